//! Body and parameter encoding strategies for a request.
//!
//! A [`Task`] describes *what* a request carries (raw bytes, an encodable
//! JSON body, URL parameters, a multipart upload, or a download destination)
//! without performing any encoding itself. The request builder in
//! [`crate::request`] turns a task into concrete wire bytes.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::codec::EncoderConfig;
use crate::errors::Error;

/// A flat key-value parameter map.
///
/// Iteration order is deterministic, so repeated builds of the same target
/// render identical query strings and form bodies.
pub type Parameters = Map<String, Value>;

/// The body/parameter encoding strategy of one request.
///
/// Exactly one variant is active per request; the variant determines which
/// fields are meaningful and how the request builder renders them.
#[derive(Clone, Debug, PartialEq)]
pub enum Task {
    /// No body and no parameters.
    Plain,
    /// The given bytes are sent verbatim as the body.
    Data(Bytes),
    /// The value is serialized as a JSON body with the default encoder.
    Json(Value),
    /// The value is serialized as a JSON body with a caller-supplied
    /// encoder configuration.
    JsonWith(Value, EncoderConfig),
    /// The value is converted to a flat key-value map and rendered into the
    /// URL query string. A value that does not serialize to a JSON object
    /// fails with [`Error::ParameterConversion`].
    QueryValue(Value),
    /// The given parameters are rendered into the query string or the body,
    /// per the encoding strategy.
    Parameters {
        /// The parameters to render.
        params: Parameters,
        /// Where and how the parameters are encoded.
        encoding: ParameterEncoding,
    },
    /// A verbatim byte body combined with independent URL query parameters.
    CompositeData {
        /// The body bytes, sent verbatim.
        body: Bytes,
        /// Parameters rendered into the URL query string.
        query: Parameters,
    },
    /// Body parameters and URL query parameters set independently.
    CompositeParameters {
        /// Parameters rendered into the body.
        body: Parameters,
        /// How the body half is encoded. [`ParameterEncoding::Query`] is
        /// treated as form encoding here, since a body cannot carry a URL
        /// query.
        body_encoding: ParameterEncoding,
        /// Parameters rendered into the URL query string.
        query: Parameters,
    },
    /// The file at the given path is streamed as the request body.
    UploadFile(PathBuf),
    /// The given parts are streamed as a multipart form body.
    UploadMultipart(Vec<Part>),
    /// Multipart body parts combined with independent URL query parameters.
    UploadCompositeMultipart {
        /// The multipart body parts.
        parts: Vec<Part>,
        /// Parameters rendered into the URL query string.
        query: Parameters,
    },
    /// The response body is persisted to the given destination instead of
    /// being decoded.
    Download(Destination),
    /// A download whose request additionally carries parameters.
    DownloadParameters {
        /// The parameters to render.
        params: Parameters,
        /// Where and how the parameters are encoded.
        encoding: ParameterEncoding,
        /// Where the received bytes are persisted.
        destination: Destination,
    },
}

impl Task {
    /// Serializes a value into a [`Task::Json`] body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the value cannot be represented as
    /// JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(Self::Json(serde_json::to_value(value).map_err(Error::Encoding)?))
    }

    /// Serializes a value into a [`Task::JsonWith`] body using the given
    /// encoder configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the value cannot be represented as
    /// JSON.
    pub fn json_with<T: Serialize>(value: &T, config: EncoderConfig) -> Result<Self, Error> {
        Ok(Self::JsonWith(
            serde_json::to_value(value).map_err(Error::Encoding)?,
            config,
        ))
    }

    /// Serializes a value into a [`Task::QueryValue`].
    ///
    /// The flat-map check happens when the request is built, so a value that
    /// serializes to something other than an object is accepted here and
    /// rejected there with [`Error::ParameterConversion`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the value cannot be represented as
    /// JSON at all.
    pub fn query_of<T: Serialize>(value: &T) -> Result<Self, Error> {
        Ok(Self::QueryValue(
            serde_json::to_value(value).map_err(Error::Encoding)?,
        ))
    }

    /// Returns `true` if this task persists the response to a destination.
    #[must_use]
    pub const fn is_download(&self) -> bool {
        matches!(self, Self::Download(_) | Self::DownloadParameters { .. })
    }
}

/// Where a parameter map is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterEncoding {
    /// Percent-encoded into the URL query string.
    Query,
    /// URL-encoded into the body (`application/x-www-form-urlencoded`).
    FormBody,
    /// Serialized into a JSON object body.
    JsonBody,
}

/// One part of a multipart upload body.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    /// Form field name of the part.
    pub name: String,
    /// The part payload.
    pub content: PartContent,
    /// Optional file name reported for the part.
    pub file_name: Option<String>,
    /// Optional media type of the part (e.g. `image/png`).
    pub mime_type: Option<String>,
}

/// Payload of a multipart [`Part`]: in-memory bytes or a file streamed from
/// disk at send time.
#[derive(Clone, Debug, PartialEq)]
pub enum PartContent {
    /// In-memory payload.
    Bytes(Bytes),
    /// File streamed from disk when the request is sent.
    File(PathBuf),
}

impl Part {
    /// Creates a part from in-memory bytes.
    pub fn bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::Bytes(content.into()),
            file_name: None,
            mime_type: None,
        }
    }

    /// Creates a part streamed from a file on disk.
    ///
    /// The file is opened when the request is sent, not here; a missing file
    /// surfaces as [`Error::Io`] at dispatch time.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            content: PartContent::File(path.into()),
            file_name: None,
            mime_type: None,
        }
    }

    /// Sets the file name reported for this part.
    #[must_use]
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the media type of this part.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Where a download's received bytes are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A uniquely named file under the system temporary directory.
    TempFile,
    /// A caller-specified path.
    Path {
        /// Target path for the downloaded file.
        path: PathBuf,
        /// Whether an existing file at the path is replaced. When `false`,
        /// an existing file fails the download with [`Error::Io`].
        overwrite: bool,
    },
}
