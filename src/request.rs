//! The pure transform from a [`Target`] to a ready-to-send [`WireRequest`].
//!
//! [`build`] performs no I/O: file and multipart bodies carry paths that the
//! transport streams at send time, and download destinations are resolved
//! when bytes actually arrive. Given the same target, repeated builds produce
//! identical wire requests.

use bytes::Bytes;
use reqwest::Method;
use std::collections::BTreeMap;
use std::path::PathBuf;
use serde_json::Value;

use crate::codec::{self, EncoderConfig};
use crate::errors::Error;
use crate::task::{Destination, ParameterEncoding, Parameters, Part, Task};
use crate::target::Target;

const CONTENT_TYPE: &str = "content-type";
const JSON_MEDIA_TYPE: &str = "application/json";
const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// A fully-resolved, ready-to-send request: method, URL, headers, and body.
///
/// Header names are normalized to lowercase so interceptors can read and
/// replace them without case juggling.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRequest {
    /// The HTTP method.
    pub method: Method,
    /// The resolved URL, query string included.
    pub url: String,
    /// Request headers, lowercase names.
    pub headers: BTreeMap<String, String>,
    /// The request body.
    pub body: WireBody,
    /// When present, the response body is persisted here instead of being
    /// decoded.
    pub download: Option<Destination>,
}

impl WireRequest {
    /// Returns a header value by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Sets a header, replacing any existing value for the name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    /// The path component of the resolved URL, without scheme, host, or
    /// query string.
    #[must_use]
    pub fn url_path(&self) -> &str {
        let after_scheme = match self.url.find("://") {
            Some(index) => &self.url[index + 3..],
            None => self.url.as_str(),
        };
        let path = match after_scheme.find('/') {
            Some(index) => &after_scheme[index..],
            None => "",
        };
        match path.find('?') {
            Some(index) => &path[..index],
            None => path,
        }
    }
}

/// The body of a [`WireRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum WireBody {
    /// No body.
    Empty,
    /// In-memory body bytes, sent verbatim.
    Bytes(Bytes),
    /// Form fields, URL-encoded into the body by the transport.
    Form(Vec<(String, String)>),
    /// Multipart form parts, streamed by the transport.
    Multipart(Vec<Part>),
    /// A file streamed from disk by the transport.
    File(PathBuf),
}

/// Renders a target into a wire request.
///
/// This is a pure transform: repeated calls with an identical target yield
/// an identical wire request (method, URL, headers, and body bytes).
///
/// # Errors
///
/// - [`Error::Encoding`] when a JSON body cannot be rendered.
/// - [`Error::ParameterConversion`] when a [`Task::QueryValue`] value does
///   not serialize to a flat key-value map.
pub fn build(target: &Target) -> Result<WireRequest, Error> {
    let mut headers: BTreeMap<String, String> = target
        .headers()
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect();

    let mut query: Vec<(String, String)> = Vec::new();
    let mut download = None;
    let mut default_content_type = None;

    let body = match target.task() {
        Task::Plain => WireBody::Empty,
        Task::Data(bytes) => {
            default_content_type = Some(OCTET_STREAM_MEDIA_TYPE);
            WireBody::Bytes(bytes.clone())
        }
        Task::Json(value) => {
            default_content_type = Some(JSON_MEDIA_TYPE);
            WireBody::Bytes(encode_json(value, EncoderConfig::default())?)
        }
        Task::JsonWith(value, config) => {
            default_content_type = Some(JSON_MEDIA_TYPE);
            WireBody::Bytes(encode_json(value, *config)?)
        }
        Task::QueryValue(value) => {
            query = parameter_pairs(&codec::to_parameters(value)?);
            WireBody::Empty
        }
        Task::Parameters { params, encoding } => match encoding {
            ParameterEncoding::Query => {
                query = parameter_pairs(params);
                WireBody::Empty
            }
            ParameterEncoding::FormBody => WireBody::Form(parameter_pairs(params)),
            ParameterEncoding::JsonBody => {
                default_content_type = Some(JSON_MEDIA_TYPE);
                WireBody::Bytes(encode_json(
                    &Value::Object(params.clone()),
                    EncoderConfig::default(),
                )?)
            }
        },
        Task::CompositeData { body, query: params } => {
            query = parameter_pairs(params);
            default_content_type = Some(OCTET_STREAM_MEDIA_TYPE);
            WireBody::Bytes(body.clone())
        }
        Task::CompositeParameters {
            body,
            body_encoding,
            query: params,
        } => {
            query = parameter_pairs(params);
            match body_encoding {
                // A body cannot carry a URL query, so the query strategy
                // degrades to its body-side equivalent.
                ParameterEncoding::Query | ParameterEncoding::FormBody => {
                    WireBody::Form(parameter_pairs(body))
                }
                ParameterEncoding::JsonBody => {
                    default_content_type = Some(JSON_MEDIA_TYPE);
                    WireBody::Bytes(encode_json(
                        &Value::Object(body.clone()),
                        EncoderConfig::default(),
                    )?)
                }
            }
        }
        Task::UploadFile(path) => {
            default_content_type = Some(OCTET_STREAM_MEDIA_TYPE);
            WireBody::File(path.clone())
        }
        Task::UploadMultipart(parts) => WireBody::Multipart(parts.clone()),
        Task::UploadCompositeMultipart { parts, query: params } => {
            query = parameter_pairs(params);
            WireBody::Multipart(parts.clone())
        }
        Task::Download(destination) => {
            download = Some(destination.clone());
            WireBody::Empty
        }
        Task::DownloadParameters {
            params,
            encoding,
            destination,
        } => {
            download = Some(destination.clone());
            match encoding {
                ParameterEncoding::Query => {
                    query = parameter_pairs(params);
                    WireBody::Empty
                }
                ParameterEncoding::FormBody => WireBody::Form(parameter_pairs(params)),
                ParameterEncoding::JsonBody => {
                    default_content_type = Some(JSON_MEDIA_TYPE);
                    WireBody::Bytes(encode_json(
                        &Value::Object(params.clone()),
                        EncoderConfig::default(),
                    )?)
                }
            }
        }
    };

    if let Some(media_type) = default_content_type
        && !headers.contains_key(CONTENT_TYPE)
    {
        headers.insert(CONTENT_TYPE.to_string(), media_type.to_string());
    }

    Ok(WireRequest {
        method: target.method().clone(),
        url: resolve_url(target.base_url(), target.path(), &query),
        headers,
        body,
        download,
    })
}

fn encode_json(value: &Value, config: EncoderConfig) -> Result<Bytes, Error> {
    codec::encode_value(value, config).map(Bytes::from)
}

/// Renders a parameter map into key-value string pairs in deterministic
/// order. Scalars render bare; nested values render as compact JSON.
fn parameter_pairs(params: &Parameters) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(name, value)| (name.clone(), parameter_value(value)))
        .collect()
}

fn parameter_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn resolve_url(base_url: &str, path: &str, query: &[(String, String)]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut url = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{}", path.trim_start_matches('/'))
    };
    if !query.is_empty() {
        let rendered: Vec<String> = query
            .iter()
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect();
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&rendered.join("&"));
    }
    url
}
