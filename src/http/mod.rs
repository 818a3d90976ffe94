//! Production transport over `reqwest`.
//!
//! [`HttpTransport`] turns a [`WireRequest`] into a real network operation:
//! in-memory bodies are sent as-is, file and multipart bodies are streamed
//! from disk, and download requests are streamed straight to their
//! destination without buffering the full body in memory.

pub(crate) mod download;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as ReqwestClient;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::errors::Error;
use crate::policies::Connectivity;
use crate::request::{WireBody, WireRequest};
use crate::task::{Part, PartContent};
use crate::transport::{RawResponse, Transport};

/// The production [`Transport`], backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: ReqwestClient,
}

impl HttpTransport {
    /// Creates a transport with `reqwest`'s default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying client cannot be built
    /// (e.g. TLS backend initialization failure).
    pub fn new() -> Result<Self, Error> {
        Self::with_timeouts(None, None)
    }

    /// Wraps an already-configured `reqwest` client.
    #[must_use]
    pub const fn from_client(http: ReqwestClient) -> Self {
        Self { http }
    }

    pub(crate) fn with_timeouts(
        timeout: Option<Duration>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, Error> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::generic("invalid header name", name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::generic("invalid header value", format!("for {name}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn response_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

async fn multipart_form(parts: &[Part]) -> Result<reqwest::multipart::Form, Error> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        let mut piece = match &part.content {
            PartContent::Bytes(data) => reqwest::multipart::Part::bytes(data.to_vec()),
            PartContent::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(ReaderStream::new(
                    file,
                )))
            }
        };
        if let Some(file_name) = &part.file_name {
            piece = piece.file_name(file_name.clone());
        } else if let PartContent::File(path) = &part.content
            && let Some(file_name) = path.file_name()
        {
            piece = piece.file_name(file_name.to_string_lossy().into_owned());
        }
        if let Some(mime_type) = &part.mime_type {
            piece = piece.mime_str(mime_type)?;
        }
        form = form.part(part.name.clone(), piece);
    }
    Ok(form)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, Error> {
        let headers = header_map(&request.headers)?;
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(headers);

        builder = match &request.body {
            WireBody::Empty => builder,
            WireBody::Bytes(content) => builder.body(content.clone()),
            WireBody::Form(fields) => builder.form(fields),
            WireBody::Multipart(parts) => builder.multipart(multipart_form(parts).await?),
            WireBody::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                builder.body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response_headers(response.headers());
        debug!(status = status.as_u16(), url = %request.url, "transport response received");

        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        if let Some(destination) = &request.download {
            let path = download::persist_stream(destination, response.bytes_stream()).await?;
            return Ok(RawResponse {
                status: status.as_u16(),
                headers,
                body: Bytes::new(),
                saved_to: Some(path),
            });
        }

        let body = response.bytes().await?;
        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
            saved_to: None,
        })
    }
}

impl Connectivity for HttpTransport {
    fn is_connected(&self) -> bool {
        true
    }
}
