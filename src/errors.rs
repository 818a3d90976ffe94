use bytes::Bytes;
use thiserror::Error;

/// Maximum characters of a response body included in error messages.
const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

/// Defines errors that can occur while building, dispatching, or decoding a
/// request.
///
/// # Example: Handling dispatch errors
///
/// ```ignore
/// match client.dispatch::<User>(target).await {
///     Err(Error::Status { status: 429, .. }) => {
///         tracing::warn!("rate limited");
///         // Retry with backoff
///     }
///     Err(Error::Offline) => {
///         // Surface an offline banner, queue for later
///     }
///     // ...
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport failed before a response was received (connection
    /// reset, DNS failure, TLS error, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    ///
    /// The response body bytes are preserved so callers can inspect a
    /// structured error payload; use [`Error::body_preview`] for display.
    #[error("server returned HTTP {status}")]
    Status {
        /// HTTP status code (e.g., 401, 429, 500)
        status: u16,
        /// Raw response body
        body: Bytes,
    },

    /// Serializing the request body failed. Terminal: the request is
    /// malformed and resubmitting it cannot help.
    #[error("request body encoding failed: {0}")]
    Encoding(#[source] serde_json::Error),

    /// A value handed to a parameter-encoding task did not serialize to a
    /// flat key-value map.
    ///
    /// Distinct from [`Error::Encoding`]: the value serialized fine, but its
    /// shape cannot be rendered as URL or form parameters.
    #[error("parameters are not representable as a flat key-value map")]
    ParameterConversion,

    /// The response body could not be decoded into the requested type.
    #[error("failed to decode {context}: {source}")]
    Decoding {
        /// Name of the type the body was decoded into
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The connectivity monitor reported no reachable network before the
    /// request was sent.
    #[error("no network connectivity")]
    Offline,

    /// The request was cancelled via its [`RequestHandle`](crate::RequestHandle)
    /// before a result was delivered.
    #[error("request was cancelled")]
    Cancelled,

    /// Reading an upload source or persisting a download failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Classified catch-all with a human-readable title and detail, used
    /// when no more specific cause is known. Callers always receive a
    /// classified error; failures are never dropped silently.
    #[error("{title}: {detail}")]
    Generic {
        /// Short summary suitable for a heading
        title: String,
        /// Longer human-readable description
        detail: String,
    },
}

impl Error {
    /// Builds a [`Error::Generic`] from a title and detail pair.
    #[must_use]
    pub fn generic(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Generic {
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Returns the HTTP status code for [`Error::Status`] failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the preserved response body for [`Error::Status`] failures.
    #[must_use]
    pub const fn response_body(&self) -> Option<&Bytes> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns a truncated, lossy-UTF-8 preview of the response body for
    /// [`Error::Status`] failures.
    #[must_use]
    pub fn body_preview(&self) -> Option<String> {
        self.response_body().map(|body| {
            let text = String::from_utf8_lossy(body);
            let mut preview: String = text.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
            if text.chars().count() > ERROR_BODY_PREVIEW_LENGTH {
                preview.push_str("...");
            }
            preview
        })
    }

    /// Returns `true` if this error is likely transient and the request may
    /// succeed on retry.
    ///
    /// Transient: transport-level failures, `Offline`, and responses with
    /// status 408, 429, or 5xx. Everything else is permanent: encoding and
    /// decoding failures mean the request or response is malformed, and
    /// resubmitting an identical request cannot change that.
    ///
    /// Retry *policy* lives in interceptors; this helper is advisory for
    /// custom [`Interceptor`](crate::Interceptor) implementations.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Offline => true,
            Self::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            Self::Encoding(_)
            | Self::ParameterConversion
            | Self::Decoding { .. }
            | Self::Cancelled
            | Self::Io(_)
            | Self::Generic { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_includes_code() {
        let error = Error::Status {
            status: 429,
            body: Bytes::from_static(b"slow down"),
        };
        let display = format!("{error}");
        assert!(display.contains("429"));
    }

    #[test]
    fn generic_display_includes_title_and_detail() {
        let error = Error::generic("upload failed", "file vanished mid-read");
        let display = format!("{error}");
        assert!(display.contains("upload failed"));
        assert!(display.contains("file vanished mid-read"));
    }

    #[test]
    fn parameter_conversion_display_is_distinct_from_encoding() {
        let conversion = format!("{}", Error::ParameterConversion);
        let encoding = format!(
            "{}",
            Error::Encoding(serde_json::from_str::<serde_json::Value>("{bad").unwrap_err())
        );
        assert!(conversion.contains("flat key-value map"));
        assert!(encoding.contains("encoding failed"));
        assert_ne!(conversion, encoding);
    }

    #[test]
    fn decoding_display_names_target_type() {
        let source = serde_json::from_str::<u32>("\"nope\"").unwrap_err();
        let error = Error::Decoding {
            context: "Vec<User>".to_string(),
            source,
        };
        let display = format!("{error}");
        assert!(display.contains("Vec<User>"));
    }

    #[test]
    fn body_preview_truncates_long_bodies() {
        let long_body: String = "x".repeat(500);
        let error = Error::Status {
            status: 500,
            body: Bytes::from(long_body),
        };
        let preview = error.body_preview().unwrap();
        assert!(preview.len() <= ERROR_BODY_PREVIEW_LENGTH + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn status_accessors() {
        let error = Error::Status {
            status: 401,
            body: Bytes::from_static(b"{}"),
        };
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.response_body().map(|b| b.len()), Some(2));
        assert_eq!(Error::Offline.status(), None);
    }

    #[test]
    fn retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 504] {
            let error = Error::Status {
                status,
                body: Bytes::new(),
            };
            assert!(error.is_retryable(), "{status} should be retryable");
        }
    }

    #[test]
    fn non_retryable_client_statuses() {
        for status in [400, 401, 403, 404, 422] {
            let error = Error::Status {
                status,
                body: Bytes::new(),
            };
            assert!(!error.is_retryable(), "{status} should not be retryable");
        }
    }

    #[test]
    fn offline_is_retryable() {
        assert!(Error::Offline.is_retryable());
    }

    #[test]
    fn terminal_errors_are_not_retryable() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        assert!(!Error::Encoding(json_err).is_retryable());
        assert!(!Error::ParameterConversion.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::generic("t", "d").is_retryable());
        let decode_err = serde_json::from_str::<u32>("\"s\"").unwrap_err();
        assert!(
            !Error::Decoding {
                context: "u32".into(),
                source: decode_err,
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists");
        let error: Error = io.into();
        assert!(matches!(error, Error::Io(_)));
        assert!(!error.is_retryable());
    }
}
