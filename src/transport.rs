//! The seam between the dispatch pipeline and whatever actually moves bytes.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::Error;
use crate::request::WireRequest;

/// The raw outcome of a successful send: status, headers, and body bytes,
/// plus the persisted location for download requests.
#[derive(Clone, Debug, Default)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, lowercase names. Values that are not valid UTF-8
    /// are omitted.
    pub headers: BTreeMap<String, String>,
    /// Response body bytes. Empty for download requests, whose bytes are
    /// streamed to `saved_to` instead.
    pub body: Bytes,
    /// Where a download request's bytes were persisted.
    pub saved_to: Option<PathBuf>,
}

impl RawResponse {
    /// Whether the status code is in the success range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Executes one wire request.
///
/// Implementations return `Ok` only for success-status responses; a received
/// non-success response is reported as [`Error::Status`] with the body
/// preserved, and failures before any response arrives as [`Error::Http`]
/// (or implementation-specific variants). This keeps the retry loop's view
/// uniform: every `Err` is a candidate for an interceptor decision.
///
/// Cancellation is cooperative: dropping the future returned by `send` must
/// abort the underlying operation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and collects the raw response.
    ///
    /// # Errors
    ///
    /// See the trait-level contract.
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, Error>;

    /// Reports whether the network is currently reachable.
    fn is_connected(&self) -> bool {
        true
    }
}
