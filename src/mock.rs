//! Deterministic transport substitution for tests.
//!
//! [`MockTransport`] implements the same [`Transport`] contract as the
//! production transport, so a [`Client`](crate::Client) built over it is
//! indistinguishable to callers: handles, cancellation, interceptors, and
//! typed decoding all behave identically. Instead of network I/O it resolves
//! responses from a fixture table keyed by method and URL path, after a
//! configurable delay.
//!
//! An error override can be injected to simulate failure deterministically:
//! once set, every subsequent send fails with the produced error until the
//! override is cleared. The override and delay are instance state, so two
//! mock transports in concurrently running tests never interfere.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::errors::Error;
use crate::http::download;
use crate::policies::Connectivity;
use crate::request::WireRequest;
use crate::transport::{RawResponse, Transport};

type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

/// A [`Transport`] that resolves canned responses instead of performing
/// network I/O.
///
/// ```
/// use courier::MockTransport;
/// use reqwest::Method;
/// use serde_json::json;
///
/// let mock = MockTransport::new()
///     .with_delay(std::time::Duration::from_millis(50))
///     .json_fixture(Method::GET, "/users", json!([{"id": 1, "name": "ada"}]));
/// ```
pub struct MockTransport {
    fixtures: HashMap<(Method, String), Bytes>,
    delay: Duration,
    error: Mutex<Option<ErrorFactory>>,
    connected: AtomicBool,
}

impl MockTransport {
    /// Creates a mock with no fixtures, no delay, and connectivity reported
    /// as available.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fixtures: HashMap::new(),
            delay: Duration::ZERO,
            error: Mutex::new(None),
            connected: AtomicBool::new(true),
        }
    }

    /// Sets the delay applied before every resolution, success or failure.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Registers a canned response body for a method and URL path.
    #[must_use]
    pub fn fixture(
        mut self,
        method: Method,
        path: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        self.fixtures.insert((method, path.into()), body.into());
        self
    }

    /// Registers a canned JSON response for a method and URL path.
    #[must_use]
    pub fn json_fixture(
        self,
        method: Method,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        self.fixture(method, path, body.to_string())
    }

    /// Injects a failure delivered to the next and all subsequent sends
    /// until [`clear_failure`](Self::clear_failure) is called.
    ///
    /// The factory is invoked once per send, so non-`Clone` errors can be
    /// reproduced for every delivery.
    pub fn fail_with<F>(&self, factory: F)
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        let mut error = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        *error = Some(Box::new(factory));
    }

    /// Clears the injected failure; fixture-based responses resume.
    pub fn clear_failure(&self) {
        let mut error = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        *error = None;
    }

    /// Sets what [`Connectivity::is_connected`] reports.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn injected_error(&self) -> Option<Error> {
        let error = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        error.as_ref().map(|factory| factory())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, Error> {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = self.injected_error() {
            debug!(url = %request.url, "mock delivering injected failure");
            return Err(error);
        }

        let key = (request.method.clone(), request.url_path().to_string());
        let Some(body) = self.fixtures.get(&key) else {
            return Err(Error::generic(
                "no fixture",
                format!("no canned response for {} {}", key.0, key.1),
            ));
        };
        debug!(url = %request.url, bytes = body.len(), "mock resolving fixture");

        if let Some(destination) = &request.download {
            let path = download::persist_bytes(destination, body).await?;
            return Ok(RawResponse {
                status: 200,
                headers: std::collections::BTreeMap::new(),
                body: Bytes::new(),
                saved_to: Some(path),
            });
        }

        Ok(RawResponse {
            status: 200,
            headers: std::collections::BTreeMap::new(),
            body: body.clone(),
            saved_to: None,
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Connectivity for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
