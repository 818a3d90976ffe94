//! Bundled default interceptors: a connectivity gate and a token-refresh
//! policy, composed into the default chain in exactly that order.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::interceptor::{Interceptor, InterceptorChain, RetryDecision};
use crate::request::WireRequest;

/// Lowercase name of the credential header the token policy writes.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Reports whether a network is currently reachable.
///
/// Transports implement this so the connectivity gate can consult the same
/// collaborator that will carry the request.
pub trait Connectivity: Send + Sync {
    /// Returns `true` when the network is reachable.
    fn is_connected(&self) -> bool;
}

/// A monitor that always reports a reachable network.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Supplies and refreshes the credential injected by [`TokenRefresh`].
///
/// Implementations are shared across concurrent requests and must serialize
/// access to any cached credential themselves (e.g. behind a
/// `tokio::sync::Mutex`).
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns the current credential, if one is available.
    async fn current(&self) -> Option<String>;

    /// Obtains a fresh credential, e.g. via a refresh-token exchange.
    ///
    /// # Errors
    ///
    /// A refresh failure leaves the original request failure in place; it is
    /// not retried.
    async fn refresh(&self) -> Result<String, Error>;
}

/// Fails a request fast with [`Error::Offline`] when the monitor reports no
/// network, before any bytes are sent.
pub struct ConnectivityGate {
    monitor: Arc<dyn Connectivity>,
}

impl ConnectivityGate {
    /// Creates a gate over the given monitor.
    #[must_use]
    pub fn new(monitor: Arc<dyn Connectivity>) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl Interceptor for ConnectivityGate {
    async fn adapt(&self, request: WireRequest) -> Result<WireRequest, Error> {
        if self.monitor.is_connected() {
            Ok(request)
        } else {
            Err(Error::Offline)
        }
    }
}

/// Injects the current credential on every attempt and refreshes it once
/// after an authorization failure.
///
/// A 401 on the first attempt triggers exactly one
/// [`TokenSource::refresh`] and one resubmission; a 401 on the refreshed
/// attempt is terminal. This bounds the policy at one refresh per request
/// and prevents refresh loops.
pub struct TokenRefresh {
    source: Arc<dyn TokenSource>,
}

impl TokenRefresh {
    /// Creates the policy over the given token source.
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Interceptor for TokenRefresh {
    async fn adapt(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        if let Some(token) = self.source.current().await {
            request.set_header(AUTHORIZATION_HEADER, format!("Bearer {token}"));
        }
        Ok(request)
    }

    async fn retry(
        &self,
        request: &WireRequest,
        error: &Error,
        attempt: u32,
    ) -> RetryDecision {
        if error.status() != Some(401) {
            return RetryDecision::DoNotRetry;
        }
        if attempt > 1 {
            // The refreshed credential was already rejected once; refreshing
            // again cannot help.
            debug!(url = %request.url, "authorization failed after refresh, giving up");
            return RetryDecision::DoNotRetry;
        }
        match self.source.refresh().await {
            Ok(_) => {
                debug!(url = %request.url, "credential refreshed, resubmitting");
                RetryDecision::Retry
            }
            Err(refresh_error) => {
                warn!(url = %request.url, error = %refresh_error, "credential refresh failed");
                RetryDecision::DoNotRetry
            }
        }
    }
}

/// Composes the bundled default chain: the connectivity gate followed by the
/// token-refresh policy.
#[must_use]
pub fn default_chain(
    monitor: Arc<dyn Connectivity>,
    tokens: Arc<dyn TokenSource>,
) -> InterceptorChain {
    InterceptorChain::new()
        .with(Arc::new(ConnectivityGate::new(monitor)))
        .with(Arc::new(TokenRefresh::new(tokens)))
}
