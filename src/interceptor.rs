//! Ordered adapt/retry policies applied around dispatch.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Error;
use crate::request::WireRequest;

/// Outcome of consulting an interceptor after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The failure is terminal for this interceptor; the next interceptor in
    /// the chain is consulted.
    DoNotRetry,
    /// Resubmit the request immediately.
    Retry,
    /// Resubmit the request after a non-blocking delay.
    RetryAfter(Duration),
}

/// A policy object that can rewrite outgoing requests and decide whether a
/// failed attempt is resubmitted.
///
/// `adapt` runs before every attempt, including retried attempts, and must
/// therefore be side-effect-idempotent. Interceptors are shared across
/// concurrent requests; any mutable state they hold must serialize its own
/// access.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Rewrites the outgoing request, or fails fast.
    ///
    /// Each interceptor receives the previous interceptor's output; the
    /// default implementation passes the request through unchanged.
    ///
    /// # Errors
    ///
    /// A returned error abandons the attempt and is delivered to the caller
    /// as the terminal failure.
    async fn adapt(&self, request: WireRequest) -> Result<WireRequest, Error> {
        Ok(request)
    }

    /// Decides whether a failed attempt is resubmitted.
    ///
    /// `attempt` counts completed attempts for this request, starting at 1
    /// for the first failure. The default implementation declines.
    async fn retry(
        &self,
        request: &WireRequest,
        error: &Error,
        attempt: u32,
    ) -> RetryDecision {
        let _ = (request, error, attempt);
        RetryDecision::DoNotRetry
    }
}

/// An ordered sequence of interceptors.
///
/// Order is fixed at construction: `adapt` runs front to back, each
/// interceptor seeing the previous one's output, and after a failure the
/// interceptors are consulted front to back with the first decision other
/// than [`RetryDecision::DoNotRetry`] winning.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor, returning the chain for further composition.
    #[must_use]
    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Appends an interceptor in place.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Number of interceptors in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs every interceptor's `adapt` in order.
    ///
    /// # Errors
    ///
    /// Propagates the first interceptor failure; later interceptors are not
    /// consulted.
    pub async fn adapt(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        for interceptor in &self.interceptors {
            request = interceptor.adapt(request).await?;
        }
        Ok(request)
    }

    /// Consults every interceptor's `retry` in order; the first decision
    /// other than [`RetryDecision::DoNotRetry`] wins.
    pub async fn retry(
        &self,
        request: &WireRequest,
        error: &Error,
        attempt: u32,
    ) -> RetryDecision {
        for interceptor in &self.interceptors {
            match interceptor.retry(request, error, attempt).await {
                RetryDecision::DoNotRetry => {}
                decision => return decision,
            }
        }
        RetryDecision::DoNotRetry
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
