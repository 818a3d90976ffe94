//! The dispatcher: owns in-flight requests, runs the interceptor chain
//! around the transport, decodes typed responses, and delivers results
//! through cancellable awaitables.

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::codec;
use crate::errors::Error;
use crate::http::HttpTransport;
use crate::interceptor::{Interceptor, InterceptorChain, RetryDecision};
use crate::registry::{CancelState, CancellationRegistry, RequestHandle, RequestId};
use crate::request::{self, WireRequest};
use crate::target::Target;
use crate::transport::{RawResponse, Transport};

/// Dispatches [`Target`] values through the interceptor chain and a
/// [`Transport`], delivering typed results asynchronously.
///
/// Cloning a client is cheap; clones share the transport, the chain, and the
/// cancellation registry.
///
/// # Example
///
/// ```no_run
/// use courier::{Client, Target, Task};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn run() -> Result<(), courier::Error> {
/// let client = Client::builder().build()?;
/// let target = Target::builder("https://api.example.com", "/users")
///     .task(Task::QueryValue(json!({"page": 1})))
///     .build();
///
/// let pending = client.dispatch::<Vec<User>>(target);
/// let handle = pending.handle().clone();
/// let users = pending.await?;
/// assert!(!handle.is_cancelled());
/// println!("fetched {} users", users.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    chain: InterceptorChain,
    registry: CancellationRegistry,
}

/// Builder for [`Client`] instances.
///
/// # Example
///
/// ```no_run
/// use courier::Client;
/// use std::time::Duration;
///
/// # fn run() -> Result<(), courier::Error> {
/// let client = Client::builder()
///     .timeout(Duration::from_secs(30))
///     .connect_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    chain: InterceptorChain,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Sets the total request timeout of the default transport.
    ///
    /// Ignored when a custom transport is supplied: a deadline is a
    /// property of the transport, not of the dispatch pipeline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout of the default transport.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Supplies the transport. Defaults to [`HttpTransport`]; tests inject a
    /// [`MockTransport`](crate::MockTransport) here.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Appends one interceptor to the chain. Order of calls is the order
    /// `adapt` runs in.
    #[must_use]
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.chain.push(interceptor);
        self
    }

    /// Replaces the whole interceptor chain, e.g. with
    /// [`default_chain`](crate::policies::default_chain).
    #[must_use]
    pub fn interceptors(mut self, chain: InterceptorChain) -> Self {
        self.chain = chain;
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the default transport cannot be
    /// constructed.
    pub fn build(self) -> Result<Client, Error> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::with_timeouts(
                self.timeout,
                self.connect_timeout,
            )?),
        };
        Ok(Client {
            transport,
            chain: self.chain,
            registry: CancellationRegistry::new(),
        })
    }
}

impl Client {
    /// Creates a new builder for `Client` instances.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// The cancellation registry tracking this client's in-flight requests.
    #[must_use]
    pub const fn registry(&self) -> &CancellationRegistry {
        &self.registry
    }

    /// Cancels every handle in the given collection; completed or
    /// already-cancelled handles are tolerated as no-ops.
    pub fn cancel_all<'a, I>(&self, handles: I)
    where
        I: IntoIterator<Item = &'a RequestHandle>,
    {
        self.registry.cancel_all(handles);
    }

    /// Dispatches a target and decodes the response body into `T`.
    ///
    /// Returns immediately with a [`PendingResponse`]; the request runs on
    /// the Tokio runtime. Await the pending value for the typed result, or
    /// cancel it through its [`RequestHandle`].
    ///
    /// Download tasks do not produce a decodable body; use
    /// [`Client::download`] for those.
    pub fn dispatch<T>(&self, target: Target) -> PendingResponse<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.launch(target, |raw, target: &Target| {
            codec::decode_body(
                &raw.body,
                target.key_decoding(),
                std::any::type_name::<T>(),
            )
        })
    }

    /// Dispatches a download target, resolving to the path the response
    /// body was persisted at.
    pub fn download(&self, target: Target) -> PendingDownload {
        self.launch(target, |raw, _target: &Target| {
            raw.saved_to.ok_or_else(|| {
                Error::generic(
                    "download failed",
                    "the dispatched task does not persist to a destination",
                )
            })
        })
    }

    fn launch<T, F>(&self, target: Target, finish: F) -> PendingResponse<T>
    where
        T: Send + 'static,
        F: FnOnce(RawResponse, &Target) -> Result<T, Error> + Send + 'static,
    {
        let id = RequestId::next();
        let state = Arc::new(CancelState::new());
        let handle = RequestHandle::new(id, state.clone(), self.registry.clone());
        self.registry.register(&handle);

        let (tx, rx) = oneshot::channel();
        let transport = self.transport.clone();
        let chain = self.chain.clone();
        let registry = self.registry.clone();
        let task_state = state.clone();

        let join = tokio::spawn(async move {
            let result = run_attempts(transport.as_ref(), &chain, &target, id)
                .await
                .and_then(|raw| finish(raw, &target));
            if task_state.is_cancelled() {
                debug!(request_id = %id, "result suppressed for cancelled request");
            } else if tx.send(result).is_err() {
                debug!(request_id = %id, "caller dropped before delivery");
            }
            registry.remove(id);
        });
        state.attach(join.abort_handle());

        PendingResponse { handle, rx }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("chain", &self.chain)
            .field("in_flight", &self.registry.len())
            .finish()
    }
}

/// One full pass over the attempt loop: adapt, send, and consult the chain
/// on failure until a terminal outcome is reached.
async fn run_attempts(
    transport: &dyn Transport,
    chain: &InterceptorChain,
    target: &Target,
    id: RequestId,
) -> Result<RawResponse, Error> {
    // Encoding failures are terminal before anything is sent; a malformed
    // request cannot be repaired by retrying.
    let built = request::build(target)?;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        // Each attempt adapts a fresh copy of the built request, so
        // interceptor output never accumulates across retries.
        let wire = chain.adapt(built.clone()).await?;
        debug!(
            request_id = %id,
            attempt,
            method = %wire.method,
            url = %wire.url,
            "dispatching request"
        );
        match transport.send(&wire).await {
            Ok(raw) => {
                debug!(request_id = %id, status = raw.status, "request completed");
                return Ok(raw);
            }
            Err(error) => match chain.retry(&wire, &error, attempt).await {
                RetryDecision::DoNotRetry => {
                    debug!(request_id = %id, error = %error, "request failed");
                    return Err(error);
                }
                RetryDecision::Retry => {
                    warn!(request_id = %id, attempt, error = %error, "resubmitting request");
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        request_id = %id,
                        attempt,
                        ?delay,
                        error = %error,
                        "resubmitting request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}

/// The eventual typed outcome of one dispatched request.
///
/// Await it for the result, or cancel it through [`handle`](Self::handle).
/// Awaiting a cancelled request yields [`Error::Cancelled`]; the
/// success/failure value of a cancelled request is never delivered.
pub struct PendingResponse<T> {
    handle: RequestHandle,
    rx: oneshot::Receiver<Result<T, Error>>,
}

/// The eventual outcome of a dispatched download: the path the body was
/// persisted at.
pub type PendingDownload = PendingResponse<PathBuf>;

impl<T> PendingResponse<T> {
    /// The handle for this request. Clone it to cancel from elsewhere or to
    /// group it for [`Client::cancel_all`].
    #[must_use]
    pub const fn handle(&self) -> &RequestHandle {
        &self.handle
    }
}

impl<T> fmt::Debug for PendingResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse")
            .field("handle", &self.handle)
            .finish()
    }
}

impl<T: Send + 'static> IntoFuture for PendingResponse<T> {
    type Output = Result<T, Error>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { handle, rx } = self;
        Box::pin(async move {
            match rx.await {
                Ok(_) if handle.is_cancelled() => Err(Error::Cancelled),
                Ok(result) => result,
                // The sender was dropped without sending: the task was
                // aborted before delivery.
                Err(_) => Err(Error::Cancelled),
            }
        })
    }
}
