//! Request handles and the shared cancellation registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::AbortHandle;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Correlates one dispatched request across log lines, the registry, and its
/// handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Shared cancel state between a handle, the registry, and the spawned
/// request task.
#[derive(Debug, Default)]
pub(crate) struct CancelState {
    cancelled: AtomicBool,
    abort: Mutex<Option<AbortHandle>>,
}

impl CancelState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Flips the cancelled flag and aborts the task. Returns `true` only on
    /// the first call; the flag is monotonic.
    fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut abort = self
            .abort
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(abort) = abort.take() {
            abort.abort();
        }
        true
    }

    /// Attaches the abort capability of the spawned task. If cancellation
    /// already happened, the task is aborted on the spot.
    pub(crate) fn attach(&self, handle: AbortHandle) {
        {
            let mut abort = self
                .abort
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *abort = Some(handle);
        }
        // A cancel that raced ahead of the attach saw no handle to abort;
        // re-checking after the store closes that window.
        if self.is_cancelled() {
            let mut abort = self
                .abort
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(abort) = abort.take() {
                abort.abort();
            }
        }
    }
}

/// A caller-owned reference to one in-flight (or completed) request.
///
/// Cloning a handle does not duplicate the request; every clone cancels the
/// same operation. `cancel` is idempotent and a no-op once the request has
/// completed.
#[derive(Clone)]
pub struct RequestHandle {
    id: RequestId,
    state: Arc<CancelState>,
    registry: CancellationRegistry,
}

impl RequestHandle {
    pub(crate) fn new(
        id: RequestId,
        state: Arc<CancelState>,
        registry: CancellationRegistry,
    ) -> Self {
        Self {
            id,
            state,
            registry,
        }
    }

    /// The id of the request this handle refers to.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Whether this request has been cancelled. Monotonic: once `true`,
    /// always `true`.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Cancels the request: suppresses result delivery and asks the
    /// transport to abort the in-flight operation.
    ///
    /// Idempotent: a second call, or a call after completion, does nothing.
    pub fn cancel(&self) {
        if self.state.cancel() {
            self.registry.remove(self.id);
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Tracks outstanding request handles so a group can be cancelled
/// atomically.
///
/// The registry holds only weak references: a handle's lifetime is governed
/// by its creator, and entries are removed at the first of completion or
/// cancellation. Registration, removal, and group cancellation are safe to
/// call concurrently from multiple call sites.
#[derive(Clone, Debug, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<HashMap<RequestId, Weak<CancelState>>>>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle's request to the registry. The registry keeps only a
    /// weak reference; ownership stays with the handle's creator.
    pub fn register(&self, handle: &RequestHandle) {
        let mut entries = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(handle.id, Arc::downgrade(&handle.state));
    }

    /// Removes a request from the registry. Absent ids are tolerated, so
    /// removal at completion and removal at cancellation cannot conflict.
    pub fn remove(&self, id: RequestId) {
        let mut entries = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id);
    }

    /// Number of requests currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no requests are currently registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every handle in the given collection exactly once, tolerating
    /// handles that already completed or were already cancelled (each is a
    /// no-op).
    pub fn cancel_all<'a, I>(&self, handles: I)
    where
        I: IntoIterator<Item = &'a RequestHandle>,
    {
        for handle in handles {
            handle.cancel();
        }
    }
}
