//! The call registry: tracks every call still waiting for a response.
//!
//! # Concurrency note
//!
//! Senders allocate from their own tasks while the connection's reader task
//! resolves, so the registry is shared behind an `Arc` and guards its map
//! and id counter with one `std::sync::Mutex`. The lock is only held for a
//! map insert or remove and never across an `.await`, and continuations run
//! after it is released.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use mirai_ws_protocol::{CallId, CallKind};

use crate::{Continuation, PendingCall, RegistryError};

/// Default number of calls that may be outstanding at once.
pub const DEFAULT_CAPACITY: usize = 1024;

struct Inner {
    calls: HashMap<CallId, PendingCall>,
    /// The id handed out by the next successful allocation.
    next_id: u64,
}

/// Correlates outstanding call ids with their continuations.
///
/// ## Lifecycle
///
/// ```text
/// allocate() ──→ [pending] ──→ resolve() ──→ PendingCall::complete()
///                    │
///                    └──→ cancel() / registry dropped  (never completed)
/// ```
///
/// Ids start at 1 and increase for the registry's lifetime; they are never
/// reused, so a late or duplicated response can never complete a newer call.
pub struct CallRegistry {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl CallRegistry {
    /// Creates an empty registry that admits at most `capacity` outstanding
    /// calls.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                calls: HashMap::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                next_id: 1,
            }),
            capacity,
        }
    }

    // Every critical section is a single insert or remove, so the map is
    // consistent even if the lock was poisoned.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new call and returns its id.
    ///
    /// # Errors
    /// Returns [`RegistryError::Full`] if `capacity` calls are already
    /// outstanding. No id is consumed in that case.
    pub fn allocate<F>(&self, kind: CallKind, continuation: F) -> Result<CallId, RegistryError>
    where
        F: FnOnce(mirai_ws_protocol::SendReceipt) + Send + 'static,
    {
        self.allocate_boxed(kind, Box::new(continuation))
    }

    /// [`allocate`](Self::allocate) for an already-boxed continuation.
    pub fn allocate_boxed(
        &self,
        kind: CallKind,
        continuation: Continuation,
    ) -> Result<CallId, RegistryError> {
        let mut inner = self.lock();
        if inner.calls.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, %kind, "call registry full");
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }

        let id = CallId(inner.next_id);
        inner.next_id += 1;
        inner.calls.insert(id, PendingCall::new(id, kind, continuation));

        tracing::trace!(call_id = %id, %kind, "call registered");
        Ok(id)
    }

    /// Removes and returns the call registered under `id`.
    ///
    /// Returns `None` if no such call is outstanding: the id was never
    /// issued, was already resolved, or was cancelled.
    pub fn resolve(&self, id: CallId) -> Option<PendingCall> {
        let call = self.lock().calls.remove(&id);
        if call.is_none() {
            tracing::debug!(call_id = %id, "no pending call for response");
        }
        call
    }

    /// Removes the call registered under `id` without running it.
    ///
    /// Returns `true` if a call was removed.
    pub fn cancel(&self, id: CallId) -> bool {
        let removed = self.lock().calls.remove(&id).is_some();
        if removed {
            tracing::debug!(call_id = %id, "call cancelled");
        }
        removed
    }

    /// Drops every outstanding call without running any of them.
    ///
    /// Returns how many were abandoned. Ids keep counting from where they
    /// were.
    pub fn clear(&self) -> usize {
        let abandoned: Vec<PendingCall> = self.lock().calls.drain().map(|(_, call)| call).collect();
        // Continuations are dropped here, outside the lock.
        abandoned.len()
    }

    /// Returns the number of outstanding calls.
    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    /// Returns `true` if no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of outstanding calls.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRegistry")
            .field("outstanding", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// =========================================================================
// Tests
// =========================================================================
