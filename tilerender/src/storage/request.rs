//! Take-once callback delivery and cancellation handles.
//!
//! A fetch is split into two halves that share exactly one piece of
//! mutable state, the [`CallbackSlot`]:
//!
//! ```text
//!   caller                              fetch task
//!   ──────                              ──────────
//!   AsyncRequest ── Weak<CallbackSlot> ──► Arc<CallbackSlot> ◄── PendingFetch
//!        │                                                           │
//!        └──────────── CancellationToken (shared) ───────────────────┘
//! ```
//!
//! Whichever of {cancel, deliver} takes the callback out of the slot first
//! wins; the other finds it empty. The handle holds only a weak link, so
//! it never keeps a finished fetch alive.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::trace;

use super::resource::Resource;
use super::response::Response;
use super::transport::{assemble_response, TransportResult};
use super::FetchError;

/// Single-use completion callback.
pub type Callback = Box<dyn FnOnce(Response) + Send + 'static>;

/// Holds a callback until it is taken.
pub struct CallbackSlot {
    callback: Mutex<Option<Callback>>,
}

impl CallbackSlot {
    fn new(callback: Callback) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
        }
    }

    /// Removes the callback. Only the first call returns `Some`.
    pub fn take(&self) -> Option<Callback> {
        self.callback.lock().take()
    }

    pub fn is_filled(&self) -> bool {
        self.callback.lock().is_some()
    }
}

/// What happened to a response handed to [`PendingFetch::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The callback ran with the response.
    Delivered,
    /// The callback was already gone; the response was discarded.
    Dropped,
}

/// Caller-held cancellation handle for one in-flight fetch.
///
/// Dropping the handle before delivery cancels the fetch: the callback is
/// removed from its slot and dropped, and the fetch task is signalled to
/// abandon the transport. Dropping it after delivery does nothing.
#[must_use = "dropping an AsyncRequest cancels the fetch"]
pub struct AsyncRequest {
    resource: Resource,
    token: CancellationToken,
    slot: Weak<CallbackSlot>,
}

impl AsyncRequest {
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Whether the callback has neither fired nor been cancelled.
    pub fn is_pending(&self) -> bool {
        self.slot.upgrade().is_some_and(|slot| slot.is_filled())
    }

    /// Cancels explicitly. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for AsyncRequest {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(slot) = self.slot.upgrade() {
            if slot.take().is_some() {
                trace!(url = %self.resource.url, "Fetch cancelled before delivery");
            }
        }
    }
}

impl std::fmt::Debug for AsyncRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncRequest")
            .field("resource", &self.resource)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Fetch-side binding of a resource to its callback.
pub struct PendingFetch {
    resource: Resource,
    slot: Arc<CallbackSlot>,
    token: CancellationToken,
}

impl PendingFetch {
    /// Binds `callback` to `resource` and returns both halves.
    pub fn new(resource: Resource, callback: Callback) -> (PendingFetch, AsyncRequest) {
        let slot = Arc::new(CallbackSlot::new(callback));
        let token = CancellationToken::new();

        let request = AsyncRequest {
            resource: resource.clone(),
            token: token.clone(),
            slot: Arc::downgrade(&slot),
        };
        let pending = PendingFetch {
            resource,
            slot,
            token,
        };
        (pending, request)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Resolves once the caller cancels.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Validates a transport result and delivers it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidBody`] for a non-binary body. The
    /// callback stays in its slot, so a corrected result may still be
    /// delivered.
    pub fn respond(&self, result: TransportResult) -> Result<Delivery, FetchError> {
        let response = assemble_response(result)?;
        Ok(self.deliver(response))
    }

    /// Hands `response` to the callback unless it was already taken.
    ///
    /// The callback runs outside the slot lock.
    pub fn deliver(&self, response: Response) -> Delivery {
        match self.slot.take() {
            Some(callback) => {
                callback(response);
                Delivery::Delivered
            }
            None => Delivery::Dropped,
        }
    }
}
