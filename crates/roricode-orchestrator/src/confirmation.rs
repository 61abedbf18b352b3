//! Confirmation rendezvous between tools and the user.
//!
//! A tool asking for approval gets a fresh correlation id and a single-use
//! response slot. The request goes out over the bus and the tool's own task
//! waits; the event loop routes the matching `ConfirmationResponse` back by id.
//! The slot is removed on every path out of the wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::{ConfirmationRequest, CoreEvent, EventBus};
use crate::tools::Confirmator;

type PendingTable = Mutex<HashMap<String, oneshot::Sender<bool>>>;

/// Pending confirmation table keyed by correlation id.
pub struct ConfirmationBroker {
    bus: Arc<EventBus>,
    cancel: CancellationToken,
    pending: PendingTable,
}

impl std::fmt::Debug for ConfirmationBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationBroker")
            .field("pending", &self.pending_count())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Removes the slot when the waiting future completes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(self.id);
    }
}

fn lock(table: &PendingTable) -> MutexGuard<'_, HashMap<String, oneshot::Sender<bool>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConfirmationBroker {
    /// Creates a broker publishing on `bus`. Cancelling `cancel` denies every wait.
    pub fn new(bus: Arc<EventBus>, cancel: CancellationToken) -> Self {
        Self { bus, cancel, pending: Mutex::new(HashMap::new()) }
    }

    /// Delivers the user's answer. Returns false if no request with `id` is waiting.
    pub fn handle_response(&self, id: &str, approved: bool) -> bool {
        let Some(slot) = lock(&self.pending).remove(id) else {
            debug!(id = %id, "Confirmation response for unknown id ignored");
            return false;
        };
        slot.send(approved).is_ok()
    }

    /// Number of requests still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

#[async_trait]
impl Confirmator for ConfirmationBroker {
    async fn request_confirmation(&self, operation: &str, detail: &str, dangerous: bool) -> bool {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), tx);
        let _guard = PendingGuard { pending: &self.pending, id: &id };

        let request = ConfirmationRequest {
            id: id.clone(),
            operation: operation.to_string(),
            command: detail.to_string(),
            dangerous,
        };
        if let Err(err) = self.bus.send_to_ui(CoreEvent::ConfirmationRequest(request)) {
            warn!(id = %id, operation = %operation, error = %err, "Could not publish confirmation request, denying");
            return false;
        }
        debug!(id = %id, operation = %operation, dangerous, "Waiting for confirmation");

        tokio::select! {
            () = self.cancel.cancelled() => {
                debug!(id = %id, "Confirmation wait cancelled");
                false
            }
            answer = rx => answer.unwrap_or(false),
        }
    }
}
