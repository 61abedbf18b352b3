//! Event bus between the presentation layer and the orchestrator.
//!
//! Two bounded channels, `UI -> core` and `core -> UI`. Sends never block: a
//! full channel is a failure. Every send goes through a shared
//! [`CircuitBreaker`] so a stuck consumer cannot make producers pile up.

mod circuit_breaker;
mod events;

pub use circuit_breaker::{CircuitBreaker, CircuitState, DEFAULT_MAX_FAILURES, DEFAULT_RESET_TIMEOUT};
pub use events::{ConfirmationRequest, CoreEvent, UiEvent};

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Capacity of each direction.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Direction of a bus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    UiToCore,
    CoreToUi,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UiToCore => f.write_str("ui->core"),
            Self::CoreToUi => f.write_str("core->ui"),
        }
    }
}

/// Reasons a send was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The breaker is open, nothing was attempted
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The channel buffer is full
    #[error("{0} channel is full")]
    ChannelFull(Channel),

    /// The bus was closed or the receiving side is gone
    #[error("{0} channel is closed")]
    Closed(Channel),
}

/// Callback invoked for every failed send.
pub type ErrorCallback = Arc<dyn Fn(&BusError) + Send + Sync>;

/// Bidirectional bounded event bus.
pub struct EventBus {
    ui_to_core_tx: Mutex<Option<mpsc::Sender<UiEvent>>>,
    core_to_ui_tx: Mutex<Option<mpsc::Sender<CoreEvent>>>,
    ui_to_core_rx: Mutex<Option<mpsc::Receiver<UiEvent>>>,
    core_to_ui_rx: Mutex<Option<mpsc::Receiver<CoreEvent>>>,
    breaker: CircuitBreaker,
    on_error: RwLock<Option<ErrorCallback>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("breaker", &self.breaker)
            .field("on_error", &"<callback>")
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates a bus with capacity 100 per direction and the default breaker.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CHANNEL_CAPACITY, CircuitBreaker::new())
    }

    /// Creates a bus with a custom capacity and breaker.
    #[must_use]
    pub fn with_settings(capacity: usize, breaker: CircuitBreaker) -> Self {
        let (ui_tx, ui_rx) = mpsc::channel(capacity.max(1));
        let (core_tx, core_rx) = mpsc::channel(capacity.max(1));
        Self {
            ui_to_core_tx: Mutex::new(Some(ui_tx)),
            core_to_ui_tx: Mutex::new(Some(core_tx)),
            ui_to_core_rx: Mutex::new(Some(ui_rx)),
            core_to_ui_rx: Mutex::new(Some(core_rx)),
            breaker,
            on_error: RwLock::new(None),
        }
    }

    /// Convenience constructor for a custom breaker policy.
    #[must_use]
    pub fn with_breaker(capacity: usize, max_failures: u32, reset_timeout: Duration) -> Self {
        Self::with_settings(capacity, CircuitBreaker::with_settings(max_failures, reset_timeout))
    }

    /// Installs the callback fired on every failed send.
    pub fn set_error_callback(&self, callback: impl Fn(&BusError) + Send + Sync + 'static) {
        *self.on_error.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Sends an event from the UI to the orchestrator.
    pub fn send_to_core(&self, event: UiEvent) -> Result<(), BusError> {
        self.send(&self.ui_to_core_tx, Channel::UiToCore, event)
    }

    /// Sends an event from the orchestrator to the UI.
    pub fn send_to_ui(&self, event: CoreEvent) -> Result<(), BusError> {
        self.send(&self.core_to_ui_tx, Channel::CoreToUi, event)
    }

    /// Takes the receiving end of the `UI -> core` channel. Only the first call gets it.
    pub fn ui_to_core_channel(&self) -> Option<mpsc::Receiver<UiEvent>> {
        self.ui_to_core_rx.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Takes the receiving end of the `core -> UI` channel. Only the first call gets it.
    pub fn core_to_ui_channel(&self) -> Option<mpsc::Receiver<CoreEvent>> {
        self.core_to_ui_rx.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Closes both directions. Receivers drain what is buffered, then end.
    pub fn close(&self) {
        self.ui_to_core_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.core_to_ui_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        debug!("Event bus closed");
    }

    /// The breaker guarding this bus.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn send<T>(
        &self,
        sender: &Mutex<Option<mpsc::Sender<T>>>,
        channel: Channel,
        event: T,
    ) -> Result<(), BusError> {
        if self.breaker.is_open() {
            return Err(self.report(BusError::CircuitOpen));
        }

        let result = match sender.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            None => Err(BusError::Closed(channel)),
            Some(tx) => tx.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => BusError::ChannelFull(channel),
                TrySendError::Closed(_) => BusError::Closed(channel),
            }),
        };

        match result {
            Ok(()) => {
                self.breaker.record_success();
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    fn report(&self, err: BusError) -> BusError {
        self.breaker.record_failure();
        let callback = self.on_error.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(&err);
        }
        err
    }
}
