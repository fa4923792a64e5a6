//! Event subscription registry.
//!
//! Handlers registered on an [`EventBus`] run synchronously, in registration
//! order, right after the session fields were updated. Channel subscribers
//! receive a [`SessionEvent`] copy through a `tokio::sync::broadcast` channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;

use crate::error::HandlerError;
use crate::event::{Event, SessionEvent};
use crate::session::Session;

/// Capacity of the subscriber notification channel.
/// Large enough for a burst of reconciliation events on startup or shutdown.
const DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// Reacts to events emitted by sessions.
pub trait EventHandler: Send + Sync {
    /// Called once per emitted event.
    fn on_event(&self, session: &Session, event: Event) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&Session, Event) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_event(&self, session: &Session, event: Event) -> Result<(), HandlerError> {
        self(session, event)
    }
}

/// Ordered handler list plus a broadcast channel for async subscribers.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    update_tx: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handler_count", &self.handler_count())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus with no handlers and no subscribers.
    pub fn new() -> Self {
        let (update_tx, _rx) = broadcast::channel(DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY);
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            update_tx,
        }
    }

    /// Appends a handler. It sees every event emitted after this call.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns a receiver for [`SessionEvent`] notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.update_tx.subscribe()
    }

    /// Number of live channel subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.update_tx.receiver_count()
    }

    /// Runs every handler, then notifies channel subscribers.
    pub(crate) fn publish(&self, session: &Session, event: Event) {
        // Copy the list so handlers may register further handlers.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        deliver(&handlers, session, event);

        let update = SessionEvent {
            session_id: session.id().clone(),
            session_name: session.to_string(),
            event,
            state: session.state(),
            locked: session.locked(),
            at: Utc::now(),
        };
        match self.update_tx.send(update) {
            Ok(count) => {
                tracing::trace!("session event sent to {} subscribers", count);
            }
            Err(_) => {
                tracing::trace!("no subscribers for session event");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Calls each handler in order. A failing or panicking handler is logged and
/// does not stop the others.
pub(crate) fn deliver(handlers: &[Arc<dyn EventHandler>], session: &Session, event: Event) {
    for (index, handler) in handlers.iter().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_event(session, event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    session = %session,
                    event = %event,
                    handler = index,
                    error = %e,
                    "event handler failed"
                );
            }
            Err(_) => {
                tracing::warn!(
                    session = %session,
                    event = %event,
                    handler = index,
                    "event handler panicked"
                );
            }
        }
    }
}
