//! Tests for the Controller.
//!
//! - `activate`: startup, idempotence, failure and shutdown reconciliation
//! - `refresh`: enumeration diffing and transient probe failures
//! - `notifications`: monitor task behavior
//! - `broadcast`: handlers, subscribers and system-wide events
//! - `concurrent`: registry access from several threads

mod concurrent;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::Receiver;

use super::Controller;
use crate::dispatch::EventHandler;
use crate::error::HandlerError;
use crate::event::{Event, SessionEvent};
use crate::session::{Session, SessionAttributes, State};
use crate::source::{MemorySource, SessionStatus};

pub(super) fn status(state: State) -> SessionStatus {
    SessionStatus::new(state)
}

pub(super) fn user(name: &str) -> SessionAttributes {
    SessionAttributes {
        username: Some(name.to_string()),
        ..Default::default()
    }
}

/// Records `(session id, event)` pairs seen by a controller handler.
#[derive(Clone, Default)]
pub(super) struct Recorder {
    seen: Arc<Mutex<Vec<(String, Event)>>>,
}

impl Recorder {
    pub(super) fn attach(controller: &Controller) -> Self {
        let recorder = Self::default();
        controller.add_handler(recorder.handler());
        recorder
    }

    pub(super) fn handler(&self) -> Arc<dyn EventHandler> {
        let seen = self.seen.clone();
        Arc::new(
            move |session: &Session, event: Event| -> Result<(), HandlerError> {
                seen.lock().unwrap().push((session.id().to_string(), event));
                Ok(())
            },
        )
    }

    pub(super) fn all(&self) -> Vec<(String, Event)> {
        self.seen.lock().unwrap().clone()
    }

    pub(super) fn events(&self) -> Vec<Event> {
        self.all().into_iter().map(|(_, event)| event).collect()
    }

    pub(super) fn count(&self, event: Event) -> usize {
        self.events().into_iter().filter(|e| *e == event).count()
    }
}

/// Waits for the next broadcast event, failing after one second.
pub(super) async fn next_event(rx: &mut Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Source with two logged in sessions: "1" in foreground, "2" in background.
pub(super) fn two_sessions() -> MemorySource {
    let source = MemorySource::new();
    source.insert("1", user("alice"), status(State::Foreground));
    source.insert("2", user("bob"), status(State::Background));
    source
}
