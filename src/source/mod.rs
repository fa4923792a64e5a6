//! OS session source interface.
//!
//! The controller never talks to logind or terminal services directly. It
//! consumes a [`SessionSource`]: a synchronous full enumeration plus an
//! asynchronous stream of [`Notification`]s.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ProbeError, SourceError};
use crate::session::{SessionAttributes, SessionId, State};

pub mod feed;
mod memory;

pub use memory::MemorySource;

/// Asynchronous notification delivered by a session source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A new session id appeared.
    SessionAppeared(SessionId),
    /// A session went away.
    SessionRemoved(SessionId),
    /// The focus moved to (`true`) or away from (`false`) a session.
    FocusChanged(SessionId, bool),
    /// The screen lock of a session changed.
    LockChanged(SessionId, bool),
    /// System is preparing to sleep.
    SystemSleep,
    /// System resumed from sleep.
    SystemResume,
    /// System is shutting down.
    SystemShutdown,
}

/// Lifecycle values read from the OS for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Current lifecycle state.
    pub state: State,
    /// Screen lock engaged.
    #[serde(default)]
    pub locked: bool,
}

impl SessionStatus {
    /// Status with the lock released.
    pub fn new(state: State) -> Self {
        Self {
            state,
            locked: false,
        }
    }

    /// Same status with the lock flag set to `locked`.
    pub fn locked(self, locked: bool) -> Self {
        Self { locked, ..self }
    }
}

/// One entry of an OS enumeration.
///
/// `status` is an error when reading the session's state failed; the
/// controller then keeps whatever it knew before.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Platform session id.
    pub id: SessionId,
    /// Identity and descriptive attributes.
    pub attributes: SessionAttributes,
    /// State and lock flag, or the probe failure.
    pub status: Result<SessionStatus, ProbeError>,
}

/// Where sessions come from.
pub trait SessionSource: Send + Sync {
    /// Lists every session the OS currently knows about.
    fn enumerate(&self) -> Result<Vec<SessionSnapshot>, SourceError>;

    /// Reads a single session.
    fn query(&self, id: &SessionId) -> Result<SessionSnapshot, SourceError> {
        self.enumerate()?
            .into_iter()
            .find(|snapshot| &snapshot.id == id)
            .ok_or_else(|| SourceError::UnknownSession(id.clone()))
    }

    /// Opens a notification stream. The stream ends when the source drops
    /// its sender.
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Notification>, SourceError>;
}
