//! Tracked user sessions.
//!
//! A [`Session`] holds the current truth for one OS login session. Its flags
//! are atomics so any thread can read them without the controller lock; the
//! only way to change them is the crate-internal [`SessionWriter`] handed out
//! to the controller.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::dispatch::{self, EventBus, EventHandler};
use crate::error::ProbeError;
use crate::event::Event;

mod identity;
mod writer;

pub use identity::IdentityError;
pub(crate) use writer::SessionWriter;

#[cfg(test)]
mod tests;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum State {
    /// Session is being set up.
    Opening = 0,
    /// Session is logged in and has the focus.
    #[serde(alias = "active")]
    Foreground = 1,
    /// Session is logged in without the focus.
    #[serde(alias = "online")]
    Background = 2,
    /// Session is logged out; some of its processes may still be around.
    Closing = 3,
    /// State could not be determined.
    Unknown = 4,
}

impl State {
    /// Returns `true` for logged in states, regardless of focus.
    pub fn is_active(self) -> bool {
        matches!(self, State::Foreground | State::Background)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Opening,
            1 => State::Foreground,
            2 => State::Background,
            3 => State::Closing,
            _ => State::Unknown,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Opening => "opening",
            State::Foreground => "foreground",
            State::Background => "background",
            State::Closing => "closing",
            State::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Error type for parsing [`State`] from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError(pub String);

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session state: {}", self.0)
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for State {
    type Err = ParseStateError;

    /// Accepts the canonical names plus the logind ones (`active`, `online`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opening" => Ok(State::Opening),
            "foreground" | "active" => Ok(State::Foreground),
            "background" | "online" => Ok(State::Background),
            "closing" => Ok(State::Closing),
            "unknown" => Ok(State::Unknown),
            _ => Err(ParseStateError(s.to_string())),
        }
    }
}

/// Event produced by `set()` when a session moves from `from` to `to`.
///
/// Entering a logged in state from `Opening` or `Unknown` is a logon; moving
/// between `Foreground` and `Background` is a focus change.
pub fn transition_event(from: State, to: State) -> Option<Event> {
    if from == to {
        return None;
    }
    match (from, to) {
        (_, State::Closing) => Some(Event::Logoff),
        (from, to) if !from.is_active() && to.is_active() => Some(Event::Logon),
        (_, State::Foreground) => Some(Event::Foreground),
        (_, State::Background) => Some(Event::Background),
        _ => None,
    }
}

/// Platform session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    /// Numeric handle (terminal services session id).
    Handle(u32),
    /// Opaque string id (logind session id).
    Name(String),
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionId::Handle(sid) => write!(f, "{}", sid),
            SessionId::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId::Name(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId::Name(value)
    }
}

impl From<u32> for SessionId {
    fn from(value: u32) -> Self {
        SessionId::Handle(value)
    }
}

/// Platform-specific extras attached to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlatformExtras {
    /// No platform data.
    #[default]
    Generic,
    /// logind session.
    Logind {
        /// Seat the session is attached to.
        seat: Option<String>,
        /// Object path of the user's bus, when known.
        bus_path: Option<String>,
    },
    /// Windows terminal services session.
    TerminalServices {
        /// Window station name.
        station: Option<String>,
    },
}

/// Identity and descriptive attributes of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionAttributes {
    /// Resolved user name.
    pub username: Option<String>,
    /// Numeric user id.
    pub uid: Option<u32>,
    /// Primary group id.
    pub gid: Option<u32>,
    /// Session class (`user`, `greeter`, `lock-screen`, ...).
    pub classname: Option<String>,
    /// Service that created the session (`gdm-password`, `sshd`, ...).
    pub service: Option<String>,
    /// Non-local login.
    pub remote: bool,
    /// Service or system account rather than an interactive user.
    pub system: bool,
    /// PID of the session leader process.
    pub leader: Option<u32>,
    /// Platform-specific extras.
    pub platform: PlatformExtras,
}

/// Bookkeeping for the most recent emission.
#[derive(Debug, Clone, Copy)]
pub struct LastEvent {
    /// The emitted event.
    pub event: Event,
    /// When it was emitted.
    pub at: Instant,
}

/// One tracked OS login session.
pub struct Session {
    id: SessionId,
    state: AtomicU8,
    alive: AtomicBool,
    locked: AtomicBool,
    attributes: RwLock<SessionAttributes>,
    last_event: Mutex<Option<LastEvent>>,
    /// Per-session reactions, run before the controller's handlers.
    handlers: Vec<Arc<dyn EventHandler>>,
    bus: OnceLock<EventBus>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("alive", &self.alive())
            .field("locked", &self.locked())
            .field("attributes", &*self.read_attributes())
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

impl Session {
    /// Creates an untracked session in the `Unknown` state.
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            state: AtomicU8::new(State::Unknown as u8),
            alive: AtomicBool::new(false),
            locked: AtomicBool::new(false),
            attributes: RwLock::new(SessionAttributes::default()),
            last_event: Mutex::new(None),
            handlers: Vec::new(),
            bus: OnceLock::new(),
        }
    }

    /// Sets the initial attributes.
    pub fn with_attributes(self, attributes: SessionAttributes) -> Self {
        *self.attributes.write().unwrap_or_else(|e| e.into_inner()) = attributes;
        self
    }

    /// Adds a handler that reacts to this session's events only.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Platform session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` while the session is tracked by a controller.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// `true` when the session is logged in, in foreground or background.
    pub fn active(&self) -> bool {
        self.state().is_active()
    }

    /// `true` exactly when the session has the focus.
    pub fn foreground(&self) -> bool {
        self.state() == State::Foreground
    }

    /// `true` when the screen lock is engaged.
    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// `true` for non-local logins.
    pub fn remote(&self) -> bool {
        self.read_attributes().remote
    }

    /// `true` for service/system accounts.
    pub fn system(&self) -> bool {
        self.read_attributes().system
    }

    /// Session class, when known.
    pub fn classname(&self) -> Option<String> {
        self.read_attributes().classname.clone()
    }

    /// Session service, when known.
    pub fn service(&self) -> Option<String> {
        self.read_attributes().service.clone()
    }

    /// User name, when resolved.
    pub fn username(&self) -> Option<String> {
        self.read_attributes().username.clone()
    }

    /// Copy of the current attributes.
    pub fn attributes(&self) -> SessionAttributes {
        self.read_attributes().clone()
    }

    /// The most recent emission, if any.
    pub fn last_event(&self) -> Option<LastEvent> {
        *self.last_event.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_attributes(&self) -> std::sync::RwLockReadGuard<'_, SessionAttributes> {
        self.attributes.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Connects the session to the controller's event bus. Only the first
    /// call has an effect.
    pub(crate) fn attach(&self, bus: EventBus) {
        let _ = self.bus.set(bus);
    }

    pub(crate) fn writer(&self) -> SessionWriter<'_> {
        SessionWriter::new(self)
    }

    fn store_state(&self, state: State) -> State {
        State::from_u8(self.state.swap(state as u8, Ordering::AcqRel))
    }

    fn store_locked(&self, locked: bool) -> bool {
        self.locked.swap(locked, Ordering::AcqRel)
    }

    fn store_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Records the emission, then notifies the session's own handlers and the
    /// controller's bus.
    fn emit(&self, event: Event) {
        *self.last_event.lock().unwrap_or_else(|e| e.into_inner()) = Some(LastEvent {
            event,
            at: Instant::now(),
        });
        tracing::debug!(session = %self, event = %event, "emitting session event");
        dispatch::deliver(&self.handlers, self, event);
        if let Some(bus) = self.bus.get() {
            bus.publish(self, event);
        }
    }
}

impl fmt::Display for Session {
    /// Username when known, session id otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.read_attributes().username {
            Some(name) if !name.is_empty() => f.write_str(name),
            _ => write!(f, "{}", self.id),
        }
    }
}

/// Fallible attribute reads used when deciding alert admission.
///
/// A failing probe must make the caller deny, never admit.
pub trait SessionProbe {
    /// Name used in log lines.
    fn display_name(&self) -> String;
    /// Service/system account.
    fn is_system(&self) -> Result<bool, ProbeError>;
    /// Non-local login.
    fn is_remote(&self) -> Result<bool, ProbeError>;
    /// Logged in, foreground or background.
    fn is_active(&self) -> Result<bool, ProbeError>;
    /// Has the focus.
    fn is_foreground(&self) -> Result<bool, ProbeError>;
    /// Screen lock engaged.
    fn is_locked(&self) -> Result<bool, ProbeError>;
    /// Session class.
    fn session_class(&self) -> Result<String, ProbeError>;
    /// Session service.
    fn session_service(&self) -> Result<String, ProbeError>;
}

impl SessionProbe for Session {
    fn display_name(&self) -> String {
        self.to_string()
    }

    fn is_system(&self) -> Result<bool, ProbeError> {
        Ok(self.system())
    }

    fn is_remote(&self) -> Result<bool, ProbeError> {
        Ok(self.remote())
    }

    fn is_active(&self) -> Result<bool, ProbeError> {
        Ok(self.active())
    }

    fn is_foreground(&self) -> Result<bool, ProbeError> {
        Ok(self.foreground())
    }

    fn is_locked(&self) -> Result<bool, ProbeError> {
        Ok(self.locked())
    }

    fn session_class(&self) -> Result<String, ProbeError> {
        self.classname().ok_or(ProbeError::Unavailable("classname"))
    }

    fn session_service(&self) -> Result<String, ProbeError> {
        self.service().ok_or(ProbeError::Unavailable("service"))
    }
}
