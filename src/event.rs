//! Session event taxonomy.
//!
//! Events form a closed, ordered set. `pulse` is always the last value and is
//! used as the upper bound when events are collected into an [`EventMask`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::session::{SessionId, State};

/// Lifecycle event emitted for a tracked session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    /// Session was already active when the controller started.
    AlreadyActive,
    /// Session was still active when the controller stopped.
    StillActive,
    /// User logon detected.
    Logon,
    /// User logoff detected.
    Logoff,
    /// Session was locked.
    Lock,
    /// Session was unlocked.
    Unlock,
    /// Session moved to the foreground.
    Foreground,
    /// Session moved to the background.
    Background,
    /// System is preparing to sleep.
    Sleep,
    /// System is resuming from sleep.
    Resume,
    /// System is shutting down.
    Shutdown,
    /// Timer-driven event, independent of session transitions.
    Pulse,
}

impl Event {
    /// Every event, in declaration order.
    pub const ALL: [Event; 12] = [
        Event::AlreadyActive,
        Event::StillActive,
        Event::Logon,
        Event::Logoff,
        Event::Lock,
        Event::Unlock,
        Event::Foreground,
        Event::Background,
        Event::Sleep,
        Event::Resume,
        Event::Shutdown,
        Event::Pulse,
    ];

    /// The sentinel last event.
    pub const PULSE: Event = Event::Pulse;

    /// Ordinal of this event in the taxonomy.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Configuration name of the event.
    pub fn name(self) -> &'static str {
        match self {
            Event::AlreadyActive => "already_active",
            Event::StillActive => "still_active",
            Event::Logon => "logon",
            Event::Logoff => "logoff",
            Event::Lock => "lock",
            Event::Unlock => "unlock",
            Event::Foreground => "foreground",
            Event::Background => "background",
            Event::Sleep => "sleep",
            Event::Resume => "resume",
            Event::Shutdown => "shutdown",
            Event::Pulse => "pulse",
        }
    }

    /// Human readable description, used by `session-watch events`.
    pub fn description(self) -> &'static str {
        match self {
            Event::AlreadyActive => "Session is active on controller startup",
            Event::StillActive => "Session is active on controller shutdown",
            Event::Logon => "User logon detected",
            Event::Logoff => "User logoff detected",
            Event::Lock => "Session was locked",
            Event::Unlock => "Session was unlocked",
            Event::Foreground => "Session is in foreground",
            Event::Background => "Session is in background",
            Event::Sleep => "System is preparing to sleep",
            Event::Resume => "System is resuming from sleep",
            Event::Shutdown => "System is shutting down",
            Event::Pulse => "Periodic pulse",
        }
    }

    fn bit(self) -> u16 {
        1 << self.index()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for parsing an [`Event`] from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventError(pub String);

impl fmt::Display for ParseEventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session event: {}", self.0)
    }
}

impl std::error::Error for ParseEventError {}

impl FromStr for Event {
    type Err = ParseEventError;

    /// Accepts both `already_active` and `already-active` spellings,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Event::ALL
            .into_iter()
            .find(|event| event.name() == normalized)
            .ok_or_else(|| ParseEventError(s.to_string()))
    }
}

/// Builds an [`Event`] from a configured name.
pub fn event_factory(name: &str) -> Result<Event, ParseEventError> {
    name.parse()
}

/// Set of events a filter reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u16);

impl EventMask {
    /// Creates an empty mask.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates a mask containing a single event.
    pub fn single(event: Event) -> Self {
        Self(event.bit())
    }

    /// Parses a comma or whitespace separated list of event names.
    pub fn parse_list(names: &str) -> Result<Self, ParseEventError> {
        names
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(event_factory)
            .collect()
    }

    /// Adds an event to the mask.
    pub fn insert(&mut self, event: Event) {
        self.0 |= event.bit();
    }

    /// Returns `true` if the mask contains the event.
    pub fn contains(self, event: Event) -> bool {
        self.0 & event.bit() != 0
    }

    /// Returns `true` if no event is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the periodic pulse is requested.
    pub fn has_pulse(self) -> bool {
        self.contains(Event::PULSE)
    }

    /// The mask restricted to session-state events.
    pub fn session_events(self) -> Self {
        Self(self.0 & !Event::PULSE.bit())
    }

    /// Iterates the events of the mask in taxonomy order.
    pub fn iter(self) -> impl Iterator<Item = Event> {
        Event::ALL.into_iter().filter(move |event| self.contains(*event))
    }
}

impl FromIterator<Event> for EventMask {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut mask = EventMask::empty();
        for event in iter {
            mask.insert(event);
        }
        mask
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Event::name).collect();
        f.write_str(&names.join(","))
    }
}

/// Broadcast notification describing one emitted event.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Identifier of the session the event refers to.
    pub session_id: SessionId,
    /// Display name of the session (username or id).
    pub session_name: String,
    /// The emitted event.
    pub event: Event,
    /// Session state after the transition.
    pub state: State,
    /// Lock flag after the transition.
    pub locked: bool,
    /// Wall-clock emission time.
    pub at: DateTime<Utc>,
}
