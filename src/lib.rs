//! session-watch library
//!
//! Tracks OS login sessions and turns their lifecycle transitions (logon,
//! focus changes, screen lock, logoff) into events that configured alerts
//! react to.
//!
//! - [`controller::Controller`] keeps the registry of live sessions in sync
//!   with a [`source::SessionSource`] and emits events on every transition.
//! - [`session::Session`] holds one session's state; only the controller
//!   can change it.
//! - [`alert::AlertBinding`] applies an [`alert::AlertFilter`] to each event
//!   and fires or clears its action.
//!
//! # Platform Support
//!
//! Unix-like systems only. Daemonization uses `fork()` and shutdown is driven
//! by SIGINT/SIGTERM. Session data comes from a JSON Lines feed (see
//! [`source::feed`]) written by a platform bridge.

/// Alert filter, actions and event bindings.
pub mod alert;

/// TOML configuration.
pub mod config;

/// Session registry and monitor.
pub mod controller;

/// Process lifecycle for the `run` command.
pub mod daemon;

/// Event handler registry.
pub mod dispatch;

/// Shared error types.
pub mod error;

/// Session event taxonomy.
pub mod event;

/// `tracing` subscriber setup.
pub mod logging;

/// Tracked sessions.
pub mod session;

/// OS session sources.
pub mod source;

pub use controller::{Controller, ControllerBuilder, SessionFactory};
pub use dispatch::{EventBus, EventHandler};
pub use error::{ControllerError, HandlerError, ProbeError, SourceError};
pub use event::{Event, EventMask, SessionEvent};
pub use session::{Session, SessionAttributes, SessionId, State};
