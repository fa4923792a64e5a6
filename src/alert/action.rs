//! Alert actions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::LogLevel;
use crate::error::HandlerError;

/// What an alert does when it fires.
///
/// `activate` receives a function expanding a message template for the
/// session and event that triggered the alert.
pub trait AlertAction: Send + Sync {
    /// Fires the alert.
    fn activate(&self, expand: &dyn Fn(&str) -> String) -> Result<(), HandlerError>;

    /// Clears the alert. Called for every event the alert does not react to.
    fn deactivate(&self);
}

/// Writes the expanded message to the log.
#[derive(Debug)]
pub struct LogAction {
    name: String,
    message: String,
    level: LogLevel,
    active: AtomicBool,
    activations: AtomicU64,
}

impl LogAction {
    /// An empty `message` logs a generic line naming the alert and event.
    pub fn new(name: impl Into<String>, message: impl Into<String>, level: LogLevel) -> Self {
        let name = name.into();
        let message = message.into();
        let message = if message.is_empty() {
            "Alert '${alertname}' fired for ${username} on ${event}".to_string()
        } else {
            message
        };
        Self {
            name,
            message,
            level,
            active: AtomicBool::new(false),
            activations: AtomicU64::new(0),
        }
    }

    /// `true` between an activation and the next deactivation.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of times the alert fired.
    pub fn activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }
}

impl AlertAction for LogAction {
    fn activate(&self, expand: &dyn Fn(&str) -> String) -> Result<(), HandlerError> {
        let text = expand(&self.message);
        let alert = self.name.as_str();
        match self.level {
            LogLevel::Error => tracing::error!(alert, "{}", text),
            LogLevel::Warn => tracing::warn!(alert, "{}", text),
            LogLevel::Info => tracing::info!(alert, "{}", text),
            LogLevel::Debug => tracing::debug!(alert, "{}", text),
            LogLevel::Trace => tracing::trace!(alert, "{}", text),
        }
        self.active.store(true, Ordering::Release);
        self.activations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn deactivate(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            tracing::trace!(alert = %self.name, "alert cleared");
        }
    }
}
