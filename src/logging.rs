//! Logging initialization.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `SESSION_WATCH_LOG` environment variable. When the variable is unset or
//! invalid, the level from `[monitor] log_level` applies.
//!
//! ```bash
//! # Filter decisions for every alert
//! SESSION_WATCH_LOG=debug session-watch run
//!
//! # Module-specific filtering
//! SESSION_WATCH_LOG=session_watch::alert=debug,warn session-watch run
//! ```

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "SESSION_WATCH_LOG";

/// Installs the global subscriber, writing to stderr.
///
/// Does nothing if a global subscriber is already set.
pub fn init(fallback: LogLevel) {
    let _ = fmt()
        .with_env_filter(filter(fallback))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn filter(fallback: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(fallback.as_str()))
}
