//! Default configuration template and file creation.
//!
//! The template documents every key and parses to `Config::default()`; the
//! example alerts ship commented out.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::error::ConfigError;
use crate::config::xdg;

// ---------------------------------------------------------------------------
// Default TOML template
// ---------------------------------------------------------------------------

/// Commented TOML template with all default values.
///
/// Every active value here must match `Config::default()` from `schema.rs`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# session-watch configuration
#
# This file was generated with the built-in defaults.
# Uncomment and edit entries to define alerts.
#
# Location: $XDG_CONFIG_HOME/session-watch/config.toml

# ==============================================================================
# Monitor
# ==============================================================================

[monitor]

# Interval between full re-enumerations of the session source.
# Catches transitions the notification stream missed.
# Examples: "10s", "30s", "5m". "0s" disables periodic refresh.
refresh_interval = "30s"

# Logging verbosity when SESSION_WATCH_LOG is unset.
# Options: "error", "warn", "info", "debug", "trace"
#   debug - also logs every alert filter decision
log_level = "info"

# ==============================================================================
# Filter defaults
# ==============================================================================
#
# Alerts inherit admission keys from the group named by `settings-from`
# (default: "alert-defaults"). Keys set on an alert win over the group.
# Every flag defaults to true. The legacy spelling (`remote-session`) is still
# read, but `allow-on-remote-session` takes precedence when both are present.
#
# [settings.alert-defaults]
# allow-on-system-session = false
# allow-on-remote-session = true
# allow-on-active-session = true
# allow-on-inactive-session = false
# allow-on-foreground-session = true
# allow-on-background-session = true
# allow-on-locked-session = true
# allow-on-unlocked-session = true
# session-class = "user"
# session-service = ""

# ==============================================================================
# Alerts
# ==============================================================================
#
# Events: logon, logoff, foreground, background, lock, unlock,
#         sleep, resume, shutdown, still_active, already_active, pulse
#
# Message placeholders: ${username}, ${alertname}, ${event}
#
# [[alerts]]
# name = "welcome"
# event = "logon"
# message = "Welcome back, ${username}"
#
# [[alerts]]
# name = "screen-lock"
# events = ["lock", "unlock"]
# message = "${username}: ${event}"
# level = "warn"
#
# A pulse alert fires for every tracked session each interval
# (seconds or a duration string; four hours when omitted).
#
# [[alerts]]
# name = "break-reminder"
# event = "pulse"
# interval = "2h"
# allow-on-locked-session = false
# message = "${username}, time for a break"
"#;

// ---------------------------------------------------------------------------
// File creation functions
// ---------------------------------------------------------------------------

/// Creates (or force-overwrites) the default config file.
///
/// - If the file exists and `force` is `false`, returns `ConfigError::AlreadyExists`.
/// - If the file exists and `force` is `true`, backs it up to `.toml.backup` first.
/// - Returns the path where the config was written.
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();

    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists { path });
        }
        let backup_path = path.with_extension("toml.backup");
        fs::rename(&path, &backup_path).map_err(|e| ConfigError::WriteError {
            path: backup_path.clone(),
            source: e,
        })?;
        tracing::info!("Backed up existing config to {}", backup_path.display());
    }

    write_default_config(&path)?;
    Ok(path)
}

/// Writes the template to `path` with 0600 permissions.
fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let write_error = |source| ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    match path.parent() {
        Some(parent) => xdg::ensure_dir(parent).map_err(write_error)?,
        None => {
            xdg::ensure_config_dir().map_err(write_error)?;
        }
    }

    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(write_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_error)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
