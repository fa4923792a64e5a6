//! TOML configuration schema.
//!
//! All structs derive `Deserialize` and `Serialize` with defaults via
//! `#[serde(default)]`, so an empty file is a valid configuration.
//!
//! Filter keys come in two spellings that map to the same flag: the legacy
//! `<what>-session` keys and the `allow-on-<what>-session` keys. Both are kept
//! as separate optional fields; precedence is resolved when an alert filter is
//! built.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

/// Settings group alerts read from unless they name another one.
pub const DEFAULT_SETTINGS_GROUP: &str = "alert-defaults";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// ```toml
/// [monitor]
/// [settings.<group>]
/// [[alerts]]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Session monitor settings.
    pub monitor: MonitorConfig,
    /// Named groups of filter defaults.
    pub settings: BTreeMap<String, FilterSettings>,
    /// Alert definitions, in load order.
    pub alerts: Vec<AlertConfig>,
}

impl Config {
    /// Filter defaults an alert inherits from.
    ///
    /// A missing group is not an error; the alert then uses its own keys and
    /// the built-in defaults.
    pub fn settings_for(&self, alert: &AlertConfig) -> Option<&FilterSettings> {
        let group = alert
            .settings_from
            .as_deref()
            .unwrap_or(DEFAULT_SETTINGS_GROUP);
        self.settings.get(group)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// `[monitor]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between full re-enumerations, as a human-readable duration
    /// (`"30s"`, `"5m"`). `"0s"` or an empty string disables it.
    pub refresh_interval: String,
    /// Logging verbosity when `SESSION_WATCH_LOG` is unset.
    pub log_level: LogLevel,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: "30s".to_string(),
            log_level: LogLevel::Info,
        }
    }
}

impl MonitorConfig {
    /// Parsed refresh interval; `None` when disabled.
    pub fn refresh_interval(&self) -> Result<Option<Duration>, ConfigError> {
        let value = self.refresh_interval.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let interval =
            humantime::parse_duration(value).map_err(|e| ConfigError::InvalidDuration {
                field: "monitor.refresh_interval".to_string(),
                value: value.to_string(),
                message: e.to_string(),
            })?;
        Ok(Some(interval).filter(|d| !d.is_zero()))
    }
}

/// Log verbosity levels (kebab-case in TOML).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug-level detail, including every filter decision.
    Debug,
    /// Full trace output.
    Trace,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Filter settings
// ---------------------------------------------------------------------------

/// Admission keys shared by `[settings.<group>]` tables and alerts.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterSettings {
    /// `allow-on-system-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_system_session: Option<bool>,
    /// `allow-on-remote-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_remote_session: Option<bool>,
    /// `allow-on-background-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_background_session: Option<bool>,
    /// `allow-on-foreground-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_foreground_session: Option<bool>,
    /// `allow-on-locked-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_locked_session: Option<bool>,
    /// `allow-on-unlocked-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_unlocked_session: Option<bool>,
    /// `allow-on-active-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_active_session: Option<bool>,
    /// `allow-on-inactive-session`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_on_inactive_session: Option<bool>,

    /// Legacy `system-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_session: Option<bool>,
    /// Legacy `remote-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_session: Option<bool>,
    /// Legacy `background-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_session: Option<bool>,
    /// Legacy `foreground-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_session: Option<bool>,
    /// Legacy `locked-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_session: Option<bool>,
    /// Legacy `unlocked-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_session: Option<bool>,
    /// Legacy `active-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<bool>,
    /// Legacy `inactive-session`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactive_session: Option<bool>,

    /// Required session class (case-insensitive). Empty means any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_class: Option<String>,
    /// Required session service (case-insensitive). Empty means any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_service: Option<String>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Pulse interval, either in seconds or as a human-readable duration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntervalSetting {
    /// `interval = 3600`
    Seconds(u64),
    /// `interval = "1h"`
    Text(String),
}

impl IntervalSetting {
    /// Interval in whole seconds.
    pub fn as_secs(&self, alert: &str) -> Result<u64, ConfigError> {
        match self {
            IntervalSetting::Seconds(secs) => Ok(*secs),
            IntervalSetting::Text(text) => humantime::parse_duration(text.trim())
                .map(|d| d.as_secs())
                .map_err(|e| ConfigError::InvalidDuration {
                    field: format!("alerts.{}.interval", alert),
                    value: text.clone(),
                    message: e.to_string(),
                }),
        }
    }
}

/// One `[[alerts]]` entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AlertConfig {
    /// Alert name, used in logs and as the `alertname` template variable.
    pub name: String,
    /// Single triggering event name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Additional triggering event names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    /// Settings group to inherit filter defaults from
    /// (default: `alert-defaults`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_from: Option<String>,
    /// Pulse interval. Only meaningful with the `pulse` event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<IntervalSetting>,
    /// Message template. `${username}`, `${alertname}` and `${event}` are
    /// replaced on activation.
    pub message: String,
    /// Level the message is logged at.
    pub level: LogLevel,
    /// Filter keys set directly on the alert.
    #[serde(flatten)]
    pub filter: FilterSettings,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
