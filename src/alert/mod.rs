//! Alerts: admission filter, actions and their binding to session events.
//!
//! Each `[[alerts]]` entry becomes an [`AlertBinding`] registered as a
//! controller handler. Alerts with the `pulse` event additionally get a
//! [`PulseScheduler`].

mod action;
mod binding;
mod expander;
mod filter;
mod pulse;

use std::sync::Arc;

pub use action::{AlertAction, LogAction};
pub use binding::AlertBinding;
pub use expander::{BraceExpander, TextExpander};
pub use filter::{AlertFilter, FilterFlags, DEFAULT_PULSE_INTERVAL_SECS};
pub use pulse::PulseScheduler;

use crate::config::{Config, ConfigError};

/// Builds one binding per configured alert, logging through [`LogAction`].
///
/// Any invalid alert fails the whole load; a broken alert is never
/// silently skipped.
pub fn build_bindings(config: &Config) -> Result<Vec<Arc<AlertBinding>>, ConfigError> {
    let mut bindings: Vec<Arc<AlertBinding>> = Vec::with_capacity(config.alerts.len());

    for (index, alert) in config.alerts.iter().enumerate() {
        if alert.name.trim().is_empty() {
            return Err(ConfigError::invalid_alert(
                &format!("#{}", index + 1),
                "missing 'name'",
            ));
        }
        if bindings.iter().any(|b| b.filter().name() == alert.name) {
            tracing::warn!(alert = %alert.name, "Duplicate alert name");
        }

        let filter = AlertFilter::from_config(alert, config.settings_for(alert))?;
        let action = LogAction::new(alert.name.clone(), alert.message.clone(), alert.level);
        tracing::debug!(
            alert = %alert.name,
            events = %filter.mask(),
            "Loaded alert"
        );
        bindings.push(Arc::new(AlertBinding::new(filter, Arc::new(action))));
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn load(toml_str: &str) -> Result<Vec<Arc<AlertBinding>>, ConfigError> {
        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        build_bindings(&config)
    }

    #[test]
    fn builds_bindings_in_order() {
        let bindings = load(
            r#"
[[alerts]]
name = "welcome"
event = "logon"

[[alerts]]
name = "reminder"
event = "pulse"
interval = "1h"
"#,
        )
        .expect("valid alerts");

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].filter().name(), "welcome");
        assert!(bindings[0].filter().mask().contains(Event::Logon));
        assert_eq!(bindings[1].filter().timer(), 3600);
    }

    #[test]
    fn no_alerts_is_fine() {
        assert!(load("").expect("empty").is_empty());
    }

    #[test]
    fn unnamed_alert_is_reported_by_position() {
        let err = load("[[alerts]]\nevent = \"logon\"\n").expect_err("unnamed");
        match err {
            ConfigError::InvalidAlert { alert, .. } => assert_eq!(alert, "#1"),
            other => panic!("expected InvalidAlert, got: {other:?}"),
        }
    }

    #[test]
    fn one_bad_alert_fails_the_load() {
        let err = load(
            r#"
[[alerts]]
name = "ok"
event = "logon"

[[alerts]]
name = "bad"
event = "pulse"
interval = 0
"#,
        )
        .expect_err("zero interval");
        assert!(err.to_string().contains("bad"));
    }
}
