//! Alert admission filter.
//!
//! [`AlertFilter::test`] decides whether an alert may fire for a session.
//! Checks run in a fixed order and the first failing flag denies; every
//! decision is logged at debug level with the alert and session names.

use crate::config::{AlertConfig, ConfigError, FilterSettings};
use crate::error::ProbeError;
use crate::event::{event_factory, EventMask};
use crate::session::SessionProbe;

/// Pulse interval used when a pulse alert does not set one (four hours).
pub const DEFAULT_PULSE_INTERVAL_SECS: u64 = 14_400;

/// Admission flags. A `false` flag denies sessions with that property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterFlags {
    pub system: bool,
    pub remote: bool,
    pub active: bool,
    pub inactive: bool,
    /// Read from configuration but never consulted by [`AlertFilter::test`].
    pub foreground: bool,
    /// Read from configuration but never consulted by [`AlertFilter::test`].
    pub background: bool,
    pub locked: bool,
    pub unlocked: bool,
}

impl Default for FilterFlags {
    fn default() -> Self {
        Self {
            system: true,
            remote: true,
            active: true,
            inactive: true,
            foreground: true,
            background: true,
            locked: true,
            unlocked: true,
        }
    }
}

type FlagKey = fn(&FilterSettings) -> Option<bool>;

impl FilterFlags {
    /// Resolves every flag from an alert's own keys and its settings group.
    ///
    /// Lookup order per flag: alert `allow-on-*` key, group `allow-on-*` key,
    /// alert legacy key, group legacy key, then `true`.
    pub fn resolve(own: &FilterSettings, group: Option<&FilterSettings>) -> Self {
        let pick = |new: FlagKey, old: FlagKey| {
            new(own)
                .or_else(|| group.and_then(new))
                .or_else(|| old(own))
                .or_else(|| group.and_then(old))
                .unwrap_or(true)
        };

        Self {
            system: pick(|s| s.allow_on_system_session, |s| s.system_session),
            remote: pick(|s| s.allow_on_remote_session, |s| s.remote_session),
            active: pick(|s| s.allow_on_active_session, |s| s.active_session),
            inactive: pick(|s| s.allow_on_inactive_session, |s| s.inactive_session),
            foreground: pick(
                |s| s.allow_on_foreground_session,
                |s| s.foreground_session,
            ),
            background: pick(
                |s| s.allow_on_background_session,
                |s| s.background_session,
            ),
            locked: pick(|s| s.allow_on_locked_session, |s| s.locked_session),
            unlocked: pick(|s| s.allow_on_unlocked_session, |s| s.unlocked_session),
        }
    }
}

/// Admission predicate for one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFilter {
    name: String,
    mask: EventMask,
    flags: FilterFlags,
    classname: Option<String>,
    service: Option<String>,
    timer: u64,
}

impl AlertFilter {
    /// Filter with every flag allowing and no class or service requirement.
    ///
    /// A mask containing `pulse` gets the default pulse interval.
    pub fn new(name: impl Into<String>, mask: EventMask) -> Self {
        let timer = if mask.has_pulse() {
            DEFAULT_PULSE_INTERVAL_SECS
        } else {
            0
        };
        Self {
            name: name.into(),
            mask,
            flags: FilterFlags::default(),
            classname: None,
            service: None,
            timer,
        }
    }

    /// Replaces the admission flags.
    pub fn with_flags(mut self, flags: FilterFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Requires the session class to match, ignoring case. Empty means any.
    pub fn with_classname(mut self, classname: impl Into<String>) -> Self {
        self.classname = Some(classname.into()).filter(|c| !c.is_empty());
        self
    }

    /// Requires the session service to match, ignoring case. Empty means any.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into()).filter(|s| !s.is_empty());
        self
    }

    /// Builds the filter of a configured alert.
    ///
    /// Triggering events come from `event` and `events`; when both are
    /// absent the alert name itself must be an event name. A pulse alert
    /// without `interval` ticks every [`DEFAULT_PULSE_INTERVAL_SECS`]; an
    /// explicit zero interval is rejected.
    pub fn from_config(
        alert: &AlertConfig,
        group: Option<&FilterSettings>,
    ) -> Result<Self, ConfigError> {
        let name = alert.name.as_str();
        let mask = event_mask(alert)?;

        let timer = if mask.has_pulse() {
            let secs = match &alert.interval {
                Some(interval) => interval.as_secs(name)?,
                None => DEFAULT_PULSE_INTERVAL_SECS,
            };
            if secs == 0 {
                return Err(ConfigError::invalid_alert(
                    name,
                    "pulse alert requires a positive 'interval'",
                ));
            }
            secs
        } else {
            if alert.interval.is_some() {
                tracing::debug!(alert = name, "Ignoring 'interval' on a non-pulse alert");
            }
            0
        };

        let text = |own: &Option<String>, inherited: Option<&Option<String>>| {
            own.clone()
                .or_else(|| inherited.cloned().flatten())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            name: name.to_string(),
            mask,
            flags: FilterFlags::resolve(&alert.filter, group),
            classname: text(
                &alert.filter.session_class,
                group.map(|g| &g.session_class),
            ),
            service: text(
                &alert.filter.session_service,
                group.map(|g| &g.session_service),
            ),
            timer,
        })
    }

    /// Alert name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Triggering events.
    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Admission flags.
    pub fn flags(&self) -> FilterFlags {
        self.flags
    }

    /// Required session class, if any.
    pub fn classname(&self) -> Option<&str> {
        self.classname.as_deref()
    }

    /// Required session service, if any.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Pulse interval in seconds; 0 when the alert has no pulse.
    pub fn timer(&self) -> u64 {
        self.timer
    }

    /// Returns `true` when the alert may fire for `session`.
    ///
    /// A probe failure is logged and denies.
    pub fn test<P: SessionProbe + ?Sized>(&self, session: &P) -> bool {
        let who = session.display_name();
        match self.denial(session) {
            Ok(None) => {
                tracing::debug!(
                    alert = %self.name,
                    session = %who,
                    "Allowing alert '{}'",
                    self.name
                );
                true
            }
            Ok(Some(flag)) => {
                tracing::debug!(
                    alert = %self.name,
                    session = %who,
                    flag,
                    "Denying alert '{}' by '{}' flag",
                    self.name,
                    flag
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    alert = %self.name,
                    session = %who,
                    "Error checking alert '{}' flags: {}",
                    self.name,
                    e
                );
                false
            }
        }
    }

    /// Name of the first flag denying `session`, or `None` when admitted.
    fn denial<P: SessionProbe + ?Sized>(
        &self,
        session: &P,
    ) -> Result<Option<&'static str>, ProbeError> {
        let flags = &self.flags;

        if !flags.system && session.is_system()? {
            return Ok(Some("system"));
        }
        if !flags.remote && session.is_remote()? {
            return Ok(Some("remote"));
        }

        if session.is_active()? {
            if !flags.active {
                return Ok(Some("active"));
            }
            let locked = session.is_locked()?;
            if !flags.locked && locked {
                return Ok(Some("locked"));
            }
            if !flags.unlocked && !locked {
                return Ok(Some("unlocked"));
            }
        } else if !flags.inactive {
            return Ok(Some("inactive"));
        }

        if let Some(required) = &self.classname {
            if !session.session_class()?.eq_ignore_ascii_case(required) {
                return Ok(Some("classname"));
            }
        }
        if let Some(required) = &self.service {
            if !session.session_service()?.eq_ignore_ascii_case(required) {
                return Ok(Some("service"));
            }
        }

        Ok(None)
    }
}

/// Triggering events of a configured alert.
fn event_mask(alert: &AlertConfig) -> Result<EventMask, ConfigError> {
    let name = alert.name.as_str();
    let invalid = |e: crate::event::ParseEventError| ConfigError::invalid_alert(name, e.to_string());

    let mut mask = EventMask::empty();
    for list in alert.event.iter().chain(alert.events.iter()) {
        for event in EventMask::parse_list(list).map_err(invalid)?.iter() {
            mask.insert(event);
        }
    }

    if mask.is_empty() {
        if alert.event.is_none() && alert.events.is_empty() {
            if let Ok(event) = event_factory(name) {
                return Ok(EventMask::single(event));
            }
        }
        return Err(ConfigError::invalid_alert(
            name,
            "no triggering event; set 'event' or 'events'",
        ));
    }
    Ok(mask)
}
