//! Binds an alert filter and action to session events.

use std::sync::Arc;

use crate::alert::action::AlertAction;
use crate::alert::expander::{BraceExpander, TextExpander};
use crate::alert::filter::AlertFilter;
use crate::dispatch::EventHandler;
use crate::error::HandlerError;
use crate::event::Event;
use crate::session::Session;

/// Activates an action when a matching event passes the filter and
/// deactivates it on any other event.
///
/// An alert therefore stays active only while its triggering condition is
/// the latest thing that happened to a session.
pub struct AlertBinding {
    filter: AlertFilter,
    action: Arc<dyn AlertAction>,
    expander: Arc<dyn TextExpander>,
}

impl std::fmt::Debug for AlertBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertBinding")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl AlertBinding {
    /// Uses `${key}` expansion for messages.
    pub fn new(filter: AlertFilter, action: Arc<dyn AlertAction>) -> Self {
        Self::with_expander(filter, action, Arc::new(BraceExpander))
    }

    pub fn with_expander(
        filter: AlertFilter,
        action: Arc<dyn AlertAction>,
        expander: Arc<dyn TextExpander>,
    ) -> Self {
        Self {
            filter,
            action,
            expander,
        }
    }

    /// The admission filter.
    pub fn filter(&self) -> &AlertFilter {
        &self.filter
    }

    /// Value of a template variable for `session` and `event`.
    fn resolve(&self, key: &str, session: &Session, event: Event) -> Option<String> {
        if key.eq_ignore_ascii_case("username") {
            Some(session.to_string())
        } else if key.eq_ignore_ascii_case("alertname") {
            Some(self.filter.name().to_string())
        } else if key.eq_ignore_ascii_case("event") {
            Some(event.name().to_string())
        } else {
            None
        }
    }
}

impl EventHandler for AlertBinding {
    fn on_event(&self, session: &Session, event: Event) -> Result<(), HandlerError> {
        if !self.filter.mask().contains(event) {
            self.action.deactivate();
            return Ok(());
        }
        if !self.filter.test(session) {
            return Ok(());
        }
        let resolver = |key: &str| self.resolve(key, session, event);
        self.action
            .activate(&|template| self.expander.expand(template, &resolver))
    }
}
