//! Mutation capability for sessions, held by the controller only.

use super::{transition_event, Session, SessionAttributes, State};
use crate::event::Event;

/// Write access to a [`Session`].
///
/// Every field update happens before the matching event is emitted, so a
/// handler never observes an event together with the previous field value.
pub(crate) struct SessionWriter<'a> {
    session: &'a Session,
}

impl<'a> SessionWriter<'a> {
    pub(super) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Loads the initial state without emitting anything and marks the
    /// session alive.
    pub(crate) fn initialize(&self, state: State, locked: bool) {
        self.session.store_state(state);
        self.session.store_locked(locked);
        self.session.store_alive(true);
    }

    /// Applies a new lifecycle state. Returns the emitted event, if the move
    /// produced one; setting the current state is a no-op.
    pub(crate) fn set(&self, state: State) -> Option<Event> {
        let previous = self.session.store_state(state);
        if previous == state {
            return None;
        }
        tracing::trace!(
            session = %self.session,
            from = %previous,
            to = %state,
            "session state changed"
        );
        let event = transition_event(previous, state)?;
        self.session.emit(event);
        Some(event)
    }

    /// Applies the lock flag, emitting `lock`/`unlock` on change.
    pub(crate) fn set_locked(&self, locked: bool) -> Option<Event> {
        if self.session.store_locked(locked) == locked {
            return None;
        }
        let event = if locked { Event::Lock } else { Event::Unlock };
        self.session.emit(event);
        Some(event)
    }

    pub(crate) fn emit(&self, event: Event) {
        self.session.emit(event);
    }

    pub(crate) fn update_attributes(&self, attributes: SessionAttributes) {
        *self
            .session
            .attributes
            .write()
            .unwrap_or_else(|e| e.into_inner()) = attributes;
    }

    /// Marks the session as no longer tracked.
    pub(crate) fn retire(&self) {
        self.session.store_alive(false);
    }
}
