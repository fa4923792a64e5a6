//! Activation, reconciliation and notification handling for the Controller.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::monitor::Monitor;
use super::Controller;
use crate::error::ControllerError;
use crate::event::Event;
use crate::session::{Session, SessionId, State};
use crate::source::{Notification, SessionSnapshot};

impl Controller {
    /// Starts monitoring.
    ///
    /// Subscribes to the source, loads every session it enumerates and emits
    /// `already_active` for the ones that are logged in, then spawns the
    /// monitor task. Calling it while active does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Source`] when subscribing or enumerating
    /// fails, and [`ControllerError::NoRuntime`] outside a tokio runtime. The
    /// controller stays inactive in both cases.
    pub async fn activate(&self) -> Result<(), ControllerError> {
        let mut monitor = self.inner.monitor.lock().await;
        if monitor.is_some() {
            tracing::debug!("controller already active");
            return Ok(());
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ControllerError::NoRuntime)?;

        // Subscribe first so nothing between enumeration and subscription is lost.
        let notifications = self.inner.source.subscribe()?;
        let snapshots = self.inner.source.enumerate()?;

        let mut loaded = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let (state, locked) = match snapshot.status {
                Ok(status) => (status.state, status.locked),
                Err(ref e) => {
                    tracing::warn!(session = %snapshot.id, error = %e, "cannot read session state");
                    (State::Unknown, false)
                }
            };
            if state == State::Closing {
                continue;
            }
            let session = self.prepare(&snapshot.id, state, locked);
            session.writer().update_attributes(snapshot.attributes);
            let (session, inserted) = self.register(session);
            if inserted {
                loaded.push(session);
            }
        }

        for session in &loaded {
            if session.active() {
                session.writer().emit(Event::AlreadyActive);
            }
        }

        *monitor = Some(Monitor::spawn(&runtime, &self.inner, notifications));
        self.inner.active.store(true, Ordering::Release);
        tracing::info!(sessions = loaded.len(), "session monitoring activated");
        Ok(())
    }

    /// Stops monitoring.
    ///
    /// The monitor task is stopped first; then every tracked session gets a
    /// final `still_active` and the registry is cleared. Safe to call without
    /// a prior `activate()`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Monitor`] if the monitor task had panicked.
    /// Reconciliation and cleanup have completed by then.
    pub async fn deactivate(&self) -> Result<(), ControllerError> {
        let mut monitor = self.inner.monitor.lock().await;
        self.inner.deactivating.store(true, Ordering::Release);
        self.inner.active.store(false, Ordering::Release);

        let mut outcome = Ok(());
        if let Some(running) = monitor.take() {
            let _ = running.shutdown_tx.send(());
            if let Err(e) = running.handle.await {
                tracing::error!(error = %e, "session monitor task failed");
                outcome = Err(ControllerError::Monitor(e.to_string()));
            }
        }

        let sessions = std::mem::take(&mut *self.registry());
        for session in &sessions {
            session.writer().emit(Event::StillActive);
        }
        for session in &sessions {
            session.writer().retire();
        }

        self.inner.deactivating.store(false, Ordering::Release);
        tracing::info!(sessions = sessions.len(), "session monitoring deactivated");
        outcome
    }

    /// Re-synchronizes the registry with a fresh enumeration.
    ///
    /// Sessions missing from the enumeration are closed and removed, new ones
    /// are registered, known ones are updated in place. A session whose state
    /// cannot be read keeps its previous state for this cycle.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Source`] when the enumeration fails; the
    /// registry is left untouched then.
    pub fn refresh(&self) -> Result<(), ControllerError> {
        if self.is_deactivating() {
            return Ok(());
        }
        let snapshots = self.inner.source.enumerate()?;

        let gone: Vec<Arc<Session>> = self
            .sessions()
            .into_iter()
            .filter(|session| !snapshots.iter().any(|s| &s.id == session.id()))
            .collect();
        for session in gone {
            self.close(&session);
        }

        for snapshot in snapshots {
            self.apply_snapshot(snapshot);
        }
        tracing::trace!(count = self.size(), "session registry refreshed");
        Ok(())
    }

    /// Applies one notification. Called from the monitor task.
    pub(super) fn handle_notification(&self, notification: Notification) {
        if self.is_deactivating() {
            return;
        }
        tracing::debug!(?notification, "session notification");
        match notification {
            Notification::SessionAppeared(id) => self.reload(&id),
            Notification::SessionRemoved(id) => {
                if let Some(session) = self.lookup(&id) {
                    self.close(&session);
                }
            }
            Notification::FocusChanged(id, focused) => match self.lookup(&id) {
                Some(session) => {
                    let state = if focused {
                        State::Foreground
                    } else {
                        State::Background
                    };
                    session.writer().set(state);
                }
                None => self.reload(&id),
            },
            Notification::LockChanged(id, locked) => match self.lookup(&id) {
                Some(session) => {
                    session.writer().set_locked(locked);
                }
                None => self.reload(&id),
            },
            Notification::SystemSleep => self.sleep(),
            Notification::SystemResume => self.resume(),
            Notification::SystemShutdown => self.shutdown(),
        }
    }

    /// Queries one session from the source and applies it.
    fn reload(&self, id: &SessionId) {
        match self.inner.source.query(id) {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(e) => tracing::warn!(session = %id, error = %e, "cannot query session"),
        }
    }

    fn apply_snapshot(&self, snapshot: SessionSnapshot) {
        match self.lookup(&snapshot.id) {
            Some(session) => self.update(&session, snapshot),
            None => self.track(snapshot),
        }
    }

    /// Applies fresh values to a tracked session.
    fn update(&self, session: &Arc<Session>, snapshot: SessionSnapshot) {
        let writer = session.writer();
        writer.update_attributes(snapshot.attributes);
        match snapshot.status {
            Ok(status) if status.state == State::Closing => self.close(session),
            Ok(status) => {
                writer.set(status.state);
                writer.set_locked(status.locked);
            }
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "keeping previous session state");
            }
        }
    }

    /// Registers a session the registry did not know and announces it.
    ///
    /// Logged in sessions get a `logon` right after registration. An
    /// `Opening` session gets it once it completes; a session whose state
    /// cannot be read starts as `Opening` for the same reason.
    fn track(&self, snapshot: SessionSnapshot) {
        let (state, locked) = match snapshot.status {
            Ok(status) => (status.state, status.locked),
            Err(ref e) => {
                tracing::warn!(session = %snapshot.id, error = %e, "cannot read state of new session");
                (State::Opening, false)
            }
        };
        if state == State::Closing {
            tracing::debug!(session = %snapshot.id, "ignoring closing session");
            return;
        }

        let session = self.prepare(&snapshot.id, state, locked);
        session.writer().update_attributes(snapshot.attributes);
        let (session, inserted) = self.register(session);
        if inserted && state.is_active() {
            session.writer().emit(Event::Logon);
        }
    }

    /// Emits the final transition, then drops the session from the registry.
    fn close(&self, session: &Arc<Session>) {
        session.writer().set(State::Closing);
        if self.unregister(session) {
            session.writer().retire();
        }
    }
}
