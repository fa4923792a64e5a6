//! In-memory session source.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{Notification, SessionSnapshot, SessionSource, SessionStatus};
use crate::error::{ProbeError, SourceError};
use crate::session::{SessionAttributes, SessionId, State};

#[derive(Default)]
struct Inner {
    /// Known sessions, in insertion order.
    sessions: Vec<SessionSnapshot>,
    subscribers: Vec<mpsc::UnboundedSender<Notification>>,
    enumeration_failure: Option<String>,
    subscription_failure: Option<String>,
}

/// Session source backed by a plain list.
///
/// Mutators only change what `enumerate()` returns; [`notify`](Self::notify)
/// is a separate step, so callers decide whether the controller learns about
/// a change through a notification or through the next refresh. The
/// `appear`/`vanish`/`focus`/`lock` helpers do both.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemorySource")
            .field("sessions", &inner.sessions.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds or replaces a session without notifying.
    pub fn insert(
        &self,
        id: impl Into<SessionId>,
        attributes: SessionAttributes,
        status: SessionStatus,
    ) {
        let snapshot = SessionSnapshot {
            id: id.into(),
            attributes,
            status: Ok(status),
        };
        let mut inner = self.lock();
        match inner.sessions.iter_mut().find(|s| s.id == snapshot.id) {
            Some(existing) => *existing = snapshot,
            None => inner.sessions.push(snapshot),
        }
    }

    /// Removes a session without notifying. Returns `true` if it existed.
    pub fn remove(&self, id: &SessionId) -> bool {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|s| &s.id != id);
        inner.sessions.len() != before
    }

    /// Replaces the status of a known session.
    pub fn set_status(&self, id: &SessionId, status: SessionStatus) -> Result<(), SourceError> {
        self.update(id, |snapshot| snapshot.status = Ok(status))
    }

    /// Makes status reads of a known session fail with `error`.
    pub fn set_probe_error(&self, id: &SessionId, error: ProbeError) -> Result<(), SourceError> {
        self.update(id, |snapshot| snapshot.status = Err(error))
    }

    /// Replaces the attributes of a known session.
    pub fn set_attributes(
        &self,
        id: &SessionId,
        attributes: SessionAttributes,
    ) -> Result<(), SourceError> {
        self.update(id, |snapshot| snapshot.attributes = attributes)
    }

    fn update<F>(&self, id: &SessionId, apply: F) -> Result<(), SourceError>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let mut inner = self.lock();
        let snapshot = inner
            .sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| SourceError::UnknownSession(id.clone()))?;
        apply(snapshot);
        Ok(())
    }

    /// Makes `enumerate()` fail with `reason`, or succeed again with `None`.
    pub fn fail_enumeration(&self, reason: Option<&str>) {
        self.lock().enumeration_failure = reason.map(str::to_string);
    }

    /// Makes `subscribe()` fail with `reason`, or succeed again with `None`.
    pub fn fail_subscription(&self, reason: Option<&str>) {
        self.lock().subscription_failure = reason.map(str::to_string);
    }

    /// Sends a notification to every open stream. Closed streams are pruned.
    /// Returns the number of streams reached.
    pub fn notify(&self, notification: Notification) -> usize {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(notification.clone()).is_ok());
        let reached = inner.subscribers.len();
        tracing::trace!(?notification, reached, "memory source notification");
        reached
    }

    /// Inserts a session and announces it.
    pub fn appear(
        &self,
        id: impl Into<SessionId>,
        attributes: SessionAttributes,
        status: SessionStatus,
    ) {
        let id = id.into();
        self.insert(id.clone(), attributes, status);
        self.notify(Notification::SessionAppeared(id));
    }

    /// Removes a session and announces it.
    pub fn vanish(&self, id: &SessionId) {
        self.remove(id);
        self.notify(Notification::SessionRemoved(id.clone()));
    }

    /// Moves the focus of a known session and announces it.
    pub fn focus(&self, id: &SessionId, focused: bool) -> Result<(), SourceError> {
        let state = if focused {
            State::Foreground
        } else {
            State::Background
        };
        self.update(id, |snapshot| {
            let locked = snapshot.status.as_ref().map(|s| s.locked).unwrap_or(false);
            snapshot.status = Ok(SessionStatus { state, locked });
        })?;
        self.notify(Notification::FocusChanged(id.clone(), focused));
        Ok(())
    }

    /// Changes the lock of a known session and announces it.
    pub fn lock_session(&self, id: &SessionId, locked: bool) -> Result<(), SourceError> {
        self.update(id, |snapshot| {
            if let Ok(status) = snapshot.status.as_mut() {
                status.locked = locked;
            }
        })?;
        self.notify(Notification::LockChanged(id.clone(), locked));
        Ok(())
    }

    /// Number of sessions the source reports.
    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    /// `true` when the source reports no session.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open notification streams.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl SessionSource for MemorySource {
    fn enumerate(&self) -> Result<Vec<SessionSnapshot>, SourceError> {
        let inner = self.lock();
        if let Some(reason) = &inner.enumeration_failure {
            return Err(SourceError::Enumeration(reason.clone()));
        }
        Ok(inner.sessions.clone())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<Notification>, SourceError> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.subscription_failure {
            return Err(SourceError::Subscription(reason.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.push(tx);
        Ok(rx)
    }
}
