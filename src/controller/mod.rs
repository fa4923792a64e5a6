//! Session registry and OS notification bridge.
//!
//! The [`Controller`] owns the authoritative list of tracked sessions. It is
//! cheap to clone; every clone shares the same registry, event bus and
//! monitor task. One controller per process is the convention, but nothing
//! enforces it.
//!
//! Registry access goes through a single `std::sync::Mutex`. The lock is held
//! only to find, insert, remove or copy entries; state transitions and event
//! emission always happen after it was released, so handlers may call back
//! into the controller.
//!
//! # Example
//!
//! ```
//! use session_watch::controller::Controller;
//! use session_watch::source::{MemorySource, SessionStatus};
//! use session_watch::session::{SessionAttributes, State};
//!
//! let source = MemorySource::new();
//! source.insert("7", SessionAttributes::default(), SessionStatus::new(State::Foreground));
//!
//! let controller = Controller::new(source);
//! controller.refresh().expect("in-memory source");
//! assert_eq!(controller.size(), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::dispatch::{EventBus, EventHandler};
use crate::event::{Event, SessionEvent};
use crate::session::{Session, SessionId, State};
use crate::source::SessionSource;

mod lifecycle;
mod monitor;

#[cfg(test)]
mod tests;

use monitor::Monitor;

/// Builds the [`Session`] instances the controller tracks.
///
/// Override to attach per-session handlers or default attributes.
pub trait SessionFactory: Send + Sync {
    /// Returns a new, untracked session for `id`.
    fn create(&self, id: &SessionId) -> Session {
        Session::new(id.clone())
    }
}

/// Factory producing plain sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSessionFactory;

impl SessionFactory for DefaultSessionFactory {}

struct Inner {
    registry: Mutex<Vec<Arc<Session>>>,
    bus: EventBus,
    source: Arc<dyn SessionSource>,
    factory: Arc<dyn SessionFactory>,
    refresh_interval: Option<Duration>,
    /// Serializes activate/deactivate.
    monitor: tokio::sync::Mutex<Option<Monitor>>,
    active: AtomicBool,
    /// Set while `deactivate()` runs; transitions are dropped meanwhile.
    deactivating: AtomicBool,
}

/// Process-wide registry of OS sessions.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("size", &self.size())
            .field("active", &self.is_active())
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("bus", &self.inner.bus)
            .finish()
    }
}

/// Configures a [`Controller`].
pub struct ControllerBuilder {
    source: Arc<dyn SessionSource>,
    factory: Arc<dyn SessionFactory>,
    refresh_interval: Option<Duration>,
}

impl ControllerBuilder {
    /// Uses a custom session factory.
    pub fn factory(mut self, factory: impl SessionFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Re-enumerates the OS sessions every `interval` while active.
    /// `None` (the default) disables periodic refresh.
    pub fn refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval.filter(|d| !d.is_zero());
        self
    }

    /// Creates the controller. Monitoring starts with
    /// [`Controller::activate`].
    pub fn build(self) -> Controller {
        Controller {
            inner: Arc::new(Inner {
                registry: Mutex::new(Vec::new()),
                bus: EventBus::new(),
                source: self.source,
                factory: self.factory,
                refresh_interval: self.refresh_interval,
                monitor: tokio::sync::Mutex::new(None),
                active: AtomicBool::new(false),
                deactivating: AtomicBool::new(false),
            }),
        }
    }
}

impl Controller {
    /// Creates a controller with the default factory and no periodic refresh.
    pub fn new(source: impl SessionSource + 'static) -> Self {
        Self::builder(source).build()
    }

    /// Starts configuring a controller reading from `source`.
    pub fn builder(source: impl SessionSource + 'static) -> ControllerBuilder {
        ControllerBuilder {
            source: Arc::new(source),
            factory: Arc::new(DefaultSessionFactory),
            refresh_interval: None,
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Session>>> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a handler called for every event of every tracked session.
    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.bus.add_handler(handler);
    }

    /// Returns a receiver for [`SessionEvent`] notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.bus.subscribe()
    }

    /// `true` between `activate()` and `deactivate()`.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Number of tracked sessions.
    pub fn size(&self) -> usize {
        self.registry().len()
    }

    /// Snapshot of the tracked sessions, in registration order.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.registry().clone()
    }

    /// Calls `callback` for every tracked session.
    ///
    /// The list is copied under the registry lock and the callback runs
    /// after the lock was released, so it may use any controller operation.
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(&Session),
    {
        for session in self.sessions() {
            callback(&session);
        }
    }

    /// Looks up a session by id.
    ///
    /// With `create`, an unknown id is registered as a new `Unknown` session
    /// before it is returned. No event is emitted for it.
    pub fn find(&self, id: &SessionId, create: bool) -> Option<Arc<Session>> {
        if let Some(session) = self.lookup(id) {
            return Some(session);
        }
        if !create {
            return None;
        }
        let session = self.prepare(id, State::Unknown, false);
        Some(self.register(session).0)
    }

    fn lookup(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.registry().iter().find(|s| s.id() == id).cloned()
    }

    /// Builds a fully initialized session that is not yet visible in the
    /// registry.
    fn prepare(&self, id: &SessionId, state: State, locked: bool) -> Arc<Session> {
        let session = self.inner.factory.create(id);
        session.attach(self.inner.bus.clone());
        session.writer().initialize(state, locked);
        Arc::new(session)
    }

    /// Inserts `session` unless its id is already tracked. Returns the
    /// tracked entry and whether it was inserted.
    fn register(&self, session: Arc<Session>) -> (Arc<Session>, bool) {
        let mut registry = self.registry();
        let existing = registry.iter().find(|s| s.id() == session.id()).cloned();
        if let Some(existing) = existing {
            drop(registry);
            session.writer().retire();
            return (existing, false);
        }
        registry.push(Arc::clone(&session));
        tracing::debug!(session = %session, count = registry.len(), "session registered");
        (session, true)
    }

    /// Removes exactly this entry from the registry.
    fn unregister(&self, session: &Arc<Session>) -> bool {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|s| !Arc::ptr_eq(s, session));
        let removed = registry.len() != before;
        if removed {
            tracing::debug!(session = %session, count = registry.len(), "session unregistered");
        }
        removed
    }

    /// Sends `sleep` to every tracked session.
    pub fn sleep(&self) {
        self.broadcast(Event::Sleep);
    }

    /// Sends `resume` to every tracked session.
    pub fn resume(&self) {
        self.broadcast(Event::Resume);
    }

    /// Sends `shutdown` to every tracked session.
    pub fn shutdown(&self) {
        self.broadcast(Event::Shutdown);
    }

    /// System-wide events leave the per-session state untouched.
    fn broadcast(&self, event: Event) {
        if self.is_deactivating() {
            return;
        }
        tracing::info!(event = %event, "system event");
        for session in self.sessions() {
            session.writer().emit(event);
        }
    }

    fn is_deactivating(&self) -> bool {
        self.inner.deactivating.load(Ordering::Acquire)
    }
}
