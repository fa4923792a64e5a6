//! Periodic `pulse` delivery.
//!
//! A pulse is not a session transition: it goes straight to the binding that
//! asked for it, once per tracked session, every `timer` seconds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::alert::binding::AlertBinding;
use crate::controller::Controller;
use crate::dispatch::EventHandler;
use crate::event::Event;

/// Background task ticking one pulse binding.
///
/// Dropping the scheduler aborts the task; [`PulseScheduler::shutdown`]
/// stops it and waits for it to finish.
pub struct PulseScheduler {
    alert: String,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PulseScheduler {
    /// Starts ticking `binding` on the current tokio runtime.
    ///
    /// Returns `None` when the binding has no pulse interval.
    pub fn spawn(controller: &Controller, binding: Arc<AlertBinding>) -> Option<Self> {
        let secs = binding.filter().timer();
        if secs == 0 {
            return None;
        }
        let alert = binding.filter().name().to_string();
        let period = Duration::from_secs(secs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run(controller.clone(), binding, period, shutdown_rx));
        tracing::debug!(alert = %alert, interval = secs, "pulse scheduler started");
        Some(Self {
            alert,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Alert this scheduler ticks.
    pub fn alert(&self) -> &str {
        &self.alert
    }

    /// Stops the task and waits for it.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(alert = %self.alert, error = %e, "pulse task failed");
            }
        }
    }
}

impl Drop for PulseScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    controller: Controller,
    binding: Arc<AlertBinding>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => pulse(&controller, &binding),
        }
    }

    tracing::debug!(alert = %binding.filter().name(), "pulse scheduler stopped");
}

/// Delivers one pulse to `binding` for every tracked session.
fn pulse(controller: &Controller, binding: &AlertBinding) {
    controller.for_each(|session| {
        if let Err(e) = binding.on_event(session, Event::Pulse) {
            tracing::warn!(
                alert = %binding.filter().name(),
                session = %session,
                error = %e,
                "pulse handler failed"
            );
        }
    });
}
