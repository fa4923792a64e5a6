//! Background task applying OS notifications and periodic refreshes.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};

use super::{Controller, Inner};
use crate::source::Notification;

/// Running monitor task plus its stop signal.
pub(super) struct Monitor {
    pub(super) shutdown_tx: broadcast::Sender<()>,
    pub(super) handle: JoinHandle<()>,
}

impl Monitor {
    /// Spawns the task on the current runtime.
    ///
    /// The task holds only a weak reference, so a controller dropped without
    /// `deactivate()` still ends it.
    pub(super) fn spawn(
        runtime: &tokio::runtime::Handle,
        inner: &Arc<Inner>,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let ticker = inner.refresh_interval.map(refresh_ticker);
        let handle = runtime.spawn(run(
            Arc::downgrade(inner),
            Some(notifications),
            ticker,
            shutdown_rx,
        ));
        Self {
            shutdown_tx,
            handle,
        }
    }
}

fn refresh_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run(
    inner: Weak<Inner>,
    mut notifications: Option<mpsc::UnboundedReceiver<Notification>>,
    mut ticker: Option<Interval>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::debug!("session monitor started");

    loop {
        if notifications.is_none() && ticker.is_none() {
            tracing::warn!("session monitor has nothing left to watch");
            break;
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!("session monitor received shutdown signal");
                break;
            }
            received = next_notification(&mut notifications) => {
                let Some(notification) = received else {
                    tracing::warn!("session notification stream closed; relying on periodic refresh");
                    notifications = None;
                    continue;
                };
                let Some(controller) = upgrade(&inner) else { break };
                controller.handle_notification(notification);
            }
            _ = next_tick(&mut ticker) => {
                let Some(controller) = upgrade(&inner) else { break };
                if let Err(e) = controller.refresh() {
                    tracing::warn!(error = %e, "periodic session refresh failed");
                }
            }
        }
    }

    tracing::debug!("session monitor stopped");
}

fn upgrade(inner: &Weak<Inner>) -> Option<Controller> {
    inner.upgrade().map(|inner| Controller { inner })
}

/// Next notification; pending forever once the stream is gone.
async fn next_notification(
    notifications: &mut Option<mpsc::UnboundedReceiver<Notification>>,
) -> Option<Notification> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Next refresh tick; pending forever without a ticker.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
