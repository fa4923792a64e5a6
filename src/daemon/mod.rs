//! Monitor process lifecycle.
//!
//! Loads the configuration, optionally detaches from the terminal, then runs
//! the controller, the alert bindings and the session feed on a tokio runtime
//! until SIGINT or SIGTERM arrives.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fork::{daemon, Fork};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::alert::{self, AlertBinding, PulseScheduler};
use crate::config::{Config, ConfigError, ConfigLoader};
use crate::controller::Controller;
use crate::error::ControllerError;
use crate::logging;
use crate::source::{feed, MemorySource};

/// How long shutdown waits for blocking feed reads.
const STDIN_RELEASE_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors that stop the monitor.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The controller failed to start or stop.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Detaching from the terminal failed.
    #[error("failed to daemonize: {0}")]
    Daemonize(String),

    /// The tokio runtime could not be created.
    #[error("failed to create tokio runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The session feed could not be opened.
    #[error("failed to open session feed {path}: {source}")]
    Feed {
        /// Feed path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Where session notifications come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedInput {
    /// JSON Lines on standard input.
    Stdin,
    /// JSON Lines from a file or FIFO.
    Path(PathBuf),
}

impl FeedInput {
    /// `-` selects standard input.
    pub fn from_arg(arg: PathBuf) -> Self {
        if arg.as_os_str() == "-" {
            FeedInput::Stdin
        } else {
            FeedInput::Path(arg)
        }
    }
}

/// Options of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit configuration file; the XDG location otherwise.
    pub config_path: Option<PathBuf>,
    /// Session feed.
    pub feed: Option<FeedInput>,
    /// Detach from the terminal.
    pub daemonize: bool,
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// If SIGTERM handler registration fails, falls back to SIGINT only.
async fn wait_for_shutdown() {
    match unix_signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received SIGINT (Ctrl+C), shutting down");
                },
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                },
            }
        }
        Err(e) => {
            warn!(error = %e, "could not register SIGTERM handler, using SIGINT only");
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "failed waiting for SIGINT");
            } else {
                info!("received SIGINT (Ctrl+C), shutting down");
            }
        }
    }
}

/// Daemonize the current process.
///
/// The parent exits with code 0; the child continues in the background.
/// Must run before the tokio runtime exists.
pub fn daemonize_process(nochdir: bool, noclose: bool) -> DaemonResult<()> {
    match daemon(nochdir, noclose) {
        Ok(Fork::Child) => Ok(()),
        Ok(Fork::Parent(_)) => std::process::exit(0),
        Err(e) => Err(DaemonError::Daemonize(e.to_string())),
    }
}

/// Loads the configuration and builds every alert binding.
///
/// Shared by `run` and `config validate` so both reject the same files.
pub fn load(config_path: Option<&Path>) -> DaemonResult<(Config, Vec<Arc<AlertBinding>>)> {
    let config = ConfigLoader::load(config_path)?;
    config.monitor.refresh_interval()?;
    let bindings = alert::build_bindings(&config)?;
    Ok((config, bindings))
}

/// Runs the monitor until a shutdown signal arrives.
pub fn run(options: RunOptions) -> DaemonResult<()> {
    // Configuration errors must reach the terminal, so load before forking.
    let (config, bindings) = load(options.config_path.as_deref())?;
    logging::init(config.monitor.log_level);

    let mut feed_input = options.feed;
    if options.daemonize {
        // The daemon runs from `/`.
        if let Some(FeedInput::Path(path)) = &mut feed_input {
            if path.is_relative() {
                let cwd = std::env::current_dir().map_err(|e| DaemonError::Feed {
                    path: path.clone(),
                    source: e,
                })?;
                *path = cwd.join(&*path);
            }
        }
        // Keep stdio open when the feed is standard input.
        let noclose = feed_input == Some(FeedInput::Stdin);
        daemonize_process(false, noclose)?;
    }

    info!(
        alerts = bindings.len(),
        daemonize = options.daemonize,
        "session-watch starting"
    );

    let runtime = Runtime::new().map_err(DaemonError::Runtime)?;
    let result = runtime.block_on(serve(config, bindings, feed_input));
    // A blocking stdin read would otherwise keep the runtime alive.
    runtime.shutdown_timeout(STDIN_RELEASE_TIMEOUT);
    result
}

async fn serve(
    config: Config,
    bindings: Vec<Arc<AlertBinding>>,
    feed_input: Option<FeedInput>,
) -> DaemonResult<()> {
    let source = MemorySource::new();
    let controller = Controller::builder(source.clone())
        .refresh_interval(config.monitor.refresh_interval()?)
        .build();

    for binding in &bindings {
        controller.add_handler(binding.clone());
    }

    controller.activate().await?;

    let schedulers: Vec<PulseScheduler> = bindings
        .iter()
        .filter_map(|binding| PulseScheduler::spawn(&controller, binding.clone()))
        .collect();

    let feed_task = match feed_input {
        Some(input) => Some(spawn_feed(input, source).await?),
        None => None,
    };

    info!(sessions = controller.size(), "monitoring sessions");
    wait_for_shutdown().await;

    if let Some(task) = feed_task {
        task.abort();
    }
    for scheduler in schedulers {
        scheduler.shutdown().await;
    }
    controller.deactivate().await?;

    info!("session-watch stopped");
    Ok(())
}

async fn spawn_feed(input: FeedInput, source: MemorySource) -> DaemonResult<JoinHandle<()>> {
    let handle = match input {
        FeedInput::Stdin => {
            info!("reading session feed from stdin");
            tokio::spawn(async move {
                let reader = BufReader::new(tokio::io::stdin());
                report_feed_end(feed::run(reader, &source).await);
            })
        }
        FeedInput::Path(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| DaemonError::Feed {
                    path: path.clone(),
                    source: e,
                })?;
            info!(path = %path.display(), "reading session feed");
            tokio::spawn(async move {
                report_feed_end(feed::run(BufReader::new(file), &source).await);
            })
        }
    };
    Ok(handle)
}

fn report_feed_end(result: Result<usize, feed::FeedError>) {
    match result {
        Ok(applied) => info!(applied, "session feed closed"),
        Err(e) => error!(error = %e, "session feed failed"),
    }
}
