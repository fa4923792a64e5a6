//! session-watch CLI entry point
//!
//! Runs the session monitor in the foreground or as a daemon, and manages
//! the configuration file.

use clap::{Parser, Subcommand};
use session_watch::config::{default, xdg};
use session_watch::daemon::{self, FeedInput, RunOptions};
use session_watch::event::Event;
use std::path::PathBuf;
use std::process::ExitCode;

/// User session monitor
#[derive(Parser)]
#[command(name = "session-watch")]
#[command(version, about = "Turns login session transitions into alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Monitor sessions until SIGINT or SIGTERM
    Run {
        /// Configuration file (default: $XDG_CONFIG_HOME/session-watch/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON Lines session feed; `-` reads standard input
        #[arg(long)]
        feed: Option<PathBuf>,

        /// Run as a background daemon (detached from terminal)
        #[arg(long)]
        daemonize: bool,
    },

    /// List the event names alerts can react to
    Events,

    /// Manage configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Actions for the `config` subcommand.
#[derive(Subcommand)]
enum ConfigAction {
    /// Create default configuration file
    Init {
        /// Overwrite existing configuration (creates backup)
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
    /// Validate configuration file and its alerts
    Validate {
        /// Configuration file (default: the XDG location)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Parse CLI arguments BEFORE any fork/runtime operations
    // so errors are shown in the terminal.
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            feed,
            daemonize,
        } => {
            let options = RunOptions {
                config_path: config,
                feed: feed.map(FeedInput::from_arg),
                daemonize,
            };
            if let Err(e) = daemon::run(options) {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
        Commands::Events => {
            for event in Event::ALL {
                println!("{:<16}{}", event.name(), event.description());
            }
        }
        Commands::Config { action } => return run_config_command(action),
    }

    ExitCode::SUCCESS
}

fn run_config_command(action: ConfigAction) -> ExitCode {
    match action {
        ConfigAction::Init { force } => match default::create_default_config(force) {
            Ok(path) => println!("Created configuration at {}", path.display()),
            Err(e) => {
                eprintln!("Config error: {e}");
                return ExitCode::FAILURE;
            }
        },
        ConfigAction::Path => println!("{}", xdg::config_path().display()),
        ConfigAction::Validate { config } => match daemon::load(config.as_deref()) {
            Ok((_, bindings)) => {
                println!("Configuration is valid");
                for binding in &bindings {
                    let filter = binding.filter();
                    if filter.timer() > 0 {
                        println!(
                            "  {}: {} every {}s",
                            filter.name(),
                            filter.mask(),
                            filter.timer()
                        );
                    } else {
                        println!("  {}: {}", filter.name(), filter.mask());
                    }
                }
            }
            Err(e) => {
                eprintln!("Config error: {e}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}
