//! CLI entry point for file-events.
//!
//! This binary starts a watch session on the given paths and prints one line
//! per change until interrupted.
//!
//! # Usage
//!
//! ```bash
//! fe-watch [OPTIONS] <COMMAND>
//!
//! # Watch two directories with the native backend
//! fe-watch watch ./src ./tests
//!
//! # Poll every 500ms, without descending into subdirectories
//! fe-watch watch --poll 500 --non-recursive /var/log
//!
//! # Print the backend version
//! fe-watch version
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use fe_core::{BackendKind, Config};
use fe_watcher::{
    ChangeType, EventStream, WatchEvent, WatchSession, WatcherBuilder, event_channel,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch file-system paths and print change events.
#[derive(Parser)]
#[command(name = "fe-watch", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "FE_WATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch paths and print every change until interrupted.
    Watch {
        /// Paths to watch; relative paths are resolved against the current directory.
        #[arg(required = true)]
        paths: Vec<Utf8PathBuf>,

        /// Use the polling backend with this interval in milliseconds.
        #[arg(long, value_name = "MS")]
        poll: Option<u64>,

        /// Do not watch subdirectories.
        #[arg(long)]
        non_recursive: bool,
    },

    /// Print the watcher backend version.
    Version,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses the
/// configured default filter, then `debug` if `--verbose` is set, or `info`.
fn init_tracing(verbose: bool, no_color: bool, default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        default_filter.map_or_else(
            || {
                let level = if verbose { "debug" } else { "info" };
                EnvFilter::new(format!("{level},notify=warn,mio=warn"))
            },
            EnvFilter::new,
        )
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();

    // Backends may have cached a verbosity before the subscriber existed.
    fe_watcher::invalidate_log_level_cache();
}

/// Loads the configuration file if one was given, otherwise the defaults.
fn load_config(path: Option<&Utf8Path>) -> color_eyre::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load configuration: {}", e)),
        None => Ok(Config::default()),
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Watches `paths` until Ctrl-C, SIGTERM, or a fatal backend error.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the backend cannot be
/// started, or a path cannot be watched.
async fn run_watch(
    mut config: Config,
    paths: &[Utf8PathBuf],
    poll: Option<u64>,
    non_recursive: bool,
) -> color_eyre::Result<()> {
    if let Some(interval_ms) = poll {
        config.watch.backend = BackendKind::Poll { interval_ms };
    }
    if non_recursive {
        config.watch.recursive = false;
    }
    config
        .validate()
        .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration: {}", e))?;

    let (callback, mut events) = event_channel(config.watch.channel_capacity);
    let session = WatcherBuilder::new(callback)
        .with_config(config.watch)
        .start()?;

    if let Err(error) = session.start_watching(paths) {
        close_session(&session);
        return Err(error.into());
    }
    info!(count = paths.len(), backend = ?config.watch.backend, "Watching paths");

    let outcome = print_events(&mut events).await;
    session.close()?;
    outcome
}

/// Prints events until the stream ends, a fatal error arrives, or a shutdown signal.
async fn print_events(events: &mut EventStream) -> color_eyre::Result<()> {
    let stdout = std::io::stdout();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(WatchEvent::Changed { kind, path }) => {
                        let mut handle = stdout.lock();
                        writeln!(handle, "{}", format_change(kind, &path))?;
                    }
                    Some(WatchEvent::Error(error)) if error.is_fatal() => {
                        // Every root deleted, or the OS event queue became unreadable.
                        tracing::error!(%error, "Watching stopped unexpectedly");
                        return Ok(());
                    }
                    Some(WatchEvent::Error(error)) => {
                        tracing::warn!(%error, "Watcher reported an error");
                    }
                    None => return Ok(()),
                }
            }
            () = &mut shutdown => {
                info!("Received shutdown signal");
                return Ok(());
            }
        }
    }
}

/// Closes `session`, logging any teardown failure.
fn close_session(session: &WatchSession) {
    if let Err(error) = session.close() {
        tracing::warn!(%error, "Failed to close watch session");
    }
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Formats one change as `KIND path`.
fn format_change(kind: ChangeType, path: &Utf8Path) -> String {
    format!("{:<11} {path}", kind.label())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Load configuration (it may carry the default log filter)
    let config = load_config(cli.config.as_deref())?;

    // 4. Initialize tracing
    init_tracing(cli.verbose, cli.no_color, config.logging.filter.as_deref());

    // 5. Route to appropriate command
    match &cli.command {
        Commands::Watch {
            paths,
            poll,
            non_recursive,
        } => run_watch(config, paths, *poll, *non_recursive).await,
        Commands::Version => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "fe-watcher {}", fe_watcher::get_version())?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_change_aligns_labels() {
        assert_eq!(
            format_change(ChangeType::Created, Utf8Path::new("/tmp/a")),
            "CREATED     /tmp/a"
        );
        assert_eq!(
            format_change(ChangeType::Invalidated, Utf8Path::new("/tmp/b")),
            "INVALIDATED /tmp/b"
        );
    }

    #[test]
    fn test_cli_parses_watch() {
        let cli = Cli::try_parse_from(["fe-watch", "watch", "--poll", "250", "a", "b"])
            .expect("valid arguments");
        match cli.command {
            Commands::Watch {
                paths,
                poll,
                non_recursive,
            } => {
                assert_eq!(paths, vec![Utf8PathBuf::from("a"), Utf8PathBuf::from("b")]);
                assert_eq!(poll, Some(250));
                assert!(!non_recursive);
            }
            Commands::Version => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["fe-watch", "watch"]).is_err());
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).expect("defaults always load");
        assert_eq!(config, Config::default());
    }
}
