use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where log output goes for the chosen run mode.
pub enum LogTarget {
    /// One-shot modes: human-readable lines on stderr.
    Stderr,
    /// TUI: the terminal is owned by the alternate screen, so log to a daily file.
    File,
}

/// Directory holding TUI log files.
pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("video-enhancer")
        .join("logs")
}

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init(target: LogTarget, verbose: bool) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
            Ok(None)
        }
        LogTarget::File => {
            let dir = log_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "video-enhancer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            tracing::info!("video-enhancer v{} starting", env!("CARGO_PKG_VERSION"));
            Ok(Some(guard))
        }
    }
}
