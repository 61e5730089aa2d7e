mod cli;
mod engine;
mod error;
mod gateway;
mod history;
mod logging;
mod model;
mod orchestrator;
mod session;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.is_one_shot() || cfg!(not(feature = "tui"));

    let target = if is_non_tui {
        logging::LogTarget::Stderr
    } else {
        logging::LogTarget::File
    };
    let _log_guard = logging::init(target, args.verbose)?;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("{e:#}");
            Err(e)
        }
    }
}
