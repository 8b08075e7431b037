mod api;
mod cli;
mod competition;
mod config;
mod error;
mod keywords;
mod logging;
mod metrics;
mod model;
mod orchestrator;
mod text_summary;
#[cfg(test)]
mod testing;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_interactive = args.is_interactive() && cfg!(feature = "tui");

    // The dashboard owns the terminal, so its logs go to a file.
    let target = if is_interactive {
        logging::LogTarget::File(logging::default_log_file())
    } else {
        logging::LogTarget::Stderr
    };
    logging::init(&args.log_level, args.log_json, target)?;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success for one-shot commands
            if !is_interactive {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
