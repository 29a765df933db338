mod cli;
mod engine;
mod logging;
mod model;
mod registry;
mod status;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing: SCRIPTS_LIST may come from the env file.
    let env_file = cli::load_env_file(cli::env_file_arg(std::env::args_os()).as_deref())?;
    let args = cli::Cli::parse();

    // A log file we cannot open should not keep the menu from starting.
    let _log_guard = match logging::init(args.log_file.as_deref(), args.is_headless()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };

    if let Some(path) = &env_file {
        tracing::info!(
            path = %path.display(),
            explicit = args.env_file.is_some(),
            "environment file loaded"
        );
    }

    cli::run(args).await
}
