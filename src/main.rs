use anyhow::Result;
use clap::Parser;
use script_debugger::cli::{Cli, Commands};
use script_debugger::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    let settings = match cli.config.clone().or_else(Settings::default_path) {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };

    // Initialize logging; RUST_LOG wins over flags and settings.
    // Logs go to stderr so `--output json` keeps stdout clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.to_log_level(&settings.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run(args) => {
            script_debugger::cli::commands::run(args, &settings)?;
        }
        Commands::Debug(args) => {
            script_debugger::cli::commands::debug(args, &settings)?;
        }
        Commands::Completions(args) => {
            script_debugger::cli::commands::completions(args)?;
        }
    }

    Ok(())
}
