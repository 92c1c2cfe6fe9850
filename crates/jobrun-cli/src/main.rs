//! Job run aggregator CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;
mod handlers;
mod logging;

use commands::{Commands, ConfigCommands};
use config::{AggregatorConfig, LogFormat};

#[derive(Parser)]
#[command(name = "job-run-aggregator")]
#[command(author, version, about = "Caches CI job runs from the artifact bucket", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AggregatorConfig::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    logging::init(config.log_format);

    match cli.command {
        Commands::Cache { job, source } => {
            job.apply(&mut config);
            source.apply(&mut config);
            handlers::cache(&config).await?
        }
        Commands::Index { job } => {
            job.apply(&mut config);
            handlers::index(&config).await?
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
        },
    }

    Ok(())
}
