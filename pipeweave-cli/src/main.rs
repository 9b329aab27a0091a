//! Pipeweave CLI
//!
//! Command-line interface for compiling grouped pipelines and running them on
//! the orchestrator.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipeweave")]
#[command(about = "Compile pipelines into grouped orchestrator graphs", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "PIPEWEAVE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Configuration environment
    #[arg(short, long, env = "PIPEWEAVE_ENV", default_value = "base")]
    env: String,

    /// Plugin configuration file [default: conf/<env>/pipeweave.yaml]
    #[arg(long, env = "PIPEWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Pipeline manifest exported by the pipeline framework
    #[arg(long, env = "PIPEWEAVE_MANIFEST", default_value = "pipelines.yaml")]
    manifest: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipeweave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::new(cli.orchestrator_url, cli.env, cli.config, cli.manifest);

    handle_command(cli.command, &config).await
}
