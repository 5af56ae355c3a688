mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Resident issue portal - command-line client
#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Portal backend URL (overrides config)
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    /// Allow a plain http:// backend (overrides config)
    #[arg(long, global = true)]
    allow_insecure_http: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    config::init_logging(cli.verbose);

    // defaults -> YAML (if provided) -> env (PORTAL__*) -> CLI overrides
    let overrides = config::CliOverrides {
        api_base_url: cli.api_base_url,
        allow_insecure_http: cli.allow_insecure_http,
    };
    let config = config::load(cli.config.as_deref(), &overrides)?;
    tracing::debug!(?config, "effective configuration");

    cli.command.run(&config).await
}
