mod builder;
mod cli;
mod config;
mod error;
mod host;
mod options;
mod presets;
mod settings;
mod target;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::Config::config_path);
    let config = config::Config::load(Some(&config_path))?;

    // RUST_LOG wins, then --verbose, then the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { config.general.log_level.as_str() })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = cli::Session::load(config, config_path)?;
    cli.execute(session).await
}
