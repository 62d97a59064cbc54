use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};
use crate::metrics;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;
    info!(
        "Starting cartpilot v{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE")
    );

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let metrics_port = cli.metrics_port.unwrap_or(config.metrics_port);
    let _metrics_server = metrics::spawn_metrics_server(metrics_port);
    let cli_context = CliContext::new(config, path, cli.output.clone());

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
