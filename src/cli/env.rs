use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

/// Verified add-to-cart runs against a remote UI agent
#[derive(Parser)]
#[command(name = "cartpilot", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Cartpilot YAML config (engine knobs, agent URL, locator tables, recovery)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Tracing filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// How outcomes, tables and config are printed
    #[arg(short, long, value_enum, default_value = "human", global = true)]
    pub output: crate::cli::output::OutputFormat,

    /// Port for the Prometheus /metrics endpoint; overrides `metrics_port`
    /// from the config, 0 disables it
    #[arg(long, value_name = "PORT", global = true)]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn global_flags_parse_after_the_subcommand() {
        CliArgs::command().debug_assert();
        let args = CliArgs::try_parse_from([
            "cartpilot",
            "locators",
            "--output",
            "json",
            "--metrics-port",
            "0",
        ])
        .unwrap();
        assert!(matches!(args.output, crate::cli::output::OutputFormat::Json));
        assert_eq!(args.metrics_port, Some(0));
        assert!(!args.debug);
    }
}
