use crate::cli::context::CliContext;
use crate::cli::output::print_value;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tokio::fs;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Validate configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            if matches!(ctx.output(), crate::cli::output::OutputFormat::Human) {
                println!("Current configuration ({}):", path.display());
            }
            print_value(ctx.output(), ctx.config())?;
        }
        ConfigAction::Validate => {
            if fs::try_exists(path).await? {
                ctx.config()
                    .validate()
                    .with_context(|| format!("validating {}", path.display()))?;
                ctx.locator_tables()?;
                println!("Configuration file {} is valid", path.display());
            } else {
                ctx.config().validate()?;
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}
