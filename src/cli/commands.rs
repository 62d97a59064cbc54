use clap::Subcommand;

use super::config::ConfigArgs;
use super::locators::LocatorsArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run a batch of add-to-cart requests against one session
    Run(RunArgs),

    /// Show platform locator tables
    Locators(LocatorsArgs),

    /// Inspect or validate configuration
    Config(ConfigArgs),
}
