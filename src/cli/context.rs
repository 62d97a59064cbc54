use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use action_locator::LocatorTables;
use tracing::info;

use crate::cli::output::OutputFormat;
use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    /// Built-in tables merged with `locators.tables_dir`
    pub fn locator_tables(&self) -> Result<LocatorTables> {
        let mut tables = LocatorTables::builtin().context("loading built-in locator tables")?;
        if let Some(dir) = &self.config.locators.tables_dir {
            let loaded = tables
                .load_dir(dir)
                .with_context(|| format!("loading locator tables from {}", dir.display()))?;
            info!(dir = %dir.display(), loaded, "Merged locator tables");
        }
        Ok(tables)
    }
}
