//! Platform tables and the `Locator` lookup

use cartpilot_core_types::Platform;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    errors::LocatorError,
    types::{Candidate, PlatformTable, SemanticTarget},
};

const BUILTIN_TABLES: &[(&str, &str)] = &[("amazon", include_str!("../tables/amazon.yaml"))];

/// Resolves semantic targets to ordered candidates for a platform.
///
/// `locate` never fails: an unknown platform or target yields an empty list.
pub trait Locator: Send + Sync {
    fn locate(&self, target: SemanticTarget, platform: &Platform) -> Vec<Candidate>;

    fn profile(&self, platform: &Platform) -> Option<Arc<PlatformTable>>;
}

/// Locator backed by per-platform YAML tables
#[derive(Debug, Clone, Default)]
pub struct LocatorTables {
    tables: BTreeMap<Platform, Arc<PlatformTable>>,
}

impl LocatorTables {
    /// Empty set of tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables shipped with the crate
    pub fn builtin() -> Result<Self, LocatorError> {
        let mut tables = Self::new();
        for (name, yaml) in BUILTIN_TABLES {
            tables.insert(parse_table(yaml, &format!("builtin:{}", name))?);
        }
        Ok(tables)
    }

    /// Parse one table document
    pub fn from_yaml_str(yaml: &str) -> Result<PlatformTable, LocatorError> {
        parse_table(yaml, "<inline>")
    }

    /// Add or replace the table for its platform
    pub fn insert(&mut self, table: PlatformTable) -> Option<Arc<PlatformTable>> {
        self.tables.insert(table.platform.clone(), Arc::new(table))
    }

    /// Merge every `*.yaml` / `*.yml` table in `dir` over the current tables.
    ///
    /// Returns the number of tables loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, LocatorError> {
        let io_err = |path: &Path, err: std::io::Error| LocatorError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|err| io_err(dir, err))? {
            let path = entry.map_err(|err| io_err(dir, err))?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
                .unwrap_or(false);
            if is_yaml && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let yaml = std::fs::read_to_string(path).map_err(|err| io_err(path, err))?;
            let table = parse_table(&yaml, &path.display().to_string())?;
            info!(platform = %table.platform, path = %path.display(), "Loaded locator table");
            self.insert(table);
        }
        Ok(paths.len())
    }

    pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
        self.tables.keys()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<PlatformTable>> {
        self.tables.values()
    }
}

fn parse_table(yaml: &str, source_name: &str) -> Result<PlatformTable, LocatorError> {
    let table: PlatformTable = serde_yaml::from_str(yaml).map_err(|err| LocatorError::Parse {
        source_name: source_name.to_string(),
        reason: err.to_string(),
    })?;
    table.validate()?;
    Ok(table)
}

impl Locator for LocatorTables {
    fn locate(&self, target: SemanticTarget, platform: &Platform) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = self
            .tables
            .get(platform)
            .map(|table| {
                table
                    .anchors(target)
                    .iter()
                    .enumerate()
                    .map(|(priority, anchor)| Candidate::new(target, anchor.clone(), priority))
                    .collect()
            })
            .unwrap_or_default();
        debug!(
            platform = %platform,
            target = %target,
            candidates = candidates.len(),
            "Located candidates"
        );
        candidates
    }

    fn profile(&self, platform: &Platform) -> Option<Arc<PlatformTable>> {
        self.tables.get(platform).cloned()
    }
}
