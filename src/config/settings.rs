use crate::detection::{
    BlockingRule, ReplacementRecord, replacement::DEFAULT_REPLACEMENT_VERSION,
};
use crate::error::{DepshiftError, Result};
use crate::plan::DEFAULT_MAX_BATCH_SIZE;
use crate::registry::npm::DEFAULT_NPM_REGISTRY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "depshift.toml";

/// Contents of `depshift.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub planner: PlannerSettings,
    pub installer: InstallerSettings,
    pub restore: RestoreSettings,
    pub url_check: UrlCheckSettings,
    pub scan: ScanSettings,
    pub blocking: Vec<BlockingRule>,
    pub replacements: Vec<ReplacementEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    pub max_batch_size: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["install".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStrategy {
    /// Write back the bytes read before each attempt.
    #[default]
    Snapshot,
    /// `git checkout -- package.json`; requires a committed manifest.
    Git,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestoreSettings {
    pub strategy: RestoreStrategy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UrlCheckSettings {
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for UrlCheckSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            cache_ttl_secs: 300,
            cache_capacity: 256,
        }
    }
}

impl UrlCheckSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub registry: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            registry: DEFAULT_NPM_REGISTRY.to_string(),
        }
    }
}

/// One `[[replacements]]` table as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEntry {
    pub package: String,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub requires_manual_review: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<ReplacementEntry> for ReplacementRecord {
    fn from(entry: ReplacementEntry) -> Self {
        let mut record = match entry.replacement {
            Some(successor) => ReplacementRecord::swap(
                entry.package,
                successor,
                entry
                    .version
                    .unwrap_or_else(|| DEFAULT_REPLACEMENT_VERSION.to_string()),
            ),
            None => ReplacementRecord::removal(entry.package),
        };
        record.requires_manual_review |= entry.requires_manual_review;
        record.notes = entry.notes;
        record
    }
}

impl Settings {
    /// Load settings from `explicit`, or from `depshift.toml` in the project
    /// when present. A missing default file yields the defaults.
    pub fn load(project_path: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = Self::default_path(project_path);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = fs::read_to_string(&path).map_err(|e| {
            DepshiftError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn default_path(project_path: &Path) -> PathBuf {
        project_path.join(CONFIG_FILE)
    }

    pub fn replacement_records(&self) -> Vec<ReplacementRecord> {
        self.replacements.iter().cloned().map(Into::into).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.installer.program.trim().is_empty() {
            return Err(DepshiftError::Config(
                "installer.program must not be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.replacements {
            if !seen.insert(entry.package.as_str()) {
                return Err(DepshiftError::Config(format!(
                    "Duplicate replacement entry for '{}'",
                    entry.package
                )));
            }
        }

        Ok(())
    }
}
