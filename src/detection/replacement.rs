use crate::agents::manifest::Manifest;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Version specifier used when a replacement names no explicit version.
pub const DEFAULT_REPLACEMENT_VERSION: &str = "latest";

/// What to do with a package that has been superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReplacementAction {
    /// Swap the dependency for `package` at `version`.
    Swap { package: String, version: String },
    /// No successor exists; a human has to remove or rewrite the usage.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementRecord {
    pub package: String,
    pub action: ReplacementAction,
    pub requires_manual_review: bool,
    pub notes: Option<String>,
}

impl ReplacementRecord {
    pub fn swap(package: impl Into<String>, to: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            action: ReplacementAction::Swap {
                package: to.into(),
                version: version.into(),
            },
            requires_manual_review: false,
            notes: None,
        }
    }

    pub fn removal(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            action: ReplacementAction::Remove,
            requires_manual_review: true,
            notes: None,
        }
    }
}

pub trait ReplacementRegistry {
    fn lookup(&self, name: &str) -> Option<ReplacementRecord>;
}

/// Registry backed by the `[[replacements]]` table of `depshift.toml`.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    records: HashMap<String, ReplacementRecord>,
}

impl TableRegistry {
    pub fn new(records: Vec<ReplacementRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.package.clone(), record))
                .collect(),
        }
    }
}

impl ReplacementRegistry for TableRegistry {
    fn lookup(&self, name: &str) -> Option<ReplacementRecord> {
        self.records.get(name).cloned()
    }
}

/// What happened to one replacement when it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementOutcome {
    pub package_name: String,
    pub replaced_by: Option<String>,
    pub old_version: String,
    pub new_version: Option<String>,
    pub requires_manual_review: bool,
}

pub trait ReplacementExecutor {
    fn execute_replacements(&self, records: &[ReplacementRecord]) -> Result<Vec<ReplacementOutcome>>;
}

/// Applies swaps directly to `package.json`, keeping each entry's position.
pub struct ManifestReplacementExecutor {
    manifest_path: PathBuf,
}

impl ManifestReplacementExecutor {
    pub fn new<P: AsRef<Path>>(manifest_path: P) -> Self {
        Self {
            manifest_path: manifest_path.as_ref().to_path_buf(),
        }
    }
}

impl ReplacementExecutor for ManifestReplacementExecutor {
    fn execute_replacements(&self, records: &[ReplacementRecord]) -> Result<Vec<ReplacementOutcome>> {
        let mut manifest = Manifest::load(&self.manifest_path)?;
        let mut outcomes = Vec::new();
        let mut changed = false;

        for record in records {
            let Some(current) = manifest.version_of(&record.package).map(str::to_string) else {
                debug!(package = %record.package, "replacement target not declared, skipping");
                continue;
            };

            match &record.action {
                ReplacementAction::Swap { package, version } => {
                    if let Some(old_version) =
                        manifest.rename_dependency(&record.package, package, version)
                    {
                        info!(from = %record.package, to = %package, "package replaced");
                        changed = true;
                        outcomes.push(ReplacementOutcome {
                            package_name: record.package.clone(),
                            replaced_by: Some(package.clone()),
                            old_version,
                            new_version: Some(version.clone()),
                            requires_manual_review: record.requires_manual_review,
                        });
                    }
                }
                ReplacementAction::Remove => outcomes.push(ReplacementOutcome {
                    package_name: record.package.clone(),
                    replaced_by: None,
                    old_version: current,
                    new_version: None,
                    requires_manual_review: true,
                }),
            }
        }

        if changed {
            manifest.save(&self.manifest_path)?;
        }
        Ok(outcomes)
    }
}
