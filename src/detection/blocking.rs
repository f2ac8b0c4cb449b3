use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a dependency blocks modernization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockingReason {
    Deprecated,
    NativeBuild,
    IncompatibleRuntime,
    Other(String),
}

impl From<String> for BlockingReason {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "deprecated" => BlockingReason::Deprecated,
            "native-build" => BlockingReason::NativeBuild,
            "incompatible-runtime" => BlockingReason::IncompatibleRuntime,
            _ => BlockingReason::Other(value),
        }
    }
}

impl From<BlockingReason> for String {
    fn from(reason: BlockingReason) -> Self {
        reason.to_string()
    }
}

impl fmt::Display for BlockingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingReason::Deprecated => f.write_str("deprecated"),
            BlockingReason::NativeBuild => f.write_str("native-build"),
            BlockingReason::IncompatibleRuntime => f.write_str("incompatible-runtime"),
            BlockingReason::Other(text) => f.write_str(text),
        }
    }
}

/// Configured rule: `name` blocks the update for `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingRule {
    pub name: String,
    pub reason: BlockingReason,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// A dependency flagged as architecturally incompatible with the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockingDependency {
    pub name: String,
    pub version: String,
    pub reason: BlockingReason,
    pub replacement: Option<String>,
}

pub trait BlockingDependencyDetector {
    /// `dependencies` maps package name to its current version specifier.
    fn detect(&self, dependencies: &BTreeMap<String, String>) -> Vec<BlockingDependency>;
}

/// Detector backed by the `[[blocking]]` rules of `depshift.toml`.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedDetector {
    rules: Vec<BlockingRule>,
}

impl RuleBasedDetector {
    pub fn new(rules: Vec<BlockingRule>) -> Self {
        Self { rules }
    }
}

impl BlockingDependencyDetector for RuleBasedDetector {
    fn detect(&self, dependencies: &BTreeMap<String, String>) -> Vec<BlockingDependency> {
        dependencies
            .iter()
            .filter_map(|(name, version)| {
                self.rules
                    .iter()
                    .find(|rule| rule.name == *name)
                    .map(|rule| BlockingDependency {
                        name: name.clone(),
                        version: version.clone(),
                        reason: rule.reason.clone(),
                        replacement: rule.replacement.clone(),
                    })
            })
            .collect()
    }
}
