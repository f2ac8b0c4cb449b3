//! Informational passes run before batching: blocking dependencies, dead
//! URL references and known package replacements. None of them filter the
//! plan; their findings are reported alongside it.

pub mod blocking;
pub mod replacement;
pub mod url_validator;

pub use blocking::{
    BlockingDependency, BlockingDependencyDetector, BlockingRule, RuleBasedDetector,
};
pub use replacement::{
    ManifestReplacementExecutor, ReplacementAction, ReplacementExecutor, ReplacementOutcome,
    ReplacementRecord, ReplacementRegistry, TableRegistry,
};
pub use url_validator::{HttpUrlValidator, UrlCache, UrlCheck, UrlValidator, url_reference};

use serde::Serialize;

/// A URL-like dependency reference that did not answer successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadUrl {
    pub package: String,
    pub url: String,
    pub check: UrlCheck,
}

/// Everything the detection passes can report, one variant per detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Finding {
    Blocking(BlockingDependency),
    DeadUrl(DeadUrl),
    Replacement(ReplacementRecord),
}
