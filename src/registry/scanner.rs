use crate::detection::ReplacementRegistry;
use crate::plan::PlanItem;
use crate::plan::model::URGENT_PRIORITY;
use crate::plan::version::{VersionComparator, is_major_update, major_version};
use crate::registry::npm::PackageRegistryClient;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const MAJOR_PRIORITY: i64 = 500;
const ROUTINE_PRIORITY: i64 = 100;

/// Dependencies the scanner could not turn into plan items.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub items: Vec<PlanItem>,
    pub skipped: Vec<(String, String)>,
}

/// Builds a plan by comparing declared dependencies against the registry.
pub struct PlanScanner<'a> {
    client: &'a dyn PackageRegistryClient,
    replacements: &'a dyn ReplacementRegistry,
    show_progress: bool,
}

impl<'a> PlanScanner<'a> {
    pub fn new(
        client: &'a dyn PackageRegistryClient,
        replacements: &'a dyn ReplacementRegistry,
    ) -> Self {
        Self {
            client,
            replacements,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn scan(&self, dependencies: &BTreeMap<String, String>, stable_only: bool) -> ScanReport {
        let mut report = ScanReport::default();

        let pb = ProgressBar::new(dependencies.len() as u64);
        if !self.show_progress {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        for (name, current) in dependencies {
            pb.set_message(name.clone());
            match self.plan_item(name, current, stable_only) {
                Ok(Some(item)) => report.items.push(item),
                Ok(None) => {}
                Err(reason) => {
                    debug!(package = %name, %reason, "dependency skipped");
                    report.skipped.push((name.clone(), reason));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        report
    }

    fn plan_item(
        &self,
        name: &str,
        current: &str,
        stable_only: bool,
    ) -> std::result::Result<Option<PlanItem>, String> {
        if major_version(current).is_none() {
            return Err(format!("unsupported version specifier '{current}'"));
        }

        let latest = match self.client.fetch_latest_version(name, stable_only) {
            Ok(Some(latest)) => latest,
            Ok(None) => return Err("not found in registry".to_string()),
            Err(e) => {
                warn!(package = %name, error = %e, "registry lookup failed");
                return Err(e.to_string());
            }
        };

        if !VersionComparator::is_newer(&latest, current) {
            return Ok(None);
        }

        let target = format!("{}{}", range_prefix(current), latest);
        let (priority, reason) = if self.replacements.lookup(name).is_some() {
            (URGENT_PRIORITY, "replacement registered".to_string())
        } else if is_major_update(current, &target) {
            (MAJOR_PRIORITY, format!("major release {latest} available"))
        } else {
            (ROUTINE_PRIORITY, format!("{latest} available"))
        };

        Ok(Some(
            PlanItem::new(name, current, target, priority).with_reason(reason),
        ))
    }
}

/// `^` or `~` prefix of a specifier, kept when writing the target.
fn range_prefix(spec: &str) -> &str {
    match spec.chars().next() {
        Some('^') => "^",
        Some('~') => "~",
        _ => "",
    }
}
