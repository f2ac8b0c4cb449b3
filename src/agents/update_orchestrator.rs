use crate::agents::batch_executor::{BatchExecutor, ExecutionResult};
use crate::agents::manifest::MANIFEST_FILE;
use crate::detection::{
    BlockingDependency, BlockingDependencyDetector, DeadUrl, Finding, ReplacementExecutor,
    ReplacementOutcome, ReplacementRecord, ReplacementRegistry, UrlValidator, url_reference,
};
use crate::error::{DepshiftError, Result};
use crate::plan::{BatchPlanner, PlanItem, UpdateBatch};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Detection passes and planned batches for one set of plan items.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub blocking_dependencies: Vec<BlockingDependency>,
    pub dead_urls: Vec<DeadUrl>,
    pub replacements: Vec<ReplacementRecord>,
    pub update_batches: Vec<UpdateBatch>,
    pub initial_plan_items: Vec<PlanItem>,
}

impl AnalysisResult {
    pub fn findings(&self) -> Vec<Finding> {
        let blocking = self
            .blocking_dependencies
            .iter()
            .cloned()
            .map(Finding::Blocking);
        let dead = self.dead_urls.iter().cloned().map(Finding::DeadUrl);
        let replacements = self.replacements.iter().cloned().map(Finding::Replacement);
        blocking.chain(dead).chain(replacements).collect()
    }
}

/// A plan item that was never installed, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct FailedPackage {
    pub item: PlanItem,
    pub error: String,
}

/// Aggregated outcome of applying a whole analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineResult {
    pub replacements: Vec<ReplacementOutcome>,
    pub manual_review: Vec<ReplacementOutcome>,
    pub replacement_error: Option<String>,
    pub batch_results: Vec<ExecutionResult>,
    pub updated_packages: Vec<String>,
    pub failed_packages: Vec<FailedPackage>,
    pub cancelled: bool,
    pub success: bool,
}

/// Per-batch decision taken before a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchGate {
    Run,
    Skip,
    Stop,
}

/// External detectors and the replacement executor used by the orchestrator.
pub struct Collaborators<'a> {
    pub detector: &'a dyn BlockingDependencyDetector,
    pub url_validator: &'a dyn UrlValidator,
    pub registry: &'a dyn ReplacementRegistry,
    pub replacer: &'a dyn ReplacementExecutor,
}

pub struct UpdateOrchestrator<'a> {
    collaborators: Collaborators<'a>,
    planner: BatchPlanner,
    executor: BatchExecutor<'a>,
    escalate: bool,
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(
        collaborators: Collaborators<'a>,
        planner: BatchPlanner,
        executor: BatchExecutor<'a>,
    ) -> Self {
        Self {
            collaborators,
            planner,
            executor,
            escalate: true,
        }
    }

    /// With escalation off each batch gets a single plain install attempt
    /// and no individual fallback.
    pub fn with_escalation(mut self, escalate: bool) -> Self {
        self.escalate = escalate;
        self
    }

    /// Run every detection pass and plan batches for the full item set.
    /// Findings are informational; no item is filtered out of batching.
    pub fn analyze(&self, project_dir: &Path, items: Vec<PlanItem>) -> Result<AnalysisResult> {
        let manifest_path = project_dir.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(DepshiftError::ProjectValidation(format!(
                "{} not found in {}",
                MANIFEST_FILE,
                project_dir.display()
            )));
        }

        let name_versions: BTreeMap<String, String> = items
            .iter()
            .map(|item| (item.name.clone(), item.current_version.clone()))
            .collect();
        let blocking_dependencies = self.collaborators.detector.detect(&name_versions);

        let mut dead_urls = Vec::new();
        for item in &items {
            let Some(url) = url_reference(&item.name) else {
                continue;
            };
            let check = self.collaborators.url_validator.validate(url.as_str());
            if !check.is_valid {
                debug!(package = %item.name, url = %url, "dead url reference");
                dead_urls.push(DeadUrl {
                    package: item.name.clone(),
                    url: url.to_string(),
                    check,
                });
            }
        }

        let mut replacements: Vec<ReplacementRecord> = Vec::new();
        for item in &items {
            if let Some(record) = self.collaborators.registry.lookup(&item.name) {
                if !replacements.iter().any(|r| r.package == record.package) {
                    replacements.push(record);
                }
            }
        }

        let update_batches = self.planner.plan(&items);

        info!(
            items = items.len(),
            batches = update_batches.len(),
            blocking = blocking_dependencies.len(),
            dead_urls = dead_urls.len(),
            replacements = replacements.len(),
            "analysis complete"
        );

        Ok(AnalysisResult {
            blocking_dependencies,
            dead_urls,
            replacements,
            update_batches,
            initial_plan_items: items,
        })
    }

    /// Apply replacements, then every batch in planned order.
    pub fn execute(&self, project_dir: &Path, analysis: &AnalysisResult) -> PipelineResult {
        self.execute_gated(project_dir, analysis, |_| BatchGate::Run)
    }

    /// Like [`execute`](Self::execute), asking `gate` before each batch.
    /// Skipped and cancelled batches count as failed packages.
    pub fn execute_gated(
        &self,
        project_dir: &Path,
        analysis: &AnalysisResult,
        mut gate: impl FnMut(&UpdateBatch) -> BatchGate,
    ) -> PipelineResult {
        let mut result = PipelineResult::default();

        if !analysis.replacements.is_empty() {
            match self
                .collaborators
                .replacer
                .execute_replacements(&analysis.replacements)
            {
                Ok(outcomes) => {
                    result.manual_review = outcomes
                        .iter()
                        .filter(|o| o.requires_manual_review)
                        .cloned()
                        .collect();
                    result.replacements = outcomes;
                    self.executor.accept_manifest();
                }
                Err(e) => {
                    warn!(error = %e, "applying replacements failed");
                    result.replacement_error = Some(e.to_string());
                }
            }
        }

        for batch in &analysis.update_batches {
            if result.cancelled {
                fail_all(&mut result, batch, "cancelled by user");
                continue;
            }

            match gate(batch) {
                BatchGate::Run => {}
                BatchGate::Skip => {
                    fail_all(&mut result, batch, "skipped by user");
                    continue;
                }
                BatchGate::Stop => {
                    result.cancelled = true;
                    fail_all(&mut result, batch, "cancelled by user");
                    continue;
                }
            }

            let outcome = if self.escalate {
                self.executor.execute_with_fallback(batch, project_dir)
            } else {
                self.executor.execute(batch, project_dir)
            };
            record_outcome(&mut result, batch, &outcome);
            result.batch_results.push(outcome);
        }

        result.success = result.failed_packages.is_empty();
        info!(
            updated = result.updated_packages.len(),
            failed = result.failed_packages.len(),
            "pipeline finished"
        );
        result
    }
}

fn fail_all(result: &mut PipelineResult, batch: &UpdateBatch, reason: &str) {
    result
        .failed_packages
        .extend(batch.items.iter().map(|item| FailedPackage {
            item: item.clone(),
            error: reason.to_string(),
        }));
}

fn record_outcome(result: &mut PipelineResult, batch: &UpdateBatch, outcome: &ExecutionResult) {
    if !outcome.success {
        let reason = outcome
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "all install strategies failed".to_string());
        fail_all(result, batch, &reason);
        return;
    }

    for name in outcome.batch.package_names() {
        if !result.updated_packages.iter().any(|n| n == name) {
            result.updated_packages.push(name.to_string());
        }
    }

    for item in &batch.items {
        if outcome.batch.package_names().any(|name| name == item.name) {
            continue;
        }
        let error = outcome
            .package_results
            .iter()
            .find(|p| p.name == item.name)
            .and_then(|p| p.error.as_ref())
            .map(ToString::to_string)
            .unwrap_or_else(|| "failed to install in isolation".to_string());
        result.failed_packages.push(FailedPackage {
            item: item.clone(),
            error,
        });
    }
}
