use crate::agents::error_classifier::{InstallError, classify};
use crate::agents::install_execution::{InstallFlag, InstallOutput, InstallStrategy, Installer};
use crate::agents::manifest::{MANIFEST_FILE, ManifestSnapshot};
use crate::agents::restore::ManifestRestorer;
use crate::error::Result;
use crate::plan::{PlanItem, UpdateBatch};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one isolated package attempt during individual fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutcome {
    pub name: String,
    pub success: bool,
    pub error: Option<InstallError>,
}

/// Result of a single top-level `execute` or `execute_with_fallback` call.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// The batch whose outcome is reported. After a partial individual
    /// fallback this is the consolidated batch of packages that succeeded.
    pub batch: UpdateBatch,
    pub success: bool,
    pub log: String,
    pub error: Option<InstallError>,
    pub install_flags_used: Option<Vec<String>>,
    pub package_results: Vec<PackageOutcome>,
}

impl ExecutionResult {
    fn succeeded(batch: UpdateBatch, log: String, flags: Option<Vec<String>>) -> Self {
        Self {
            batch,
            success: true,
            log,
            error: None,
            install_flags_used: flags,
            package_results: Vec::new(),
        }
    }

    fn failed(batch: UpdateBatch, log: String, error: Option<InstallError>) -> Self {
        Self {
            batch,
            success: false,
            log,
            error,
            install_flags_used: None,
            package_results: Vec::new(),
        }
    }

    fn with_package_results(mut self, results: Vec<PackageOutcome>) -> Self {
        self.package_results = results;
        self
    }
}

/// Applies batches to `package.json` and drives the installer.
///
/// Every attempt starts from a snapshot of the manifest and any attempt that
/// does not succeed is rolled back through the configured restorer before the
/// next one begins. Work is strictly sequential.
pub struct BatchExecutor<'a> {
    installer: &'a dyn Installer,
    restorer: &'a dyn ManifestRestorer,
    strategies: Vec<InstallStrategy>,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(installer: &'a dyn Installer, restorer: &'a dyn ManifestRestorer) -> Self {
        Self {
            installer,
            restorer,
            strategies: InstallStrategy::escalation(),
        }
    }

    #[cfg(test)]
    pub fn with_strategies(mut self, strategies: Vec<InstallStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Single plain install attempt with no escalation.
    pub fn execute(&self, batch: &UpdateBatch, project_dir: &Path) -> ExecutionResult {
        let mut log = String::new();
        let snapshot = match ManifestSnapshot::capture(project_dir.join(MANIFEST_FILE)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log.push_str(&format!("ERROR: {e}\n"));
                return ExecutionResult::failed(batch.clone(), log, Some(InstallError::Unknown));
            }
        };

        log.push_str(&format!("[{}] install\n", batch.id));
        match self.attempt(&batch.items, &snapshot, project_dir, None, &mut log) {
            Ok(output) if output.success() => {
                info!(batch = %batch.id, "batch installed");
                self.checkpoint(&mut log);
                ExecutionResult::succeeded(batch.clone(), log, None)
            }
            Ok(output) => {
                let error = classify(&output.combined());
                self.restore(&snapshot, &mut log);
                ExecutionResult::failed(batch.clone(), log, Some(error))
            }
            Err(e) => {
                log.push_str(&format!("ERROR: {e}\n"));
                self.restore(&snapshot, &mut log);
                ExecutionResult::failed(batch.clone(), log, Some(classify(&e.to_string())))
            }
        }
    }

    /// Try each install strategy in order, then fall back to installing
    /// packages one at a time.
    pub fn execute_with_fallback(&self, batch: &UpdateBatch, project_dir: &Path) -> ExecutionResult {
        let mut log = String::new();
        let snapshot = match ManifestSnapshot::capture(project_dir.join(MANIFEST_FILE)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log.push_str(&format!("ERROR: {e}\n"));
                return ExecutionResult::failed(batch.clone(), log, Some(InstallError::Unknown));
            }
        };

        for strategy in &self.strategies {
            log.push_str(&format!("[{}] install (strategy: {})\n", batch.id, strategy.name));

            match self.attempt(&batch.items, &snapshot, project_dir, strategy.flag, &mut log) {
                Ok(output) if output.success() => {
                    info!(batch = %batch.id, strategy = strategy.name, "batch installed");
                    self.checkpoint(&mut log);
                    return ExecutionResult::succeeded(
                        batch.clone(),
                        log,
                        Some(strategy.flags_used()),
                    );
                }
                Ok(output) => {
                    debug!(
                        batch = %batch.id,
                        strategy = strategy.name,
                        error = %classify(&output.combined()),
                        "install strategy failed"
                    );
                }
                Err(e) => {
                    log.push_str(&format!("ERROR: {e}\n"));
                    debug!(batch = %batch.id, strategy = strategy.name, error = %e, "attempt aborted");
                }
            }

            self.restore(&snapshot, &mut log);
        }

        warn!(batch = %batch.id, "all install strategies failed, isolating packages");
        self.individual_fallback(batch, project_dir, log)
    }

    fn individual_fallback(
        &self,
        batch: &UpdateBatch,
        project_dir: &Path,
        mut log: String,
    ) -> ExecutionResult {
        let manifest_path = project_dir.join(MANIFEST_FILE);
        let mut package_results = Vec::with_capacity(batch.len());
        let mut succeeded = Vec::new();

        log.push_str(&format!("[{}] individual fallback\n", batch.id));

        for item in &batch.items {
            let fresh = match ManifestSnapshot::capture(&manifest_path) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    log.push_str(&format!("FAILURE: {} ({e})\n", item.name));
                    package_results.push(PackageOutcome {
                        name: item.name.clone(),
                        success: false,
                        error: Some(InstallError::Unknown),
                    });
                    continue;
                }
            };

            // Installer output for isolated attempts only goes to the debug log.
            let mut attempt_log = String::new();
            let outcome = match self.attempt(
                std::slice::from_ref(item),
                &fresh,
                project_dir,
                None,
                &mut attempt_log,
            ) {
                Ok(output) if output.success() => PackageOutcome {
                    name: item.name.clone(),
                    success: true,
                    error: None,
                },
                Ok(output) => PackageOutcome {
                    name: item.name.clone(),
                    success: false,
                    error: Some(classify(&output.combined())),
                },
                Err(e) => PackageOutcome {
                    name: item.name.clone(),
                    success: false,
                    error: Some(classify(&e.to_string())),
                },
            };
            debug!(package = %item.name, output = %attempt_log, "isolated install finished");

            match &outcome.error {
                None => {
                    log.push_str(&format!("SUCCESS: {}\n", item.name));
                    succeeded.push(item.name.clone());
                }
                Some(error) => log.push_str(&format!("FAILURE: {} ({error})\n", item.name)),
            }
            package_results.push(outcome);

            self.restore(&fresh, &mut log);
        }

        let final_batch = batch.retain_packages(&succeeded);
        if final_batch.is_empty() {
            return ExecutionResult::failed(batch.clone(), log, None)
                .with_package_results(package_results);
        }

        log.push_str(&format!(
            "[{}] consolidated install of {} package(s)\n",
            final_batch.id,
            final_batch.len()
        ));

        let fresh = match ManifestSnapshot::capture(&manifest_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log.push_str(&format!("ERROR: {e}\n"));
                return ExecutionResult::failed(final_batch, log, Some(InstallError::Unknown))
                    .with_package_results(package_results);
            }
        };

        let result = match self.attempt(&final_batch.items, &fresh, project_dir, None, &mut log) {
            Ok(output) if output.success() => {
                info!(
                    batch = %batch.id,
                    installed = final_batch.len(),
                    skipped = batch.len() - final_batch.len(),
                    "partial batch installed"
                );
                self.checkpoint(&mut log);
                ExecutionResult::succeeded(final_batch, log, Some(Vec::new()))
            }
            Ok(output) => {
                let error = classify(&output.combined());
                self.restore(&fresh, &mut log);
                ExecutionResult::failed(final_batch, log, Some(error))
            }
            Err(e) => {
                log.push_str(&format!("ERROR: {e}\n"));
                self.restore(&fresh, &mut log);
                ExecutionResult::failed(final_batch, log, Some(classify(&e.to_string())))
            }
        };

        result.with_package_results(package_results)
    }

    /// Derive the mutation from `base`, write it in one go and run the installer.
    fn attempt(
        &self,
        items: &[PlanItem],
        base: &ManifestSnapshot,
        project_dir: &Path,
        flag: Option<InstallFlag>,
        log: &mut String,
    ) -> Result<InstallOutput> {
        let mut manifest = base.parse()?;
        let applied = manifest.apply_updates(items);
        debug!(applied = ?applied, skipped = items.len() - applied.len(), "manifest mutation prepared");
        manifest.save(base.path())?;

        let output = self.installer.install(project_dir, flag)?;
        let combined = output.combined();
        log.push_str(&combined);
        if !combined.is_empty() && !combined.ends_with('\n') {
            log.push('\n');
        }
        Ok(output)
    }

    /// Mark the manifest on disk as accepted, e.g. after replacements were
    /// applied outside the executor. Failures are logged, not raised.
    pub fn accept_manifest(&self) {
        let mut log = String::new();
        self.checkpoint(&mut log);
    }

    fn checkpoint(&self, log: &mut String) {
        if let Err(e) = self.restorer.checkpoint() {
            warn!(error = %e, "manifest checkpoint failed");
            log.push_str(&format!("WARNING: manifest checkpoint failed: {e}\n"));
        }
    }

    fn restore(&self, snapshot: &ManifestSnapshot, log: &mut String) {
        if let Err(e) = self.restorer.restore(snapshot) {
            warn!(error = %e, path = %snapshot.path().display(), "manifest restore failed");
            log.push_str(&format!("WARNING: manifest restore failed: {e}\n"));
        }
    }
}
