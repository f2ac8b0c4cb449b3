use crate::agents::{
    AnalysisResult, BatchExecutor, BatchGate, BatchInteraction, Collaborators, CommandInstaller,
    GitRestorer, Manifest, ManifestRestorer, PipelineResult, ProjectScannerAgent,
    SnapshotRestorer, UpdateOrchestrator, VersionControlAgent,
};
use crate::config::{ConfigEditor, ReplacementEntry, RestoreStrategy, Settings};
use crate::detection::{
    Finding, HttpUrlValidator, ManifestReplacementExecutor, ReplacementAction, RuleBasedDetector,
    TableRegistry, UrlCache,
};
use crate::error::{DepshiftError, Result};
use crate::plan::{BatchPlanner, PlanItem, UpdateBatch};
use crate::registry::{NpmRegistry, PlanScanner};
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Concrete collaborators built from `depshift.toml`.
struct Services {
    detector: RuleBasedDetector,
    url_validator: HttpUrlValidator,
    registry: TableRegistry,
    replacer: ManifestReplacementExecutor,
    installer: CommandInstaller,
}

impl Services {
    fn from_settings(settings: &Settings, manifest_path: &Path) -> Result<Self> {
        let cache = UrlCache::new(
            settings.url_check.cache_ttl(),
            settings.url_check.cache_capacity,
        );
        Ok(Self {
            detector: RuleBasedDetector::new(settings.blocking.clone()),
            url_validator: HttpUrlValidator::new(settings.url_check.timeout(), cache)?,
            registry: TableRegistry::new(settings.replacement_records()),
            replacer: ManifestReplacementExecutor::new(manifest_path),
            installer: CommandInstaller::new(
                settings.installer.program.clone(),
                settings.installer.args.clone(),
            ),
        })
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            detector: &self.detector,
            url_validator: &self.url_validator,
            registry: &self.registry,
            replacer: &self.replacer,
        }
    }
}

fn load_plan(plan_path: &Path) -> Result<Vec<PlanItem>> {
    let content = fs::read_to_string(plan_path).map_err(|e| {
        DepshiftError::ProjectValidation(format!(
            "Failed to read plan file {}: {}",
            plan_path.display(),
            e
        ))
    })?;
    let items: Vec<PlanItem> = serde_json::from_str(&content)?;
    Ok(items)
}

/// Execute the plan workflow - show batches for a plan file
pub fn execute_plan<P: AsRef<Path>>(
    project_path: P,
    config: Option<&Path>,
    plan_path: &Path,
) -> Result<()> {
    let project_path = project_path.as_ref();
    println!("{}", "Planning update batches...".cyan().bold());

    println!("\n{}", "1. Loading configuration...".yellow());
    let settings = Settings::load(project_path, config)?;
    let planner = BatchPlanner::new(settings.planner.max_batch_size);
    println!(
        "{}",
        format!("✓ Max batch size: {}", planner.max_batch_size()).green()
    );

    println!("\n{}", "2. Reading plan...".yellow());
    let items = load_plan(plan_path)?;
    println!("{}", format!("✓ {} plan item(s)", items.len()).green());

    let batches = planner.plan(&items);
    print_batches(&batches);

    Ok(())
}

/// Execute the check workflow (dry-run analysis)
pub fn execute_check<P: AsRef<Path>>(
    project_path: P,
    config: Option<&Path>,
    plan_path: &Path,
) -> Result<()> {
    let project_path = project_path.as_ref();
    println!("{}", "Analyzing update plan...".cyan().bold());

    println!("\n{}", "1. Validating project structure...".yellow());
    let project_info = ProjectScannerAgent::new(project_path).validate()?;
    println!("{}", "✓ Project structure is valid".green());

    println!("\n{}", "2. Loading configuration and plan...".yellow());
    let settings = Settings::load(&project_info.project_path, config)?;
    let items = load_plan(plan_path)?;
    println!("{}", format!("✓ {} plan item(s)", items.len()).green());

    println!("\n{}", "3. Running detection passes...".yellow());
    let services = Services::from_settings(&settings, &project_info.manifest_path)?;
    let executor = BatchExecutor::new(&services.installer, &SnapshotRestorer);
    let orchestrator = UpdateOrchestrator::new(
        services.collaborators(),
        BatchPlanner::new(settings.planner.max_batch_size),
        executor,
    );
    let analysis = orchestrator.analyze(&project_info.project_path, items)?;
    println!("{}", "✓ Analysis completed".green());

    print_findings(&analysis);
    print_batches(&analysis.update_batches);

    if !analysis.update_batches.is_empty() {
        println!("\n{}", "To apply this plan, run:".dimmed());
        println!("  {}", format!("depshift apply --plan {}", plan_path.display()).cyan());
    }

    Ok(())
}

/// Execute the apply workflow
pub fn execute_apply<P: AsRef<Path>>(
    project_path: P,
    config: Option<&Path>,
    plan_path: &Path,
    interactive: bool,
    commit: bool,
    no_escalation: bool,
    json: bool,
) -> Result<()> {
    let project_path = project_path.as_ref();
    let report = !json;
    if report {
        println!("{}", "Starting dependency update process...".cyan().bold());
        println!("\n{}", "1. Validating project structure...".yellow());
    }
    let project_info = ProjectScannerAgent::new(project_path).validate()?;
    let root = project_info.project_path.as_path();
    let settings = Settings::load(root, config)?;
    if report {
        println!("{}", "✓ Project structure is valid".green());
        if let Some(lockfile) = &project_info.lockfile {
            println!("   Lockfile: {}", lockfile.display().to_string().dimmed());
        }
    }

    // Step 2: pick the restore strategy; git needs a committed, clean manifest
    let restorer: Box<dyn ManifestRestorer> = match settings.restore.strategy {
        RestoreStrategy::Snapshot => Box::new(SnapshotRestorer),
        RestoreStrategy::Git => {
            if report {
                println!("\n{}", "2. Checking Git status...".yellow());
            }
            if !project_info.has_git {
                return Err(DepshiftError::Config(
                    "restore.strategy = \"git\" requires a Git repository".into(),
                ));
            }
            let git_agent = VersionControlAgent::new(root)?;
            if !git_agent.is_manifest_clean()? {
                return Err(DepshiftError::GitOperation(
                    "package.json has uncommitted changes; commit or stash them first".into(),
                ));
            }
            if report {
                println!("{}", "✓ package.json is clean".green());
            }
            Box::new(GitRestorer::new(git_agent))
        }
    };

    if report {
        println!("\n{}", "3. Analyzing plan...".yellow());
    }
    let items = load_plan(plan_path)?;
    let services = Services::from_settings(&settings, &project_info.manifest_path)?;
    let executor = BatchExecutor::new(&services.installer, restorer.as_ref());
    let orchestrator = UpdateOrchestrator::new(
        services.collaborators(),
        BatchPlanner::new(settings.planner.max_batch_size),
        executor,
    )
    .with_escalation(!no_escalation);
    let analysis = orchestrator.analyze(root, items)?;
    if report {
        print_findings(&analysis);
        print_batches(&analysis.update_batches);
        println!("\n{}", "4. Applying batches...".yellow());
    }

    let result = if interactive {
        let mut interaction = BatchInteraction::new(true);
        orchestrator.execute_gated(root, &analysis, |batch| {
            match interaction.confirm_batch(batch) {
                Ok(true) => BatchGate::Run,
                Ok(false) => BatchGate::Skip,
                Err(DepshiftError::UserCancelled) => BatchGate::Stop,
                Err(e) => {
                    warn!(error = %e, "batch confirmation failed");
                    BatchGate::Stop
                }
            }
        })
    } else {
        let pb = ProgressBar::new_spinner();
        if json {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "installing {} batch(es)",
            analysis.update_batches.len()
        ));
        pb.enable_steady_tick(Duration::from_millis(120));
        let result = orchestrator.execute(root, &analysis);
        pb.finish_and_clear();
        result
    };

    if json {
        let payload = serde_json::json!({
            "analysis": &analysis,
            "result": &result,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_pipeline_result(&result);
    }

    // Step 5: Git commit (if requested)
    if commit && !result.updated_packages.is_empty() {
        if project_info.has_git {
            if report {
                println!("\n{}", "5. Creating Git commit...".yellow());
            }
            let git_agent = VersionControlAgent::new(root)?;
            let branch_name = git_agent.commit_to_new_branch(result.updated_packages.len())?;
            if report {
                println!(
                    "{}",
                    format!("✓ Changes committed to branch: {}", branch_name).green()
                );
            }
        } else {
            warn!("--commit given but no Git repository was found");
        }
    }

    if result.cancelled {
        if report {
            println!("\n{}", "Update cancelled by user.".yellow());
        }
        return Ok(());
    }

    if !result.success {
        return Err(DepshiftError::Install(format!(
            "{} package(s) could not be updated",
            result.failed_packages.len()
        )));
    }

    if report {
        println!(
            "\n{}",
            "✨ Update process completed successfully!".green().bold()
        );
    }
    Ok(())
}

/// Execute the scan workflow - build a plan from the npm registry
pub fn execute_scan<P: AsRef<Path>>(
    project_path: P,
    config: Option<&Path>,
    output: Option<&Path>,
    stable_only: bool,
) -> Result<()> {
    let project_path = project_path.as_ref();
    let report = output.is_some();
    if report {
        println!("{}", "Scanning npm registry for updates...".cyan().bold());
        println!("\n{}", "1. Validating project structure...".yellow());
    }
    let project_info = ProjectScannerAgent::new(project_path).validate()?;
    let settings = Settings::load(&project_info.project_path, config)?;
    let manifest = Manifest::load(&project_info.manifest_path)?;
    if report {
        println!(
            "{}",
            format!(
                "✓ Found {} dependencies",
                project_info.dependency_count
            )
            .green()
        );
        println!(
            "\n{}",
            format!("2. Querying {}...", settings.scan.registry).yellow()
        );
    }

    let client = NpmRegistry::with_base_url(&settings.scan.registry)?;
    let registry = TableRegistry::new(settings.replacement_records());
    let scan = PlanScanner::new(&client, &registry)
        .with_progress(report)
        .scan(&manifest.dependencies(), stable_only);

    let plan = serde_json::to_string_pretty(&scan.items)?;
    match output {
        Some(path) => {
            fs::write(path, format!("{plan}\n"))?;
            println!(
                "{}",
                format!("✓ {} update(s) written to {}", scan.items.len(), path.display()).green()
            );
            if !scan.skipped.is_empty() {
                println!("\n{}:", "Skipped".yellow().bold());
                for (name, reason) in &scan.skipped {
                    println!("  • {} {}", name.white().bold(), reason.dimmed());
                }
            }
        }
        None => {
            for (name, reason) in &scan.skipped {
                warn!(package = %name, %reason, "dependency skipped");
            }
            println!("{plan}");
        }
    }

    Ok(())
}

/// Register a replacement in depshift.toml
pub fn execute_replace_add<P: AsRef<Path>>(
    project_path: P,
    config: Option<&Path>,
    entry: ReplacementEntry,
) -> Result<()> {
    let project_path = PathValidator::validate_project_path(project_path)?;
    println!("{}", "Adding replacement entry...".cyan().bold());

    let config_path = match config {
        Some(path) => path.to_path_buf(),
        None => Settings::default_path(&project_path),
    };

    ConfigEditor::new(&config_path).add_replacement(&entry)?;
    // Re-read to make sure the edited file still loads.
    Settings::load(&project_path, Some(&config_path))?;

    let target = match &entry.replacement {
        Some(successor) => format!(
            "{} → {}@{}",
            entry.package,
            successor,
            entry.version.as_deref().unwrap_or("latest")
        ),
        None => format!("{} (remove)", entry.package),
    };
    println!(
        "{}",
        format!("✓ Replacement {} added to {}", target, config_path.display()).green()
    );
    Ok(())
}

fn print_batches(batches: &[UpdateBatch]) {
    if batches.is_empty() {
        println!("\n{}", "✨ Nothing to update!".green().bold());
        return;
    }

    println!("\n{}", "📦 Update batches:".cyan().bold());
    for batch in batches {
        println!(
            "\n{} {} {}",
            format!("[{}]", batch.id).cyan().bold(),
            format!("tier {}", batch.tier).dimmed(),
            format!("risk {}", batch.risk).dimmed()
        );
        for item in &batch.items {
            let reason = if item.fixes_vulnerabilities {
                format!(" (fixes {} vulnerabilities)", item.vulnerability_count)
            } else if item.reason.is_empty() {
                String::new()
            } else {
                format!(" ({})", item.reason)
            };
            println!(
                "  • {} {} → {}{}",
                item.name.white().bold(),
                item.current_version.red(),
                item.target_version.green().bold(),
                reason.dimmed()
            );
        }
    }
}

fn print_findings(analysis: &AnalysisResult) {
    let findings = analysis.findings();
    if findings.is_empty() {
        println!("{}", "✓ No findings".green());
        return;
    }

    println!("\n{}", "Findings:".yellow().bold());
    for finding in &findings {
        match finding {
            Finding::Blocking(blocking) => {
                let hint = blocking
                    .replacement
                    .as_ref()
                    .map(|r| format!(", consider {r}"))
                    .unwrap_or_default();
                println!(
                    "  • {} {} {}{}",
                    "blocking".red(),
                    blocking.name.white().bold(),
                    blocking.reason,
                    hint
                );
            }
            Finding::DeadUrl(dead) => {
                let detail = dead
                    .check
                    .error
                    .clone()
                    .or_else(|| dead.check.status_code.map(|code| format!("HTTP {code}")))
                    .unwrap_or_default();
                println!(
                    "  • {} {} {}",
                    "dead url".red(),
                    dead.url.white().bold(),
                    detail.dimmed()
                );
            }
            Finding::Replacement(record) => {
                let action = match &record.action {
                    ReplacementAction::Swap { package, version } => {
                        format!("→ {package}@{version}")
                    }
                    ReplacementAction::Remove => "remove".to_string(),
                };
                let review = if record.requires_manual_review {
                    " (manual review)"
                } else {
                    ""
                };
                println!(
                    "  • {} {} {}{}",
                    "replacement".yellow(),
                    record.package.white().bold(),
                    action,
                    review.dimmed()
                );
            }
        }
    }
}

fn print_pipeline_result(result: &PipelineResult) {
    println!("\n{}", "📊 Update summary:".cyan().bold());

    if let Some(error) = &result.replacement_error {
        println!("{}", format!("⚠ Replacements not applied: {error}").red());
    }
    for outcome in &result.replacements {
        let successor = outcome.replaced_by.as_deref().unwrap_or("(removal)");
        println!(
            "  • {} {} → {} {}",
            "replaced".yellow(),
            outcome.package_name.white().bold(),
            successor.green(),
            outcome.new_version.as_deref().unwrap_or("").dimmed()
        );
    }
    if !result.manual_review.is_empty() {
        println!("\n{}:", "Needs manual review".yellow().bold());
        for outcome in &result.manual_review {
            println!("  • {}", outcome.package_name.white().bold());
        }
    }

    for batch in &result.batch_results {
        let status = if batch.success {
            "ok".green()
        } else {
            "failed".red()
        };
        let flags = match &batch.install_flags_used {
            Some(flags) if !flags.is_empty() => format!(" with {}", flags.join(" ")),
            _ => String::new(),
        };
        println!(
            "  {} {}{}",
            format!("[{}]", batch.batch.id).cyan(),
            status,
            flags.dimmed()
        );
    }

    if !result.updated_packages.is_empty() {
        println!(
            "\n{}",
            format!("✓ Updated {} package(s)", result.updated_packages.len()).green()
        );
        for name in &result.updated_packages {
            println!("  • {}", name.white().bold());
        }
    }

    if !result.failed_packages.is_empty() {
        println!(
            "\n{}",
            format!("✗ {} package(s) not updated", result.failed_packages.len()).red()
        );
        for failed in &result.failed_packages {
            println!(
                "  • {} {} {}",
                failed.item.name.white().bold(),
                failed.item.target_version.dimmed(),
                failed.error.red()
            );
        }
    }
}
