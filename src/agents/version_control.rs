use crate::agents::manifest::MANIFEST_FILE;
use crate::error::{DepshiftError, Result};
use crate::utils::path_validator::PathValidator;
use jiff::Zoned;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const SHELL_METACHARACTERS: [char; 7] = [';', '|', '&', '$', '`', '\n', '\r'];
const MAX_BRANCH_LEN: usize = 50;

/// VersionControlAgent handles Git operations with hardened input validation.
pub struct VersionControlAgent {
    project_path: PathBuf,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Result<Self> {
        let project_path = Self::validate_git_path(project_path.as_ref())?;
        Ok(Self { project_path })
    }

    /// True when `git status` reports no changes for the manifest.
    pub fn is_manifest_clean(&self) -> Result<bool> {
        let output = self.run_git(&["status", "--porcelain", "--", MANIFEST_FILE])?;
        Self::ensure_success(&output, "git status")?;
        Ok(output.stdout.is_empty())
    }

    /// Restore the manifest to its last committed state.
    ///
    /// When the manifest was never committed git reports an error, which is
    /// returned to the caller; the file is left untouched in that case.
    pub fn restore_manifest(&self) -> Result<()> {
        let output = self.run_git(&["checkout", "--", MANIFEST_FILE])?;
        Self::ensure_success(&output, "git checkout")
    }

    pub fn create_update_branch(&self) -> Result<String> {
        let branch_name = self.create_safe_branch_name();
        let output = self.run_git(&["checkout", "-b", &branch_name])?;
        Self::ensure_success(&output, "git checkout -b")?;
        Ok(branch_name)
    }

    pub fn stage_manifest(&self) -> Result<()> {
        let manifest_path = self.project_path.join(MANIFEST_FILE);
        PathValidator::validate_file_path(&manifest_path, &self.project_path).map_err(|err| {
            DepshiftError::GitOperation(format!("Refusing to stage unsafe path: {err}"))
        })?;

        let output = self.run_git(&["add", MANIFEST_FILE])?;
        Self::ensure_success(&output, "git add")
    }

    pub fn commit_updates(&self, updated: usize) -> Result<()> {
        let message = format!("chore(deps): modernize {updated} dependencies");
        let output = self.run_git(&["commit", "-m", &message])?;
        Self::ensure_success(&output, "git commit")
    }

    /// Create a branch, stage the manifest and commit it.
    pub fn commit_to_new_branch(&self, updated: usize) -> Result<String> {
        let branch_name = self.create_update_branch()?;
        self.stage_manifest()?;
        self.commit_updates(updated)?;
        Ok(branch_name)
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.project_path)
            .args(args)
            .output()
            .map_err(|e| {
                DepshiftError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(DepshiftError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let rendered = path.to_string_lossy();
        if let Some(ch) = rendered.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            return Err(DepshiftError::GitOperation(format!(
                "Refusing path with shell metacharacter {ch:?}: {rendered}"
            )));
        }
        if path.is_relative() {
            return Err(DepshiftError::GitOperation(format!(
                "Git operations need an absolute project path, got {rendered}"
            )));
        }

        PathValidator::validate_project_path(path)
            .map_err(|err| DepshiftError::GitOperation(format!("Invalid Git path: {err}")))
    }

    fn create_safe_branch_name(&self) -> String {
        let date = Zoned::now().strftime("%Y-%m-%d");
        format!("deps/modernize-{date}")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/') {
                    c
                } else {
                    '-'
                }
            })
            .take(MAX_BRANCH_LEN)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, tempdir_in};

    #[test]
    fn rejects_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let temp = tempdir_in(&cwd).unwrap();
        let relative = PathBuf::from(temp.path().file_name().unwrap());
        assert!(VersionControlAgent::new(&relative).is_err());
    }

    #[test]
    fn rejects_dangerous_paths() {
        let dir = tempdir().unwrap();
        let dangerous = dir.path().join("sub;dir");
        fs::create_dir_all(&dangerous).unwrap();
        assert!(VersionControlAgent::new(dangerous).is_err());
    }

    #[test]
    fn branch_name_is_dated_and_safe() {
        let dir = tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let agent = VersionControlAgent::new(&canonical).unwrap();
        let branch = agent.create_safe_branch_name();
        assert!(branch.starts_with("deps/modernize-"));
        assert!(branch.len() <= MAX_BRANCH_LEN);
        assert!(
            branch
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
        );
    }
}
