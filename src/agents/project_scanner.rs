use crate::agents::manifest::{MANIFEST_FILE, Manifest};
use crate::error::{DepshiftError, Result};
use crate::utils::path_validator::PathValidator;
use std::path::{Path, PathBuf};

const LOCKFILES: &[&str] = &["package-lock.json", "npm-shrinkwrap.json"];

/// ProjectScannerAgent validates the project structure
pub struct ProjectScannerAgent {
    project_path: PathBuf,
}

impl ProjectScannerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// Validates the project structure and that `package.json` parses.
    pub fn validate(&self) -> Result<ProjectInfo> {
        let project_path = PathValidator::validate_project_path(&self.project_path)?;

        let manifest_path = project_path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(DepshiftError::ProjectValidation(format!(
                "{} not found in {}",
                MANIFEST_FILE,
                project_path.display()
            )));
        }
        let manifest = Manifest::load(&manifest_path)?;

        let git_dir = project_path.join(".git");
        let has_git = git_dir.exists();

        let lockfile = LOCKFILES
            .iter()
            .map(|name| project_path.join(name))
            .find(|path| path.is_file());

        Ok(ProjectInfo {
            dependency_count: manifest.dependencies().len(),
            project_path,
            manifest_path,
            has_git,
            lockfile,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_path: PathBuf,
    pub manifest_path: PathBuf,
    pub has_git: bool,
    pub lockfile: Option<PathBuf>,
    pub dependency_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn validates_npm_project() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"dependencies":{"react":"^18.2.0"},"devDependencies":{"vite":"^5.0.0"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let info = ProjectScannerAgent::new(dir.path()).validate().unwrap();

        assert!(!info.has_git);
        assert_eq!(info.dependency_count, 2);
        assert!(info.lockfile.is_some());
        assert!(info.manifest_path.ends_with(MANIFEST_FILE));
    }

    #[test]
    fn missing_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        let err = ProjectScannerAgent::new(dir.path()).validate().unwrap_err();
        assert!(matches!(err, DepshiftError::ProjectValidation(_)));
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert!(ProjectScannerAgent::new(dir.path()).validate().is_err());
    }
}
