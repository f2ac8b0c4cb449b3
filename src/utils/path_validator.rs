use crate::error::{DepshiftError, Result};
use std::path::{Path, PathBuf};

/// Directories a project may never live under.
const FORBIDDEN_ROOTS: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Path checks applied before the tool writes to a project or hands a path to git.
pub struct PathValidator;

impl PathValidator {
    /// Canonicalise a project directory and reject system locations.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            DepshiftError::ProjectValidation(format!(
                "Cannot open project '{}': {e}",
                path.display()
            ))
        })?;

        if !canonical.is_dir() {
            return Err(DepshiftError::ProjectValidation(format!(
                "Project path '{}' is not a directory",
                canonical.display()
            )));
        }

        if let Some(root) = Self::forbidden_root(path, &canonical) {
            return Err(DepshiftError::ProjectValidation(format!(
                "Refusing to modify a project under system directory '{root}'"
            )));
        }

        Ok(canonical)
    }

    /// Ensure `file_path` resolves inside `base_dir`.
    pub fn validate_file_path(
        file_path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let canonical_file = file_path.canonicalize().map_err(|e| {
            DepshiftError::ProjectValidation(format!(
                "Cannot resolve '{}': {e}",
                file_path.display()
            ))
        })?;
        let canonical_base = Self::validate_project_path(base_dir)?;

        if !canonical_file.starts_with(&canonical_base) {
            return Err(DepshiftError::ProjectValidation(format!(
                "'{}' is outside the project directory",
                file_path.display()
            )));
        }

        Ok(canonical_file)
    }

    fn forbidden_root(raw: &Path, canonical: &Path) -> Option<&'static str> {
        FORBIDDEN_ROOTS.iter().copied().find(|root| {
            let root_path = Path::new(root);
            raw.starts_with(root_path)
                || canonical.starts_with(root_path)
                || root_path
                    .canonicalize()
                    .is_ok_and(|resolved| canonical.starts_with(resolved))
        })
    }
}
