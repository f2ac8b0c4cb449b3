use crate::error::{DepshiftError, Result};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Permissiveness flags accepted by the installer, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallFlag {
    LegacyPeerDeps,
    Force,
}

impl InstallFlag {
    pub fn name(self) -> &'static str {
        match self {
            InstallFlag::LegacyPeerDeps => "legacy-peer-deps",
            InstallFlag::Force => "force",
        }
    }

    pub fn as_arg(self) -> String {
        format!("--{}", self.name())
    }
}

impl fmt::Display for InstallFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named step in the install escalation ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStrategy {
    pub name: &'static str,
    pub flag: Option<InstallFlag>,
}

impl InstallStrategy {
    pub const PLAIN: InstallStrategy = InstallStrategy {
        name: "none",
        flag: None,
    };

    pub const LEGACY_PEER_DEPS: InstallStrategy = InstallStrategy {
        name: "legacy-peer-deps",
        flag: Some(InstallFlag::LegacyPeerDeps),
    };

    pub const FORCE: InstallStrategy = InstallStrategy {
        name: "force",
        flag: Some(InstallFlag::Force),
    };

    /// `none`, then `legacy-peer-deps`, then `force`.
    pub fn escalation() -> Vec<InstallStrategy> {
        vec![Self::PLAIN, Self::LEGACY_PEER_DEPS, Self::FORCE]
    }

    /// Flag names recorded on a successful result.
    pub fn flags_used(&self) -> Vec<String> {
        self.flag.iter().map(|flag| flag.name().to_string()).collect()
    }
}

/// Captured result of one installer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InstallOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }
}

/// Seam over the external package-manager install command.
pub trait Installer {
    fn install(&self, project_dir: &Path, flag: Option<InstallFlag>) -> Result<InstallOutput>;
}

/// Runs the configured package manager, e.g. `npm install --force`.
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_args(&self, flag: Option<InstallFlag>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(flag) = flag {
            args.push(flag.as_arg());
        }
        args
    }
}

impl Installer for CommandInstaller {
    fn install(&self, project_dir: &Path, flag: Option<InstallFlag>) -> Result<InstallOutput> {
        let args = self.command_args(flag);
        debug!(program = %self.program, args = ?args, dir = %project_dir.display(), "running installer");

        let output = Command::new(&self.program)
            .current_dir(project_dir)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                DepshiftError::Install(format!(
                    "Failed to spawn '{} {}': {}",
                    self.program,
                    args.join(" "),
                    e
                ))
            })?;

        Ok(InstallOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn escalation_order_is_fixed() {
        let names: Vec<&str> = InstallStrategy::escalation()
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["none", "legacy-peer-deps", "force"]);
    }

    #[test]
    fn flags_are_rendered_as_long_options() {
        let installer = CommandInstaller::new("npm", vec!["install".to_string()]);
        assert_eq!(installer.command_args(None), vec!["install"]);
        assert_eq!(
            installer.command_args(Some(InstallFlag::LegacyPeerDeps)),
            vec!["install", "--legacy-peer-deps"]
        );
        assert_eq!(InstallStrategy::FORCE.flags_used(), vec!["force"]);
        assert!(InstallStrategy::PLAIN.flags_used().is_empty());
    }

    #[test]
    fn combined_output_concatenates_streams() {
        let output = InstallOutput {
            exit_code: Some(1),
            stdout: "added 3 packages".into(),
            stderr: "npm ERR! code ERESOLVE".into(),
        };
        assert!(!output.success());
        assert_eq!(output.combined(), "added 3 packages\nnpm ERR! code ERESOLVE");
    }

    #[cfg(unix)]
    #[test]
    fn command_installer_captures_exit_code_and_streams() {
        let dir = tempdir().unwrap();
        let installer = CommandInstaller::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
        );

        let output = installer.install(dir.path(), None).unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn missing_program_is_an_install_error() {
        let dir = tempdir().unwrap();
        let installer = CommandInstaller::new("definitely-not-a-real-installer", vec![]);
        let err = installer.install(dir.path(), None).unwrap_err();
        assert!(matches!(err, DepshiftError::Install(_)));
    }
}
