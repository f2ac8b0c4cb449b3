use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Machine-readable hint derived from installer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallError {
    PeerDependencyConflict { package: Option<String> },
    NetworkError,
    BuildFailure,
    Unknown,
}

impl fmt::Display for InstallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallError::PeerDependencyConflict { package: Some(name) } => {
                write!(f, "peer dependency conflict on {name}")
            }
            InstallError::PeerDependencyConflict { package: None } => {
                f.write_str("peer dependency conflict")
            }
            InstallError::NetworkError => f.write_str("network error"),
            InstallError::BuildFailure => f.write_str("build failure"),
            InstallError::Unknown => f.write_str("unknown install failure"),
        }
    }
}

static PEER_CONFLICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ERESOLVE|peer dep(endency)?|could not resolve dependency|conflicting peer")
        .expect("valid peer conflict pattern")
});

// npm prints the offending package on lines such as
// "Could not resolve dependency:\nnpm ERR! peer react@"^16.8.0" from react-dom@16.14.0"
// or "Conflicting peer dependency: react@18.2.0".
static PEER_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:conflicting peer dependency:|peer)\s+(@?[a-z0-9][\w.\-]*(?:/[\w.\-]+)?)@"#)
        .expect("valid peer package pattern")
});

static NETWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)ETIMEDOUT|ENOTFOUND|ECONNREFUSED|ECONNRESET|EAI_AGAIN|socket hang up|network (error|request)",
    )
    .expect("valid network pattern")
});

static BUILD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)gyp ERR!|ELIFECYCLE|build failed|compilation (error|failed)|postinstall")
        .expect("valid build pattern")
});

/// Classify captured installer output. Never fails; falls back to `Unknown`.
pub fn classify(output: &str) -> InstallError {
    if PEER_CONFLICT.is_match(output) {
        let package = PEER_PACKAGE
            .captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        return InstallError::PeerDependencyConflict { package };
    }

    if NETWORK.is_match(output) {
        return InstallError::NetworkError;
    }

    if BUILD.is_match(output) {
        return InstallError::BuildFailure;
    }

    InstallError::Unknown
}
