use std::cmp::Ordering;

const RANGE_QUALIFIERS: &[char] = &['^', '~', '>', '=', '<'];

/// Leading major version of an npm version specifier, e.g. `^1.2.3` -> 1.
///
/// Range qualifiers are stripped first. Returns `None` when the remainder does
/// not start with a digit.
pub fn major_version(spec: &str) -> Option<u64> {
    let stripped = spec.trim_start_matches(RANGE_QUALIFIERS);
    let digits: String = stripped.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// True when the target's major version is strictly greater than the current one.
/// Unparseable specifiers never count as a major update.
pub fn is_major_update(current: &str, target: &str) -> bool {
    match (major_version(current), major_version(target)) {
        (Some(from), Some(to)) => to > from,
        _ => false,
    }
}

/// A concrete registry version, used when comparing published releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub original: String,
    pub parsed: VersionType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionType {
    Semantic(semver::Version),
    Numeric(Vec<u64>),
    Unknown(String),
}

impl Version {
    pub fn parse(version: &str) -> Self {
        let cleaned = version.trim_start_matches(RANGE_QUALIFIERS).trim_start_matches('v');
        let parsed = if let Ok(v) = semver::Version::parse(cleaned) {
            VersionType::Semantic(v)
        } else if let Some(numeric) = Self::parse_numeric(cleaned) {
            VersionType::Numeric(numeric)
        } else {
            VersionType::Unknown(version.to_string())
        };

        Version {
            original: version.to_string(),
            parsed,
        }
    }

    fn parse_numeric(version: &str) -> Option<Vec<u64>> {
        let numbers: Option<Vec<u64>> = version.split('.').map(|part| part.parse().ok()).collect();
        numbers.filter(|n| !n.is_empty())
    }

    pub fn is_prerelease(&self) -> bool {
        match &self.parsed {
            VersionType::Semantic(v) => !v.pre.is_empty(),
            VersionType::Numeric(_) => false,
            VersionType::Unknown(_) => true,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (VersionType::Semantic(a), VersionType::Semantic(b)) => a.cmp(b),
            (VersionType::Numeric(a), VersionType::Numeric(b)) => a.cmp(b),
            (VersionType::Semantic(a), VersionType::Numeric(b)) => {
                vec![a.major, a.minor, a.patch].cmp(b)
            }
            (VersionType::Numeric(a), VersionType::Semantic(b)) => {
                a.cmp(&vec![b.major, b.minor, b.patch])
            }
            (VersionType::Unknown(_), VersionType::Unknown(_)) => self.original.cmp(&other.original),
            (VersionType::Unknown(_), _) => Ordering::Less,
            (_, VersionType::Unknown(_)) => Ordering::Greater,
        }
    }
}

pub struct VersionComparator;

impl VersionComparator {
    /// Newest version in `versions`, optionally ignoring pre-releases.
    pub fn get_latest(versions: &[String], stable_only: bool) -> Option<String> {
        versions
            .iter()
            .map(|v| Version::parse(v))
            .filter(|v| !stable_only || !v.is_prerelease())
            .max()
            .map(|v| v.original)
    }

    /// Check if version `a` is newer than version `b`
    pub fn is_newer(a: &str, b: &str) -> bool {
        Version::parse(a) > Version::parse(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_range_to_next_major_is_major_update() {
        assert!(is_major_update("^1.2.3", "2.0.0"));
    }

    #[test]
    fn tilde_range_within_major_is_not_major_update() {
        assert!(!is_major_update("~1.2.3", "1.9.9"));
    }

    #[test]
    fn unparseable_versions_are_never_major() {
        assert!(!is_major_update("latest", "2.0.0"));
        assert!(!is_major_update("1.0.0", "next"));
        assert!(!is_major_update("*", "*"));
        assert!(!is_major_update("", "3.0.0"));
    }

    #[test]
    fn major_version_strips_all_qualifiers() {
        assert_eq!(major_version(">=12.0.0"), Some(12));
        assert_eq!(major_version("<=3"), Some(3));
        assert_eq!(major_version("=0.4.1"), Some(0));
        assert_eq!(major_version("v1.0.0"), None);
    }

    #[test]
    fn downgrade_is_not_major_update() {
        assert!(!is_major_update("3.0.0", "2.9.0"));
    }

    #[test]
    fn get_latest_respects_stable_only() {
        let versions = vec![
            "1.0.0".to_string(),
            "2.0.0-beta.1".to_string(),
            "1.4.2".to_string(),
        ];

        assert_eq!(
            VersionComparator::get_latest(&versions, false),
            Some("2.0.0-beta.1".to_string())
        );
        assert_eq!(
            VersionComparator::get_latest(&versions, true),
            Some("1.4.2".to_string())
        );
    }

    #[test]
    fn is_newer_ignores_range_prefix() {
        assert!(VersionComparator::is_newer("4.18.2", "^4.17.1"));
        assert!(!VersionComparator::is_newer("4.17.1", "~4.17.1"));
    }
}
