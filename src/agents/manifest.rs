use crate::error::{DepshiftError, Result};
use crate::plan::PlanItem;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

/// Dependency sections the tool is allowed to touch.
pub const DEPENDENCY_SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

/// Exact bytes of the manifest as read before an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSnapshot {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ManifestSnapshot {
    pub fn capture<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = fs::read(&path).map_err(|e| {
            DepshiftError::Manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self { path, bytes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(&self) -> Result<Manifest> {
        Manifest::from_slice(&self.bytes)
    }

    /// Write the captured bytes back verbatim.
    pub fn write_back(&self) -> Result<()> {
        fs::write(&self.path, &self.bytes).map_err(|e| {
            DepshiftError::Manifest(format!("Failed to restore {}: {}", self.path.display(), e))
        })
    }
}

const DEFAULT_INDENT: &str = "  ";

/// In-memory `package.json` document. Key order and indentation are
/// preserved on rewrite.
#[derive(Debug, Clone)]
pub struct Manifest {
    document: Map<String, Value>,
    indent: String,
    trailing_newline: bool,
}

/// Leading whitespace of the first indented line, e.g. four spaces or a tab.
fn detect_indent(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.lines()
        .skip(1)
        .map(|line| {
            let width = line.len() - line.trim_start_matches([' ', '\t']).len();
            &line[..width]
        })
        .find(|indent| !indent.is_empty())
        .unwrap_or(DEFAULT_INDENT)
        .to_string()
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let document = match value {
            Value::Object(map) => map,
            _ => {
                return Err(DepshiftError::Manifest(
                    "package.json must contain a JSON object".to_string(),
                ));
            }
        };

        Ok(Self {
            document,
            indent: detect_indent(bytes),
            trailing_newline: bytes.ends_with(b"\n"),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        ManifestSnapshot::capture(path)?.parse()
    }

    /// All declared dependencies across both sections. Runtime entries win
    /// when a name appears in both.
    pub fn dependencies(&self) -> BTreeMap<String, String> {
        let mut all = BTreeMap::new();
        for section in DEPENDENCY_SECTIONS.iter().rev() {
            if let Some(map) = self.section(section) {
                for (name, version) in map {
                    if let Some(version) = version.as_str() {
                        all.insert(name.clone(), version.to_string());
                    }
                }
            }
        }
        all
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        DEPENDENCY_SECTIONS
            .iter()
            .filter_map(|section| self.section(section))
            .find_map(|map| map.get(name))
            .and_then(Value::as_str)
    }

    /// Overwrite the version of every item that is already declared.
    /// Returns the names that were changed; unknown names are skipped.
    pub fn apply_updates(&mut self, items: &[PlanItem]) -> Vec<String> {
        let mut applied = Vec::new();
        for item in items {
            let mut touched = false;
            for section in DEPENDENCY_SECTIONS {
                if let Some(map) = self.section_mut(section) {
                    if let Some(slot) = map.get_mut(&item.name) {
                        *slot = Value::String(item.target_version.clone());
                        touched = true;
                    }
                }
            }
            if touched {
                applied.push(item.name.clone());
            }
        }
        applied
    }

    /// Replace `old` with `new` at the same position in every section that
    /// declares it. Returns the previous version when a rename happened.
    pub fn rename_dependency(&mut self, old: &str, new: &str, version: &str) -> Option<String> {
        let mut previous = None;
        for section in DEPENDENCY_SECTIONS {
            let Some(map) = self.section_mut(section) else {
                continue;
            };
            if !map.contains_key(old) {
                continue;
            }

            let entries = std::mem::take(map);
            for (name, value) in entries {
                if name == old {
                    if previous.is_none() {
                        previous = value.as_str().map(str::to_string);
                    }
                    map.insert(new.to_string(), Value::String(version.to_string()));
                } else if name != new {
                    map.insert(name, value);
                }
            }
        }
        previous
    }

    pub fn to_json_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
        self.document.serialize(&mut serializer)?;
        let mut rendered = String::from_utf8(buffer)
            .map_err(|e| DepshiftError::Manifest(format!("Rendered manifest is not UTF-8: {e}")))?;
        if self.trailing_newline {
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// Serialise and write the whole document in a single write.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let rendered = self.to_json_string()?;
        fs::write(path, rendered).map_err(|e| {
            DepshiftError::Manifest(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.document.get(name).and_then(Value::as_object)
    }

    fn section_mut(&mut self, name: &str) -> Option<&mut Map<String, Value>> {
        self.document.get_mut(name).and_then(Value::as_object_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
  "name": "demo",
  "version": "1.0.0",
  "dependencies": {
    "react": "^17.0.2",
    "lodash": "^4.17.15"
  },
  "devDependencies": {
    "jest": "^26.6.3"
  }
}
"#;

    #[test]
    fn apply_updates_only_touches_existing_keys() {
        let mut manifest = Manifest::from_slice(SAMPLE.as_bytes()).unwrap();
        let applied = manifest.apply_updates(&[
            PlanItem::new("lodash", "^4.17.15", "4.17.21", 1000),
            PlanItem::new("jest", "^26.6.3", "^29.0.0", 100),
            PlanItem::new("missing", "1.0.0", "2.0.0", 100),
        ]);

        assert_eq!(applied, vec!["lodash", "jest"]);
        assert_eq!(manifest.version_of("lodash"), Some("4.17.21"));
        assert_eq!(manifest.version_of("jest"), Some("^29.0.0"));
        assert_eq!(manifest.version_of("missing"), None);
        assert_eq!(manifest.dependencies().len(), 3);
    }

    #[test]
    fn unchanged_document_round_trips_byte_for_byte() {
        let manifest = Manifest::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.to_json_string().unwrap(), SAMPLE);
    }

    #[test]
    fn rewrite_keeps_tab_and_four_space_indentation() {
        let tabbed = "{\n\t\"name\": \"demo\",\n\t\"dependencies\": {\n\t\t\"react\": \"^17.0.2\"\n\t}\n}\n";
        let mut manifest = Manifest::from_slice(tabbed.as_bytes()).unwrap();
        manifest.apply_updates(&[PlanItem::new("react", "^17.0.2", "^18.2.0", 500)]);
        assert_eq!(
            manifest.to_json_string().unwrap(),
            tabbed.replace("^17.0.2", "^18.2.0")
        );

        let four = SAMPLE.replace("\n  ", "\n    ").replace("\n      ", "\n        ");
        let manifest = Manifest::from_slice(four.as_bytes()).unwrap();
        assert_eq!(manifest.to_json_string().unwrap(), four);
    }

    #[test]
    fn compact_manifest_falls_back_to_two_spaces() {
        assert_eq!(detect_indent(b"{\"a\":1}"), "  ");
    }

    #[test]
    fn rename_keeps_position() {
        let mut manifest = Manifest::from_slice(SAMPLE.as_bytes()).unwrap();
        let previous = manifest.rename_dependency("react", "preact", "^10.19.0");

        assert_eq!(previous.as_deref(), Some("^17.0.2"));
        let rendered = manifest.to_json_string().unwrap();
        let preact = rendered.find("preact").unwrap();
        let lodash = rendered.find("lodash").unwrap();
        assert!(preact < lodash);
        assert!(!rendered.contains("\"react\""));
    }

    #[test]
    fn snapshot_write_back_restores_exact_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let original = "{\"dependencies\":{\"a\":\"1.0.0\"}}";
        fs::write(&path, original).unwrap();

        let snapshot = ManifestSnapshot::capture(&path).unwrap();
        let mut manifest = snapshot.parse().unwrap();
        manifest.apply_updates(&[PlanItem::new("a", "1.0.0", "2.0.0", 100)]);
        manifest.save(&path).unwrap();
        assert_ne!(fs::read_to_string(&path).unwrap(), original);

        snapshot.write_back().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn rejects_non_object_manifest() {
        let err = Manifest::from_slice(b"[1, 2]").unwrap_err();
        assert!(matches!(err, DepshiftError::Manifest(_)));
    }
}
