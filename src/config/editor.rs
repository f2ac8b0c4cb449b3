use crate::config::settings::ReplacementEntry;
use crate::error::{DepshiftError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{ArrayOfTables, DocumentMut, Item, Table, value};

/// Format-preserving edits to `depshift.toml`.
pub struct ConfigEditor {
    config_path: PathBuf,
}

impl ConfigEditor {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Append a `[[replacements]]` entry, creating the file when needed.
    /// Comments and layout of the existing file are kept.
    pub fn add_replacement(&self, entry: &ReplacementEntry) -> Result<()> {
        if entry.package.trim().is_empty() {
            return Err(DepshiftError::Config(
                "Replacement package name must not be empty".into(),
            ));
        }

        let mut doc = self.load_document()?;

        if doc.get("replacements").is_none() {
            doc.insert("replacements", Item::ArrayOfTables(ArrayOfTables::new()));
        }

        let replacements = doc["replacements"].as_array_of_tables_mut().ok_or_else(|| {
            DepshiftError::Config("'replacements' must be an array of tables".into())
        })?;

        let exists = replacements.iter().any(|table| {
            table.get("package").and_then(|item| item.as_str()) == Some(entry.package.as_str())
        });
        if exists {
            return Err(DepshiftError::Config(format!(
                "A replacement for '{}' is already configured",
                entry.package
            )));
        }

        replacements.push(replacement_table(entry));
        self.write_document(&doc)
    }

    fn load_document(&self) -> Result<DocumentMut> {
        if !self.config_path.exists() {
            return Ok(DocumentMut::new());
        }

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            DepshiftError::Config(format!(
                "Failed to read {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        content
            .parse::<DocumentMut>()
            .map_err(|e| DepshiftError::Config(format!("Failed to parse config: {}", e)))
    }

    fn write_document(&self, doc: &DocumentMut) -> Result<()> {
        fs::write(&self.config_path, doc.to_string()).map_err(|e| {
            DepshiftError::Config(format!(
                "Failed to write {}: {}",
                self.config_path.display(),
                e
            ))
        })
    }
}

fn replacement_table(entry: &ReplacementEntry) -> Table {
    let mut table = Table::new();
    table.insert("package", value(entry.package.as_str()));
    if let Some(replacement) = &entry.replacement {
        table.insert("replacement", value(replacement.as_str()));
    }
    if let Some(version) = &entry.version {
        table.insert("version", value(version.as_str()));
    }
    if entry.requires_manual_review {
        table.insert("requires_manual_review", value(true));
    }
    if let Some(notes) = &entry.notes {
        table.insert("notes", value(notes.as_str()));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;
    use tempfile::tempdir;

    fn entry(package: &str, replacement: Option<&str>) -> ReplacementEntry {
        ReplacementEntry {
            package: package.into(),
            replacement: replacement.map(str::to_string),
            version: replacement.map(|_| "^1.0.0".to_string()),
            requires_manual_review: false,
            notes: None,
        }
    }

    #[test]
    fn creates_config_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("depshift.toml");

        ConfigEditor::new(&path)
            .add_replacement(&entry("request", Some("axios")))
            .unwrap();

        let settings = Settings::parse(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(settings.replacements.len(), 1);
        assert_eq!(settings.replacements[0].replacement.as_deref(), Some("axios"));
    }

    #[test]
    fn preserves_existing_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("depshift.toml");
        fs::write(&path, "# team settings\n[planner]\nmax_batch_size = 5 # keep small\n").unwrap();

        ConfigEditor::new(&path)
            .add_replacement(&entry("left-pad", None))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# team settings\n"));
        assert!(content.contains("max_batch_size = 5 # keep small"));
        assert!(content.contains("[[replacements]]"));
        let settings = Settings::parse(&content).unwrap();
        assert_eq!(settings.planner.max_batch_size, 5);
    }

    #[test]
    fn rejects_duplicate_package() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("depshift.toml");
        let editor = ConfigEditor::new(&path);

        editor.add_replacement(&entry("moment", Some("dayjs"))).unwrap();
        let err = editor
            .add_replacement(&entry("moment", Some("luxon")))
            .unwrap_err();

        assert!(matches!(err, DepshiftError::Config(_)));
    }
}
