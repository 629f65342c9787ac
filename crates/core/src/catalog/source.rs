use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::{Catalog, RawRecord};
use crate::errors::LoadError;

pub fn read_records(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| LoadError::ReadFile { path: path.to_path_buf(), source })?;
    let document: Value = serde_json::from_str(&raw)
        .map_err(|source| LoadError::ParseFile { path: path.to_path_buf(), source })?;

    let Value::Array(items) = document else {
        return Err(LoadError::NotAnArray(path.to_path_buf()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(LoadError::InvalidRecord {
                position,
                detail: format!("expected an object in `{}`, found {other}", path.display()),
            }),
        })
        .collect()
}

/// A missing overrides file is an empty override set.
pub fn read_optional_records(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    if !path.exists() {
        warn!(
            event_name = "catalog.load.overrides_missing",
            path = %path.display(),
            "overrides file not found, continuing with generated entries only"
        );
        return Ok(Vec::new());
    }
    read_records(path)
}

pub fn load_from_files(generated: &Path, overrides: Option<&Path>) -> Result<Catalog, LoadError> {
    let generated_records = read_records(generated)?;
    let override_records = match overrides {
        Some(path) => read_optional_records(path)?,
        None => Vec::new(),
    };

    let catalog = Catalog::load(generated_records, override_records)?;
    info!(
        event_name = "catalog.load.completed",
        generated_path = %generated.display(),
        entries = catalog.len(),
        categories = catalog.categories().len(),
        "endpoint catalog loaded"
    );
    Ok(catalog)
}

impl Catalog {
    /// Writes the merged catalog in canonical form.
    pub fn write_json(&self, path: &Path) -> Result<(), LoadError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| LoadError::WriteFile { path: path.to_path_buf(), source })?;
        }

        let mut rendered = serde_json::to_string_pretty(self.entries()).map_err(|error| {
            LoadError::WriteFile { path: path.to_path_buf(), source: io::Error::other(error) }
        })?;
        rendered.push('\n');
        fs::write(path, rendered)
            .map_err(|source| LoadError::WriteFile { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{load_from_files, read_records};
    use crate::errors::LoadError;

    const GENERATED: &str = r#"[
  {"name": "roster", "base": "web", "path": "/roster/{team}/{season}", "method": "GET",
   "category": "teams", "cost": 2, "description": "Roster endpoint",
   "params_schema": {"path": {"team": "string", "season": "string"}, "query": {}}},
  {"name": "skater_summary", "base": "stats", "path": "en/skater/summary", "method": "GET",
   "category": "skaters", "cost": 3, "description": "Skater summary endpoint",
   "params_schema": {"path": {}, "query": {"cayenneExp": "string", "limit": "integer"}}}
]"#;

    #[test]
    fn loads_generated_with_overrides_from_disk() {
        let dir = TempDir::new().expect("temp dir");
        let generated = dir.path().join("generated.json");
        let overrides = dir.path().join("overrides.json");
        fs::write(&generated, GENERATED).expect("write generated");
        fs::write(&overrides, r#"[{"pathTemplate": "roster/{team}/{season}", "cost": 5}]"#)
            .expect("write overrides");

        let catalog = load_from_files(&generated, Some(&overrides)).expect("catalog loads");

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup_by_template("roster/{team}/{season}").map(|e| e.cost), Some(5));
    }

    #[test]
    fn missing_overrides_file_is_empty_override_set() {
        let dir = TempDir::new().expect("temp dir");
        let generated = dir.path().join("generated.json");
        fs::write(&generated, GENERATED).expect("write generated");

        let catalog = load_from_files(&generated, Some(&dir.path().join("absent.json")))
            .expect("catalog loads");
        assert_eq!(catalog.lookup_by_name("roster").map(|e| e.cost), Some(2));
    }

    #[test]
    fn missing_generated_file_is_read_error() {
        let dir = TempDir::new().expect("temp dir");
        let error = load_from_files(&dir.path().join("absent.json"), None).expect_err("no file");

        assert!(matches!(error, LoadError::ReadFile { .. }));
    }

    #[test]
    fn document_must_be_an_array_of_objects() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("catalog.json");

        fs::write(&path, r#"{"name": "roster"}"#).expect("write");
        assert!(matches!(read_records(&path), Err(LoadError::NotAnArray(_))));

        fs::write(&path, r#"[{"name": "roster"}, 3]"#).expect("write");
        assert!(matches!(read_records(&path), Err(LoadError::InvalidRecord { position: 1, .. })));
    }

    #[test]
    fn written_catalog_reloads_identically() {
        let dir = TempDir::new().expect("temp dir");
        let generated = dir.path().join("generated.json");
        fs::write(&generated, GENERATED).expect("write generated");
        let catalog = load_from_files(&generated, None).expect("catalog loads");

        let merged = dir.path().join("out").join("merged.json");
        catalog.write_json(&merged).expect("write merged");
        let reloaded = load_from_files(&merged, None).expect("merged catalog loads");

        assert_eq!(reloaded.entries(), catalog.entries());
    }
}
