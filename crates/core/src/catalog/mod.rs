pub mod merge;
pub mod source;
pub mod template;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::LoadError;

pub use merge::{merge_records, RawRecord};
pub use template::{PathTemplate, ResolvedPath, TemplateError};

/// Remote service family an entry targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    Web,
    Stats,
}

impl Base {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Stats => "stats",
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only read-only calls are representable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsSchema {
    #[serde(default)]
    pub path: BTreeMap<String, ParamKind>,
    #[serde(default)]
    pub query: BTreeMap<String, ParamKind>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub base: Base,
    pub path_template: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub category: String,
    pub cost: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params_schema: ParamsSchema,
}

/// The merged, invariant-checked set of permitted endpoints. Built once at startup and shared
/// read-only (typically behind an `Arc`) by the gateway, discovery and every session.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    templates: Vec<PathTemplate>,
    by_template: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Merges `overrides` onto `generated` and validates the result.
    pub fn load(generated: Vec<RawRecord>, overrides: Vec<RawRecord>) -> Result<Self, LoadError> {
        let generated_count = generated.len();
        let override_count = overrides.len();
        let merged = merge_records(generated, overrides)?;

        let entries = merged
            .into_iter()
            .enumerate()
            .map(|(position, record)| {
                serde_json::from_value::<CatalogEntry>(Value::Object(record))
                    .map_err(|error| LoadError::InvalidRecord { position, detail: error.to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Self::from_entries(entries)?;
        debug!(
            event_name = "catalog.load.merged",
            generated = generated_count,
            overrides = override_count,
            entries = catalog.len(),
            "endpoint catalog merged"
        );
        Ok(catalog)
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, LoadError> {
        let mut catalog = Self::default();

        for mut entry in entries {
            if entry.name.trim().is_empty() {
                return Err(LoadError::SchemaMismatch {
                    name: entry.path_template.clone(),
                    detail: "entry name must not be empty".to_string(),
                });
            }

            let template = PathTemplate::parse(&entry.path_template).map_err(|error| {
                LoadError::SchemaMismatch { name: entry.name.clone(), detail: error.to_string() }
            })?;
            entry.path_template = template.as_str().to_string();
            check_placeholders(&entry, &template)?;

            let index = catalog.entries.len();
            if catalog.by_name.contains_key(&entry.name) {
                return Err(LoadError::DuplicateName { name: entry.name });
            }
            if let Some(&existing) = catalog.by_template.get(&entry.path_template) {
                return Err(LoadError::DuplicateTemplate {
                    path_template: entry.path_template,
                    first: catalog.entries[existing].name.clone(),
                    second: entry.name,
                });
            }

            catalog.by_name.insert(entry.name.clone(), index);
            catalog.by_template.insert(entry.path_template.clone(), index);
            catalog.templates.push(template);
            catalog.entries.push(entry);
        }

        Ok(catalog)
    }

    /// Exact string match on `pathTemplate`; no normalisation or pattern inference.
    pub fn lookup_by_template(&self, path_template: &str) -> Option<&CatalogEntry> {
        self.by_template.get(path_template).map(|&index| &self.entries[index])
    }

    /// Like [`Catalog::lookup_by_template`], also returning the parsed template.
    pub fn resolve_template(&self, path_template: &str) -> Option<(&CatalogEntry, &PathTemplate)> {
        self.by_template
            .get(path_template)
            .map(|&index| (&self.entries[index], &self.templates[index]))
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Entries in merge order, optionally restricted to one category.
    pub fn list_by_category(&self, category: Option<&str>) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|entry| category.map_or(true, |category| entry.category == category))
            .collect()
    }

    pub fn categories(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_placeholders(entry: &CatalogEntry, template: &PathTemplate) -> Result<(), LoadError> {
    let placeholders: BTreeSet<&str> = template.placeholders().collect();
    let declared: BTreeSet<&str> = entry.params_schema.path.keys().map(String::as_str).collect();

    if placeholders == declared {
        return Ok(());
    }

    let undeclared: Vec<&str> = placeholders.difference(&declared).copied().collect();
    let unused: Vec<&str> = declared.difference(&placeholders).copied().collect();
    Err(LoadError::SchemaMismatch {
        name: entry.name.clone(),
        detail: format!(
            "placeholders without a declared path parameter: {undeclared:?}; declared path parameters missing from template: {unused:?}"
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::{Base, Catalog, CatalogEntry, HttpMethod, ParamKind, ParamsSchema, RawRecord};
    use crate::errors::LoadError;

    fn record(value: serde_json::Value) -> RawRecord {
        match value {
            serde_json::Value::Object(map) => map,
            _ => RawRecord::new(),
        }
    }

    fn roster_entry() -> CatalogEntry {
        CatalogEntry {
            name: "roster".to_string(),
            base: Base::Web,
            path_template: "roster/{team}/{season}".to_string(),
            method: HttpMethod::Get,
            category: "teams".to_string(),
            cost: 2,
            description: "Team roster endpoint".to_string(),
            params_schema: ParamsSchema {
                path: BTreeMap::from([
                    ("team".to_string(), ParamKind::String),
                    ("season".to_string(), ParamKind::String),
                ]),
                query: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn lookup_by_template_is_exact() {
        let catalog = Catalog::from_entries(vec![roster_entry()]).expect("valid catalog");

        assert!(catalog.lookup_by_template("roster/{team}/{season}").is_some());
        assert!(catalog.lookup_by_template("/roster/{team}/{season}").is_none());
        assert!(catalog.lookup_by_template("roster/{team}").is_none());
        assert!(catalog.lookup_by_template("roster/TOR/20232024").is_none());
    }

    #[test]
    fn leading_slash_is_normalised_at_load() {
        let mut entry = roster_entry();
        entry.path_template = "/roster/{team}/{season}".to_string();
        let catalog = Catalog::from_entries(vec![entry]).expect("valid catalog");

        assert_eq!(catalog.entries()[0].path_template, "roster/{team}/{season}");
    }

    #[test]
    fn placeholder_without_schema_is_schema_mismatch() {
        let mut entry = roster_entry();
        entry.params_schema.path.remove("season");

        let error = Catalog::from_entries(vec![entry]).expect_err("season is undeclared");
        assert!(matches!(
            error,
            LoadError::SchemaMismatch { ref name, ref detail } if name == "roster" && detail.contains("season")
        ));
    }

    #[test]
    fn declared_parameter_missing_from_template_is_schema_mismatch() {
        let mut entry = roster_entry();
        entry.params_schema.path.insert("lang".to_string(), ParamKind::String);

        let error = Catalog::from_entries(vec![entry]).expect_err("lang is unused");
        assert!(matches!(error, LoadError::SchemaMismatch { ref detail, .. } if detail.contains("lang")));
    }

    #[test]
    fn duplicate_names_fail_the_load() {
        let mut second = roster_entry();
        second.path_template = "roster-season/{team}/{season}".to_string();

        let error = Catalog::from_entries(vec![roster_entry(), second]).expect_err("duplicate name");
        assert!(matches!(error, LoadError::DuplicateName { ref name } if name == "roster"));
    }

    #[test]
    fn duplicate_templates_fail_the_load() {
        let mut second = roster_entry();
        second.name = "roster_2".to_string();

        let error = Catalog::from_entries(vec![roster_entry(), second]).expect_err("duplicate template");
        assert!(matches!(
            error,
            LoadError::DuplicateTemplate { ref first, ref second, .. } if first == "roster" && second == "roster_2"
        ));
    }

    #[test]
    fn list_by_category_keeps_merge_order() {
        let catalog = Catalog::load(
            vec![
                record(json!({"name": "standings_now", "base": "web", "path": "standings/now", "category": "standings", "cost": 2})),
                record(json!({"name": "schedule_now", "base": "web", "path": "schedule/now", "category": "schedule", "cost": 2})),
                record(json!({"name": "standings_date", "base": "web", "path": "standings/{date}", "category": "standings", "cost": 2,
                    "params_schema": {"path": {"date": "string"}, "query": {}}})),
            ],
            Vec::new(),
        )
        .expect("valid catalog");

        let names = |category: Option<&str>| {
            catalog.list_by_category(category).into_iter().map(|entry| entry.name.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(None), ["standings_now", "schedule_now", "standings_date"]);
        assert_eq!(names(Some("standings")), ["standings_now", "standings_date"]);
        assert!(names(Some("edge")).is_empty());
        assert_eq!(names(None), names(None));
        assert_eq!(catalog.categories().get("standings"), Some(&2));
    }

    #[test]
    fn non_get_method_is_an_invalid_record() {
        let error = Catalog::load(
            vec![record(json!({"name": "x", "base": "web", "path": "x", "method": "POST", "category": "c", "cost": 1}))],
            Vec::new(),
        )
        .expect_err("POST is not representable");

        assert!(matches!(error, LoadError::InvalidRecord { position: 0, .. }));
    }
}
