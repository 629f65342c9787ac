use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::catalog::template::normalize_template;
use crate::errors::LoadError;

/// One catalog record as read from disk, before it is typed.
pub type RawRecord = Map<String, Value>;

const TEMPLATE_KEY: &str = "pathTemplate";
const TEMPLATE_ALIASES: [&str; 2] = ["path", "path_template"];
const SCHEMA_KEY: &str = "paramsSchema";
const SCHEMA_ALIASES: [&str; 1] = ["params_schema"];
const NAME_KEY: &str = "name";

/// Rewrites alias keys to their canonical spelling and strips a leading `/` from the template.
/// When both spellings are present the canonical key wins.
pub fn canonicalize(mut record: RawRecord) -> RawRecord {
    rename_aliases(&mut record, TEMPLATE_KEY, &TEMPLATE_ALIASES);
    rename_aliases(&mut record, SCHEMA_KEY, &SCHEMA_ALIASES);

    if let Some(Value::String(template)) = record.get_mut(TEMPLATE_KEY) {
        let normalized = normalize_template(template).to_string();
        *template = normalized;
    }
    record
}

fn rename_aliases(record: &mut RawRecord, canonical: &str, aliases: &[&str]) {
    for alias in aliases {
        if let Some(value) = record.remove(*alias) {
            if !record.contains_key(canonical) {
                record.insert(canonical.to_string(), value);
            }
        }
    }
}

fn string_field<'a>(record: &'a RawRecord, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Overlays `overrides` onto `generated`.
///
/// An override is matched by `pathTemplate`, then by `name`; a match has its fields replaced
/// key by key, anything unmatched is appended. An override that reuses a generated entry's
/// `name` while declaring a different `pathTemplate` is rejected as ambiguous.
pub fn merge_records(
    generated: Vec<RawRecord>,
    overrides: Vec<RawRecord>,
) -> Result<Vec<RawRecord>, LoadError> {
    let mut merged: Vec<RawRecord> = generated.into_iter().map(canonicalize).collect();
    let mut by_template: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (index, record) in merged.iter().enumerate() {
        if let Some(template) = string_field(record, TEMPLATE_KEY) {
            by_template.entry(template.to_string()).or_insert(index);
        }
        if let Some(name) = string_field(record, NAME_KEY) {
            by_name.entry(name.to_string()).or_insert(index);
        }
    }

    for record in overrides.into_iter().map(canonicalize) {
        let template = string_field(&record, TEMPLATE_KEY).map(str::to_string);
        let name = string_field(&record, NAME_KEY).map(str::to_string);

        let target = match (&template, &name) {
            (Some(template), _) if by_template.contains_key(template) => {
                by_template.get(template).copied()
            }
            (Some(template), Some(name)) => match by_name.get(name) {
                Some(&index) => {
                    let existing =
                        string_field(&merged[index], TEMPLATE_KEY).unwrap_or_default().to_string();
                    return Err(LoadError::AmbiguousIdentity {
                        name: name.clone(),
                        existing_template: existing,
                        override_template: template.clone(),
                    });
                }
                None => None,
            },
            (None, Some(name)) => by_name.get(name).copied(),
            _ => None,
        };

        let index = match target {
            Some(index) => {
                merged[index].extend(record);
                index
            }
            None => {
                merged.push(record);
                merged.len() - 1
            }
        };

        if let Some(template) = string_field(&merged[index], TEMPLATE_KEY) {
            by_template.entry(template.to_string()).or_insert(index);
        }
        if let Some(name) = string_field(&merged[index], NAME_KEY) {
            by_name.entry(name.to_string()).or_insert(index);
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{canonicalize, merge_records, RawRecord};
    use crate::errors::LoadError;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => RawRecord::new(),
        }
    }

    fn roster() -> RawRecord {
        record(json!({
            "name": "roster",
            "base": "web",
            "path": "/roster/{team}/{season}",
            "method": "GET",
            "category": "teams",
            "cost": 2,
            "description": "Roster endpoint",
            "params_schema": {"path": {"team": "string", "season": "string"}, "query": {}}
        }))
    }

    #[test]
    fn canonicalize_renames_aliases_and_strips_slash() {
        let canonical = canonicalize(roster());

        assert_eq!(canonical.get("pathTemplate"), Some(&json!("roster/{team}/{season}")));
        assert!(canonical.contains_key("paramsSchema"));
        assert!(!canonical.contains_key("path"));
        assert!(!canonical.contains_key("params_schema"));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let canonical =
            canonicalize(record(json!({"pathTemplate": "a/{x}", "path": "b/{y}", "name": "a"})));

        assert_eq!(canonical.get("pathTemplate"), Some(&json!("a/{x}")));
    }

    #[test]
    fn override_overlays_matching_template_field_by_field() {
        let merged = merge_records(
            vec![roster()],
            vec![record(json!({"pathTemplate": "roster/{team}/{season}", "cost": 5}))],
        )
        .expect("merge succeeds");

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("cost"), Some(&json!(5)));
        assert_eq!(merged[0].get("name"), Some(&json!("roster")));
        assert_eq!(merged[0].get("description"), Some(&json!("Roster endpoint")));
    }

    #[test]
    fn override_without_template_matches_by_name() {
        let merged =
            merge_records(vec![roster()], vec![record(json!({"name": "roster", "category": "rosters"}))])
                .expect("merge succeeds");

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("category"), Some(&json!("rosters")));
    }

    #[test]
    fn unmatched_override_is_appended() {
        let merged = merge_records(
            vec![roster()],
            vec![record(json!({"name": "standings_now", "base": "web", "pathTemplate": "standings/now", "category": "standings", "cost": 2}))],
        )
        .expect("merge succeeds");

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].get("name"), Some(&json!("standings_now")));
    }

    #[test]
    fn same_name_different_template_is_ambiguous() {
        let error = merge_records(
            vec![roster()],
            vec![record(json!({"name": "roster", "pathTemplate": "roster/{team}/current"}))],
        )
        .expect_err("ambiguous identity");

        assert!(matches!(
            error,
            LoadError::AmbiguousIdentity { ref name, ref existing_template, ref override_template }
                if name == "roster"
                    && existing_template == "roster/{team}/{season}"
                    && override_template == "roster/{team}/current"
        ));
    }

    #[test]
    fn empty_override_set_keeps_generated_order() {
        let second = record(json!({"name": "standings_now", "pathTemplate": "standings/now"}));
        let merged = merge_records(vec![roster(), second], Vec::new()).expect("merge succeeds");

        let names: Vec<_> = merged.iter().filter_map(|record| record.get("name")).collect();
        assert_eq!(names, [&json!("roster"), &json!("standings_now")]);
    }
}
