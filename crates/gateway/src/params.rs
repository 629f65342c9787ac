use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use statline_core::{CallError, CatalogEntry, ParamKind};

/// Checks that the supplied path parameter names are exactly the declared ones.
pub fn check_path_keys(
    entry: &CatalogEntry,
    supplied: &BTreeMap<String, Value>,
) -> Result<(), CallError> {
    let declared: BTreeSet<&str> = entry.params_schema.path.keys().map(String::as_str).collect();
    let given: BTreeSet<&str> = supplied.keys().map(String::as_str).collect();
    if declared == given {
        return Ok(());
    }

    Err(CallError::PathParamMismatch {
        path_template: entry.path_template.clone(),
        missing: declared.difference(&given).map(|name| name.to_string()).collect(),
        unexpected: given.difference(&declared).map(|name| name.to_string()).collect(),
    })
}

/// Checks that every supplied query parameter name is declared.
pub fn check_query_keys(
    entry: &CatalogEntry,
    supplied: &BTreeMap<String, Value>,
) -> Result<(), CallError> {
    let rejected: Vec<String> = supplied
        .keys()
        .filter(|name| !entry.params_schema.query.contains_key(*name))
        .cloned()
        .collect();
    if rejected.is_empty() {
        return Ok(());
    }

    Err(CallError::QueryParamNotAllowed {
        path_template: entry.path_template.clone(),
        rejected,
        allowed: entry.params_schema.query.keys().cloned().collect(),
    })
}

pub fn render_path_values(
    entry: &CatalogEntry,
    supplied: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, String>, CallError> {
    supplied
        .iter()
        .map(|(name, value)| {
            let kind = entry.params_schema.path.get(name).copied().unwrap_or(ParamKind::String);
            render_value(name, kind, value).map(|rendered| (name.clone(), rendered))
        })
        .collect()
}

/// Renders query values in key order. A `null` value means the parameter was not supplied.
pub fn render_query_values(
    entry: &CatalogEntry,
    supplied: &BTreeMap<String, Value>,
) -> Result<Vec<(String, String)>, CallError> {
    supplied
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            let kind = entry.params_schema.query.get(name).copied().unwrap_or(ParamKind::String);
            render_value(name, kind, value).map(|rendered| (name.clone(), rendered))
        })
        .collect()
}

/// Renders one scalar as it will appear on the wire, checking it against the declared kind.
pub fn render_value(name: &str, kind: ParamKind, value: &Value) -> Result<String, CallError> {
    let invalid = |reason: String| CallError::InvalidParamValue { name: name.to_string(), reason };

    let rendered = match value {
        Value::String(text) => {
            let accepted = match kind {
                ParamKind::String => true,
                ParamKind::Integer => text.parse::<i64>().is_ok(),
                ParamKind::Number => text.parse::<f64>().is_ok_and(f64::is_finite),
                ParamKind::Boolean => matches!(text.as_str(), "true" | "false"),
            };
            if !accepted {
                return Err(invalid(format!("`{text}` is not a valid {}", kind.as_str())));
            }
            text.clone()
        }
        Value::Number(number) => {
            let accepted = match kind {
                ParamKind::String | ParamKind::Number => true,
                ParamKind::Integer => number.is_i64() || number.is_u64(),
                ParamKind::Boolean => false,
            };
            if !accepted {
                return Err(invalid(format!("{number} is not a valid {}", kind.as_str())));
            }
            number.to_string()
        }
        Value::Bool(flag) => {
            if !matches!(kind, ParamKind::Boolean | ParamKind::String) {
                return Err(invalid(format!("{flag} is not a valid {}", kind.as_str())));
            }
            flag.to_string()
        }
        Value::Null | Value::Array(_) | Value::Object(_) => {
            return Err(invalid("expected a string, number or boolean".to_string()));
        }
    };

    if rendered.is_empty() || rendered == "." || rendered == ".." {
        return Err(invalid(format!("`{rendered}` is not a usable value")));
    }
    Ok(rendered)
}
