use std::env;
use std::fs;
use std::path::Path;

use statline_core::config::{resolve_config_path, LoadOptions};
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let display_path = |path: &Path| path.display().to_string();
    let cost_limit = match config.session.effective_cost_limit() {
        Some(limit) => limit.to_string(),
        None => "0 (unconstrained)".to_string(),
    };
    let deadline =
        config.session.deadline_secs.map_or_else(|| "<unset>".to_string(), |secs| secs.to_string());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    };

    push(
        "catalog.generated_path",
        display_path(&config.catalog.generated_path),
        &["STATLINE_CATALOG_GENERATED_PATH"],
    );
    push(
        "catalog.overrides_path",
        display_path(&config.catalog.overrides_path),
        &["STATLINE_CATALOG_OVERRIDES_PATH"],
    );
    push(
        "gateway.web_base_url",
        config.gateway.web_base_url.clone(),
        &["STATLINE_GATEWAY_WEB_BASE_URL"],
    );
    push(
        "gateway.stats_base_url",
        config.gateway.stats_base_url.clone(),
        &["STATLINE_GATEWAY_STATS_BASE_URL"],
    );
    push(
        "gateway.timeout_secs",
        config.gateway.timeout_secs.to_string(),
        &["STATLINE_GATEWAY_TIMEOUT_SECS"],
    );
    push(
        "gateway.cache_enabled",
        config.gateway.cache_enabled.to_string(),
        &["STATLINE_GATEWAY_CACHE_ENABLED"],
    );
    push(
        "gateway.cache_dir",
        display_path(&config.gateway.cache_dir),
        &["STATLINE_GATEWAY_CACHE_DIR"],
    );
    push(
        "session.call_limit",
        config.session.call_limit.to_string(),
        &["STATLINE_SESSION_CALL_LIMIT"],
    );
    push("session.cost_limit", cost_limit, &["STATLINE_SESSION_COST_LIMIT"]);
    push(
        "session.max_turns",
        config.session.max_turns.to_string(),
        &["STATLINE_SESSION_MAX_TURNS"],
    );
    push(
        "session.record_discovery",
        config.session.record_discovery.to_string(),
        &["STATLINE_SESSION_RECORD_DISCOVERY"],
    );
    push(
        "session.discovery_cost",
        config.session.discovery_cost.to_string(),
        &["STATLINE_SESSION_DISCOVERY_COST"],
    );
    push(
        "session.summary_max_chars",
        config.session.summary_max_chars.to_string(),
        &["STATLINE_SESSION_SUMMARY_MAX_CHARS"],
    );
    push("session.deadline_secs", deadline, &["STATLINE_SESSION_DEADLINE_SECS"]);
    push(
        "logging.level",
        config.logging.level.clone(),
        &["STATLINE_LOGGING_LEVEL", "STATLINE_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["STATLINE_LOGGING_FORMAT", "STATLINE_LOG_FORMAT"],
    );

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
