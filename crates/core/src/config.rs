use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub gateway: GatewayConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub generated_path: PathBuf,
    pub overrides_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub web_base_url: String,
    pub stats_base_url: String,
    pub timeout_secs: u64,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub call_limit: u32,
    /// Zero means cost-unconstrained.
    pub cost_limit: u64,
    pub max_turns: u32,
    pub record_discovery: bool,
    pub discovery_cost: u64,
    pub summary_max_chars: usize,
    pub deadline_secs: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub generated_path: Option<PathBuf>,
    pub overrides_path: Option<PathBuf>,
    pub call_limit: Option<u32>,
    pub cost_limit: Option<u64>,
    pub max_turns: Option<u32>,
    pub cache_enabled: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                generated_path: PathBuf::from("catalog/endpoint_catalog.generated.json"),
                overrides_path: PathBuf::from("catalog/endpoint_catalog.overrides.json"),
            },
            gateway: GatewayConfig {
                web_base_url: "https://api-web.nhle.com/v1".to_string(),
                stats_base_url: "https://api.nhle.com/stats/rest".to_string(),
                timeout_secs: 30,
                cache_enabled: true,
                cache_dir: PathBuf::from(".cache/statline"),
            },
            session: SessionConfig {
                call_limit: 20,
                cost_limit: 0,
                max_turns: 40,
                record_discovery: true,
                discovery_cost: 0,
                summary_max_chars: 512,
                deadline_secs: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SessionConfig {
    /// `None` when the deployment relies on the call count alone.
    pub fn effective_cost_limit(&self) -> Option<u64> {
        (self.cost_limit > 0).then_some(self.cost_limit)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("statline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(generated_path) = catalog.generated_path {
                self.catalog.generated_path = generated_path;
            }
            if let Some(overrides_path) = catalog.overrides_path {
                self.catalog.overrides_path = overrides_path;
            }
        }

        if let Some(gateway) = patch.gateway {
            if let Some(web_base_url) = gateway.web_base_url {
                self.gateway.web_base_url = web_base_url;
            }
            if let Some(stats_base_url) = gateway.stats_base_url {
                self.gateway.stats_base_url = stats_base_url;
            }
            if let Some(timeout_secs) = gateway.timeout_secs {
                self.gateway.timeout_secs = timeout_secs;
            }
            if let Some(cache_enabled) = gateway.cache_enabled {
                self.gateway.cache_enabled = cache_enabled;
            }
            if let Some(cache_dir) = gateway.cache_dir {
                self.gateway.cache_dir = cache_dir;
            }
        }

        if let Some(session) = patch.session {
            if let Some(call_limit) = session.call_limit {
                self.session.call_limit = call_limit;
            }
            if let Some(cost_limit) = session.cost_limit {
                self.session.cost_limit = cost_limit;
            }
            if let Some(max_turns) = session.max_turns {
                self.session.max_turns = max_turns;
            }
            if let Some(record_discovery) = session.record_discovery {
                self.session.record_discovery = record_discovery;
            }
            if let Some(discovery_cost) = session.discovery_cost {
                self.session.discovery_cost = discovery_cost;
            }
            if let Some(summary_max_chars) = session.summary_max_chars {
                self.session.summary_max_chars = summary_max_chars;
            }
            if let Some(deadline_secs) = session.deadline_secs {
                self.session.deadline_secs = Some(deadline_secs);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STATLINE_CATALOG_GENERATED_PATH") {
            self.catalog.generated_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("STATLINE_CATALOG_OVERRIDES_PATH") {
            self.catalog.overrides_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("STATLINE_GATEWAY_WEB_BASE_URL") {
            self.gateway.web_base_url = value;
        }
        if let Some(value) = read_env("STATLINE_GATEWAY_STATS_BASE_URL") {
            self.gateway.stats_base_url = value;
        }
        if let Some(value) = read_env("STATLINE_GATEWAY_TIMEOUT_SECS") {
            self.gateway.timeout_secs = parse_u64("STATLINE_GATEWAY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("STATLINE_GATEWAY_CACHE_ENABLED") {
            self.gateway.cache_enabled = parse_bool("STATLINE_GATEWAY_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("STATLINE_GATEWAY_CACHE_DIR") {
            self.gateway.cache_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("STATLINE_SESSION_CALL_LIMIT") {
            self.session.call_limit = parse_u32("STATLINE_SESSION_CALL_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_COST_LIMIT") {
            self.session.cost_limit = parse_u64("STATLINE_SESSION_COST_LIMIT", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_MAX_TURNS") {
            self.session.max_turns = parse_u32("STATLINE_SESSION_MAX_TURNS", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_RECORD_DISCOVERY") {
            self.session.record_discovery =
                parse_bool("STATLINE_SESSION_RECORD_DISCOVERY", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_DISCOVERY_COST") {
            self.session.discovery_cost = parse_u64("STATLINE_SESSION_DISCOVERY_COST", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_SUMMARY_MAX_CHARS") {
            self.session.summary_max_chars =
                parse_usize("STATLINE_SESSION_SUMMARY_MAX_CHARS", &value)?;
        }
        if let Some(value) = read_env("STATLINE_SESSION_DEADLINE_SECS") {
            self.session.deadline_secs =
                Some(parse_u64("STATLINE_SESSION_DEADLINE_SECS", &value)?);
        }

        let log_level =
            read_env("STATLINE_LOGGING_LEVEL").or_else(|| read_env("STATLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STATLINE_LOGGING_FORMAT").or_else(|| read_env("STATLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(generated_path) = overrides.generated_path {
            self.catalog.generated_path = generated_path;
        }
        if let Some(overrides_path) = overrides.overrides_path {
            self.catalog.overrides_path = overrides_path;
        }
        if let Some(call_limit) = overrides.call_limit {
            self.session.call_limit = call_limit;
        }
        if let Some(cost_limit) = overrides.cost_limit {
            self.session.cost_limit = cost_limit;
        }
        if let Some(max_turns) = overrides.max_turns {
            self.session.max_turns = max_turns;
        }
        if let Some(cache_enabled) = overrides.cache_enabled {
            self.gateway.cache_enabled = cache_enabled;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_gateway(&self.gateway)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `AppConfig::load` would read: the explicit path if it exists, else
/// `statline.toml`, else `config/statline.toml`.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("statline.toml"), PathBuf::from("config/statline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.generated_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.generated_path must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_gateway(gateway: &GatewayConfig) -> Result<(), ConfigError> {
    for (key, base_url) in [
        ("gateway.web_base_url", &gateway.web_base_url),
        ("gateway.stats_base_url", &gateway.stats_base_url),
    ] {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if gateway.timeout_secs == 0 || gateway.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "gateway.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if gateway.cache_enabled && gateway.cache_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "gateway.cache_dir is required when gateway.cache_enabled is true".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.call_limit == 0 {
        return Err(ConfigError::Validation(
            "session.call_limit must be greater than zero".to_string(),
        ));
    }

    if session.max_turns < session.call_limit {
        return Err(ConfigError::Validation(format!(
            "session.max_turns ({}) must be at least session.call_limit ({})",
            session.max_turns, session.call_limit
        )));
    }

    if session.summary_max_chars < 16 {
        return Err(ConfigError::Validation(
            "session.summary_max_chars must be at least 16".to_string(),
        ));
    }

    if session.deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "session.deadline_secs must be greater than zero when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    gateway: Option<GatewayPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    generated_path: Option<PathBuf>,
    overrides_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayPatch {
    web_base_url: Option<String>,
    stats_base_url: Option<String>,
    timeout_secs: Option<u64>,
    cache_enabled: Option<bool>,
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    call_limit: Option<u32>,
    cost_limit: Option<u64>,
    max_turns: Option<u32>,
    record_discovery: Option<bool>,
    discovery_cost: Option<u64>,
    summary_max_chars: Option<usize>,
    deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
