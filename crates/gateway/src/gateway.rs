use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use statline_core::config::GatewayConfig;
use statline_core::{Base, CallError, Catalog};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CachingTransport;
use crate::params::{check_path_keys, check_query_keys, render_path_values, render_query_values};
use crate::transport::{HttpTransport, RemoteRequest, Transport};

/// What the agent asks for: a catalog template plus parameter values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(alias = "path_template")]
    pub path_template: String,
    #[serde(default, alias = "path_params", deserialize_with = "map_or_null")]
    pub path_params: BTreeMap<String, Value>,
    #[serde(default, alias = "query_params", deserialize_with = "map_or_null")]
    pub query_params: BTreeMap<String, Value>,
}

impl CallRequest {
    pub fn new(path_template: impl Into<String>) -> Self {
        Self { path_template: path_template.into(), ..Self::default() }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }
}

fn map_or_null<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A validated request, ready to dispatch. Building one performs no I/O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedCall {
    pub entry_name: String,
    pub path_template: String,
    pub base: Base,
    pub resolved_path: String,
    pub cost: u64,
    pub request: RemoteRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallResult {
    pub payload: Value,
    pub cost: u64,
    pub base: Base,
    pub resolved_path: String,
}

#[derive(Debug, Error)]
pub enum GatewayBuildError {
    #[error("invalid {base} base url `{url}`: {source}")]
    InvalidBaseUrl { base: Base, url: String, source: url::ParseError },
    #[error("{base} base url `{url}` cannot carry a path")]
    NotABase { base: Base, url: String },
    #[error("could not build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Remote service roots, one per [`Base`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrls {
    web: Url,
    stats: Url,
}

impl BaseUrls {
    pub fn parse(web: &str, stats: &str) -> Result<Self, GatewayBuildError> {
        Ok(Self { web: parse_root(Base::Web, web)?, stats: parse_root(Base::Stats, stats)? })
    }

    pub fn root(&self, base: Base) -> &Url {
        match base {
            Base::Web => &self.web,
            Base::Stats => &self.stats,
        }
    }
}

fn parse_root(base: Base, raw: &str) -> Result<Url, GatewayBuildError> {
    let url = Url::parse(raw).map_err(|source| GatewayBuildError::InvalidBaseUrl {
        base,
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(GatewayBuildError::NotABase { base, url: raw.to_string() });
    }
    Ok(url)
}

/// Path of `url` below `root`, exactly as sent on the wire.
fn encoded_suffix(url: &Url, root: &Url) -> String {
    let mut base: Vec<&str> = root.path_segments().map(Iterator::collect).unwrap_or_default();
    if base.last() == Some(&"") {
        base.pop();
    }
    url.path_segments()
        .map(|segments| segments.skip(base.len()).collect::<Vec<_>>().join("/"))
        .unwrap_or_default()
}

/// Validates calls against the catalog and dispatches them through a [`Transport`].
///
/// Holds no session state; one instance can serve any number of concurrent sessions.
#[derive(Clone)]
pub struct EndpointGateway {
    catalog: Arc<Catalog>,
    transport: Arc<dyn Transport>,
    bases: BaseUrls,
    timeout: Duration,
}

impl EndpointGateway {
    pub fn new(
        catalog: Arc<Catalog>,
        transport: Arc<dyn Transport>,
        bases: BaseUrls,
        timeout: Duration,
    ) -> Self {
        Self { catalog, transport, bases, timeout }
    }

    /// Builds the HTTP-backed gateway described by `config`, with the disk cache in front of
    /// the network when enabled.
    pub fn from_config(
        catalog: Arc<Catalog>,
        config: &GatewayConfig,
    ) -> Result<Self, GatewayBuildError> {
        let bases = BaseUrls::parse(&config.web_base_url, &config.stats_base_url)?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = HttpTransport::new(timeout)?;
        let transport: Arc<dyn Transport> = if config.cache_enabled {
            Arc::new(CachingTransport::new(http, config.cache_dir.clone()))
        } else {
            Arc::new(http)
        };
        Ok(Self::new(catalog, transport, bases, timeout))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Declared cost of the entry behind `path_template`, if it is in the catalog.
    pub fn cost_of(&self, path_template: &str) -> Option<u64> {
        self.catalog.lookup_by_template(path_template).map(|entry| entry.cost)
    }

    pub fn prepare(&self, request: &CallRequest) -> Result<PreparedCall, CallError> {
        self.validate(request).map_err(|error| {
            warn!(
                event_name = "gateway.call.rejected",
                path_template = %request.path_template,
                error_kind = error.error_kind(),
                error = %error,
                "call rejected before dispatch"
            );
            error
        })
    }

    fn validate(&self, request: &CallRequest) -> Result<PreparedCall, CallError> {
        let (entry, template) = self
            .catalog
            .resolve_template(&request.path_template)
            .ok_or_else(|| CallError::PathNotAllowed { path_template: request.path_template.clone() })?;

        check_path_keys(entry, &request.path_params)?;
        check_query_keys(entry, &request.query_params)?;
        let path_values = render_path_values(entry, &request.path_params)?;
        let query_pairs = render_query_values(entry, &request.query_params)?;

        let resolved = template.resolve(&path_values).map_err(|error| {
            CallError::TemplateResolution {
                path_template: entry.path_template.clone(),
                detail: error.to_string(),
            }
        })?;

        let root = self.bases.root(entry.base);
        let mut url = root.clone();
        url.path_segments_mut()
            .map_err(|()| CallError::TemplateResolution {
                path_template: entry.path_template.clone(),
                detail: format!("{} base url cannot carry a path", entry.base),
            })?
            .pop_if_empty()
            .extend(resolved.segments());
        if !query_pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(&query_pairs);
        }

        Ok(PreparedCall {
            entry_name: entry.name.clone(),
            path_template: entry.path_template.clone(),
            base: entry.base,
            resolved_path: encoded_suffix(&url, root),
            cost: entry.cost,
            request: RemoteRequest::new(url),
        })
    }

    /// Sends a prepared call. Every outcome of this method counts as a dispatch attempt.
    pub async fn dispatch(&self, prepared: &PreparedCall) -> Result<CallResult, CallError> {
        let started = Instant::now();
        debug!(
            event_name = "gateway.dispatch.started",
            endpoint = %prepared.entry_name,
            base = %prepared.base,
            resolved_path = %prepared.resolved_path,
            "dispatching remote call"
        );

        let outcome =
            match tokio::time::timeout(self.timeout, self.transport.get_json(&prepared.request)).await {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(error)) => Err(CallError::from(error)),
                Err(_) => Err(CallError::RemoteUnavailable {
                    detail: format!("no response within {}ms", self.timeout.as_millis()),
                }),
            };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(payload) => {
                info!(
                    event_name = "gateway.dispatch.completed",
                    endpoint = %prepared.entry_name,
                    resolved_path = %prepared.resolved_path,
                    cost = prepared.cost,
                    elapsed_ms,
                    "remote call completed"
                );
                Ok(CallResult {
                    payload,
                    cost: prepared.cost,
                    base: prepared.base,
                    resolved_path: prepared.resolved_path.clone(),
                })
            }
            Err(error) => {
                warn!(
                    event_name = "gateway.dispatch.failed",
                    endpoint = %prepared.entry_name,
                    resolved_path = %prepared.resolved_path,
                    error_kind = error.error_kind(),
                    error = %error,
                    elapsed_ms,
                    "remote call failed"
                );
                Err(error)
            }
        }
    }

    pub async fn call(&self, request: &CallRequest) -> Result<CallResult, CallError> {
        let prepared = self.prepare(request)?;
        self.dispatch(&prepared).await
    }
}
