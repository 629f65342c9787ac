use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use statline_core::CallError;
use thiserror::Error;
use tracing::debug;
use url::Url;

const BODY_SNIPPET_CHARS: usize = 200;

/// A fully resolved outbound request. The query string is already attached to `url` in
/// sorted key order, so the URL alone identifies the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRequest {
    pub url: Url,
}

impl RemoteRequest {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("remote unavailable: {detail}")]
    Unavailable { detail: String },
    #[error("remote rejected request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("remote error: {detail}")]
    Remote { status: Option<u16>, detail: String },
}

impl From<TransportError> for CallError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Unavailable { detail } => CallError::RemoteUnavailable { detail },
            TransportError::Rejected { status, detail } => {
                CallError::RemoteRejected { status, detail }
            }
            TransportError::Remote { status, detail } => CallError::RemoteError { status, detail },
        }
    }
}

/// Collaborator seam for remote dispatch. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, request: &RemoteRequest) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get_json(&self, request: &RemoteRequest) -> Result<Value, TransportError> {
        (**self).get_json(request).await
    }
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, request: &RemoteRequest) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(request.url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| TransportError::Unavailable { detail: describe_send_error(&error) })?;

        let status = response.status();
        debug!(
            event_name = "gateway.transport.response",
            url = %request.url,
            status = status.as_u16(),
            "remote response received"
        );

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                detail: snippet(&body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Remote {
                status: Some(status.as_u16()),
                detail: snippet(&body),
            });
        }

        let bytes = response.bytes().await.map_err(|error| TransportError::Remote {
            status: Some(status.as_u16()),
            detail: format!("failed to read response body: {error}"),
        })?;
        serde_json::from_slice(&bytes).map_err(|error| TransportError::Remote {
            status: Some(status.as_u16()),
            detail: format!("malformed JSON payload: {error}"),
        })
    }
}

fn describe_send_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let kept: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use statline_core::CallError;

    use super::{snippet, TransportError};

    #[test]
    fn transport_errors_map_onto_charged_call_errors() {
        let cases = [
            (TransportError::Unavailable { detail: "timed out".to_string() }, "remote_unavailable"),
            (
                TransportError::Rejected { status: 404, detail: "not found".to_string() },
                "remote_rejected",
            ),
            (TransportError::Remote { status: Some(502), detail: String::new() }, "remote_error"),
            (TransportError::Remote { status: None, detail: "bad json".to_string() }, "remote_error"),
        ];

        for (error, kind) in cases {
            let mapped = CallError::from(error);
            assert_eq!(mapped.error_kind(), kind);
            assert!(mapped.is_charged());
        }
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(1_000);
        let cut = snippet(&body);

        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
