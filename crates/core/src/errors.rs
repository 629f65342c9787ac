use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Startup-time catalog failures. A process that hits one of these must refuse to serve.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("could not write catalog file `{path}`: {source}")]
    WriteFile { path: PathBuf, source: std::io::Error },
    #[error("catalog file `{0}` must contain a JSON array of entry objects")]
    NotAnArray(PathBuf),
    #[error("catalog record {position} is invalid: {detail}")]
    InvalidRecord { position: usize, detail: String },
    #[error("duplicate endpoint name `{name}`")]
    DuplicateName { name: String },
    #[error("path template `{path_template}` is declared by both `{first}` and `{second}`")]
    DuplicateTemplate { path_template: String, first: String, second: String },
    #[error("schema mismatch for `{name}`: {detail}")]
    SchemaMismatch { name: String, detail: String },
    #[error(
        "override `{name}` declares path template `{override_template}` but the generated entry uses `{existing_template}`"
    )]
    AmbiguousIdentity { name: String, existing_template: String, override_template: String },
}

/// Failures of a single gateway call. Validation failures happen before any I/O and are never
/// charged; remote failures happen after dispatch and always are.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("path template `{path_template}` is not in the endpoint catalog")]
    PathNotAllowed { path_template: String },
    #[error(
        "path parameters do not match `{path_template}` (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    PathParamMismatch { path_template: String, missing: Vec<String>, unexpected: Vec<String> },
    #[error(
        "query parameters {rejected:?} are not allowed for `{path_template}` (allowed: {allowed:?})"
    )]
    QueryParamNotAllowed { path_template: String, rejected: Vec<String>, allowed: Vec<String> },
    #[error("invalid value for parameter `{name}`: {reason}")]
    InvalidParamValue { name: String, reason: String },
    #[error("template `{path_template}` could not be resolved: {detail}")]
    TemplateResolution { path_template: String, detail: String },
    #[error("remote service unavailable: {detail}")]
    RemoteUnavailable { detail: String },
    #[error("remote service rejected the request with status {status}: {detail}")]
    RemoteRejected { status: u16, detail: String },
    #[error("remote service error{}: {detail}", status_suffix(.status))]
    RemoteError { status: Option<u16>, detail: String },
}

impl CallError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::PathNotAllowed { .. } => "path_not_allowed",
            Self::PathParamMismatch { .. } => "path_param_mismatch",
            Self::QueryParamNotAllowed { .. } => "query_param_not_allowed",
            Self::InvalidParamValue { .. } => "invalid_param_value",
            Self::TemplateResolution { .. } => "template_resolution_error",
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::RemoteError { .. } => "remote_error",
        }
    }

    /// True when the failure came from an attempted dispatch.
    pub fn is_charged(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::RemoteRejected { .. } | Self::RemoteError { .. }
        )
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PathNotAllowed { .. } => {
                Some("call list_endpoints and use a pathTemplate exactly as listed")
            }
            Self::PathParamMismatch { .. } => {
                Some("supply exactly the parameters declared in paramsSchema.path")
            }
            Self::QueryParamNotAllowed { .. } => {
                Some("only use query parameters declared in paramsSchema.query")
            }
            Self::InvalidParamValue { .. } => {
                Some("parameter values must be non-empty scalars matching the declared kind")
            }
            Self::TemplateResolution { .. } => None,
            Self::RemoteUnavailable { .. } | Self::RemoteError { .. } => {
                Some("the remote service failed; retrying costs another call")
            }
            Self::RemoteRejected { .. } => {
                Some("the remote service refused these parameter values")
            }
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure {
            error_kind: self.error_kind().to_string(),
            detail: self.to_string(),
            charged: self.is_charged(),
            hint: self.hint().map(str::to_string),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|status| format!(" (status {status})")).unwrap_or_default()
}

/// Agent-facing shape of a failed tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailure {
    pub error_kind: String,
    pub detail: String,
    pub charged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<CallError> for ToolFailure {
    fn from(value: CallError) -> Self {
        value.to_failure()
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{CallError, ToolFailure};

    #[test]
    fn validation_failures_are_not_charged() {
        let errors = [
            CallError::PathNotAllowed { path_template: "admin/{x}".to_owned() },
            CallError::PathParamMismatch {
                path_template: "roster/{team}/{season}".to_owned(),
                missing: vec!["season".to_owned()],
                unexpected: Vec::new(),
            },
            CallError::QueryParamNotAllowed {
                path_template: "standings/now".to_owned(),
                rejected: vec!["expand".to_owned()],
                allowed: Vec::new(),
            },
            CallError::InvalidParamValue { name: "team".to_owned(), reason: "empty".to_owned() },
            CallError::TemplateResolution {
                path_template: "roster/{team}".to_owned(),
                detail: "no value".to_owned(),
            },
        ];

        assert!(errors.iter().all(|error| !error.is_charged()));
    }

    #[test]
    fn dispatch_failures_are_charged() {
        assert!(CallError::RemoteUnavailable { detail: "timeout".to_owned() }.is_charged());
        assert!(CallError::RemoteRejected { status: 404, detail: String::new() }.is_charged());
        assert!(CallError::RemoteError { status: Some(503), detail: String::new() }.is_charged());
    }

    #[test]
    fn failure_carries_offending_template_and_hint() {
        let failure: ToolFailure =
            CallError::PathNotAllowed { path_template: "internal/admin".to_owned() }.into();

        assert_eq!(failure.error_kind, "path_not_allowed");
        assert!(failure.detail.contains("internal/admin"));
        assert!(!failure.charged);
        assert!(failure.hint.as_deref().is_some_and(|hint| hint.contains("list_endpoints")));
    }

    #[test]
    fn remote_error_display_includes_status_when_known() {
        let with_status = CallError::RemoteError { status: Some(502), detail: "bad gateway".to_owned() };
        let without_status =
            CallError::RemoteError { status: None, detail: "malformed payload".to_owned() };

        assert_eq!(with_status.to_string(), "remote service error (status 502): bad gateway");
        assert_eq!(without_status.to_string(), "remote service error: malformed payload");
    }
}
