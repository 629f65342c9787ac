use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Base;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceTool {
    ListEndpoints,
    CallEndpoint,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceOutcome {
    Ok,
    Error { error_kind: String },
    Cancelled,
}

/// One executed tool call. `seq` and the running counters are assigned by [`SessionTrace`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub seq: u64,
    pub tool: TraceTool,
    pub call_id: Option<String>,
    pub base: Option<Base>,
    pub resolved_path: Option<String>,
    pub params: Value,
    pub outcome: TraceOutcome,
    pub summary: String,
    pub cost: u64,
    pub cost_so_far: u64,
    pub calls_so_far: u32,
    pub elapsed_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl TraceEntry {
    pub fn new(tool: TraceTool, params: Value, outcome: TraceOutcome) -> Self {
        Self {
            seq: 0,
            tool,
            call_id: None,
            base: None,
            resolved_path: None,
            params,
            outcome,
            summary: String::new(),
            cost: 0,
            cost_so_far: 0,
            calls_so_far: 0,
            elapsed_ms: 0,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_call_id(mut self, call_id: Option<String>) -> Self {
        self.call_id = call_id;
        self
    }

    pub fn with_target(mut self, base: Base, resolved_path: impl Into<String>) -> Self {
        self.base = Some(base);
        self.resolved_path = Some(resolved_path.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }
}

/// Append-only, ordered log of a session's tool calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionTrace {
    entries: Vec<TraceEntry>,
}

impl SessionTrace {
    /// Stamps the entry with the next sequence number and the running totals. Totals lower
    /// than the previous entry's are raised so the counters never go backwards.
    pub fn append(&mut self, mut entry: TraceEntry, calls_so_far: u32, cost_so_far: u64) -> &TraceEntry {
        let (last_calls, last_cost) = self
            .entries
            .last()
            .map(|last| (last.calls_so_far, last.cost_so_far))
            .unwrap_or_default();

        entry.seq = self.entries.len() as u64 + 1;
        entry.calls_so_far = calls_so_far.max(last_calls);
        entry.cost_so_far = cost_so_far.max(last_cost);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compact JSON rendering of `payload`, cut to at most `max_chars` characters.
pub fn summarize_payload(payload: &Value, max_chars: usize) -> String {
    let rendered = payload.to_string();
    truncate_chars(&rendered, max_chars)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}... [truncated, {total} chars total]")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::catalog::Base;
    use crate::trace::{
        summarize_payload, SessionTrace, TraceEntry, TraceOutcome, TraceTool,
    };

    #[test]
    fn append_assigns_sequence_and_totals() {
        let mut trace = SessionTrace::default();
        trace.append(
            TraceEntry::new(TraceTool::ListEndpoints, json!({"category": null}), TraceOutcome::Ok),
            0,
            0,
        );
        let entry = trace
            .append(
                TraceEntry::new(
                    TraceTool::CallEndpoint,
                    json!({"pathParams": {"team": "TOR", "season": "20232024"}}),
                    TraceOutcome::Ok,
                )
                .with_call_id(Some("call_1".to_owned()))
                .with_target(Base::Web, "roster/TOR/20232024")
                .with_cost(2),
                1,
                2,
            )
            .clone();

        assert_eq!(trace.len(), 2);
        assert_eq!(entry.seq, 2);
        assert_eq!(entry.calls_so_far, 1);
        assert_eq!(entry.cost_so_far, 2);
        assert_eq!(entry.resolved_path.as_deref(), Some("roster/TOR/20232024"));
    }

    #[test]
    fn running_totals_never_decrease() {
        let mut trace = SessionTrace::default();
        trace.append(TraceEntry::new(TraceTool::CallEndpoint, json!({}), TraceOutcome::Ok), 3, 9);
        let entry =
            trace.append(TraceEntry::new(TraceTool::ListEndpoints, json!({}), TraceOutcome::Ok), 1, 1);

        assert_eq!(entry.calls_so_far, 3);
        assert_eq!(entry.cost_so_far, 9);
    }

    #[test]
    fn summary_is_bounded() {
        let payload = json!({"players": (0..500).map(|id| json!({"id": id})).collect::<Vec<_>>()});
        let summary = summarize_payload(&payload, 64);

        assert!(summary.starts_with("{\"players\":[{\"id\":0}"));
        assert!(summary.contains("truncated"));
        assert!(summary.chars().count() < 120);
    }

    #[test]
    fn short_payload_is_kept_whole() {
        assert_eq!(summarize_payload(&json!({"ok": true}), 64), "{\"ok\":true}");
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let value = serde_json::to_value(TraceOutcome::Error { error_kind: "remote_error".to_owned() })
            .expect("serialise");

        assert_eq!(value, json!({"status": "error", "error_kind": "remote_error"}));
    }
}
