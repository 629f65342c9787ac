use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statline_core::config::SessionConfig;
use statline_core::SessionTrace;
use uuid::Uuid;

use crate::budget::SessionBudget;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The agent produced its own final answer.
    Completed,
    BudgetExceeded,
    Cancelled,
    TurnLimit,
    AgentFailed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::BudgetExceeded => "budget_exceeded",
            Self::Cancelled => "cancelled",
            Self::TurnLimit => "turn_limit",
            Self::AgentFailed => "agent_failed",
        }
    }

    /// Reasons after which the agent is asked for a best-effort answer.
    pub fn forces_final(&self) -> bool {
        matches!(self, Self::BudgetExceeded | Self::TurnLimit)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a running session is. A terminated session is represented by its [`SessionOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingIntent,
    BudgetCheck,
    Dispatch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    pub answer: Value,
    pub forced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<String>,
}

/// The audit artifact of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub reason: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub final_answer: Option<FinalAnswer>,
    pub turns: u32,
    pub budget: SessionBudget,
    pub trace: SessionTrace,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Per-session limits and policy, supplied by the host rather than the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub call_limit: u32,
    pub cost_limit: Option<u64>,
    pub max_turns: u32,
    pub record_discovery: bool,
    pub discovery_cost: u64,
    pub summary_max_chars: usize,
    pub deadline: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            call_limit: 20,
            cost_limit: None,
            max_turns: 40,
            record_discovery: true,
            discovery_cost: 0,
            summary_max_chars: 512,
            deadline: None,
        }
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            call_limit: config.call_limit,
            cost_limit: config.effective_cost_limit(),
            max_turns: config.max_turns,
            record_discovery: config.record_discovery,
            discovery_cost: config.discovery_cost,
            summary_max_chars: config.summary_max_chars,
            deadline: config.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl SessionSettings {
    pub fn budget(&self) -> SessionBudget {
        SessionBudget::new(self.call_limit, self.cost_limit)
    }
}

#[cfg(test)]
mod tests {
    use statline_core::config::AppConfig;

    use super::{SessionSettings, TerminationReason};

    #[test]
    fn zero_cost_limit_in_config_means_unconstrained() {
        let mut config = AppConfig::default();
        config.session.cost_limit = 0;
        config.session.deadline_secs = Some(90);

        let settings = SessionSettings::from(&config.session);
        assert_eq!(settings.cost_limit, None);
        assert_eq!(settings.deadline.map(|deadline| deadline.as_secs()), Some(90));
        assert_eq!(settings.budget().call_limit(), 20);
    }

    #[test]
    fn only_limit_reasons_force_a_final_answer() {
        assert!(TerminationReason::BudgetExceeded.forces_final());
        assert!(TerminationReason::TurnLimit.forces_final());
        assert!(!TerminationReason::Completed.forces_final());
        assert!(!TerminationReason::Cancelled.forces_final());
        assert_eq!(
            serde_json::to_value(TerminationReason::BudgetExceeded).expect("serialise"),
            "budget_exceeded"
        );
    }
}
