use serde::{Deserialize, Serialize};
use statline_core::config::SessionConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BudgetDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

impl BudgetDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Call and cost accounting for one session. Owned by exactly one orchestrator run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBudget {
    call_limit: u32,
    cost_limit: Option<u64>,
    calls_used: u32,
    cost_used: u64,
}

impl SessionBudget {
    /// `cost_limit` of `None` leaves cost unconstrained; only the call count applies.
    pub fn new(call_limit: u32, cost_limit: Option<u64>) -> Self {
        Self { call_limit, cost_limit, calls_used: 0, cost_used: 0 }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.call_limit, config.effective_cost_limit())
    }

    /// Whether a remote call costing `cost` may still be dispatched.
    pub fn check_call(&self, cost: u64) -> BudgetDecision {
        if self.calls_used >= self.call_limit {
            return BudgetDecision::Deny {
                reason_code: "call_limit_reached",
                user_message: format!(
                    "All {} remote calls for this session have been used.",
                    self.call_limit
                ),
            };
        }
        self.check_cost(cost)
    }

    /// Cost-only check, for charges that do not consume a call.
    pub fn check_cost(&self, cost: u64) -> BudgetDecision {
        match self.cost_limit {
            Some(limit) if self.cost_used.saturating_add(cost) > limit => BudgetDecision::Deny {
                reason_code: "cost_limit_reached",
                user_message: format!(
                    "A call costing {cost} would exceed the session cost limit ({} of {limit} used).",
                    self.cost_used
                ),
            },
            _ => BudgetDecision::Allow,
        }
    }

    pub fn charge_call(&mut self, cost: u64) {
        self.calls_used = self.calls_used.saturating_add(1);
        self.charge_cost(cost);
    }

    pub fn charge_cost(&mut self, cost: u64) {
        self.cost_used = self.cost_used.saturating_add(cost);
    }

    pub fn call_limit(&self) -> u32 {
        self.call_limit
    }

    pub fn cost_limit(&self) -> Option<u64> {
        self.cost_limit
    }

    pub fn calls_used(&self) -> u32 {
        self.calls_used
    }

    pub fn cost_used(&self) -> u64 {
        self.cost_used
    }

    pub fn calls_remaining(&self) -> u32 {
        self.call_limit.saturating_sub(self.calls_used)
    }

    pub fn cost_remaining(&self) -> Option<u64> {
        self.cost_limit.map(|limit| limit.saturating_sub(self.cost_used))
    }
}

#[cfg(test)]
mod tests {
    use super::{BudgetDecision, SessionBudget};

    #[test]
    fn call_limit_is_checked_before_cost() {
        let mut budget = SessionBudget::new(1, Some(10));
        assert_eq!(budget.check_call(2), BudgetDecision::Allow);

        budget.charge_call(2);
        let decision = budget.check_call(0);
        assert!(matches!(decision, BudgetDecision::Deny { reason_code: "call_limit_reached", .. }));
        assert_eq!(budget.calls_remaining(), 0);
        assert_eq!(budget.cost_remaining(), Some(8));
    }

    #[test]
    fn cost_limit_allows_exact_fit_but_not_overrun() {
        let mut budget = SessionBudget::new(10, Some(5));
        budget.charge_call(3);

        assert!(budget.check_call(2).is_allowed());
        assert!(matches!(
            budget.check_call(3),
            BudgetDecision::Deny { reason_code: "cost_limit_reached", .. }
        ));
    }

    #[test]
    fn unconstrained_cost_only_counts_calls() {
        let mut budget = SessionBudget::new(2, None);
        budget.charge_call(1_000);

        assert!(budget.check_call(u64::MAX).is_allowed());
        assert_eq!(budget.cost_remaining(), None);
    }

    #[test]
    fn cost_only_charges_leave_call_count_alone() {
        let mut budget = SessionBudget::new(1, Some(4));
        budget.charge_cost(3);

        assert_eq!(budget.calls_used(), 0);
        assert!(matches!(budget.check_cost(2), BudgetDecision::Deny { .. }));
        assert!(budget.check_cost(1).is_allowed());
    }

    #[test]
    fn snapshot_serialises_in_camel_case() {
        let value = serde_json::to_value(SessionBudget::new(3, None)).expect("serialise");
        assert_eq!(value["callLimit"], 3);
        assert_eq!(value["callsUsed"], 0);
        assert!(value["costLimit"].is_null());
    }
}
