use std::time::Instant as StdInstant;

use chrono::Utc;
use serde_json::json;
use statline_core::trace::{summarize_payload, truncate_chars};
use statline_core::{CallError, DiscoveryService, SessionTrace, TraceEntry, TraceOutcome, TraceTool};
use statline_gateway::{CallRequest, EndpointGateway};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::budget::{BudgetDecision, SessionBudget};
use crate::driver::{AgentDriver, AgentIntent, AgentTurn, FinalRequest, ToolFeedback};
use crate::session::{FinalAnswer, SessionOutcome, SessionSettings, SessionState, TerminationReason};

pub const FORCED_FINAL_INSTRUCTION: &str = "The session budget is exhausted. Do not request more \
    data. Give the best answer the information gathered so far supports, and state explicitly \
    which parts are uncertain or unverified.";

enum Interrupt {
    Cancelled,
    Deadline,
}

impl Interrupt {
    fn detail(&self) -> &'static str {
        match self {
            Self::Cancelled => "session cancelled by host",
            Self::Deadline => "session deadline exceeded",
        }
    }
}

async fn interrupted(cancel: &CancellationToken, deadline: Option<Instant>) -> Interrupt {
    match deadline {
        Some(at) => tokio::select! {
            _ = cancel.cancelled() => Interrupt::Cancelled,
            _ = tokio::time::sleep_until(at) => Interrupt::Deadline,
        },
        None => {
            cancel.cancelled().await;
            Interrupt::Cancelled
        }
    }
}

/// Mutable state of one run. Never shared between sessions.
struct Session {
    id: Uuid,
    state: SessionState,
    budget: SessionBudget,
    trace: SessionTrace,
    turns: u32,
    feedback: Option<ToolFeedback>,
    started_at: chrono::DateTime<Utc>,
}

impl Session {
    fn record(&mut self, entry: TraceEntry) {
        let (calls, cost) = (self.budget.calls_used(), self.budget.cost_used());
        self.trace.append(entry, calls, cost);
    }

    fn finish(
        self,
        reason: TerminationReason,
        final_answer: Option<FinalAnswer>,
        detail: Option<String>,
    ) -> SessionOutcome {
        info!(
            event_name = "session.terminated",
            session_id = %self.id,
            reason = %reason,
            from_state = ?self.state,
            turns = self.turns,
            calls_used = self.budget.calls_used(),
            cost_used = self.budget.cost_used(),
            trace_len = self.trace.len(),
            "session terminated"
        );
        SessionOutcome {
            session_id: self.id,
            reason,
            detail,
            final_answer,
            turns: self.turns,
            budget: self.budget,
            trace: self.trace,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Runs agent sessions against one gateway, enforcing the configured budget.
///
/// The orchestrator itself holds only shared read-only state; each [`Orchestrator::run`]
/// owns its budget and trace.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: EndpointGateway,
    discovery: DiscoveryService,
    settings: SessionSettings,
}

impl Orchestrator {
    pub fn new(gateway: EndpointGateway, settings: SessionSettings) -> Self {
        let discovery = DiscoveryService::new(gateway.catalog().clone());
        Self { gateway, discovery, settings }
    }

    pub async fn run<A>(&self, agent: &mut A, cancel: CancellationToken) -> SessionOutcome
    where
        A: AgentDriver + ?Sized,
    {
        let deadline = self.settings.deadline.map(|deadline| Instant::now() + deadline);
        let mut session = Session {
            id: Uuid::new_v4(),
            state: SessionState::AwaitingIntent,
            budget: self.settings.budget(),
            trace: SessionTrace::default(),
            turns: 0,
            feedback: None,
            started_at: Utc::now(),
        };
        info!(
            event_name = "session.started",
            session_id = %session.id,
            call_limit = session.budget.call_limit(),
            cost_limit = ?session.budget.cost_limit(),
            max_turns = self.settings.max_turns,
            "session started"
        );

        loop {
            if session.turns >= self.settings.max_turns {
                warn!(
                    event_name = "session.turn_limit",
                    session_id = %session.id,
                    turns = session.turns,
                    "turn limit reached"
                );
                return self
                    .terminate(agent, session, TerminationReason::TurnLimit, &cancel, deadline)
                    .await;
            }

            session.state = SessionState::AwaitingIntent;
            let turn = AgentTurn {
                turn: session.turns + 1,
                budget: session.budget.clone(),
                feedback: session.feedback.take(),
            };

            let intent = tokio::select! {
                biased;
                interrupt = interrupted(&cancel, deadline) => {
                    let detail = interrupt.detail().to_string();
                    return session.finish(TerminationReason::Cancelled, None, Some(detail));
                }
                intent = agent.next_intent(&turn) => intent,
            };
            session.turns += 1;

            let intent = match intent {
                Ok(intent) => intent,
                Err(error) => {
                    warn!(
                        event_name = "session.agent_failed",
                        session_id = %session.id,
                        error = %format!("{error:#}"),
                        "agent failed to produce an intent"
                    );
                    let detail = format!("{error:#}");
                    return session.finish(TerminationReason::AgentFailed, None, Some(detail));
                }
            };

            match intent {
                AgentIntent::Final { answer } => {
                    let answer = FinalAnswer { answer, forced: false, uncertainty: None };
                    return session.finish(TerminationReason::Completed, Some(answer), None);
                }
                AgentIntent::Discover { category, call_id } => {
                    if let Err(reason) = self.discover(&mut session, category, call_id) {
                        return self.terminate(agent, session, reason, &cancel, deadline).await;
                    }
                }
                AgentIntent::Call { request, call_id } => {
                    match self.call(&mut session, request, call_id, &cancel, deadline).await {
                        Ok(()) => {}
                        Err(Stop::Limit(reason)) => {
                            return self.terminate(agent, session, reason, &cancel, deadline).await;
                        }
                        Err(Stop::Interrupted(interrupt)) => {
                            let detail = interrupt.detail().to_string();
                            return session.finish(TerminationReason::Cancelled, None, Some(detail));
                        }
                    }
                }
            }
        }
    }

    fn discover(
        &self,
        session: &mut Session,
        category: Option<String>,
        call_id: Option<String>,
    ) -> Result<(), TerminationReason> {
        let cost = self.settings.discovery_cost;
        if let BudgetDecision::Deny { reason_code, user_message } = session.budget.check_cost(cost) {
            warn!(
                event_name = "session.budget_exceeded",
                session_id = %session.id,
                reason_code,
                detail = %user_message,
                "discovery denied by budget"
            );
            return Err(TerminationReason::BudgetExceeded);
        }
        session.budget.charge_cost(cost);

        let endpoints = self.discovery.list(category.as_deref());
        debug!(
            event_name = "session.discovery",
            session_id = %session.id,
            category = ?category,
            endpoints = endpoints.len(),
            "endpoints listed"
        );

        if self.settings.record_discovery {
            let entry = TraceEntry::new(
                TraceTool::ListEndpoints,
                json!({ "category": category }),
                TraceOutcome::Ok,
            )
            .with_call_id(call_id.clone())
            .with_summary(format!("{} endpoints", endpoints.len()))
            .with_cost(cost);
            session.record(entry);
        }

        session.feedback = Some(ToolFeedback::Endpoints { call_id, endpoints });
        Ok(())
    }

    async fn call(
        &self,
        session: &mut Session,
        request: CallRequest,
        call_id: Option<String>,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), Stop> {
        session.state = SessionState::BudgetCheck;
        let candidate_cost = self.gateway.cost_of(&request.path_template).unwrap_or(0);
        if let BudgetDecision::Deny { reason_code, user_message } =
            session.budget.check_call(candidate_cost)
        {
            warn!(
                event_name = "session.budget_exceeded",
                session_id = %session.id,
                path_template = %request.path_template,
                reason_code,
                detail = %user_message,
                "call denied by budget"
            );
            return Err(Stop::Limit(TerminationReason::BudgetExceeded));
        }

        let prepared = match self.gateway.prepare(&request) {
            Ok(prepared) => prepared,
            Err(error) => {
                debug!(
                    event_name = "session.call.rejected",
                    session_id = %session.id,
                    error_kind = error.error_kind(),
                    "validation failure returned to agent uncharged"
                );
                session.feedback = Some(ToolFeedback::Failure { call_id, failure: error.into() });
                return Ok(());
            }
        };

        session.state = SessionState::Dispatch;
        session.budget.charge_call(prepared.cost);
        let params = json!({
            "pathTemplate": request.path_template,
            "pathParams": request.path_params,
            "queryParams": request.query_params,
        });
        let started = StdInstant::now();

        let result = tokio::select! {
            biased;
            interrupt = interrupted(cancel, deadline) => Err(interrupt),
            result = self.gateway.dispatch(&prepared) => Ok(result),
        };

        let entry = TraceEntry::new(TraceTool::CallEndpoint, params, TraceOutcome::Ok)
            .with_call_id(call_id.clone())
            .with_target(prepared.base, prepared.resolved_path.clone())
            .with_cost(prepared.cost)
            .with_elapsed_ms(started.elapsed().as_millis() as u64);

        match result {
            Err(interrupt) => {
                let mut entry = entry.with_summary(interrupt.detail());
                entry.outcome = TraceOutcome::Cancelled;
                session.record(entry);
                Err(Stop::Interrupted(interrupt))
            }
            Ok(Ok(call_result)) => {
                let summary = summarize_payload(&call_result.payload, self.settings.summary_max_chars);
                session.record(entry.with_summary(summary));
                session.feedback =
                    Some(ToolFeedback::Payload { call_id, payload: call_result.payload });
                Ok(())
            }
            Ok(Err(error)) => {
                session.record(failed_entry(entry, &error, self.settings.summary_max_chars));
                session.feedback = Some(ToolFeedback::Failure { call_id, failure: error.into() });
                Ok(())
            }
        }
    }

    /// Ends the session for `reason`, asking the agent for a best-effort answer first when the
    /// reason calls for one.
    async fn terminate<A>(
        &self,
        agent: &mut A,
        session: Session,
        reason: TerminationReason,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> SessionOutcome
    where
        A: AgentDriver + ?Sized,
    {
        if reason.forces_final() {
            self.finish_forced(agent, session, reason, cancel, deadline).await
        } else {
            session.finish(reason, None, None)
        }
    }

    async fn finish_forced<A>(
        &self,
        agent: &mut A,
        session: Session,
        reason: TerminationReason,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> SessionOutcome
    where
        A: AgentDriver + ?Sized,
    {
        let request = FinalRequest {
            reason,
            instruction: FORCED_FINAL_INSTRUCTION.to_string(),
            budget: session.budget.clone(),
        };

        let answer = tokio::select! {
            biased;
            interrupt = interrupted(cancel, deadline) => {
                let detail = interrupt.detail().to_string();
                return session.finish(TerminationReason::Cancelled, None, Some(detail));
            }
            answer = agent.force_final(&request) => answer,
        };

        let answer = answer.unwrap_or_else(|error| {
            warn!(
                event_name = "session.force_final_failed",
                session_id = %session.id,
                reason = %reason,
                error = %format!("{error:#}"),
                "agent could not produce a final answer, synthesising one"
            );
            json!({
                "status": reason.as_str(),
                "calls_used": session.budget.calls_used(),
                "cost_used": session.budget.cost_used(),
            })
        });

        let final_answer = FinalAnswer {
            answer,
            forced: true,
            uncertainty: Some(uncertainty_note(reason, &session.budget)),
        };
        session.finish(reason, Some(final_answer), None)
    }
}

enum Stop {
    Limit(TerminationReason),
    Interrupted(Interrupt),
}

fn failed_entry(entry: TraceEntry, error: &CallError, max_chars: usize) -> TraceEntry {
    let mut entry = entry.with_summary(truncate_chars(&error.to_string(), max_chars));
    entry.outcome = TraceOutcome::Error { error_kind: error.error_kind().to_string() };
    entry
}

fn uncertainty_note(reason: TerminationReason, budget: &SessionBudget) -> String {
    let limit = match reason {
        TerminationReason::TurnLimit => "the turn limit",
        _ => "the session budget",
    };
    format!(
        "Answer produced after reaching {limit} ({} of {} calls, cost {} used); \
         it rests only on data gathered so far and may be incomplete.",
        budget.calls_used(),
        budget.call_limit(),
        budget.cost_used()
    )
}
