//! Advisory guard against a phase that keeps routing to interrupts.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::history::ExecutionHistory;
use crate::model::{InterruptType, PhaseKind};
use crate::registry::{self, resolve_return_route};

/// One earlier interrupt of the same phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorInterrupt {
    pub interrupt_type: InterruptType,
    pub reason: String,
}

/// Corrective instruction for a phase stuck on interrupts. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptLoopAdvisory {
    pub phase: PhaseKind,
    pub interrupt_display: String,
    pub phase_display: String,
    pub count: usize,
    pub prior: Vec<PriorInterrupt>,
    pub correct_next_step: String,
    pub correct_routing_field: String,
}

impl InterruptLoopAdvisory {
    pub fn render(&self) -> String {
        let summary = if self.prior.is_empty() {
            "(No detailed interrupt history available)".to_string()
        } else {
            self.prior
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    format!("{}. Type: {} | Reason: {}", i + 1, p.interrupt_type, p.reason.trim())
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "## CRITICAL: Interrupt Loop Detected\n\n\
             You have routed to **{interrupt}** {count} time(s) already.\n\
             Each time, the interrupt was resolved and you were routed back here to **{phase}**, \
             but you keep producing another interrupt instead of progressing the workflow. \
             This is not advisable! You should be advancing the process.\n\n\
             ### Previous Interrupt Summary\n\
             {summary}\n\n\
             ### REQUIRED ACTION\n\
             **DO NOT** produce another `interruptRequest`. The information from the previous \
             interrupts has been incorporated. You MUST now proceed to the next workflow step.\n\n\
             **Set `{field}`** to produce a **{next}** and continue the workflow. Consolidate any \
             unresolved concerns from the interrupt feedback into the goal or context fields of \
             your routing output.\n\n\
             If you route to another interrupt, the workflow will fail.\n",
            interrupt = self.interrupt_display,
            count = self.count,
            phase = self.phase_display,
            summary = summary,
            field = self.correct_routing_field,
            next = self.correct_next_step,
        )
    }
}

/// Counts same-phase interrupts against a threshold.
#[derive(Debug, Clone)]
pub struct InterruptLoopGuard {
    pub threshold: usize,
}

impl Default for InterruptLoopGuard {
    fn default() -> Self {
        Self { threshold: 2 }
    }
}

impl InterruptLoopGuard {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn check(&self, history: &ExecutionHistory, kind: PhaseKind) -> Option<InterruptLoopAdvisory> {
        let interrupts = history.interrupts_of(kind);
        if interrupts.len() < self.threshold.max(1) {
            return None;
        }
        info!(phase = %kind, count = interrupts.len(), "Executing interrupt loop breaker logic");

        let (correct_next_step, correct_routing_field) = correct_next_step(kind, history);
        let node = registry::mapping(kind);
        Some(InterruptLoopAdvisory {
            phase: kind,
            interrupt_display: node.interrupt_display_name(),
            phase_display: node.display_name.to_string(),
            count: interrupts.len(),
            prior: interrupts
                .iter()
                .map(|i| PriorInterrupt {
                    interrupt_type: i.request.interrupt_type,
                    reason: i.request.reason.clone(),
                })
                .collect(),
            correct_next_step,
            correct_routing_field,
        })
    }
}

/// The step a phase should take instead of interrupting, and the field that produces it.
fn correct_next_step(kind: PhaseKind, history: &ExecutionHistory) -> (String, String) {
    let (step, field) = match kind {
        PhaseKind::Orchestrator => (
            "DiscoveryOrchestratorRequest or OrchestratorCollectorRequest",
            "discoveryOrchestratorRequest or collectorRequest",
        ),
        PhaseKind::OrchestratorCollector => (
            "OrchestratorCollectorResult with a CollectorDecision",
            "collectorResult",
        ),
        PhaseKind::DiscoveryOrchestrator => (
            "DiscoveryAgentRequests to dispatch discovery agents",
            "agentRequests",
        ),
        PhaseKind::DiscoveryAgent => ("DiscoveryAgentResult with discovery findings", "agentResult"),
        PhaseKind::DiscoveryCollector => (
            "DiscoveryCollectorResult with a CollectorDecision",
            "collectorResult",
        ),
        PhaseKind::DiscoveryAgentDispatch => (
            "DiscoveryCollectorRequest to consolidate results",
            "collectorRequest",
        ),
        PhaseKind::PlanningOrchestrator => (
            "PlanningAgentRequests to dispatch planning agents",
            "agentRequests",
        ),
        PhaseKind::PlanningAgent => ("PlanningAgentResult with planning tickets", "agentResult"),
        PhaseKind::PlanningCollector => (
            "PlanningCollectorResult with a CollectorDecision",
            "collectorResult",
        ),
        PhaseKind::PlanningAgentDispatch => (
            "PlanningCollectorRequest to consolidate results",
            "planningCollectorRequest",
        ),
        PhaseKind::TicketOrchestrator => (
            "TicketAgentRequests to dispatch ticket agents",
            "agentRequests",
        ),
        PhaseKind::TicketAgent => ("TicketAgentResult with implementation results", "agentResult"),
        PhaseKind::TicketCollector => (
            "TicketCollectorResult with a CollectorDecision",
            "collectorResult",
        ),
        PhaseKind::TicketAgentDispatch => (
            "TicketCollectorRequest to consolidate results",
            "ticketCollectorRequest",
        ),
        PhaseKind::Review => ("ReviewAgentResult with review findings", "reviewResult"),
        PhaseKind::Merger => ("MergerAgentResult with merge validation", "mergerResult"),
        PhaseKind::ContextManager | PhaseKind::ContextManagerRouting => {
            let route = resolve_return_route(history);
            return (route.next_step(), route.field_name().to_string());
        }
    };
    (step.to_string(), field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryPayload, InterruptPayload};
    use crate::model::{InterruptRequest, PhaseRequest};

    fn push_interrupt(history: &mut ExecutionHistory, kind: PhaseKind, reason: &str) {
        let payload = InterruptPayload {
            kind,
            interrupt_id: format!("int-{}", history.len()),
            origin_node_id: "origin".to_string(),
            request: InterruptRequest::new(InterruptType::HumanReview, reason),
        };
        history
            .append(
                format!("{}InterruptRequest", kind.type_stem()),
                HistoryPayload::Interrupt(payload),
            )
            .unwrap();
    }

    #[test]
    fn test_below_threshold_is_silent() {
        let mut history = ExecutionHistory::new();
        push_interrupt(&mut history, PhaseKind::DiscoveryCollector, "unsure");
        assert!(InterruptLoopGuard::default()
            .check(&history, PhaseKind::DiscoveryCollector)
            .is_none());
    }

    #[test]
    fn test_other_phase_interrupts_do_not_count() {
        let mut history = ExecutionHistory::new();
        push_interrupt(&mut history, PhaseKind::PlanningCollector, "a");
        push_interrupt(&mut history, PhaseKind::PlanningCollector, "b");
        assert!(InterruptLoopGuard::default()
            .check(&history, PhaseKind::DiscoveryCollector)
            .is_none());
    }

    #[test]
    fn test_advisory_renders_prior_interrupts() {
        let mut history = ExecutionHistory::new();
        push_interrupt(&mut history, PhaseKind::DiscoveryCollector, "need scope");
        push_interrupt(&mut history, PhaseKind::DiscoveryCollector, "still unsure");

        let advisory = InterruptLoopGuard::default()
            .check(&history, PhaseKind::DiscoveryCollector)
            .unwrap();
        assert_eq!(advisory.count, 2);
        assert_eq!(advisory.correct_routing_field, "collectorResult");

        let text = advisory.render();
        assert!(text.starts_with("## CRITICAL: Interrupt Loop Detected"));
        assert!(text.contains("You have routed to **Discovery Collector Interrupt** 2 time(s) already."));
        assert!(text.contains("1. Type: HUMAN_REVIEW | Reason: need scope"));
        assert!(text.contains("2. Type: HUMAN_REVIEW | Reason: still unsure"));
        assert!(text.contains("**Set `collectorResult`**"));
    }

    #[test]
    fn test_context_manager_uses_return_route() {
        let mut history = ExecutionHistory::new();
        history
            .append(
                "TicketCollectorRequest",
                HistoryPayload::Request(PhaseRequest::new(PhaseKind::TicketCollector, "g")),
            )
            .unwrap();
        push_interrupt(&mut history, PhaseKind::ContextManager, "x");
        push_interrupt(&mut history, PhaseKind::ContextManager, "y");

        let advisory = InterruptLoopGuard::default()
            .check(&history, PhaseKind::ContextManager)
            .unwrap();
        assert_eq!(advisory.correct_routing_field, "ticketCollectorRequest");
        assert_eq!(
            advisory.correct_next_step,
            "Ticket Collector (TicketCollectorRequest)"
        );
    }

    #[test]
    fn test_context_manager_without_route_falls_back() {
        let mut history = ExecutionHistory::new();
        push_interrupt(&mut history, PhaseKind::ContextManager, "x");
        push_interrupt(&mut history, PhaseKind::ContextManager, "y");
        let advisory = InterruptLoopGuard::default()
            .check(&history, PhaseKind::ContextManager)
            .unwrap();
        assert_eq!(advisory.correct_routing_field, "orchestratorRequest");
    }
}
