//! Contributions that tie a phase to what happened right before it:
//! its previous attempt, the interrupt it resumes from, or the fact that
//! nothing happened yet.

use super::{ContributionContext, ContributionProvider, ContributionResult};
use crate::model::PhaseKind;

/// What the same phase did last time. Only present on retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviousAttemptProvider;

impl ContributionProvider for PreviousAttemptProvider {
    fn name(&self) -> &str {
        "previous-attempt"
    }

    fn priority(&self) -> i32 {
        10_000
    }

    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        ctx.previous_attempt.is_some()
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        let Some(previous) = ctx.previous_attempt else {
            return Ok(String::new());
        };
        let body = previous.pretty_print();
        if body.trim().is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "## Previous Attempt\n\n\
             This phase already ran. Build on the previous attempt instead of repeating it.\n\n{}\n",
            body.trim_end()
        ))
    }
}

/// Folds an interrupt resolution into the phase that raised it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptFeedbackProvider;

impl ContributionProvider for InterruptFeedbackProvider {
    fn name(&self) -> &str {
        "interrupt-feedback"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        ctx.request.interrupt_feedback.is_some()
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        let Some(feedback) = &ctx.request.interrupt_feedback else {
            return Ok(String::new());
        };
        // The resumed request is not in history yet, so the last one of this
        // kind is the request that raised the interrupt.
        let before = ctx
            .history
            .last_request(ctx.kind())
            .map(|(_, request)| request.pretty_print())
            .unwrap_or_else(|| "(none)".to_string());

        let mut out = format!(
            "## Interrupt Feedback\n\n\
             Interrupt {id} ({kind})\n\
             We asked: \"{reason}\"\n\
             Resolution: \"{resolution}\"\n",
            id = feedback.interrupt_id,
            kind = feedback.interrupt_type,
            reason = feedback.reason.trim(),
            resolution = feedback.resolution.trim(),
        );
        out.push_str(&format!("\nBefore Interrupt:\n{}\n", before.trim()));
        out.push_str(&format!(
            "\nAfter Interrupt:\n{}\n",
            ctx.request.pretty_print().trim()
        ));
        out.push_str(
            "\nInstructions:\n\
             Now that we have routed to an interrupt and been routed back with the desired \
             information, please continue the process to the next agent, as desired by the \
             standard workflow.\n",
        );
        Ok(out)
    }
}

const FIRST_REQUEST: &str = "## First Orchestrator Request

This is the first orchestrator request in a new workflow (no prior history).
Your job is to start discovery.

**Required routing for this step**
- Return an `advance` decision whose request kind is `discovery_orchestrator`, as the first step will be to perform discovery to achieve our goal.
- Do NOT return a new orchestrator request or route back to the Orchestrator.
- Do NOT route to the Orchestrator Collector or the Context Manager at this stage.

**Discovery request guidance**
- Set `goal` to a rich, detailed statement of the user's intent.
- Include scope, constraints, desired outcomes, and explicit preferences.
- If a phase was provided, incorporate it into the goal text.
- Do not set `context_id`.

Current orchestrator request summary:
";

/// Kick-off guidance for a run's very first Orchestrator invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOrchestratorRequestProvider;

impl ContributionProvider for FirstOrchestratorRequestProvider {
    fn name(&self) -> &str {
        "first-orchestrator-request"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn applicable_phases(&self) -> &[PhaseKind] {
        &[PhaseKind::Orchestrator]
    }

    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        ctx.kind() == PhaseKind::Orchestrator
            && ctx.history.requests_of(PhaseKind::Orchestrator).is_empty()
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        let summary = ctx.request.pretty_print();
        let summary = if ctx.request.goal.trim().is_empty() {
            "Goal: (none)".to_string()
        } else {
            summary.trim().to_string()
        };
        Ok(format!("{}{}", FIRST_REQUEST, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::history::{ExecutionHistory, HistoryPayload};
    use crate::model::{InterruptFeedback, InterruptType, PhaseRequest};
    use crate::previous::PreviousAttemptContext;

    #[test]
    fn test_first_orchestrator_only_once() {
        let config = EngineConfig::default();
        let mut history = ExecutionHistory::new();
        let request = PhaseRequest::new(PhaseKind::Orchestrator, "");
        let ctx = ContributionContext::new(&request, &history, &config);
        let provider = FirstOrchestratorRequestProvider;

        assert!(provider.applies_to(&ctx));
        assert!(provider.contribute(&ctx).unwrap().ends_with("Goal: (none)"));

        history
            .append("orchestrator", HistoryPayload::Request(request.clone()))
            .unwrap();
        let ctx = ContributionContext::new(&request, &history, &config);
        assert!(!provider.applies_to(&ctx));
    }

    #[test]
    fn test_interrupt_feedback_sections() {
        let config = EngineConfig::default();
        let mut history = ExecutionHistory::new();
        let origin = PhaseRequest::new(PhaseKind::PlanningCollector, "plan the work");
        history
            .append("planning_collector", HistoryPayload::Request(origin))
            .unwrap();

        let mut resumed = PhaseRequest::new(PhaseKind::PlanningCollector, "plan the work");
        resumed.interrupt_feedback = Some(InterruptFeedback {
            interrupt_id: "i-1".to_string(),
            interrupt_type: InterruptType::HumanReview,
            reason: "approve tickets?".to_string(),
            resolution: "approved".to_string(),
        });
        let ctx = ContributionContext::new(&resumed, &history, &config);
        let body = InterruptFeedbackProvider.contribute(&ctx).unwrap();

        assert!(body.contains("We asked: \"approve tickets?\""));
        assert!(body.contains("Before Interrupt:\nGoal: plan the work"));
        assert!(body.contains("After Interrupt:\nGoal: plan the work\nResumed after HUMAN_REVIEW"));
        assert!(body.contains("Instructions:"));
    }

    #[test]
    fn test_previous_attempt_applicability() {
        let config = EngineConfig::default();
        let mut history = ExecutionHistory::new();
        let request = PhaseRequest::new(PhaseKind::Review, "review");
        history
            .append("review", HistoryPayload::Request(request.clone()))
            .unwrap();
        let previous = PreviousAttemptContext::from_history(&history, PhaseKind::Review).unwrap();

        let ctx = ContributionContext::new(&request, &history, &config);
        assert!(!PreviousAttemptProvider.applies_to(&ctx));

        let ctx = ctx.with_previous_attempt(Some(&previous));
        let body = PreviousAttemptProvider.contribute(&ctx).unwrap();
        assert!(body.starts_with("## Previous Attempt"));
        assert!(body.contains("Attempt: 2"));
    }
}
