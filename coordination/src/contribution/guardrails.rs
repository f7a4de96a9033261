//! Guardrail contributions: the context-manager escape hatch, the return
//! route out of context reconstruction, the orchestrator route-back check and
//! the interrupt loop breaker.

use super::{
    ContributionContext, ContributionFactory, ContributionProvider, ContributionResult,
    StaticContribution,
};
use crate::loop_detect::InterruptLoopGuard;
use crate::model::PhaseKind;
use crate::registry::{self, branches_for, resolve_return_route, ReturnRoute};

/// History must hold at least this many records before a phase is told it
/// can ask for context reconstruction.
const CONTEXT_ROUTING_MIN_HISTORY: usize = 3;

const CONTEXT_ROUTING: &str = "## Context Manager Routing Option

You have the ability to route to the **Context Manager** agent. The Context Manager has
access to tools that can query and retrieve the shared state across all agents in the
workflow. This includes the execution history, the artifact store, and execution traces
from previous agent invocations.

### When to Route to Context Manager

Route to Context Manager by populating `contextManagerRequest` in your routing response when
you need more context from a previous agent's execution:

- **Missing execution details** - You need to understand what a previous agent discovered,
  decided, or produced, but that information was not passed forward in the request
- **Incomplete handoff** - The upstream agent's results are truncated or summarized, and
  you need the full details to proceed
- **Cross-phase context** - You need information from an earlier workflow phase (e.g.,
  discovery findings while in planning, or planning decisions while executing tickets)
- **Artifact retrieval** - You need to access artifacts, curations, or intermediate results
  that were produced but not included in your current request

### Context Manager Capabilities

The Context Manager can:
1. Query the execution history to retrieve previous agent requests and results
2. Access the artifact store to find curations and other persisted data
3. Trace the execution path to understand how the workflow reached the current state
4. Reconstruct context from multiple sources and consolidate it for your use

### Important

- Only route to Context Manager when you genuinely need context from previous execution
- Be specific about what information you need so the Context Manager can retrieve it efficiently
- The Context Manager will reconstruct the needed context and route back to continue your work
";

/// Offers context reconstruction to orchestration phases once there is
/// history worth reconstructing. The root Orchestrator is not offered it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextManagerRoutingProvider;

impl ContributionProvider for ContextManagerRoutingProvider {
    fn name(&self) -> &str {
        "context-manager-routing"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn applicable_phases(&self) -> &[PhaseKind] {
        use PhaseKind::*;
        &[
            DiscoveryOrchestrator,
            DiscoveryAgentDispatch,
            DiscoveryCollector,
            PlanningOrchestrator,
            PlanningAgentDispatch,
            PlanningCollector,
            TicketOrchestrator,
            TicketAgentDispatch,
            TicketCollector,
            OrchestratorCollector,
        ]
    }

    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        self.applicable_phases().contains(&ctx.kind())
            && ctx.history.len() >= CONTEXT_ROUTING_MIN_HISTORY
    }

    fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        Ok(CONTEXT_ROUTING.to_string())
    }
}

/// Tells the Context Manager which phase to hand control back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnRouteProvider;

impl ContributionProvider for ReturnRouteProvider {
    fn name(&self) -> &str {
        "context-manager-return-route"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn applicable_phases(&self) -> &[PhaseKind] {
        &[PhaseKind::ContextManager]
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        let routing_type = registry::mapping(ctx.kind()).routing_type_name();
        let route = resolve_return_route(ctx.history);
        let body = match &route {
            ReturnRoute::Resolved {
                kind,
                field_name,
                display_name,
            } => {
                let agent_context = ctx
                    .history
                    .last_non_context_request()
                    .map(|r| r.pretty_print())
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "(No detailed context available)".to_string());
                format!(
                    "## Context Manager Return Route\n\n\
                     The last active agent before the Context Manager was invoked was \
                     **{display}** (`{request_type}`).\n\n\
                     ### Previous Agent Context\n{agent_context}\n\n\
                     ### Required Routing\n\
                     You MUST set `{field}` on your `{routing_type}` response to route back to \
                     the **{display}**. Populate it with the relevant context gathered from the \
                     context manager tools, incorporating what the agent needs to continue its work.\n\n\
                     Do not route to a different agent unless you have a strong reason. The \
                     workflow expects to return to the agent that requested context.\n",
                    display = display_name,
                    request_type = kind.request_type_name(),
                    agent_context = agent_context.trim(),
                    field = field_name,
                    routing_type = routing_type,
                )
            }
            ReturnRoute::Fallback => format!(
                "## Context Manager Return Route\n\n\
                 No previous agent could be identified from the execution history. You should \
                 route back to the **Orchestrator** to re-establish workflow direction.\n\n\
                 ### Required Routing\n\
                 Set `{field}` on your `{routing_type}` response with:\n\
                 - A clearly defined `goal` that summarizes the current workflow state and what \
                 needs to happen next, based on the context you have gathered\n\
                 - Include any relevant context from your tools in the goal description\n\n\
                 This ensures the workflow resumes with clear direction rather than getting stuck.\n",
                field = ReturnRoute::FALLBACK_FIELD,
                routing_type = routing_type,
            ),
        };
        Ok(body)
    }
}

const ORCHESTRATOR_ROUTE_BACK: &str = "## Orchestrator Route-Back Clarification Guardrail

If you are considering routing to `orchestratorRequest`, do not route immediately.
First emit an `interruptRequest` that explains:
- why routing back to Orchestrator is required
- what is unresolved
- what decision or confirmation is needed

After clarification is received, route to Orchestrator with the clarified context if it
confirms the route-back is required. Otherwise continue with normal phase progression.
";

/// Asks phases that can route back to the Orchestrator to interrupt for
/// clarification first. Requests that already carry an interrupt resolution
/// are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorRouteBackProvider;

impl OrchestratorRouteBackProvider {
    /// Whether `kind` lists a branch leading back to the root Orchestrator.
    pub fn routes_back(kind: PhaseKind) -> bool {
        kind != PhaseKind::Orchestrator
            && branches_for(kind)
                .iter()
                .any(|b| b.target == Some(PhaseKind::Orchestrator))
    }
}

impl ContributionProvider for OrchestratorRouteBackProvider {
    fn name(&self) -> &str {
        "orchestrator-route-back-interrupt-guardrail"
    }

    fn priority(&self) -> i32 {
        46
    }

    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        ctx.request.interrupt_feedback.is_none() && Self::routes_back(ctx.kind())
    }

    fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        Ok(ORCHESTRATOR_ROUTE_BACK.to_string())
    }
}

/// Emits the corrective advisory when a phase keeps producing interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptLoopBreakerFactory;

impl ContributionFactory for InterruptLoopBreakerFactory {
    fn name(&self) -> &str {
        "interrupt-loop-breaker"
    }

    fn create(
        &self,
        ctx: &ContributionContext<'_>,
    ) -> ContributionResult<Vec<Box<dyn ContributionProvider>>> {
        let guard = InterruptLoopGuard::new(ctx.config.interrupt_loop_threshold);
        let Some(advisory) = guard.check(ctx.history, ctx.kind()) else {
            return Ok(Vec::new());
        };
        Ok(vec![Box::new(StaticContribution::new(
            self.name(),
            5,
            advisory.render(),
        ))])
    }
}
