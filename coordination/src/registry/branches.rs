//! Static routing tables: branches per phase, collector decisions, fan-out
//! targets and the history each phase is allowed to see.

use crate::curation::CurationFamily;
use crate::model::PhaseKind;

use super::{display_name, mapping};

/// One routing field a phase may set, and where it leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingBranch {
    pub field_name: &'static str,
    /// `None` for interrupt and result branches.
    pub target: Option<PhaseKind>,
    pub description: &'static str,
}

const fn branch(
    field_name: &'static str,
    target: Option<PhaseKind>,
    description: &'static str,
) -> RoutingBranch {
    RoutingBranch {
        field_name,
        target,
        description,
    }
}

use PhaseKind::*;

const INTERRUPT: RoutingBranch = branch(
    "interruptRequest",
    None,
    "Interrupt (HUMAN_REVIEW, AGENT_REVIEW, PAUSE, STOP)",
);
const CONTEXT: RoutingBranch = branch(
    "contextManagerRequest",
    Some(ContextManagerRouting),
    "Context Manager",
);
const COLLECTOR_RESULT: RoutingBranch = branch(
    "collectorResult",
    None,
    "Collector result with CollectorDecision",
);
const REVIEW: RoutingBranch = branch("reviewRequest", Some(Review), "Review Agent");
const MERGER: RoutingBranch = branch("mergerRequest", Some(Merger), "Merger Agent");

const ORCHESTRATOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("collectorRequest", Some(OrchestratorCollector), "Orchestrator Collector"),
    branch("orchestratorRequest", Some(DiscoveryOrchestrator), "Discovery Orchestrator"),
    CONTEXT,
];

const DISCOVERY_ORCHESTRATOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentRequests", Some(DiscoveryAgent), "Discovery Agents (dispatch)"),
    branch("collectorRequest", Some(DiscoveryCollector), "Discovery Collector"),
    CONTEXT,
];

const DISCOVERY_DISPATCH_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("collectorRequest", Some(DiscoveryCollector), "Discovery Collector"),
    CONTEXT,
];

const DISCOVERY_AGENT_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentResult", None, "Discovery results"),
    branch("planningOrchestratorRequest", Some(PlanningOrchestrator), "Planning Orchestrator"),
    CONTEXT,
];

const DISCOVERY_COLLECTOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    COLLECTOR_RESULT,
    branch("orchestratorRequest", Some(Orchestrator), "Orchestrator"),
    branch("discoveryRequest", Some(DiscoveryOrchestrator), "Discovery Orchestrator"),
    branch("planningRequest", Some(PlanningOrchestrator), "Planning Orchestrator"),
    branch("ticketRequest", Some(TicketOrchestrator), "Ticket Orchestrator"),
    REVIEW,
    MERGER,
    CONTEXT,
];

const PLANNING_ORCHESTRATOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentRequests", Some(PlanningAgent), "Planning Agents (dispatch)"),
    branch("collectorRequest", Some(PlanningCollector), "Planning Collector"),
    CONTEXT,
];

const PLANNING_DISPATCH_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("planningCollectorRequest", Some(PlanningCollector), "Planning Collector"),
    CONTEXT,
];

const PLANNING_AGENT_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentResult", None, "Planning results"),
    CONTEXT,
];

const PLANNING_COLLECTOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    COLLECTOR_RESULT,
    branch("planningRequest", Some(PlanningOrchestrator), "Planning Orchestrator"),
    branch("ticketOrchestratorRequest", Some(TicketOrchestrator), "Ticket Orchestrator"),
    branch("discoveryOrchestratorRequest", Some(DiscoveryOrchestrator), "Discovery Orchestrator"),
    branch("orchestratorCollectorRequest", Some(OrchestratorCollector), "Orchestrator Collector"),
    REVIEW,
    MERGER,
    CONTEXT,
];

const TICKET_ORCHESTRATOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentRequests", Some(TicketAgent), "Ticket Agents (dispatch)"),
    branch("collectorRequest", Some(TicketCollector), "Ticket Collector"),
    CONTEXT,
];

const TICKET_DISPATCH_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("ticketCollectorRequest", Some(TicketCollector), "Ticket Collector"),
    CONTEXT,
];

const TICKET_AGENT_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("agentResult", None, "Ticket results"),
    CONTEXT,
];

const TICKET_COLLECTOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    COLLECTOR_RESULT,
    branch("ticketRequest", Some(TicketOrchestrator), "Ticket Orchestrator"),
    branch("orchestratorCollectorRequest", Some(OrchestratorCollector), "Orchestrator Collector"),
    REVIEW,
    MERGER,
    CONTEXT,
];

const ORCHESTRATOR_COLLECTOR_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    COLLECTOR_RESULT,
    branch("orchestratorRequest", Some(Orchestrator), "Orchestrator"),
    branch("discoveryRequest", Some(DiscoveryOrchestrator), "Discovery Orchestrator"),
    branch("planningRequest", Some(PlanningOrchestrator), "Planning Orchestrator"),
    branch("ticketRequest", Some(TicketOrchestrator), "Ticket Orchestrator"),
    REVIEW,
    MERGER,
    CONTEXT,
];

const RETURN_TO_COLLECTOR: [RoutingBranch; 4] = [
    branch("orchestratorCollectorRequest", Some(OrchestratorCollector), "Orchestrator Collector"),
    branch("discoveryCollectorRequest", Some(DiscoveryCollector), "Discovery Collector"),
    branch("planningCollectorRequest", Some(PlanningCollector), "Planning Collector"),
    branch("ticketCollectorRequest", Some(TicketCollector), "Ticket Collector"),
];

const REVIEW_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("reviewResult", None, "Review results"),
    RETURN_TO_COLLECTOR[0],
    RETURN_TO_COLLECTOR[1],
    RETURN_TO_COLLECTOR[2],
    RETURN_TO_COLLECTOR[3],
    CONTEXT,
];

const MERGER_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("mergerResult", None, "Merger results"),
    RETURN_TO_COLLECTOR[0],
    RETURN_TO_COLLECTOR[1],
    RETURN_TO_COLLECTOR[2],
    RETURN_TO_COLLECTOR[3],
    CONTEXT,
];

const CONTEXT_MANAGER_BRANCHES: &[RoutingBranch] = &[
    INTERRUPT,
    branch("orchestratorRequest", Some(Orchestrator), "Orchestrator"),
    RETURN_TO_COLLECTOR[0],
    branch("discoveryOrchestratorRequest", Some(DiscoveryOrchestrator), "Discovery Orchestrator"),
    RETURN_TO_COLLECTOR[1],
    branch("planningOrchestratorRequest", Some(PlanningOrchestrator), "Planning Orchestrator"),
    RETURN_TO_COLLECTOR[2],
    branch("ticketOrchestratorRequest", Some(TicketOrchestrator), "Ticket Orchestrator"),
    RETURN_TO_COLLECTOR[3],
    REVIEW,
    MERGER,
    branch("planningAgentRequest", Some(PlanningAgent), "Planning Agent"),
    branch("planningAgentRequests", Some(PlanningAgentDispatch), "Planning Agent Dispatch"),
    branch("ticketAgentRequest", Some(TicketAgent), "Ticket Agent"),
    branch("ticketAgentRequests", Some(TicketAgentDispatch), "Ticket Agent Dispatch"),
    branch("discoveryAgentRequest", Some(DiscoveryAgent), "Discovery Agent"),
    branch("discoveryAgentRequests", Some(DiscoveryAgentDispatch), "Discovery Agent Dispatch"),
    branch("contextOrchestratorRequest", Some(ContextManagerRouting), "Context Manager (recursive)"),
];

const CONTEXT_ROUTING_BRANCHES: &[RoutingBranch] = &[branch(
    "contextManagerRequest",
    Some(ContextManager),
    "Context Manager (reason and reconstruction type)",
)];

/// Routing fields available from `kind`, interrupt first.
pub fn branches_for(kind: PhaseKind) -> &'static [RoutingBranch] {
    match kind {
        Orchestrator => ORCHESTRATOR_BRANCHES,
        DiscoveryOrchestrator => DISCOVERY_ORCHESTRATOR_BRANCHES,
        DiscoveryAgentDispatch => DISCOVERY_DISPATCH_BRANCHES,
        DiscoveryAgent => DISCOVERY_AGENT_BRANCHES,
        DiscoveryCollector => DISCOVERY_COLLECTOR_BRANCHES,
        PlanningOrchestrator => PLANNING_ORCHESTRATOR_BRANCHES,
        PlanningAgentDispatch => PLANNING_DISPATCH_BRANCHES,
        PlanningAgent => PLANNING_AGENT_BRANCHES,
        PlanningCollector => PLANNING_COLLECTOR_BRANCHES,
        TicketOrchestrator => TICKET_ORCHESTRATOR_BRANCHES,
        TicketAgentDispatch => TICKET_DISPATCH_BRANCHES,
        TicketAgent => TICKET_AGENT_BRANCHES,
        TicketCollector => TICKET_COLLECTOR_BRANCHES,
        OrchestratorCollector => ORCHESTRATOR_COLLECTOR_BRANCHES,
        Review => REVIEW_BRANCHES,
        Merger => MERGER_BRANCHES,
        ContextManager => CONTEXT_MANAGER_BRANCHES,
        ContextManagerRouting => CONTEXT_ROUTING_BRANCHES,
    }
}

/// Whether `from` lists a branch leading to `to`.
///
/// Both context reconstruction phases count as one destination.
pub fn is_listed_target(from: PhaseKind, to: PhaseKind) -> bool {
    branches_for(from).iter().any(|b| match b.target {
        Some(target) if target == to => true,
        Some(target) => target.is_context_manager() && to.is_context_manager(),
        None => false,
    })
}

/// Where a collector's `collectorResult` leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorRoutes {
    /// `None` completes the run.
    pub advance: Option<PhaseKind>,
    pub advance_field: &'static str,
    pub route_back: PhaseKind,
    pub route_back_field: &'static str,
}

pub fn collector_routes(kind: PhaseKind) -> Option<CollectorRoutes> {
    let routes = match kind {
        DiscoveryCollector => CollectorRoutes {
            advance: Some(PlanningOrchestrator),
            advance_field: "planningRequest",
            route_back: DiscoveryOrchestrator,
            route_back_field: "discoveryRequest",
        },
        PlanningCollector => CollectorRoutes {
            advance: Some(TicketOrchestrator),
            advance_field: "ticketOrchestratorRequest",
            route_back: PlanningOrchestrator,
            route_back_field: "planningRequest",
        },
        TicketCollector => CollectorRoutes {
            advance: Some(OrchestratorCollector),
            advance_field: "orchestratorCollectorRequest",
            route_back: TicketOrchestrator,
            route_back_field: "ticketRequest",
        },
        OrchestratorCollector => CollectorRoutes {
            advance: None,
            advance_field: "COMPLETE",
            route_back: Orchestrator,
            route_back_field: "orchestratorRequest",
        },
        _ => return None,
    };
    Some(routes)
}

/// The agent and dispatch phases an orchestrator fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub agent: PhaseKind,
    pub dispatch: PhaseKind,
    pub collector: PhaseKind,
}

pub fn fan_out_for(kind: PhaseKind) -> Option<FanOut> {
    match kind {
        DiscoveryOrchestrator => Some(FanOut {
            agent: DiscoveryAgent,
            dispatch: DiscoveryAgentDispatch,
            collector: DiscoveryCollector,
        }),
        PlanningOrchestrator => Some(FanOut {
            agent: PlanningAgent,
            dispatch: PlanningAgentDispatch,
            collector: PlanningCollector,
        }),
        TicketOrchestrator => Some(FanOut {
            agent: TicketAgent,
            dispatch: TicketAgentDispatch,
            collector: TicketCollector,
        }),
        _ => None,
    }
}

/// History a phase may see in its curation narrative.
///
/// Interrupts and orchestrator, review and merger results are always visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedHistory {
    /// Collector curations.
    pub curations: &'static [CurationFamily],
    /// Individual sub-agent results, by family.
    pub agent_results: &'static [CurationFamily],
}

impl AllowedHistory {
    pub fn allows_curation(&self, family: CurationFamily) -> bool {
        self.curations.contains(&family)
    }

    pub fn allows_agent_result(&self, family: CurationFamily) -> bool {
        self.agent_results.contains(&family)
    }
}

const EVERY_FAMILY: &[CurationFamily] = &CurationFamily::ALL;

pub fn allowed_history(kind: PhaseKind) -> AllowedHistory {
    use CurationFamily::{Discovery, Planning, Ticket};
    let (curations, agent_results): (&'static [CurationFamily], &'static [CurationFamily]) =
        match kind {
            // A collector never sees the curation it is about to replace.
            DiscoveryCollector => (&[Planning, Ticket], EVERY_FAMILY),
            PlanningCollector => (&[Discovery, Ticket], EVERY_FAMILY),
            DiscoveryAgentDispatch => (&[], &[Discovery]),
            PlanningAgentDispatch => (&[Discovery], &[Discovery, Planning]),
            TicketAgentDispatch => (&[Discovery, Planning], EVERY_FAMILY),
            _ => (EVERY_FAMILY, EVERY_FAMILY),
        };
    AllowedHistory {
        curations,
        agent_results,
    }
}

/// Main chain of the workflow graph in happy-path order.
pub const MAIN_CHAIN: [PhaseKind; 14] = [
    Orchestrator,
    DiscoveryOrchestrator,
    DiscoveryAgentDispatch,
    DiscoveryAgent,
    DiscoveryCollector,
    PlanningOrchestrator,
    PlanningAgentDispatch,
    PlanningAgent,
    PlanningCollector,
    TicketOrchestrator,
    TicketAgentDispatch,
    TicketAgent,
    TicketCollector,
    OrchestratorCollector,
];

/// Nodes reachable from collectors that route back to them.
pub const SIDE_NODES: [PhaseKind; 3] = [Review, Merger, ContextManager];

/// Graph nodes as `(main chain, side nodes)`.
pub fn graph_order() -> (&'static [PhaseKind], &'static [PhaseKind]) {
    (&MAIN_CHAIN, &SIDE_NODES)
}

const INTERRUPT_GUIDANCE: &str = "\n**Interrupt guidance:** If uncertain, emit an `interruptRequest`. \
You may emit interrupts multiple times if more context is needed. Include `reason`, \
`contextForDecision` and `choices`.\n";

const CONTEXT_GUIDANCE: &str = "\n**Context guidance:** To request context reconstruction, set \
`contextManagerRequest` with a reason and a reconstruction type.\n";

fn happy_path(kind: PhaseKind) -> &'static str {
    match kind {
        Orchestrator => {
            "For a new workflow, set `orchestratorRequest` to start discovery. \
             Only set `collectorRequest` when ALL workflow phases are complete."
        }
        DiscoveryOrchestrator | PlanningOrchestrator | TicketOrchestrator => {
            "Set `agentRequests` to dispatch work, then later set `collectorRequest` \
             when the agents have produced enough to consolidate."
        }
        DiscoveryAgentDispatch => "Set `collectorRequest` to consolidate discovery results.",
        PlanningAgentDispatch => {
            "Set `planningCollectorRequest` to consolidate planning results."
        }
        TicketAgentDispatch => "Set `ticketCollectorRequest` to consolidate ticket results.",
        DiscoveryAgent => "Set `agentResult` with your discovery findings.",
        PlanningAgent => "Set `agentResult` with your planning tickets.",
        TicketAgent => "Set `agentResult` with your implementation results.",
        DiscoveryCollector | PlanningCollector | TicketCollector => {
            "Use `collectorResult` for standard flow control."
        }
        OrchestratorCollector => {
            "Use `collectorResult` with ADVANCE_PHASE for workflow completion."
        }
        Review | Merger => {
            "Set your result, then route back to the originating collector using the \
             corresponding `*CollectorRequest` field."
        }
        ContextManager => {
            "Route to the agent that can most directly act on the reconstructed context."
        }
        ContextManagerRouting => {
            "Provide a concise reason and pick the most appropriate reconstruction type."
        }
    }
}

fn article(word: &str) -> &'static str {
    match word.chars().next() {
        Some('A' | 'E' | 'I' | 'O' | 'U') => "an",
        _ => "a",
    }
}

/// Guidance paragraph for the routing options section.
pub fn guidance_for(kind: PhaseKind) -> String {
    let routing = mapping(kind).routing_type_name();
    let mut out = if kind == ContextManagerRouting {
        format!(
            "**Guidance:** You must return a `{}` assembled by the routing action.\n",
            routing
        )
    } else {
        format!(
            "**Guidance:** You must return {} `{}` with exactly ONE field set.\n",
            article(&routing),
            routing
        )
    };

    if let Some(routes) = collector_routes(kind) {
        let advance = routes
            .advance
            .map(|k| display_name(k).to_string())
            .unwrap_or_else(|| "workflow complete".to_string());
        out.push_str("\n**Branching behavior when `collectorResult` is set:**\n");
        out.push_str(&format!(
            "- ADVANCE_PHASE → `{}` ({})\n",
            routes.advance_field, advance
        ));
        out.push_str(&format!(
            "- ROUTE_BACK → `{}` ({})\n",
            routes.route_back_field,
            display_name(routes.route_back)
        ));
    }

    out.push_str(&format!("\n**Happy path:** {}\n", happy_path(kind)));

    match kind {
        ContextManagerRouting => {}
        ContextManager => out.push_str(INTERRUPT_GUIDANCE),
        _ => {
            out.push_str(INTERRUPT_GUIDANCE);
            out.push_str(CONTEXT_GUIDANCE);
        }
    }
    out
}
