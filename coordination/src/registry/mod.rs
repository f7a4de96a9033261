//! Static routing registry.
//!
//! Maps every [`PhaseKind`] to its type names, display name and the routing
//! field that addresses it, and computes return routes for the context
//! reconstruction phases. All lookups are exhaustive matches; there is no
//! runtime registration.

mod branches;

use serde::{Deserialize, Serialize};

pub use branches::{
    allowed_history, branches_for, collector_routes, fan_out_for, graph_order, guidance_for,
    is_listed_target, AllowedHistory, CollectorRoutes, FanOut, RoutingBranch,
};

use crate::history::ExecutionHistory;
use crate::model::PhaseKind;

/// Display and addressing metadata for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMapping {
    pub kind: PhaseKind,
    pub display_name: &'static str,
    /// Field on a routing decision that routes *to* this phase.
    pub field_name: Option<&'static str>,
}

impl NodeMapping {
    pub fn request_type_name(&self) -> String {
        self.kind.request_type_name()
    }

    pub fn routing_type_name(&self) -> String {
        match self.kind {
            PhaseKind::ContextManager => "ContextManagerResultRouting".to_string(),
            PhaseKind::ContextManagerRouting => "ContextManagerRequest".to_string(),
            other => format!("{}Routing", other.type_stem()),
        }
    }

    pub fn interrupt_display_name(&self) -> String {
        format!("{} Interrupt", self.display_name)
    }
}

/// Registry entry for `kind`.
pub fn mapping(kind: PhaseKind) -> NodeMapping {
    let (display_name, field_name) = match kind {
        PhaseKind::Orchestrator => ("Orchestrator", Some("orchestratorRequest")),
        PhaseKind::OrchestratorCollector => {
            ("Orchestrator Collector", Some("orchestratorCollectorRequest"))
        }
        PhaseKind::DiscoveryOrchestrator => {
            ("Discovery Orchestrator", Some("discoveryOrchestratorRequest"))
        }
        PhaseKind::DiscoveryAgentDispatch => {
            ("Discovery Agent Dispatch", Some("discoveryAgentRequests"))
        }
        PhaseKind::DiscoveryAgent => ("Discovery Agents", Some("discoveryAgentRequest")),
        PhaseKind::DiscoveryCollector => ("Discovery Collector", Some("discoveryCollectorRequest")),
        PhaseKind::PlanningOrchestrator => {
            ("Planning Orchestrator", Some("planningOrchestratorRequest"))
        }
        PhaseKind::PlanningAgentDispatch => {
            ("Planning Agent Dispatch", Some("planningAgentRequests"))
        }
        PhaseKind::PlanningAgent => ("Planning Agents", Some("planningAgentRequest")),
        PhaseKind::PlanningCollector => ("Planning Collector", Some("planningCollectorRequest")),
        PhaseKind::TicketOrchestrator => ("Ticket Orchestrator", Some("ticketOrchestratorRequest")),
        PhaseKind::TicketAgentDispatch => ("Ticket Agent Dispatch", Some("ticketAgentRequests")),
        PhaseKind::TicketAgent => ("Ticket Agents", Some("ticketAgentRequest")),
        PhaseKind::TicketCollector => ("Ticket Collector", Some("ticketCollectorRequest")),
        PhaseKind::Review => ("Review Agent", Some("reviewRequest")),
        PhaseKind::Merger => ("Merger Agent", Some("mergerRequest")),
        PhaseKind::ContextManager => ("Context Manager", None),
        PhaseKind::ContextManagerRouting => {
            ("Context Manager Routing Request", Some("contextOrchestratorRequest"))
        }
    };
    NodeMapping {
        kind,
        display_name,
        field_name,
    }
}

pub fn display_name(kind: PhaseKind) -> &'static str {
    mapping(kind).display_name
}

/// Where a context reconstruction phase should hand control back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ReturnRoute {
    Resolved {
        kind: PhaseKind,
        field_name: String,
        display_name: String,
    },
    /// No addressable phase ran before; restart at the root orchestrator.
    Fallback,
}

impl ReturnRoute {
    pub const FALLBACK_FIELD: &'static str = "orchestratorRequest";
    pub const FALLBACK_STEP: &'static str =
        "Orchestrator with a clearly defined goal summarizing the current state";

    pub fn field_name(&self) -> &str {
        match self {
            Self::Resolved { field_name, .. } => field_name,
            Self::Fallback => Self::FALLBACK_FIELD,
        }
    }

    pub fn target(&self) -> PhaseKind {
        match self {
            Self::Resolved { kind, .. } => *kind,
            Self::Fallback => PhaseKind::Orchestrator,
        }
    }

    /// Human readable next step, e.g. `Planning Collector (PlanningCollectorRequest)`.
    pub fn next_step(&self) -> String {
        match self {
            Self::Resolved {
                kind, display_name, ..
            } => format!("{} ({})", display_name, kind.request_type_name()),
            Self::Fallback => Self::FALLBACK_STEP.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// Scan history backward for the last request outside context reconstruction.
///
/// Interrupt records carry their own payload type and are never matched.
pub fn resolve_return_route(history: &ExecutionHistory) -> ReturnRoute {
    let Some(request) = history.last_non_context_request() else {
        return ReturnRoute::Fallback;
    };
    let node = mapping(request.kind);
    match node.field_name {
        Some(field) => ReturnRoute::Resolved {
            kind: request.kind,
            field_name: field.to_string(),
            display_name: node.display_name.to_string(),
        },
        None => ReturnRoute::Fallback,
    }
}
