//! Phase tags and interrupt types.
//!
//! Every phase of a workflow run is identified by a [`PhaseKind`]. All tables
//! keyed by phase (display names, routing branches, allowed upstream context)
//! match on it exhaustively, so adding a phase is a compile error until every
//! table covers it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::curation::CurationFamily;

/// A named decision point in the workflow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
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
    Review,
    Merger,
    ContextManager,
    ContextManagerRouting,
}

impl PhaseKind {
    /// All phases in happy-path order, side nodes last.
    pub const ALL: [PhaseKind; 18] = [
        Self::Orchestrator,
        Self::DiscoveryOrchestrator,
        Self::DiscoveryAgentDispatch,
        Self::DiscoveryAgent,
        Self::DiscoveryCollector,
        Self::PlanningOrchestrator,
        Self::PlanningAgentDispatch,
        Self::PlanningAgent,
        Self::PlanningCollector,
        Self::TicketOrchestrator,
        Self::TicketAgentDispatch,
        Self::TicketAgent,
        Self::TicketCollector,
        Self::OrchestratorCollector,
        Self::Review,
        Self::Merger,
        Self::ContextManager,
        Self::ContextManagerRouting,
    ];

    /// CamelCase stem shared by the request, result, routing and interrupt type names.
    pub fn type_stem(self) -> &'static str {
        match self {
            Self::Orchestrator => "Orchestrator",
            Self::DiscoveryOrchestrator => "DiscoveryOrchestrator",
            Self::DiscoveryAgentDispatch => "DiscoveryAgentDispatch",
            Self::DiscoveryAgent => "DiscoveryAgent",
            Self::DiscoveryCollector => "DiscoveryCollector",
            Self::PlanningOrchestrator => "PlanningOrchestrator",
            Self::PlanningAgentDispatch => "PlanningAgentDispatch",
            Self::PlanningAgent => "PlanningAgent",
            Self::PlanningCollector => "PlanningCollector",
            Self::TicketOrchestrator => "TicketOrchestrator",
            Self::TicketAgentDispatch => "TicketAgentDispatch",
            Self::TicketAgent => "TicketAgent",
            Self::TicketCollector => "TicketCollector",
            Self::OrchestratorCollector => "OrchestratorCollector",
            Self::Review => "Review",
            Self::Merger => "Merger",
            Self::ContextManager => "ContextManager",
            Self::ContextManagerRouting => "ContextManagerRouting",
        }
    }

    /// Stable request type name, e.g. `DiscoveryCollectorRequest`.
    ///
    /// Dispatch phases use the plural `...AgentRequests` form.
    pub fn request_type_name(self) -> String {
        match self {
            Self::DiscoveryAgentDispatch => "DiscoveryAgentRequests".to_string(),
            Self::PlanningAgentDispatch => "PlanningAgentRequests".to_string(),
            Self::TicketAgentDispatch => "TicketAgentRequests".to_string(),
            other => format!("{}Request", other.type_stem()),
        }
    }

    pub fn is_orchestrator(self) -> bool {
        matches!(
            self,
            Self::Orchestrator
                | Self::DiscoveryOrchestrator
                | Self::PlanningOrchestrator
                | Self::TicketOrchestrator
        )
    }

    pub fn is_collector(self) -> bool {
        matches!(
            self,
            Self::DiscoveryCollector
                | Self::PlanningCollector
                | Self::TicketCollector
                | Self::OrchestratorCollector
        )
    }

    pub fn is_dispatch(self) -> bool {
        matches!(
            self,
            Self::DiscoveryAgentDispatch | Self::PlanningAgentDispatch | Self::TicketAgentDispatch
        )
    }

    /// Sub-agents are the fan-out targets of an orchestrator.
    pub fn is_sub_agent(self) -> bool {
        matches!(
            self,
            Self::DiscoveryAgent | Self::PlanningAgent | Self::TicketAgent
        )
    }

    /// Context reconstruction phases are skipped when computing return routes.
    pub fn is_context_manager(self) -> bool {
        matches!(self, Self::ContextManager | Self::ContextManagerRouting)
    }

    /// Curation family a collector finalizes, if any.
    pub fn produces_curation(self) -> Option<CurationFamily> {
        match self {
            Self::DiscoveryCollector => Some(CurationFamily::Discovery),
            Self::PlanningCollector => Some(CurationFamily::Planning),
            Self::TicketCollector => Some(CurationFamily::Ticket),
            _ => None,
        }
    }

    /// Family of the discovery, planning and ticket phases.
    pub fn family(self) -> Option<CurationFamily> {
        match self {
            Self::DiscoveryOrchestrator
            | Self::DiscoveryAgentDispatch
            | Self::DiscoveryAgent
            | Self::DiscoveryCollector => Some(CurationFamily::Discovery),
            Self::PlanningOrchestrator
            | Self::PlanningAgentDispatch
            | Self::PlanningAgent
            | Self::PlanningCollector => Some(CurationFamily::Planning),
            Self::TicketOrchestrator
            | Self::TicketAgentDispatch
            | Self::TicketAgent
            | Self::TicketCollector => Some(CurationFamily::Ticket),
            _ => None,
        }
    }

    /// Snake-case identifier, also accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::DiscoveryOrchestrator => "discovery_orchestrator",
            Self::DiscoveryAgentDispatch => "discovery_agent_dispatch",
            Self::DiscoveryAgent => "discovery_agent",
            Self::DiscoveryCollector => "discovery_collector",
            Self::PlanningOrchestrator => "planning_orchestrator",
            Self::PlanningAgentDispatch => "planning_agent_dispatch",
            Self::PlanningAgent => "planning_agent",
            Self::PlanningCollector => "planning_collector",
            Self::TicketOrchestrator => "ticket_orchestrator",
            Self::TicketAgentDispatch => "ticket_agent_dispatch",
            Self::TicketAgent => "ticket_agent",
            Self::TicketCollector => "ticket_collector",
            Self::OrchestratorCollector => "orchestrator_collector",
            Self::Review => "review",
            Self::Merger => "merger",
            Self::ContextManager => "context_manager",
            Self::ContextManagerRouting => "context_manager_routing",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {}", s))
    }
}

/// Why a phase paused instead of returning a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptType {
    HumanReview,
    AgentReview,
    Pause,
    /// Terminates the run instead of suspending it.
    Stop,
}

impl std::fmt::Display for InterruptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HumanReview => write!(f, "HUMAN_REVIEW"),
            Self::AgentReview => write!(f, "AGENT_REVIEW"),
            Self::Pause => write!(f, "PAUSE"),
            Self::Stop => write!(f, "STOP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_names() {
        assert_eq!(
            PhaseKind::DiscoveryCollector.request_type_name(),
            "DiscoveryCollectorRequest"
        );
        assert_eq!(
            PhaseKind::TicketAgentDispatch.request_type_name(),
            "TicketAgentRequests"
        );
    }

    #[test]
    fn test_round_trip_through_str() {
        for kind in PhaseKind::ALL {
            let parsed: PhaseKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("nonsense".parse::<PhaseKind>().is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&PhaseKind::PlanningAgentDispatch).unwrap();
        assert_eq!(json, "\"planning_agent_dispatch\"");
        let json = serde_json::to_string(&InterruptType::HumanReview).unwrap();
        assert_eq!(json, "\"HUMAN_REVIEW\"");
    }

    #[test]
    fn test_only_three_collectors_produce_curations() {
        let producing: Vec<_> = PhaseKind::ALL
            .iter()
            .filter(|k| k.produces_curation().is_some())
            .collect();
        assert_eq!(producing.len(), 3);
        assert!(PhaseKind::OrchestratorCollector.is_collector());
        assert!(PhaseKind::OrchestratorCollector.produces_curation().is_none());
    }
}
