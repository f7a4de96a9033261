//! The routing decision returned by the decision-maker.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::phase::PhaseKind;
use super::request::{InterruptRequest, PhaseRequest};
use super::result::PhaseResult;

/// Exactly one branch of a phase's routing decision.
///
/// Being an enum, a decision cannot populate two branches at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Move on to the phase named by `request.kind`.
    Advance { request: PhaseRequest },
    /// Dispatch parallel sub-agent work; results are joined before the next phase.
    FanOut { requests: Vec<PhaseRequest> },
    /// Finalize this phase's output.
    Consolidate { result: PhaseResult },
    /// Send work back to an earlier phase.
    RouteBack { request: PhaseRequest },
    /// Pause for out-of-band resolution.
    Interrupt(InterruptRequest),
}

impl RoutingDecision {
    pub fn branch_name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::FanOut { .. } => "fan_out",
            Self::Consolidate { .. } => "consolidate",
            Self::RouteBack { .. } => "route_back",
            Self::Interrupt(_) => "interrupt",
        }
    }

    /// Phase the decision routes to directly, if it names one.
    pub fn target(&self) -> Option<PhaseKind> {
        match self {
            Self::Advance { request } | Self::RouteBack { request } => Some(request.kind),
            Self::FanOut { requests } => requests.first().map(|r| r.kind),
            Self::Consolidate { .. } | Self::Interrupt(_) => None,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }
}
