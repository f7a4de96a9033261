//! The decision-maker boundary.
//!
//! The engine never produces routing decisions itself. Whatever sits behind
//! [`DecisionMaker`] (a model client, a scripted replay, a human) receives the
//! request and its assembled context and answers with one branch.

use async_trait::async_trait;
use thiserror::Error;

use crate::contribution::AssembledContext;
use crate::model::{PhaseKind, PhaseRequest, RoutingDecision};

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Decision maker unavailable: {0}")]
    Unavailable(String),

    #[error("Expected a decision for {expected}, was asked for {actual}")]
    UnexpectedPhase {
        expected: PhaseKind,
        actual: PhaseKind,
    },

    #[error("No decision left for {0}")]
    Exhausted(PhaseKind),

    #[error("Invalid decision: {0}")]
    Invalid(String),

    #[error("Decision JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produces the routing decision for one phase invocation.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    async fn decide(
        &self,
        request: &PhaseRequest,
        context: &AssembledContext,
    ) -> Result<RoutingDecision, DecisionError>;
}
