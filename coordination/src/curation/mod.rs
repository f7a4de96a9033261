//! Content-addressed curation tree.
//!
//! Each collector finalizes one [`CurationNode`]. A node hashes its selection
//! rationale together with the hash of its body, and a body hashes its scalar
//! fields together with the hashes of its children. Because hashing walks
//! `children()`, the declared children and the hashed children cannot drift
//! apart. Nodes are never mutated: `with_children` returns a new value.

mod artifact;
mod body;
mod hasher;
mod node;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PhaseKind;

pub use artifact::{
    Artifact, CurationChild, DiscoveryReport, PlanningAgentResult, PlanningTicket,
    TicketAgentResult,
};
pub use body::{CurationBody, DiscoveryCuration, PlanningCuration, Recommendation, TicketCuration};
pub use hasher::{Blake3Hasher, ContentHasher};
pub use node::{CurationDiff, CurationNode};

/// The three phase families that produce curations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CurationFamily {
    Discovery,
    Planning,
    Ticket,
}

impl CurationFamily {
    pub const ALL: [CurationFamily; 3] = [Self::Discovery, Self::Planning, Self::Ticket];

    /// Section header used when rendering curations, e.g. `Discovery Curation`.
    pub fn title(self) -> &'static str {
        match self {
            Self::Discovery => "Discovery Curation",
            Self::Planning => "Planning Curation",
            Self::Ticket => "Ticket Curation",
        }
    }

    pub fn collector(self) -> PhaseKind {
        match self {
            Self::Discovery => PhaseKind::DiscoveryCollector,
            Self::Planning => PhaseKind::PlanningCollector,
            Self::Ticket => PhaseKind::TicketCollector,
        }
    }
}

impl std::fmt::Display for CurationFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "discovery"),
            Self::Planning => write!(f, "planning"),
            Self::Ticket => write!(f, "ticket"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("{phase} must finalize a {expected} curation, got {actual}")]
    FamilyMismatch {
        phase: PhaseKind,
        expected: CurationFamily,
        actual: CurationFamily,
    },

    #[error("{0} does not finalize curations")]
    NotACollector(PhaseKind),
}

pub type CurationResult<T> = Result<T, CurationError>;
