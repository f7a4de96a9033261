//! Phase outputs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::key::ArtifactKey;
use super::phase::PhaseKind;
use crate::curation::CurationNode;

/// What a collector decided about its own phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectorDecision {
    AdvancePhase,
    RouteBack,
}

impl std::fmt::Display for CollectorDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdvancePhase => write!(f, "ADVANCE_PHASE"),
            Self::RouteBack => write!(f, "ROUTE_BACK"),
        }
    }
}

/// Output of a phase that consolidated its work.
///
/// Collectors attach the curation they finalized; sub-agents only carry text output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseResult {
    pub kind: PhaseKind,
    #[serde(default)]
    pub result_id: ArtifactKey,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation: Option<CurationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_decision: Option<CollectorDecision>,
}

impl PhaseResult {
    pub fn new(kind: PhaseKind, output: impl Into<String>) -> Self {
        Self {
            kind,
            result_id: ArtifactKey::generate(),
            output: output.into(),
            curation: None,
            collector_decision: None,
        }
    }

    pub fn with_curation(mut self, curation: CurationNode) -> Self {
        self.curation = Some(curation);
        self
    }

    pub fn with_collector_decision(mut self, decision: CollectorDecision) -> Self {
        self.collector_decision = Some(decision);
        self
    }

    /// Collectors without an explicit decision advance.
    pub fn advances(&self) -> bool {
        !matches!(self.collector_decision, Some(CollectorDecision::RouteBack))
    }

    pub fn pretty_print(&self) -> String {
        let mut out = format!("{} result {}", self.kind, self.result_id);
        if let Some(decision) = self.collector_decision {
            out.push_str(&format!(" ({})", decision));
        }
        if !self.output.trim().is_empty() {
            out.push_str(&format!("\n{}", self.output.trim()));
        }
        out
    }
}
