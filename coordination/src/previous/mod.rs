//! What a phase did and saw the last time it ran.
//!
//! Built from history right before a retried phase is invoked, unless the
//! request already carries one explicitly.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::curation::CurationFamily;
use crate::history::ExecutionHistory;
use crate::model::{ArtifactKey, PhaseKind, PhaseResult, UpstreamCurations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PreviousAttemptContext {
    pub kind: PhaseKind,
    /// Node id of the previous attempt.
    pub previous_context_id: ArtifactKey,
    /// JSON of the routing decision that attempt produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,
    /// Number of the attempt about to run, starting at 1.
    pub attempt_number: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "UpstreamCurations::is_empty")]
    pub curations: UpstreamCurations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_result: Option<PhaseResult>,
}

/// Curation families a phase's previous-attempt context keeps.
fn kept_families(kind: PhaseKind) -> &'static [CurationFamily] {
    use CurationFamily::*;
    match kind {
        PhaseKind::Orchestrator
        | PhaseKind::OrchestratorCollector
        | PhaseKind::DiscoveryOrchestrator
        | PhaseKind::TicketOrchestrator => &CurationFamily::ALL,
        PhaseKind::PlanningOrchestrator => &[Discovery, Planning],
        PhaseKind::DiscoveryCollector => &[Discovery],
        PhaseKind::PlanningCollector => &[Planning],
        PhaseKind::TicketCollector => &[Ticket],
        _ => &[],
    }
}

impl PreviousAttemptContext {
    /// Rebuild from the most recent request of `kind`, or `None` on a first attempt.
    ///
    /// Must run before the new request is appended.
    pub fn from_history(history: &ExecutionHistory, kind: PhaseKind) -> Option<Self> {
        let (index, request) = history.last_request(kind)?;
        let record = history.get(index)?;

        let serialized_output = history
            .last_routing_after(kind, index)
            .and_then(|decision| serde_json::to_string(decision).ok());
        let error = history.last_error_for(request.context_id.as_str());
        let prior_result = history.last_result(kind).cloned();

        let kept = kept_families(kind);
        let mut curations = UpstreamCurations::default();
        for node in request.upstream.iter() {
            if kept.contains(&node.family()) {
                curations = curations.with(node.clone());
            }
        }
        // A collector's own output supersedes whatever it was handed.
        if let Some(node) = prior_result.as_ref().and_then(|r| r.curation.as_ref()) {
            if kept.contains(&node.family()) {
                curations = curations.with(node.clone());
            }
        }

        Some(Self {
            kind,
            previous_context_id: request.context_id.clone(),
            serialized_output,
            error_message: error.and_then(|e| e.message.clone()),
            error_stack_trace: error.and_then(|e| e.detail.clone()),
            attempt_number: history.requests_of(kind).len() + 1,
            previous_attempt_at: Some(record.timestamp),
            curations,
            prior_result,
        })
    }

    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        let mut line = |label: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                out.push_str(&format!("{}: {}\n", label, value.trim()));
            }
        };
        line("Attempt", Some(self.attempt_number.to_string()));
        line("Previous Context Id", Some(self.previous_context_id.to_string()));
        line(
            "Previous Attempt At",
            self.previous_attempt_at.map(|t| t.to_rfc3339()),
        );
        line("Error Message", self.error_message.clone());
        line("Error Stack Trace", self.error_stack_trace.clone());

        if let Some(output) = &self.serialized_output {
            out.push_str(&format!("Serialized Output:\n{}\n", output));
        }
        for node in self.curations.iter() {
            out.push_str(&format!(
                "Previous {}:\n{}\n",
                node.family().title(),
                node.pretty_print()
            ));
        }
        if let Some(result) = &self.prior_result {
            out.push_str(&format!("Previous Result:\n{}\n", result.pretty_print()));
        }
        out.trim().to_string()
    }
}
