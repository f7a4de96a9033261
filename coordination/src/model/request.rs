//! Phase requests and interrupt descriptors.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::key::ArtifactKey;
use super::phase::{InterruptType, PhaseKind};
use super::result::PhaseResult;
use crate::curation::{CurationFamily, CurationNode};
use crate::error::Rejection;
use crate::previous::PreviousAttemptContext;

/// Input to a single phase invocation.
///
/// `context_id` doubles as the execution node id: every fresh invocation gets
/// a fresh id, and re-using an id means re-entering the same node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseRequest {
    pub kind: PhaseKind,
    #[serde(default)]
    pub context_id: ArtifactKey,
    pub goal: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "UpstreamCurations::is_empty")]
    pub upstream: UpstreamCurations,
    /// Explicit previous-attempt context. When absent the engine rebuilds it from history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attempt: Option<PreviousAttemptContext>,
    /// Set when the phase resumes after an interrupt resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_feedback: Option<InterruptFeedback>,
    /// Joined sub-agent results, carried by dispatch requests after a fan-out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_results: Vec<PhaseResult>,
}

impl PhaseRequest {
    pub fn new(kind: PhaseKind, goal: impl Into<String>) -> Self {
        Self {
            kind,
            context_id: ArtifactKey::generate(),
            goal: goal.into(),
            detail: String::new(),
            upstream: UpstreamCurations::default(),
            previous_attempt: None,
            interrupt_feedback: None,
            agent_results: Vec::new(),
        }
    }

    pub fn with_context_id(mut self, context_id: impl Into<ArtifactKey>) -> Self {
        self.context_id = context_id.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_upstream(mut self, upstream: UpstreamCurations) -> Self {
        self.upstream = upstream;
        self
    }

    pub fn with_curation(mut self, node: CurationNode) -> Self {
        self.upstream = self.upstream.with(node);
        self
    }

    pub fn with_previous_attempt(mut self, previous: PreviousAttemptContext) -> Self {
        self.previous_attempt = Some(previous);
        self
    }

    pub fn with_agent_results(mut self, results: Vec<PhaseResult>) -> Self {
        self.agent_results = results;
        self
    }

    /// A fresh request for `kind` that carries this request's goal and curations forward.
    pub fn follow_up(&self, kind: PhaseKind) -> Self {
        Self::new(kind, self.goal.clone()).with_upstream(self.upstream.clone())
    }

    /// Reject malformed identifiers before they reach history.
    pub fn validate(&self) -> Result<(), Rejection> {
        if !self.context_id.is_valid() {
            return Err(Rejection::new(
                "INVALID_CONTEXT_ID",
                format!("Request context id '{}' is not usable", self.context_id),
                "Submit the request again with a non-blank context id",
            )
            .with_context("phase", self.kind.to_string()));
        }
        Ok(())
    }

    pub fn pretty_print(&self) -> String {
        let mut out = format!("Goal: {}", self.goal.trim());
        if !self.detail.trim().is_empty() {
            out.push_str(&format!("\nDetail: {}", self.detail.trim()));
        }
        if !self.agent_results.is_empty() {
            out.push_str(&format!("\nAgent results: {}", self.agent_results.len()));
        }
        if let Some(feedback) = &self.interrupt_feedback {
            out.push_str(&format!(
                "\nResumed after {} interrupt: {}",
                feedback.interrupt_type,
                feedback.resolution.trim()
            ));
        }
        out
    }
}

/// The curations a request carries from upstream phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UpstreamCurations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<CurationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning: Option<CurationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<CurationNode>,
}

impl UpstreamCurations {
    pub fn is_empty(&self) -> bool {
        self.discovery.is_none() && self.planning.is_none() && self.ticket.is_none()
    }

    pub fn get(&self, family: CurationFamily) -> Option<&CurationNode> {
        match family {
            CurationFamily::Discovery => self.discovery.as_ref(),
            CurationFamily::Planning => self.planning.as_ref(),
            CurationFamily::Ticket => self.ticket.as_ref(),
        }
    }

    /// Copy with `node` placed in the slot of its family.
    pub fn with(mut self, node: CurationNode) -> Self {
        match node.family() {
            CurationFamily::Discovery => self.discovery = Some(node),
            CurationFamily::Planning => self.planning = Some(node),
            CurationFamily::Ticket => self.ticket = Some(node),
        }
        self
    }

    /// Present curations in discovery, planning, ticket order.
    pub fn iter(&self) -> impl Iterator<Item = &CurationNode> {
        [&self.discovery, &self.planning, &self.ticket]
            .into_iter()
            .filter_map(|slot| slot.as_ref())
    }
}

/// One question with labelled options presented to the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterruptChoice {
    pub question: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// Interrupt descriptor returned by a phase in place of a routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterruptRequest {
    pub interrupt_type: InterruptType,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_for_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<InterruptChoice>,
}

impl InterruptRequest {
    pub fn new(interrupt_type: InterruptType, reason: impl Into<String>) -> Self {
        Self {
            interrupt_type,
            reason: reason.into(),
            context_for_decision: None,
            choices: Vec::new(),
        }
    }

    pub fn with_context_for_decision(mut self, context: impl Into<String>) -> Self {
        self.context_for_decision = Some(context.into());
        self
    }

    pub fn with_choice(mut self, choice: InterruptChoice) -> Self {
        self.choices.push(choice);
        self
    }
}

/// Resolution folded into a resumed phase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InterruptFeedback {
    pub interrupt_id: String,
    pub interrupt_type: InterruptType,
    pub reason: String,
    pub resolution: String,
}
