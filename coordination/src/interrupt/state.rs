//! Interrupt state machine: status, transitions and the per-interrupt context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{InterruptChoice, InterruptRequest, InterruptType, PhaseKind};

/// Lifecycle status of one interrupt. Linear; no state is ever skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterruptStatus {
    /// A phase returned an interrupt instead of a routing decision.
    Requested,
    /// The resolver supplied an answer.
    ResultStored,
    /// The origin phase was told the answer is available.
    StatusEmitted,
    /// The origin phase consumed the answer. Terminal.
    Resolved,
}

impl InterruptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved)
    }

    pub fn valid_transitions(self) -> &'static [InterruptStatus] {
        match self {
            Self::Requested => &[Self::ResultStored],
            Self::ResultStored => &[Self::StatusEmitted],
            Self::StatusEmitted => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }
}

impl std::fmt::Display for InterruptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "REQUESTED"),
            Self::ResultStored => write!(f, "RESULT_STORED"),
            Self::StatusEmitted => write!(f, "STATUS_EMITTED"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptTransition {
    pub from: InterruptStatus,
    pub to: InterruptStatus,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Rejected status change. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub interrupt_id: String,
    pub from: InterruptStatus,
    pub to: InterruptStatus,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid interrupt transition {} → {} for {} (allowed: {:?})",
            self.from,
            self.to,
            self.interrupt_id,
            self.from.valid_transitions()
        )
    }
}

impl std::error::Error for TransitionError {}

/// One interrupt and everything needed to resume its origin phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptContext {
    pub id: String,
    pub interrupt_type: InterruptType,
    pub status: InterruptStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_for_decision: Option<String>,
    pub origin_phase: PhaseKind,
    pub origin_node_id: String,
    /// Node resumed after resolution. Same as the origin unless set otherwise.
    pub resume_node_id: String,
    pub interrupt_node_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<InterruptChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<String>,
    pub transitions: Vec<InterruptTransition>,
    pub created_at: DateTime<Utc>,
}

impl InterruptContext {
    /// Caller guarantees `origin_node_id` is non-blank.
    pub(crate) fn new(
        origin_phase: PhaseKind,
        origin_node_id: &str,
        request: &InterruptRequest,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            interrupt_node_id: format!("interrupt-{}", id),
            id,
            interrupt_type: request.interrupt_type,
            status: InterruptStatus::Requested,
            reason: request.reason.clone(),
            context_for_decision: request.context_for_decision.clone(),
            origin_phase,
            origin_node_id: origin_node_id.to_string(),
            resume_node_id: origin_node_id.to_string(),
            choices: request.choices.clone(),
            result_payload: None,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_resume_node(mut self, node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        if !node_id.trim().is_empty() {
            self.resume_node_id = node_id;
        }
        self
    }

    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    pub(crate) fn transition(
        &mut self,
        to: InterruptStatus,
        reason: &str,
    ) -> Result<(), TransitionError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(TransitionError {
                interrupt_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.transitions.push(InterruptTransition {
            from: self.status,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.status = to;
        Ok(())
    }

    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} interrupt {} from {} ({})",
            self.status, self.interrupt_type, self.id, self.origin_phase, self.reason
        )
    }
}
