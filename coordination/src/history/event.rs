//! Low-level workflow events recorded alongside phase decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::PhaseKind;

/// Kind of trace event emitted while a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NodeAdded,
    ActionStarted,
    ActionCompleted,
    NodeError,
    InterruptStatus,
    ResolveInterrupt,
    AddMessage,
    StreamDelta,
    ToolCall,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        Self::NodeAdded,
        Self::ActionStarted,
        Self::ActionCompleted,
        Self::NodeError,
        Self::InterruptStatus,
        Self::ResolveInterrupt,
        Self::AddMessage,
        Self::StreamDelta,
        Self::ToolCall,
    ];

    /// Message events are folded into a per-node message batch.
    pub fn is_message(self) -> bool {
        matches!(self, Self::AddMessage | Self::StreamDelta | Self::ToolCall)
    }

    /// CamelCase name used in payload type names, e.g. `ActionStarted`.
    pub fn type_stem(self) -> &'static str {
        match self {
            Self::NodeAdded => "NodeAdded",
            Self::ActionStarted => "ActionStarted",
            Self::ActionCompleted => "ActionCompleted",
            Self::NodeError => "NodeError",
            Self::InterruptStatus => "InterruptStatus",
            Self::ResolveInterrupt => "ResolveInterrupt",
            Self::AddMessage => "AddMessage",
            Self::StreamDelta => "StreamDelta",
            Self::ToolCall => "ToolCall",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeAdded => write!(f, "NODE_ADDED"),
            Self::ActionStarted => write!(f, "ACTION_STARTED"),
            Self::ActionCompleted => write!(f, "ACTION_COMPLETED"),
            Self::NodeError => write!(f, "NODE_ERROR"),
            Self::InterruptStatus => write!(f, "INTERRUPT_STATUS"),
            Self::ResolveInterrupt => write!(f, "RESOLVE_INTERRUPT"),
            Self::AddMessage => write!(f, "ADD_MESSAGE"),
            Self::StreamDelta => write!(f, "STREAM_DELTA"),
            Self::ToolCall => write!(f, "TOOL_CALL"),
        }
    }
}

/// One trace event targeted at an execution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_id: String,
    pub kind: EventKind,
    pub node_id: String,
    /// Parent or related nodes; each becomes an additional `parent:<id>` target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn new(kind: EventKind, node_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            kind,
            node_id: node_id.into(),
            parent_node_ids: Vec::new(),
            phase: None,
            message: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_node_ids.push(parent.into());
        self
    }

    pub fn with_phase(mut self, phase: PhaseKind) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn action_started(node_id: impl Into<String>, phase: PhaseKind) -> Self {
        Self::new(EventKind::ActionStarted, node_id).with_phase(phase)
    }

    pub fn action_completed(node_id: impl Into<String>, phase: PhaseKind) -> Self {
        Self::new(EventKind::ActionCompleted, node_id).with_phase(phase)
    }

    pub fn node_error(
        node_id: impl Into<String>,
        phase: PhaseKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventKind::NodeError, node_id)
            .with_phase(phase)
            .with_message(message)
    }

    /// Interrupt status change; origin and resume nodes are both targeted.
    pub fn interrupt_status(
        interrupt_node_id: impl Into<String>,
        origin_node_id: &str,
        resume_node_id: &str,
        status: impl std::fmt::Display,
    ) -> Self {
        let mut event = Self::new(EventKind::InterruptStatus, interrupt_node_id)
            .with_message(status.to_string())
            .with_parent(origin_node_id);
        if resume_node_id != origin_node_id {
            event = event.with_parent(resume_node_id);
        }
        event
    }

    /// History targets, `node:<id>` first, then `parent:<id>` for each distinct parent.
    pub fn targets(&self) -> Vec<String> {
        let mut targets = Vec::new();
        if !self.node_id.trim().is_empty() {
            targets.push(format!("node:{}", self.node_id));
        }
        for parent in &self.parent_node_ids {
            if parent.trim().is_empty() {
                continue;
            }
            let target = format!("parent:{}", parent);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_dedup_and_skip_blank() {
        let event = WorkflowEvent::new(EventKind::NodeAdded, "n1")
            .with_parent("p1")
            .with_parent("p1")
            .with_parent(" ");
        assert_eq!(event.targets(), vec!["node:n1", "parent:p1"]);
    }

    #[test]
    fn test_interrupt_status_targets_origin_and_resume() {
        let event = WorkflowEvent::interrupt_status("int-1", "origin", "resume", "REQUESTED");
        assert_eq!(
            event.targets(),
            vec!["node:int-1", "parent:origin", "parent:resume"]
        );
        let same = WorkflowEvent::interrupt_status("int-1", "origin", "origin", "REQUESTED");
        assert_eq!(same.targets().len(), 2);
    }

    #[test]
    fn test_message_kinds() {
        let messages: Vec<_> = EventKind::ALL.iter().filter(|k| k.is_message()).collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(EventKind::ActionStarted.to_string(), "ACTION_STARTED");
    }
}
