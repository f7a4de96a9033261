//! Record payloads and the stable type names used to index them.

use serde::{Deserialize, Serialize};

use super::event::{EventKind, WorkflowEvent};
use crate::model::{InterruptRequest, PhaseKind, PhaseRequest, PhaseResult, RoutingDecision};

/// Stable, unique type tag of a history record.
///
/// Serialized as its type name, e.g. `DiscoveryCollectorRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PayloadType {
    Request(PhaseKind),
    Interrupt(PhaseKind),
    Result(PhaseKind),
    Routing(PhaseKind),
    InterruptResolution,
    Event(EventKind),
    MessageBatch,
}

impl PayloadType {
    pub fn type_name(&self) -> String {
        match self {
            Self::Request(kind) => kind.request_type_name(),
            Self::Interrupt(kind) => format!("{}InterruptRequest", kind.type_stem()),
            Self::Result(kind) => format!("{}Result", kind.type_stem()),
            Self::Routing(kind) => format!("{}Routing", kind.type_stem()),
            Self::InterruptResolution => "InterruptResolution".to_string(),
            Self::Event(kind) => format!("{}Event", kind.type_stem()),
            Self::MessageBatch => "MessageBatch".to_string(),
        }
    }

    pub fn phase(&self) -> Option<PhaseKind> {
        match self {
            Self::Request(k) | Self::Interrupt(k) | Self::Result(k) | Self::Routing(k) => Some(*k),
            _ => None,
        }
    }

    fn all() -> impl Iterator<Item = PayloadType> {
        let per_phase = PhaseKind::ALL.into_iter().flat_map(|k| {
            [
                Self::Request(k),
                Self::Interrupt(k),
                Self::Result(k),
                Self::Routing(k),
            ]
        });
        let events = EventKind::ALL.into_iter().map(Self::Event);
        per_phase
            .chain(events)
            .chain([Self::InterruptResolution, Self::MessageBatch])
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.type_name())
    }
}

impl std::str::FromStr for PayloadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|t| t.type_name() == s)
            .ok_or_else(|| format!("unknown payload type: {}", s))
    }
}

impl TryFrom<String> for PayloadType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PayloadType> for String {
    fn from(value: PayloadType) -> Self {
        value.type_name()
    }
}

/// Ordered trace events for one node. The only record that grows after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub batch_id: String,
    pub events: Vec<WorkflowEvent>,
}

/// An interrupt raised by a phase, tied to its ledger id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    pub kind: PhaseKind,
    pub interrupt_id: String,
    pub origin_node_id: String,
    pub request: InterruptRequest,
}

/// Body of a history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", rename_all = "snake_case")]
pub enum HistoryPayload {
    Request(PhaseRequest),
    Routing {
        kind: PhaseKind,
        node_id: String,
        decision: RoutingDecision,
    },
    Result(PhaseResult),
    Interrupt(InterruptPayload),
    InterruptResolution {
        interrupt_id: String,
        kind: PhaseKind,
        resolution: String,
    },
    Event(WorkflowEvent),
    MessageBatch(MessageBatch),
}

impl HistoryPayload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::Request(request) => PayloadType::Request(request.kind),
            Self::Routing { kind, .. } => PayloadType::Routing(*kind),
            Self::Result(result) => PayloadType::Result(result.kind),
            Self::Interrupt(interrupt) => PayloadType::Interrupt(interrupt.kind),
            Self::InterruptResolution { .. } => PayloadType::InterruptResolution,
            Self::Event(event) => PayloadType::Event(event.kind),
            Self::MessageBatch(_) => PayloadType::MessageBatch,
        }
    }

    /// Flat text used by search.
    pub fn stringified(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn as_request(&self) -> Option<&PhaseRequest> {
        match self {
            Self::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn as_result(&self) -> Option<&PhaseResult> {
        match self {
            Self::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&WorkflowEvent> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_interrupt(&self) -> Option<&InterruptPayload> {
        match self {
            Self::Interrupt(interrupt) => Some(interrupt),
            _ => None,
        }
    }

    pub fn as_routing(&self) -> Option<&RoutingDecision> {
        match self {
            Self::Routing { decision, .. } => Some(decision),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_are_unique() {
        let names: Vec<String> = PayloadType::all().map(|t| t.type_name()).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn test_type_name_examples() {
        assert_eq!(
            PayloadType::Interrupt(PhaseKind::DiscoveryCollector).type_name(),
            "DiscoveryCollectorInterruptRequest"
        );
        assert_eq!(
            PayloadType::Routing(PhaseKind::Review).type_name(),
            "ReviewRouting"
        );
        assert_eq!(
            PayloadType::Event(EventKind::ActionStarted).type_name(),
            "ActionStartedEvent"
        );
    }

    #[test]
    fn test_serializes_as_type_name() {
        let json = serde_json::to_string(&PayloadType::Result(PhaseKind::TicketAgent)).unwrap();
        assert_eq!(json, "\"TicketAgentResult\"");
        let back: PayloadType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PayloadType::Result(PhaseKind::TicketAgent));
    }
}
