//! Append-only execution history for a workflow run.
//!
//! Every phase request, routing decision, result, interrupt and trace event is
//! appended as an [`ExecutionRecord`]. Records are never reordered or removed;
//! the only record that grows after append is a node's message batch.
//!
//! Queries are linear scans. Runs are bounded to a few hundred records, so no
//! secondary index is kept.

mod event;
mod notes;
mod payload;
mod query;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use event::{EventKind, WorkflowEvent};
pub use notes::{ContextSnapshot, HistoryNote};
pub use payload::{HistoryPayload, InterruptPayload, MessageBatch, PayloadType};
pub use query::{HistoryFilter, HistoryPage, SearchHit};

use crate::model::{PhaseKind, PhaseRequest, PhaseResult, RoutingDecision};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Phase name must not be empty")]
    EmptyPhaseName,

    #[error("Index {index} out of bounds (0-{last})", last = len.saturating_sub(1))]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("No entry indices provided")]
    NoIndices,

    #[error("Note content cannot be empty")]
    EmptyNote,
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// One appended history item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub phase_name: String,
    pub payload_type: PayloadType,
    pub payload: HistoryPayload,
}

/// The ordered log of one run, plus notes and snapshots that reference it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHistory {
    records: Vec<ExecutionRecord>,
    #[serde(default)]
    notes: Vec<HistoryNote>,
    #[serde(default)]
    snapshots: Vec<ContextSnapshot>,
    #[serde(default)]
    batches_created: usize,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionRecord> {
        self.records.get(index)
    }

    pub fn notes(&self) -> &[HistoryNote] {
        &self.notes
    }

    pub fn snapshots(&self) -> &[ContextSnapshot] {
        &self.snapshots
    }

    /// Append a record stamped with the current time.
    pub fn append(
        &mut self,
        phase_name: impl Into<String>,
        payload: HistoryPayload,
    ) -> HistoryResult<usize> {
        self.append_at(phase_name, payload, Utc::now())
    }

    pub fn append_at(
        &mut self,
        phase_name: impl Into<String>,
        payload: HistoryPayload,
        timestamp: DateTime<Utc>,
    ) -> HistoryResult<usize> {
        let phase_name = phase_name.into();
        if phase_name.trim().is_empty() {
            return Err(HistoryError::EmptyPhaseName);
        }
        let index = self.records.len();
        let payload_type = payload.payload_type();
        debug!(index, phase = %phase_name, payload_type = %payload_type, "history append");
        self.records.push(ExecutionRecord {
            index,
            timestamp,
            phase_name,
            payload_type,
            payload,
        });
        Ok(index)
    }

    /// Record a trace event under each of its targets.
    ///
    /// Message events join the `node:<id>::messages` batch for their target,
    /// creating it on first use. Every other event becomes a
    /// `node:<id>::<EVENT_TYPE>` record. Events without a usable target are dropped.
    pub fn record_event(&mut self, event: WorkflowEvent) -> Vec<usize> {
        let mut touched = Vec::new();
        for target in event.targets() {
            if event.kind.is_message() {
                let name = format!("{}::messages", target);
                touched.push(self.add_to_batch(name, event.clone()));
            } else {
                let name = format!("{}::{}", target, event.kind);
                let timestamp = event.timestamp;
                if let Ok(index) =
                    self.append_at(name, HistoryPayload::Event(event.clone()), timestamp)
                {
                    touched.push(index);
                }
            }
        }
        touched
    }

    fn add_to_batch(&mut self, name: String, event: WorkflowEvent) -> usize {
        for record in self.records.iter_mut() {
            if record.phase_name == name {
                if let HistoryPayload::MessageBatch(batch) = &mut record.payload {
                    batch.events.push(event);
                    return record.index;
                }
            }
        }
        self.batches_created += 1;
        let batch = MessageBatch {
            batch_id: format!("messages:{}", self.batches_created),
            events: vec![event.clone()],
        };
        let index = self.records.len();
        self.records.push(ExecutionRecord {
            index,
            timestamp: event.timestamp,
            phase_name: name,
            payload_type: PayloadType::MessageBatch,
            payload: HistoryPayload::MessageBatch(batch),
        });
        index
    }

    pub fn count_of_type(&self, payload_type: PayloadType) -> usize {
        self.records
            .iter()
            .filter(|r| r.payload_type == payload_type)
            .count()
    }

    pub fn last_of_type(&self, payload_type: PayloadType) -> Option<&ExecutionRecord> {
        self.records
            .iter()
            .rev()
            .find(|r| r.payload_type == payload_type)
    }

    pub fn entries_of_type(&self, payload_type: PayloadType) -> Vec<&ExecutionRecord> {
        self.records
            .iter()
            .filter(|r| r.payload_type == payload_type)
            .collect()
    }

    pub fn requests_of(&self, kind: PhaseKind) -> Vec<&PhaseRequest> {
        self.entries_of_type(PayloadType::Request(kind))
            .into_iter()
            .filter_map(|r| r.payload.as_request())
            .collect()
    }

    /// Most recent request of `kind` and its record index.
    pub fn last_request(&self, kind: PhaseKind) -> Option<(usize, &PhaseRequest)> {
        self.last_of_type(PayloadType::Request(kind))
            .and_then(|r| r.payload.as_request().map(|req| (r.index, req)))
    }

    pub fn results_of(&self, kind: PhaseKind) -> Vec<&PhaseResult> {
        self.entries_of_type(PayloadType::Result(kind))
            .into_iter()
            .filter_map(|r| r.payload.as_result())
            .collect()
    }

    pub fn last_result(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.last_of_type(PayloadType::Result(kind))
            .and_then(|r| r.payload.as_result())
    }

    pub fn interrupts_of(&self, kind: PhaseKind) -> Vec<&InterruptPayload> {
        self.entries_of_type(PayloadType::Interrupt(kind))
            .into_iter()
            .filter_map(|r| r.payload.as_interrupt())
            .collect()
    }

    /// Last routing decision of `kind` appended after record `after`.
    pub fn last_routing_after(&self, kind: PhaseKind, after: usize) -> Option<&RoutingDecision> {
        self.records
            .iter()
            .skip(after + 1)
            .rev()
            .filter(|r| r.payload_type == PayloadType::Routing(kind))
            .find_map(|r| r.payload.as_routing())
    }

    /// Last `NodeError` event recorded for `node_id`.
    pub fn last_error_for(&self, node_id: &str) -> Option<&WorkflowEvent> {
        self.records
            .iter()
            .rev()
            .filter_map(|r| r.payload.as_event())
            .find(|e| e.kind == EventKind::NodeError && e.node_id == node_id)
    }

    /// Node ids of `ActionStarted` events in execution order.
    pub fn action_started_nodes(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.phase_name.starts_with("node:"))
            .filter_map(|r| r.payload.as_event())
            .filter(|e| e.kind == EventKind::ActionStarted)
            .map(|e| e.node_id.as_str())
            .collect()
    }

    /// Most recent request outside the context-reconstruction phases.
    ///
    /// Interrupts are stored under their own payload type, so they are skipped too.
    pub fn last_non_context_request(&self) -> Option<&PhaseRequest> {
        self.records
            .iter()
            .rev()
            .filter_map(|r| r.payload.as_request())
            .find(|req| !req.kind.is_context_manager())
    }

    /// Request kinds in append order.
    pub fn request_sequence(&self) -> Vec<PhaseKind> {
        self.records
            .iter()
            .filter_map(|r| r.payload.as_request())
            .map(|req| req.kind)
            .collect()
    }

    /// Record count per phase name.
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.phase_name.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary_text(&self) -> String {
        if self.records.is_empty() {
            return "No historical entries".to_string();
        }
        let mut out = String::from("History Summary:\n");
        for (name, count) in self.summary() {
            out.push_str(&format!("  - {}: {} attempts\n", name, count));
        }
        out
    }

    fn check_indices(&self, indices: &[usize]) -> HistoryResult<()> {
        for &index in indices {
            if index >= self.records.len() {
                return Err(HistoryError::IndexOutOfBounds {
                    index,
                    len: self.records.len(),
                });
            }
        }
        Ok(())
    }

    pub fn add_note(
        &mut self,
        indices: Vec<usize>,
        content: impl Into<String>,
        tags: Vec<String>,
    ) -> HistoryResult<&HistoryNote> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(HistoryError::EmptyNote);
        }
        self.check_indices(&indices)?;
        self.notes.push(HistoryNote {
            note_id: Uuid::new_v4().to_string(),
            created: Utc::now(),
            entry_indices: indices,
            content,
            tags,
        });
        Ok(&self.notes[self.notes.len() - 1])
    }

    pub fn notes_for(&self, index: usize) -> Vec<&HistoryNote> {
        self.notes
            .iter()
            .filter(|n| n.entry_indices.contains(&index))
            .collect()
    }

    pub fn create_snapshot(
        &mut self,
        indices: Vec<usize>,
        summary: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> HistoryResult<&ContextSnapshot> {
        if indices.is_empty() {
            return Err(HistoryError::NoIndices);
        }
        self.check_indices(&indices)?;
        self.snapshots.push(ContextSnapshot {
            snapshot_id: Uuid::new_v4().to_string(),
            created: Utc::now(),
            entry_indices: indices,
            summary: summary.into(),
            reasoning: reasoning.into(),
        });
        Ok(&self.snapshots[self.snapshots.len() - 1])
    }
}
