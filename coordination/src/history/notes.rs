//! Annotations attached to history records.
//!
//! Notes and snapshots reference records by index and never modify them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text annotation explaining inclusion, exclusion or routing rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryNote {
    pub note_id: String,
    pub created: DateTime<Utc>,
    pub entry_indices: Vec<usize>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A curated bundle of history records assembled during context reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub snapshot_id: String,
    pub created: DateTime<Utc>,
    pub entry_indices: Vec<usize>,
    pub summary: String,
    #[serde(default)]
    pub reasoning: String,
}
