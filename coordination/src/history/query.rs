//! Pagination and search over a run's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{HistoryPayload, PayloadType};
use super::{ExecutionHistory, ExecutionRecord};

/// Filters applied by [`ExecutionHistory::list`]. Time bounds are exclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_contains: Option<String>,
}

impl HistoryFilter {
    pub fn matches(&self, record: &ExecutionRecord) -> bool {
        if let Some(start) = self.start {
            if record.timestamp <= start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if record.timestamp >= end {
                return false;
            }
        }
        match &self.phase_contains {
            Some(needle) => record.phase_name.contains(needle.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage<'a> {
    pub entries: Vec<&'a ExecutionRecord>,
    /// Records matching the filter, before paging
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// One search match. `event_index` is set for hits inside a message batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_index: Option<usize>,
    pub phase_name: String,
    pub payload_type: PayloadType,
}

impl ExecutionHistory {
    /// Filtered page of records in append order.
    pub fn list(&self, offset: usize, limit: usize, filter: &HistoryFilter) -> HistoryPage<'_> {
        let filtered: Vec<&ExecutionRecord> =
            self.records().iter().filter(|r| filter.matches(r)).collect();
        let total = filtered.len();
        let entries = filtered.into_iter().skip(offset).take(limit).collect();
        HistoryPage {
            entries,
            total,
            offset,
            limit,
            has_more: offset.saturating_add(limit) < total,
        }
    }

    /// Case-insensitive substring search.
    ///
    /// Without a scope every record is matched on phase name, type name and
    /// payload text. A scope naming a message batch id searches only that
    /// batch's events; an unknown scope matches nothing.
    pub fn search(&self, query: &str, scope: Option<&str>, limit: usize) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        if let Some(scope) = scope {
            let Some((index, record, batch)) = self.find_batch(scope) else {
                return Vec::new();
            };
            return batch
                .events
                .iter()
                .enumerate()
                .filter(|(_, event)| {
                    serde_json::to_string(event)
                        .unwrap_or_default()
                        .to_lowercase()
                        .contains(&needle)
                })
                .take(limit)
                .map(|(event_index, _)| SearchHit {
                    index,
                    event_index: Some(event_index),
                    phase_name: record.phase_name.clone(),
                    payload_type: record.payload_type,
                })
                .collect();
        }

        self.records()
            .iter()
            .filter(|record| {
                record.phase_name.to_lowercase().contains(&needle)
                    || record.payload_type.type_name().to_lowercase().contains(&needle)
                    || record.payload.stringified().to_lowercase().contains(&needle)
            })
            .take(limit)
            .map(|record| SearchHit {
                index: record.index,
                event_index: None,
                phase_name: record.phase_name.clone(),
                payload_type: record.payload_type,
            })
            .collect()
    }

    /// Index window over a batch's events. Unknown batches yield an empty window.
    pub fn batch_window(
        &self,
        batch_id: &str,
        offset: usize,
        limit: usize,
    ) -> Vec<&super::WorkflowEvent> {
        match self.find_batch(batch_id) {
            Some((_, _, batch)) => batch.events.iter().skip(offset).take(limit).collect(),
            None => Vec::new(),
        }
    }

    fn find_batch(
        &self,
        batch_id: &str,
    ) -> Option<(usize, &ExecutionRecord, &super::payload::MessageBatch)> {
        self.records().iter().find_map(|record| match &record.payload {
            HistoryPayload::MessageBatch(batch) if batch.batch_id == batch_id => {
                Some((record.index, record, batch))
            }
            _ => None,
        })
    }
}
