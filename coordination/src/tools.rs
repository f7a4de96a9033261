//! History tools for context-reconstruction phases.
//!
//! Every operation answers with a [`ToolResponse`] carrying `success`,
//! `empty` or `error`. Failures are reported in the response, never raised.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{WorkflowEngine, WorkflowRun};
use crate::error::EngineError;
use crate::history::{
    ContextSnapshot, ExecutionRecord, HistoryError, HistoryFilter, HistoryNote, SearchHit,
};

// ============================================================================
// Tool Request/Response Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse<T> {
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ToolResponse<T> {
    fn success(data: T) -> Self {
        Self {
            status: ToolStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    fn empty(data: Option<T>, message: Option<String>) -> Self {
        Self {
            status: ToolStatus::Empty,
            data,
            error: message,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Condensed view of one history record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub phase_name: String,
    pub payload_type: String,
    pub preview: String,
    /// Notes attached to this record
    pub note_count: usize,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct TraceHistoryRequest {
    pub run_id: String,
    #[schemars(description = "Case-insensitive substring of the phase name")]
    pub phase_filter: Option<String>,
    #[schemars(description = "Exact payload type name, e.g. DiscoveryCollectorResult")]
    pub payload_type_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceResponse {
    pub entries: Vec<EntryView>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct ListHistoryRequest {
    pub run_id: String,
    pub offset: Option<usize>,
    #[schemars(description = "Page size (default 50, max 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Only records strictly after this time")]
    pub start: Option<DateTime<Utc>>,
    #[schemars(description = "Only records strictly before this time")]
    pub end: Option<DateTime<Utc>>,
    pub phase_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResponse {
    pub entries: Vec<EntryView>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct SearchHistoryRequest {
    pub run_id: String,
    pub query: String,
    #[schemars(description = "Message batch id to restrict the search to")]
    pub scope: Option<String>,
    #[schemars(description = "Maximum hits (default 20, max 50)")]
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct GetHistoryItemRequest {
    pub run_id: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItemResponse {
    pub entry: ExecutionRecord,
    pub notes: Vec<HistoryNote>,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct CreateSnapshotRequest {
    pub run_id: String,
    pub indices: Vec<usize>,
    pub summary: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct AddNoteRequest {
    pub run_id: String,
    pub indices: Vec<usize>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================================================
// Tools
// ============================================================================

/// Truncate to at most `max` characters; the `...` suffix counts toward it.
pub fn truncate_preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

pub struct ContextTools {
    engine: Arc<WorkflowEngine>,
}

impl ContextTools {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    fn view(&self, run: &WorkflowRun, record: &ExecutionRecord) -> EntryView {
        EntryView {
            index: record.index,
            timestamp: record.timestamp,
            phase_name: record.phase_name.clone(),
            payload_type: record.payload_type.type_name(),
            preview: truncate_preview(
                &record.payload.stringified(),
                self.engine.config().entry_preview_chars,
            ),
            note_count: run.history.notes_for(record.index).len(),
        }
    }

    fn unknown_run<T>(run_id: &str) -> ToolResponse<T> {
        ToolResponse::empty(None, Some(format!("Workflow run '{}' does not exist", run_id)))
    }

    fn engine_failure<T>(op: &str, e: EngineError) -> ToolResponse<T> {
        warn!(tool = op, error = %e, "Context tool failed");
        ToolResponse::error(e.to_string())
    }

    /// Every record, optionally filtered by phase name and payload type.
    pub fn trace_history(&self, req: &TraceHistoryRequest) -> ToolResponse<TraceResponse> {
        let phase = req.phase_filter.as_deref().map(str::to_lowercase);
        let payload_type = req.payload_type_filter.as_deref();
        let traced = self.engine.inspect(&req.run_id, |run| {
            run.history
                .records()
                .iter()
                .filter(|r| {
                    phase
                        .as_ref()
                        .map_or(true, |p| r.phase_name.to_lowercase().contains(p))
                })
                .filter(|r| {
                    payload_type.map_or(true, |t| r.payload_type.type_name().eq_ignore_ascii_case(t))
                })
                .map(|r| self.view(run, r))
                .collect::<Vec<_>>()
        });
        match traced {
            Ok(Some(entries)) => {
                debug!(run_id = %req.run_id, count = entries.len(), "trace_history");
                let total = entries.len();
                let response = TraceResponse { entries, total };
                if total == 0 {
                    ToolResponse::empty(Some(response), None)
                } else {
                    ToolResponse::success(response)
                }
            }
            Ok(None) => Self::unknown_run(&req.run_id),
            Err(e) => Self::engine_failure("trace_history", e),
        }
    }

    pub fn list_history(&self, req: &ListHistoryRequest) -> ToolResponse<ListResponse> {
        let offset = req.offset.unwrap_or(0);
        let limit = self.engine.config().page_limit(req.limit);
        let filter = HistoryFilter {
            start: req.start,
            end: req.end,
            phase_contains: req.phase_filter.clone(),
        };
        let listed = self.engine.inspect(&req.run_id, |run| {
            let page = run.history.list(offset, limit, &filter);
            ListResponse {
                entries: page.entries.iter().map(|r| self.view(run, r)).collect(),
                total: page.total,
                offset: page.offset,
                limit: page.limit,
                has_more: page.has_more,
            }
        });
        match listed {
            Ok(Some(page)) if page.entries.is_empty() => ToolResponse::empty(Some(page), None),
            Ok(Some(page)) => ToolResponse::success(page),
            Ok(None) => Self::unknown_run(&req.run_id),
            Err(e) => Self::engine_failure("list_history", e),
        }
    }

    pub fn search_history(&self, req: &SearchHistoryRequest) -> ToolResponse<SearchResponse> {
        if req.query.trim().is_empty() {
            return ToolResponse::error("Search query cannot be empty");
        }
        let max = self.engine.config().search_limit(req.max);
        let searched = self.engine.inspect(&req.run_id, |run| {
            run.history.search(&req.query, req.scope.as_deref(), max)
        });
        match searched {
            Ok(Some(hits)) => {
                debug!(run_id = %req.run_id, query = %req.query, hits = hits.len(), "search_history");
                let response = SearchResponse {
                    query: req.query.clone(),
                    hits,
                };
                if response.hits.is_empty() {
                    ToolResponse::empty(Some(response), None)
                } else {
                    ToolResponse::success(response)
                }
            }
            Ok(None) => Self::unknown_run(&req.run_id),
            Err(e) => Self::engine_failure("search_history", e),
        }
    }

    /// Full record with its notes.
    pub fn get_history_item(&self, req: &GetHistoryItemRequest) -> ToolResponse<HistoryItemResponse> {
        let item = self.engine.inspect(&req.run_id, |run| {
            match run.history.get(req.index) {
                Some(record) => Ok(HistoryItemResponse {
                    entry: record.clone(),
                    notes: run
                        .history
                        .notes_for(req.index)
                        .into_iter()
                        .cloned()
                        .collect(),
                }),
                None => Err(HistoryError::IndexOutOfBounds {
                    index: req.index,
                    len: run.history.len(),
                }),
            }
        });
        match item {
            Ok(Some(Ok(item))) => ToolResponse::success(item),
            Ok(Some(Err(e))) => ToolResponse::error(e.to_string()),
            Ok(None) => Self::unknown_run(&req.run_id),
            Err(e) => Self::engine_failure("get_history_item", e),
        }
    }

    pub fn create_context_snapshot(
        &self,
        req: &CreateSnapshotRequest,
    ) -> ToolResponse<ContextSnapshot> {
        let created = self.engine.update(&req.run_id, |run| {
            run.history
                .create_snapshot(req.indices.clone(), req.summary.clone(), req.reasoning.clone())
                .map(|s| s.clone())
        });
        match created {
            Ok(Some(Ok(snapshot))) => {
                debug!(
                    run_id = %req.run_id,
                    snapshot_id = %snapshot.snapshot_id,
                    entries = snapshot.entry_indices.len(),
                    "Context snapshot created"
                );
                ToolResponse::success(snapshot)
            }
            Ok(Some(Err(e))) => ToolResponse::error(e.to_string()),
            Ok(None) => ToolResponse::error(format!("Workflow run '{}' does not exist", req.run_id)),
            Err(e) => Self::engine_failure("create_context_snapshot", e),
        }
    }

    pub fn add_history_note(&self, req: &AddNoteRequest) -> ToolResponse<HistoryNote> {
        let added = self.engine.update(&req.run_id, |run| {
            run.history
                .add_note(req.indices.clone(), req.content.clone(), req.tags.clone())
                .map(|n| n.clone())
        });
        match added {
            Ok(Some(Ok(note))) => ToolResponse::success(note),
            Ok(Some(Err(e))) => ToolResponse::error(e.to_string()),
            Ok(None) => ToolResponse::error(format!("Workflow run '{}' does not exist", req.run_id)),
            Err(e) => Self::engine_failure("add_history_note", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::history::HistoryPayload;
    use crate::model::{PhaseKind, PhaseRequest, PhaseResult};

    fn tools_with_history() -> (ContextTools, String) {
        let engine = Arc::new(WorkflowEngine::new(EngineConfig {
            entry_preview_chars: 40,
            ..EngineConfig::default()
        }));
        let run_id = engine.start_run("index the repo").unwrap();
        engine
            .update(&run_id, |run| {
                run.history
                    .append(
                        "discovery_orchestrator",
                        HistoryPayload::Request(PhaseRequest::new(
                            PhaseKind::DiscoveryOrchestrator,
                            "index the repo",
                        )),
                    )
                    .unwrap();
                run.history
                    .append(
                        "discovery_agent",
                        HistoryPayload::Result(PhaseResult::new(
                            PhaseKind::DiscoveryAgent,
                            "the tokenizer is generated by a build script",
                        )),
                    )
                    .unwrap();
            })
            .unwrap();
        (ContextTools::new(engine), run_id)
    }

    #[test]
    fn test_truncate_preview_counts_suffix() {
        assert_eq!(truncate_preview("short", 10), "short");
        let cut = truncate_preview("abcdefghijkl", 8);
        assert_eq!(cut, "abcde...");
        assert_eq!(cut.chars().count(), 8);
    }

    #[test]
    fn test_trace_filters_by_payload_type() {
        let (tools, run_id) = tools_with_history();
        let all = tools.trace_history(&TraceHistoryRequest {
            run_id: run_id.clone(),
            phase_filter: None,
            payload_type_filter: None,
        });
        assert_eq!(all.data.unwrap().total, 2);

        let results = tools.trace_history(&TraceHistoryRequest {
            run_id,
            phase_filter: None,
            payload_type_filter: Some("DiscoveryAgentResult".to_string()),
        });
        assert!(results.is_success());
        let entries = results.data.unwrap().entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 1);
        assert!(entries[0].preview.chars().count() <= 40);
        assert!(entries[0].preview.ends_with("..."));
    }

    #[test]
    fn test_unknown_run_is_empty_for_reads_and_error_for_writes() {
        let (tools, _) = tools_with_history();
        let read = tools.list_history(&ListHistoryRequest {
            run_id: "missing".to_string(),
            ..ListHistoryRequest::default()
        });
        assert_eq!(read.status, ToolStatus::Empty);

        let write = tools.add_history_note(&AddNoteRequest {
            run_id: "missing".to_string(),
            indices: vec![0],
            content: "note".to_string(),
            tags: vec![],
        });
        assert_eq!(write.status, ToolStatus::Error);
    }

    #[test]
    fn test_list_clamps_limit() {
        let (tools, run_id) = tools_with_history();
        let page = tools.list_history(&ListHistoryRequest {
            run_id,
            limit: Some(1000),
            ..ListHistoryRequest::default()
        });
        let page = page.data.unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.total, 2);
        assert!(!page.has_more);
    }

    #[test]
    fn test_search_requires_query() {
        let (tools, run_id) = tools_with_history();
        let blank = tools.search_history(&SearchHistoryRequest {
            run_id: run_id.clone(),
            query: "  ".to_string(),
            scope: None,
            max: None,
        });
        assert_eq!(blank.status, ToolStatus::Error);

        let found = tools.search_history(&SearchHistoryRequest {
            run_id,
            query: "TOKENIZER".to_string(),
            scope: None,
            max: None,
        });
        assert!(found.is_success());
        assert_eq!(found.data.unwrap().hits[0].index, 1);
    }

    #[test]
    fn test_get_item_out_of_bounds_reports_range() {
        let (tools, run_id) = tools_with_history();
        let missing = tools.get_history_item(&GetHistoryItemRequest {
            run_id: run_id.clone(),
            index: 7,
        });
        assert_eq!(missing.status, ToolStatus::Error);
        assert!(missing.error.unwrap().contains("0-1"));

        let item = tools.get_history_item(&GetHistoryItemRequest { run_id, index: 0 });
        assert_eq!(item.data.unwrap().entry.phase_name, "discovery_orchestrator");
    }

    #[test]
    fn test_notes_and_snapshots_leave_records_untouched() {
        let (tools, run_id) = tools_with_history();
        let note = tools.add_history_note(&AddNoteRequest {
            run_id: run_id.clone(),
            indices: vec![1],
            content: "tokenizer is generated, do not edit".to_string(),
            tags: vec!["build".to_string()],
        });
        assert!(note.is_success());

        let snapshot = tools.create_context_snapshot(&CreateSnapshotRequest {
            run_id: run_id.clone(),
            indices: vec![0, 1],
            summary: "discovery so far".to_string(),
            reasoning: String::new(),
        });
        assert!(snapshot.is_success());

        let bad = tools.create_context_snapshot(&CreateSnapshotRequest {
            run_id: run_id.clone(),
            indices: vec![],
            summary: "nothing".to_string(),
            reasoning: String::new(),
        });
        assert_eq!(bad.status, ToolStatus::Error);

        let item = tools.get_history_item(&GetHistoryItemRequest { run_id, index: 1 });
        let item = item.data.unwrap();
        assert_eq!(item.notes.len(), 1);
        assert_eq!(item.entry.index, 1);
    }
}
