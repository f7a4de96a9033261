//! Integration tests for execution history ordering and queries
//!
//! Validates the record order a phase leaves behind, message batching,
//! paging and search, and the context tools built on top of them.

use std::sync::Arc;

use async_trait::async_trait;
use workflow_coordination::history::{EventKind, HistoryFilter, PayloadType, WorkflowEvent};
use workflow_coordination::tools::{
    AddNoteRequest, GetHistoryItemRequest, SearchHistoryRequest, TraceHistoryRequest,
};
use workflow_coordination::{
    AssembledContext, ContextTools, DecisionError, DecisionMaker, EngineConfig, ExecutionHistory,
    HistoryPayload, PhaseKind, PhaseRequest, PhaseResult, RoutingDecision, ToolStatus,
    WorkflowEngine,
};

struct Finish;

#[async_trait]
impl DecisionMaker for Finish {
    async fn decide(
        &self,
        request: &PhaseRequest,
        _context: &AssembledContext,
    ) -> Result<RoutingDecision, DecisionError> {
        Ok(RoutingDecision::Consolidate {
            result: PhaseResult::new(request.kind, format!("done: {}", request.goal)),
        })
    }
}

#[tokio::test]
async fn test_phase_leaves_ordered_records() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run("g").unwrap();
    let request = PhaseRequest::new(PhaseKind::TicketAgent, "write the migration");
    let node = request.context_id.to_string();
    engine.run_phase(&run_id, request, &Finish).await.unwrap();

    let history = engine.history(&run_id).unwrap().unwrap();
    let types: Vec<String> = history
        .records()
        .iter()
        .map(|r| r.payload_type.type_name())
        .collect();
    assert_eq!(
        types,
        vec![
            "ActionStartedEvent",
            "TicketAgentRequest",
            "TicketAgentRouting",
            "TicketAgentResult",
            "ActionCompletedEvent",
        ]
    );
    assert_eq!(history.records()[0].phase_name, format!("node:{}::ACTION_STARTED", node));
    assert!(history
        .records()
        .iter()
        .enumerate()
        .all(|(i, r)| r.index == i));
}

#[test]
fn test_message_events_share_one_batch() {
    let mut history = ExecutionHistory::new();
    history.record_event(WorkflowEvent::new(EventKind::AddMessage, "n1").with_message("hello"));
    history.record_event(WorkflowEvent::action_started("n2", PhaseKind::Review));
    history.record_event(WorkflowEvent::new(EventKind::StreamDelta, "n1").with_message("wor"));
    history.record_event(WorkflowEvent::new(EventKind::ToolCall, "n1").with_message("grep"));

    assert_eq!(history.len(), 2);
    let batch = match &history.get(0).unwrap().payload {
        HistoryPayload::MessageBatch(batch) => batch.clone(),
        other => panic!("expected a batch, got {other:?}"),
    };
    assert_eq!(batch.batch_id, "messages:1");
    let kinds: Vec<EventKind> = batch.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::AddMessage, EventKind::StreamDelta, EventKind::ToolCall]
    );

    let scoped = history.search("GREP", Some("messages:1"), 10);
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].event_index, Some(2));
    assert!(history.search("grep", Some("messages:9"), 10).is_empty());
    assert_eq!(history.batch_window("messages:1", 1, 5).len(), 2);
}

#[test]
fn test_paging_and_type_queries() {
    let mut history = ExecutionHistory::new();
    for i in 0..7 {
        let kind = if i % 2 == 0 {
            PhaseKind::DiscoveryAgent
        } else {
            PhaseKind::PlanningAgent
        };
        history
            .append(
                kind.as_str(),
                HistoryPayload::Request(PhaseRequest::new(kind, format!("step {i}"))),
            )
            .unwrap();
    }

    let filter = HistoryFilter {
        phase_contains: Some("discovery".to_string()),
        ..HistoryFilter::default()
    };
    let page = history.list(1, 2, &filter);
    assert_eq!(page.total, 4);
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.entries[0].index, 2);
    assert!(page.has_more);

    assert_eq!(
        history.count_of_type(PayloadType::Request(PhaseKind::PlanningAgent)),
        3
    );
    assert_eq!(
        history
            .last_of_type(PayloadType::Request(PhaseKind::DiscoveryAgent))
            .unwrap()
            .index,
        6
    );
    assert_eq!(history.summary().get("discovery_agent"), Some(&4));
}

#[tokio::test]
async fn test_tools_over_a_live_run() {
    let engine = Arc::new(WorkflowEngine::new(EngineConfig::default()));
    let run_id = engine.start_run("g").unwrap();
    engine
        .run_phase(
            &run_id,
            PhaseRequest::new(PhaseKind::PlanningAgent, "split the migration"),
            &Finish,
        )
        .await
        .unwrap();
    let tools = ContextTools::new(engine.clone());

    let trace = tools.trace_history(&TraceHistoryRequest {
        run_id: run_id.clone(),
        phase_filter: Some("planning".to_string()),
        payload_type_filter: None,
    });
    assert!(trace.is_success());
    assert_eq!(trace.data.unwrap().total, 3);

    let hits = tools.search_history(&SearchHistoryRequest {
        run_id: run_id.clone(),
        query: "split the migration".to_string(),
        scope: None,
        max: Some(1),
    });
    assert_eq!(hits.data.unwrap().hits.len(), 1);

    let len_before = engine.history(&run_id).unwrap().unwrap().len();
    let note = tools.add_history_note(&AddNoteRequest {
        run_id: run_id.clone(),
        indices: vec![1],
        content: "migration must be reversible".to_string(),
        tags: vec!["db".to_string()],
    });
    assert!(note.is_success());
    assert_eq!(engine.history(&run_id).unwrap().unwrap().len(), len_before);

    let empty_note = tools.add_history_note(&AddNoteRequest {
        run_id: run_id.clone(),
        indices: vec![1],
        content: " ".to_string(),
        tags: vec![],
    });
    assert_eq!(empty_note.status, ToolStatus::Error);

    let item = tools.get_history_item(&GetHistoryItemRequest { run_id, index: 1 });
    assert_eq!(item.data.unwrap().notes[0].tags, vec!["db".to_string()]);
}
