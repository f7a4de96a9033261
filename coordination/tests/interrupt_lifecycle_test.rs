//! Integration tests for the interrupt lifecycle
//!
//! Covers suspension, resolution, resumption and the history trail each
//! step leaves behind, plus the rejections for out-of-order calls.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use workflow_coordination::history::{EventKind, PayloadType};
use workflow_coordination::interrupt::InterruptError;
use workflow_coordination::model::InterruptChoice;
use workflow_coordination::{
    AssembledContext, DecisionError, DecisionMaker, EngineConfig, InterruptLedger,
    InterruptRequest, InterruptStatus, InterruptType, PhaseKind, PhaseOutcome, PhaseRequest,
    ResolveOutcome, RoutingDecision, RunStatus, WorkflowEngine,
};

/// Interrupts on the first call, then advances; remembers the contexts it saw.
struct ReviewThenAdvance {
    interrupt: InterruptRequest,
    seen: Mutex<Vec<AssembledContext>>,
}

impl ReviewThenAdvance {
    fn new(interrupt: InterruptRequest) -> Self {
        Self {
            interrupt,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DecisionMaker for ReviewThenAdvance {
    async fn decide(
        &self,
        request: &PhaseRequest,
        context: &AssembledContext,
    ) -> Result<RoutingDecision, DecisionError> {
        let mut seen = self.seen.lock().unwrap();
        seen.push(context.clone());
        if seen.len() == 1 {
            return Ok(RoutingDecision::Interrupt(self.interrupt.clone()));
        }
        Ok(RoutingDecision::Advance {
            request: PhaseRequest::new(PhaseKind::TicketOrchestrator, request.goal.clone()),
        })
    }
}

fn approval() -> InterruptRequest {
    let mut options = BTreeMap::new();
    options.insert("a".to_string(), "approve both tickets".to_string());
    options.insert("b".to_string(), "drop the migration ticket".to_string());
    InterruptRequest::new(InterruptType::HumanReview, "Approve the ticket plan?")
        .with_context_for_decision("Two tickets, one touches the schema")
        .with_choice(InterruptChoice {
            question: "Which tickets should proceed?".to_string(),
            options,
        })
}

#[tokio::test]
async fn test_full_lifecycle_leaves_history_trail() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run("schema change").unwrap();
    let maker = ReviewThenAdvance::new(approval());

    let outcome = engine
        .run_phase(
            &run_id,
            PhaseRequest::new(PhaseKind::PlanningCollector, "schema change"),
            &maker,
        )
        .await
        .unwrap();
    let PhaseOutcome::Suspended(ctx) = outcome else {
        panic!("expected suspension, got {outcome:?}");
    };
    assert_eq!(ctx.status, InterruptStatus::Requested);
    assert_eq!(ctx.origin_phase, PhaseKind::PlanningCollector);
    assert_eq!(ctx.interrupt_node_id, format!("interrupt-{}", ctx.id));
    assert_eq!(ctx.choices.len(), 1);

    let ResolveOutcome::Stored(stored) = engine
        .resolve_interrupt(&run_id, &ctx.id, "a")
        .unwrap()
    else {
        panic!("expected the resolution to be stored");
    };
    assert_eq!(stored.result_payload.as_deref(), Some("a"));

    let PhaseOutcome::Next(resumed) = engine.resume(&run_id).unwrap() else {
        panic!("expected a resumed request");
    };
    assert_eq!(resumed.kind, PhaseKind::PlanningCollector);
    assert_eq!(engine.status(&run_id).unwrap(), Some(RunStatus::Active));

    let outcome = engine.run_phase(&run_id, resumed, &maker).await.unwrap();
    assert!(matches!(outcome, PhaseOutcome::Next(ref r) if r.kind == PhaseKind::TicketOrchestrator));

    // The resumed phase saw its resolution.
    let seen = maker.seen.lock().unwrap();
    assert!(seen[1].contains("interrupt-feedback"));
    assert!(seen[1].text.contains("Resolution: \"a\""));
    assert!(!seen[0].contains("interrupt-feedback"));
    drop(seen);

    let summary = engine.summary(&run_id).unwrap().unwrap();
    let final_ctx = &summary.interrupts[0];
    assert_eq!(final_ctx.status, InterruptStatus::Resolved);
    let path: Vec<InterruptStatus> = final_ctx.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        path,
        vec![
            InterruptStatus::ResultStored,
            InterruptStatus::StatusEmitted,
            InterruptStatus::Resolved
        ]
    );

    let history = engine.history(&run_id).unwrap().unwrap();
    assert_eq!(
        history.count_of_type(PayloadType::Interrupt(PhaseKind::PlanningCollector)),
        1
    );
    assert_eq!(history.count_of_type(PayloadType::InterruptResolution), 1);
    // REQUESTED, STATUS_EMITTED and RESOLVED each reach the interrupt node
    // and the origin node.
    assert_eq!(
        history.count_of_type(PayloadType::Event(EventKind::InterruptStatus)),
        6
    );
    assert!(history
        .records()
        .iter()
        .any(|r| r.phase_name == format!("node:{}::RESOLVE_INTERRUPT", ctx.interrupt_node_id)));
}

#[tokio::test]
async fn test_out_of_order_calls_are_rejected() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run("g").unwrap();

    assert!(matches!(
        engine.resume(&run_id).unwrap(),
        PhaseOutcome::Rejected(ref r) if r.code == "RUN_NOT_SUSPENDED"
    ));
    assert!(matches!(
        engine.resolve_interrupt(&run_id, "nope", "x").unwrap(),
        ResolveOutcome::Rejected(ref r) if r.code == "UNKNOWN_INTERRUPT"
    ));
    assert!(matches!(
        engine.resolve_interrupt("missing-run", "nope", "x").unwrap(),
        ResolveOutcome::Rejected(ref r) if r.code == "UNKNOWN_RUN"
    ));

    let maker = ReviewThenAdvance::new(InterruptRequest::new(InterruptType::AgentReview, "check"));
    let PhaseOutcome::Suspended(ctx) = engine
        .run_phase(&run_id, PhaseRequest::new(PhaseKind::Review, "g"), &maker)
        .await
        .unwrap()
    else {
        panic!("expected suspension");
    };
    engine.abort(&run_id, "operator").unwrap();
    assert!(matches!(
        engine.resolve_interrupt(&run_id, &ctx.id, "late").unwrap(),
        ResolveOutcome::Rejected(ref r) if r.code == "RUN_NOT_ACTIVE"
    ));
}

#[tokio::test]
async fn test_stop_ends_run_without_ledger_entry() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run("g").unwrap();
    let maker = ReviewThenAdvance::new(InterruptRequest::new(InterruptType::Stop, "user cancelled"));

    let outcome = engine
        .run_phase(&run_id, PhaseRequest::new(PhaseKind::Merger, "g"), &maker)
        .await
        .unwrap();
    assert_eq!(outcome, PhaseOutcome::Stopped);

    let summary = engine.summary(&run_id).unwrap().unwrap();
    assert_eq!(summary.status, Some(RunStatus::Stopped));
    assert!(summary.interrupts.is_empty());
    let history = engine.history(&run_id).unwrap().unwrap();
    assert_eq!(history.interrupts_of(PhaseKind::Merger).len(), 1);
}

#[test]
fn test_ledger_allows_one_pending_interrupt() {
    let mut ledger = InterruptLedger::new();
    let req = InterruptRequest::new(InterruptType::Pause, "hold");
    let first = ledger
        .request(PhaseKind::TicketAgent, "node-1", &req)
        .unwrap()
        .id
        .clone();

    match ledger.request(PhaseKind::TicketAgent, "node-2", &req) {
        Err(InterruptError::AlreadyPending { pending }) => assert_eq!(pending, first),
        other => panic!("expected AlreadyPending, got {other:?}"),
    }
    assert!(matches!(
        ledger.request(PhaseKind::TicketAgent, "  ", &req),
        Err(InterruptError::MissingOrigin)
    ));

    // Skipping RESULT_STORED is refused and leaves the state untouched.
    assert!(ledger.emit_status(&first).is_err());
    assert_eq!(ledger.get(&first).unwrap().status, InterruptStatus::Requested);

    ledger.store_result(&first, "resume").unwrap();
    ledger.emit_status(&first).unwrap();
    ledger.resolve(&first).unwrap();
    assert!(ledger.pending().is_none());
    assert!(ledger
        .request(PhaseKind::TicketAgent, "node-2", &req)
        .is_ok());
}
