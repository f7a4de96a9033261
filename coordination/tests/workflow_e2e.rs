//! End-to-End Workflow Tests
//!
//! Drives complete runs the way a hosting process would:
//! - Orchestrator through discovery, planning and tickets to completion
//! - Collector route-back and the visit warning it produces
//! - Curations flowing downstream into later phases' context

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use workflow_coordination::curation::{
    CurationBody, CurationNode, DiscoveryCuration, PlanningCuration, TicketCuration,
};
use workflow_coordination::{
    AssembledContext, CollectorDecision, DecisionError, DecisionMaker, EngineConfig,
    InMemoryArtifactStore, PhaseKind, PhaseRequest, PhaseResult, RoutingDecision, RunStatus,
    WorkflowEngine,
};

/// Replays decisions per phase and keeps every context it was shown.
#[derive(Default)]
struct ReplayMaker {
    decisions: Mutex<HashMap<PhaseKind, VecDeque<RoutingDecision>>>,
    seen: Mutex<Vec<(PhaseKind, AssembledContext)>>,
}

impl ReplayMaker {
    fn push(&self, kind: PhaseKind, decision: RoutingDecision) {
        self.decisions
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(decision);
    }

    fn contexts_for(&self, kind: PhaseKind) -> Vec<AssembledContext> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl DecisionMaker for ReplayMaker {
    async fn decide(
        &self,
        request: &PhaseRequest,
        context: &AssembledContext,
    ) -> Result<RoutingDecision, DecisionError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.kind, context.clone()));
        self.decisions
            .lock()
            .unwrap()
            .get_mut(&request.kind)
            .and_then(|q| q.pop_front())
            .ok_or(DecisionError::Exhausted(request.kind))
    }
}

fn advance(kind: PhaseKind, goal: &str) -> RoutingDecision {
    RoutingDecision::Advance {
        request: PhaseRequest::new(kind, goal),
    }
}

fn fan_out(kind: PhaseKind, goals: &[&str]) -> RoutingDecision {
    RoutingDecision::FanOut {
        requests: goals.iter().map(|g| PhaseRequest::new(kind, *g)).collect(),
    }
}

fn agent_done(kind: PhaseKind, output: &str) -> RoutingDecision {
    RoutingDecision::Consolidate {
        result: PhaseResult::new(kind, output),
    }
}

fn collect(kind: PhaseKind, body: CurationBody, decision: CollectorDecision) -> RoutingDecision {
    RoutingDecision::Consolidate {
        result: PhaseResult::new(kind, "collected")
            .with_curation(CurationNode::new(body, "best supported by the agent reports"))
            .with_collector_decision(decision),
    }
}

const GOAL: &str = "add a --dry-run flag to the deploy command";

fn full_script() -> ReplayMaker {
    let maker = ReplayMaker::default();
    maker.push(PhaseKind::Orchestrator, advance(PhaseKind::DiscoveryOrchestrator, GOAL));

    maker.push(
        PhaseKind::DiscoveryOrchestrator,
        fan_out(PhaseKind::DiscoveryAgent, &["find the deploy command", "find flag parsing"]),
    );
    maker.push(
        PhaseKind::DiscoveryAgent,
        agent_done(PhaseKind::DiscoveryAgent, "deploy lives in cli/deploy.rs"),
    );
    maker.push(
        PhaseKind::DiscoveryAgent,
        agent_done(PhaseKind::DiscoveryAgent, "flags are parsed with clap derive"),
    );
    maker.push(
        PhaseKind::DiscoveryAgentDispatch,
        advance(PhaseKind::DiscoveryCollector, GOAL),
    );

    // Two route-backs before the collector is satisfied.
    for _ in 0..2 {
        maker.push(
            PhaseKind::DiscoveryCollector,
            collect(
                PhaseKind::DiscoveryCollector,
                CurationBody::Discovery(DiscoveryCuration::new("flag parsing not yet located")),
                CollectorDecision::RouteBack,
            ),
        );
        maker.push(
            PhaseKind::DiscoveryOrchestrator,
            advance(PhaseKind::DiscoveryCollector, GOAL),
        );
    }
    maker.push(
        PhaseKind::DiscoveryCollector,
        collect(
            PhaseKind::DiscoveryCollector,
            CurationBody::Discovery(DiscoveryCuration::new("deploy command and clap flags mapped")),
            CollectorDecision::AdvancePhase,
        ),
    );

    maker.push(
        PhaseKind::PlanningOrchestrator,
        fan_out(PhaseKind::PlanningAgent, &["plan the flag"]),
    );
    maker.push(
        PhaseKind::PlanningAgent,
        agent_done(PhaseKind::PlanningAgent, "one ticket: add flag and skip apply"),
    );
    maker.push(
        PhaseKind::PlanningAgentDispatch,
        advance(PhaseKind::PlanningCollector, GOAL),
    );
    maker.push(
        PhaseKind::PlanningCollector,
        collect(
            PhaseKind::PlanningCollector,
            CurationBody::Planning(PlanningCuration::new("single ticket")),
            CollectorDecision::AdvancePhase,
        ),
    );

    maker.push(
        PhaseKind::TicketOrchestrator,
        fan_out(PhaseKind::TicketAgent, &["implement --dry-run"]),
    );
    maker.push(
        PhaseKind::TicketAgent,
        agent_done(PhaseKind::TicketAgent, "flag added, apply step skipped when set"),
    );
    maker.push(
        PhaseKind::TicketAgentDispatch,
        advance(PhaseKind::TicketCollector, GOAL),
    );
    maker.push(
        PhaseKind::TicketCollector,
        collect(
            PhaseKind::TicketCollector,
            CurationBody::Ticket(TicketCuration::new("ticket implemented")),
            CollectorDecision::AdvancePhase,
        ),
    );

    maker.push(
        PhaseKind::OrchestratorCollector,
        RoutingDecision::Consolidate {
            result: PhaseResult::new(PhaseKind::OrchestratorCollector, "goal met"),
        },
    );
    maker
}

#[tokio::test]
async fn test_full_run_completes() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let engine = WorkflowEngine::new(EngineConfig::default()).with_store(store.clone());
    let run_id = engine.start_run(GOAL).unwrap();
    let maker = full_script();

    let summary = engine
        .drive(&run_id, PhaseRequest::new(PhaseKind::Orchestrator, GOAL), &maker)
        .await
        .unwrap();

    assert_eq!(summary.status, Some(RunStatus::Completed));
    assert!(summary.halted.is_none());
    let phases = summary.phases();
    assert_eq!(phases.first(), Some(&PhaseKind::Orchestrator));
    assert_eq!(phases.last(), Some(&PhaseKind::OrchestratorCollector));
    assert_eq!(
        phases
            .iter()
            .filter(|k| **k == PhaseKind::DiscoveryCollector)
            .count(),
        3
    );
    assert!(summary
        .steps
        .iter()
        .all(|s| s.branch.is_some()));

    // Five collector curations under their own keys; the two identical
    // route-back curations share one content address.
    let keys = store.keys();
    assert_eq!(keys.iter().filter(|k| k.starts_with("content:")).count(), 4);
    assert!(keys.iter().any(|k| k.starts_with("previous:")));
}

#[tokio::test]
async fn test_third_collector_visit_is_warned() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run(GOAL).unwrap();
    let maker = full_script();
    engine
        .drive(&run_id, PhaseRequest::new(PhaseKind::Orchestrator, GOAL), &maker)
        .await
        .unwrap();

    let contexts = maker.contexts_for(PhaseKind::DiscoveryCollector);
    assert_eq!(contexts.len(), 3);
    assert!(!contexts[1].text.contains("Discovery Collector has been visited 2 times"));
    assert!(contexts[2]
        .text
        .contains("Discovery Collector has been visited 2 times"));
}

#[tokio::test]
async fn test_curations_reach_downstream_phases() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run(GOAL).unwrap();
    let maker = full_script();
    engine
        .drive(&run_id, PhaseRequest::new(PhaseKind::Orchestrator, GOAL), &maker)
        .await
        .unwrap();

    let planning = maker.contexts_for(PhaseKind::PlanningOrchestrator);
    assert!(planning[0].contains("curation-discovery-curation"));
    assert!(planning[0].text.contains("deploy command and clap flags mapped"));

    let history = engine.history(&run_id).unwrap().unwrap();
    let (_, ticket_request) = history.last_request(PhaseKind::TicketOrchestrator).unwrap();
    assert!(ticket_request.upstream.discovery.is_some());
    assert!(ticket_request.upstream.planning.is_some());

    let (_, dispatch) = history
        .last_request(PhaseKind::DiscoveryAgentDispatch)
        .unwrap();
    assert_eq!(dispatch.agent_results.len(), 2);
}

#[tokio::test]
async fn test_exhausted_script_surfaces_decision_error() {
    let engine = WorkflowEngine::new(EngineConfig::default());
    let run_id = engine.start_run(GOAL).unwrap();
    let maker = ReplayMaker::default();
    maker.push(PhaseKind::Orchestrator, advance(PhaseKind::DiscoveryOrchestrator, GOAL));

    let err = engine
        .drive(&run_id, PhaseRequest::new(PhaseKind::Orchestrator, GOAL), &maker)
        .await
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(
        err.to_string(),
        "Decision for discovery_orchestrator failed: No decision left for discovery_orchestrator"
    );
    assert_eq!(engine.status(&run_id).unwrap(), Some(RunStatus::Active));
}
