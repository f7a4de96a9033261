//! Workflow engine.
//!
//! Owns every run's history, interrupt ledger and status, and moves a run
//! forward one phase at a time:
//!
//! 1. `prepare_phase` validates the request, records `ActionStarted`, runs the
//!    degenerate-loop policy, resolves the previous attempt, assembles the
//!    context and appends the request to history.
//! 2. The [`DecisionMaker`] answers with a [`RoutingDecision`].
//! 3. `apply_decision` records the decision and turns it into a [`PhaseOutcome`].
//!
//! `drive` repeats this until the run completes, suspends, stops or is
//! turned away. Each run sits behind its own lock, so history appends within
//! a run are linearizable while separate runs never contend. No lock is held
//! while a decision is awaited.

mod decision;
mod outcome;
mod run;

pub use decision::{DecisionError, DecisionMaker};
pub use outcome::{PhaseOutcome, Preparation, PreparedPhase, ResolveOutcome};
pub use run::{FanOutProgress, PhaseStep, RunStatus, RunSummary, WorkflowRun};

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::contribution::{ContributionContext, ContributionPipeline};
use crate::curation::{Artifact, Blake3Hasher, ContentHasher, CurationNode};
use crate::error::{EngineError, EngineResult, Rejection};
use crate::history::{EventKind, ExecutionHistory, HistoryPayload, InterruptPayload, WorkflowEvent};
use crate::interrupt::{InterruptContext, InterruptError, InterruptStatus};
use crate::loop_detect::{DegenerateLoopPolicy, NodeRepetitionPolicy};
use crate::model::{
    ArtifactKey, InterruptFeedback, InterruptRequest, InterruptType, PhaseKind, PhaseRequest,
    PhaseResult, RoutingDecision,
};
use crate::previous::PreviousAttemptContext;
use crate::registry::{self, collector_routes, fan_out_for, ReturnRoute};
use crate::store::{
    content_key, previous_key, ArtifactStore, InMemoryArtifactStore, StoredArtifact,
};

type RunHandle = Arc<RwLock<WorkflowRun>>;

/// Result of joining a fan-out.
enum Join {
    Dispatch(PhaseRequest),
    Halted(Option<Rejection>),
}

pub struct WorkflowEngine {
    config: EngineConfig,
    runs: RwLock<HashMap<String, RunHandle>>,
    pipeline: ContributionPipeline,
    loop_policy: Arc<dyn DegenerateLoopPolicy>,
    store: Arc<dyn ArtifactStore>,
    hasher: Arc<dyn ContentHasher>,
}

impl WorkflowEngine {
    /// Engine with the default contribution pipeline, node-repetition loop
    /// policy, in-memory artifact store and BLAKE3 hasher.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            pipeline: ContributionPipeline::with_defaults(&config),
            loop_policy: Arc::new(NodeRepetitionPolicy::new(config.loop_repetition_threshold)),
            store: Arc::new(InMemoryArtifactStore::new()),
            hasher: Arc::new(Blake3Hasher),
            runs: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_pipeline(mut self, pipeline: ContributionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_loop_policy(mut self, policy: Arc<dyn DegenerateLoopPolicy>) -> Self {
        self.loop_policy = policy;
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &ContributionPipeline {
        &self.pipeline
    }

    // ------------------------------------------------------------------
    // Run registry
    // ------------------------------------------------------------------

    pub fn start_run(&self, goal: impl Into<String>) -> EngineResult<String> {
        let run = WorkflowRun::new(goal);
        let run_id = run.id.clone();
        info!(run_id = %run_id, goal = %run.goal, "Workflow run started");
        self.runs
            .write()
            .map_err(|_| EngineError::LockPoisoned("runs".to_string()))?
            .insert(run_id.clone(), Arc::new(RwLock::new(run)));
        Ok(run_id)
    }

    pub fn run_ids(&self) -> EngineResult<Vec<String>> {
        let runs = self
            .runs
            .read()
            .map_err(|_| EngineError::LockPoisoned("runs".to_string()))?;
        let mut ids: Vec<String> = runs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn handle(&self, run_id: &str) -> EngineResult<Option<RunHandle>> {
        let runs = self
            .runs
            .read()
            .map_err(|_| EngineError::LockPoisoned("runs".to_string()))?;
        Ok(runs.get(run_id).cloned())
    }

    fn read(handle: &RwLock<WorkflowRun>) -> EngineResult<RwLockReadGuard<'_, WorkflowRun>> {
        handle
            .read()
            .map_err(|_| EngineError::LockPoisoned("run".to_string()))
    }

    fn write(handle: &RwLock<WorkflowRun>) -> EngineResult<RwLockWriteGuard<'_, WorkflowRun>> {
        handle
            .write()
            .map_err(|_| EngineError::LockPoisoned("run".to_string()))
    }

    /// Read access to one run. `None` when the run does not exist.
    pub fn inspect<T>(
        &self,
        run_id: &str,
        f: impl FnOnce(&WorkflowRun) -> T,
    ) -> EngineResult<Option<T>> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(None);
        };
        let run = Self::read(&handle)?;
        Ok(Some(f(&*run)))
    }

    /// Write access to one run. `None` when the run does not exist.
    pub fn update<T>(
        &self,
        run_id: &str,
        f: impl FnOnce(&mut WorkflowRun) -> T,
    ) -> EngineResult<Option<T>> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(None);
        };
        let mut run = Self::write(&handle)?;
        Ok(Some(f(&mut *run)))
    }

    pub fn status(&self, run_id: &str) -> EngineResult<Option<RunStatus>> {
        self.inspect(run_id, |run| run.status)
    }

    /// A copy of the run's history.
    pub fn history(&self, run_id: &str) -> EngineResult<Option<ExecutionHistory>> {
        self.inspect(run_id, |run| run.history.clone())
    }

    pub fn summary(&self, run_id: &str) -> EngineResult<Option<RunSummary>> {
        self.inspect(run_id, WorkflowRun::summary)
    }

    pub fn pending_interrupt(&self, run_id: &str) -> EngineResult<Option<InterruptContext>> {
        Ok(self
            .inspect(run_id, |run| run.interrupts.pending().cloned())?
            .flatten())
    }

    /// Where a context-reconstruction phase in this run would hand control back.
    pub fn return_route(&self, run_id: &str) -> EngineResult<Option<ReturnRoute>> {
        self.inspect(run_id, |run| registry::resolve_return_route(&run.history))
    }

    /// Abort a run. Returns `false` if it does not exist or already ended.
    pub fn abort(&self, run_id: &str, reason: &str) -> EngineResult<bool> {
        let aborted = self.update(run_id, |run| {
            if run.status.is_terminal() {
                return false;
            }
            warn!(run_id = %run.id, reason, "Workflow run aborted");
            run.abort(reason);
            true
        })?;
        Ok(aborted.unwrap_or(false))
    }

    // ------------------------------------------------------------------
    // Phase execution
    // ------------------------------------------------------------------

    fn accepts_phases(run: &WorkflowRun) -> Result<(), Rejection> {
        match run.status {
            RunStatus::Active => Ok(()),
            RunStatus::Suspended => {
                let pending = run
                    .interrupts
                    .pending()
                    .map(|c| c.id.clone())
                    .unwrap_or_default();
                Err(Rejection::new(
                    "RUN_SUSPENDED",
                    format!(
                        "Workflow run '{}' is waiting on interrupt '{}'",
                        run.id, pending
                    ),
                    "Resolve the pending interrupt with resolve_interrupt, then call resume",
                )
                .with_run(&run.id)
                .with_context("interrupt_id", pending))
            }
            status => Err(Rejection::run_not_active(&run.id, status)),
        }
    }

    /// Record the request and assemble its decision context.
    ///
    /// Fails only on a degenerate loop, which also aborts the run.
    pub fn prepare_phase(&self, run_id: &str, request: PhaseRequest) -> EngineResult<Preparation> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(Preparation::Rejected(Rejection::unknown_run(run_id)));
        };
        let mut run = Self::write(&handle)?;
        if let Err(rejection) = Self::accepts_phases(&run) {
            return Ok(Preparation::Rejected(rejection));
        }
        if let Err(rejection) = request.validate() {
            return Ok(Preparation::Rejected(rejection.with_run(run_id)));
        }

        let kind = request.kind;
        let node_id = request.context_id.to_string();
        run.history
            .record_event(WorkflowEvent::action_started(node_id.clone(), kind));

        if let Some(err) = self.loop_policy.detect_loop(&run.history, kind) {
            error!(run_id, phase = %kind, repetitions = err.repetition_count, "Aborting run");
            run.abort(err.to_string());
            return Err(err.into());
        }

        let previous = match &request.previous_attempt {
            Some(explicit) => Some(explicit.clone()),
            None => PreviousAttemptContext::from_history(&run.history, kind),
        };
        if let Some(previous) = &previous {
            self.persist(
                &previous_key(&node_id),
                StoredArtifact::PreviousAttempt(previous.clone()),
            );
        }

        let context = {
            let ctx = ContributionContext::new(&request, &run.history, &self.config)
                .with_previous_attempt(previous.as_ref());
            self.pipeline.assemble(&ctx)
        };

        run.history
            .append(kind.as_str(), HistoryPayload::Request(request.clone()))?;
        run.steps.push(PhaseStep {
            kind,
            node_id: node_id.clone(),
            branch: None,
            contributions: context.names().into_iter().map(String::from).collect(),
            started_at: Utc::now(),
        });
        debug!(
            run_id,
            phase = %kind,
            node_id = %node_id,
            contributions = context.records.len(),
            attempt = previous.as_ref().map(|p| p.attempt_number).unwrap_or(1),
            "Phase prepared"
        );

        Ok(Preparation::Ready(PreparedPhase {
            run_id: run_id.to_string(),
            request,
            context,
            previous_attempt: previous,
        }))
    }

    /// Prepare, decide and apply one phase.
    pub async fn run_phase(
        &self,
        run_id: &str,
        request: PhaseRequest,
        maker: &dyn DecisionMaker,
    ) -> EngineResult<PhaseOutcome> {
        let prepared = match self.prepare_phase(run_id, request)? {
            Preparation::Ready(prepared) => prepared,
            Preparation::Rejected(rejection) => {
                warn!(run_id, code = %rejection.code, "Phase rejected: {}", rejection.message);
                return Ok(PhaseOutcome::Rejected(rejection));
            }
        };

        match maker.decide(&prepared.request, &prepared.context).await {
            Ok(decision) => self.apply_decision(run_id, &prepared.request, decision),
            Err(e) => {
                let kind = prepared.request.kind;
                warn!(run_id, phase = %kind, error = %e, "Decision failed");
                self.update(run_id, |run| {
                    run.history.record_event(WorkflowEvent::node_error(
                        prepared.request.context_id.to_string(),
                        kind,
                        e.to_string(),
                    ));
                })?;
                Err(EngineError::decision_failed(kind, e))
            }
        }
    }

    /// Reasons a decision cannot be applied as given.
    fn check_decision(kind: PhaseKind, decision: &RoutingDecision) -> Option<Rejection> {
        match decision {
            RoutingDecision::FanOut { requests } => {
                let Some(fan) = fan_out_for(kind) else {
                    return Some(Rejection::new(
                        "FAN_OUT_NOT_ALLOWED",
                        format!("{} cannot dispatch sub-agents", registry::display_name(kind)),
                        "Only discovery, planning and ticket orchestrators fan out",
                    ));
                };
                if requests.is_empty() {
                    return Some(Rejection::new(
                        "EMPTY_FAN_OUT",
                        "Fan-out decision carries no agent requests",
                        "Provide at least one agent request",
                    ));
                }
                if let Some(wrong) = requests.iter().find(|r| r.kind != fan.agent) {
                    return Some(
                        Rejection::new(
                            "FAN_OUT_KIND_MISMATCH",
                            format!(
                                "{} dispatches {} requests, got {}",
                                registry::display_name(kind),
                                fan.agent,
                                wrong.kind
                            ),
                            "Address every fan-out request to the orchestrator's agent phase",
                        )
                        .with_context("expected", fan.agent.to_string()),
                    );
                }
                None
            }
            RoutingDecision::Consolidate { result } => {
                if result.kind != kind {
                    return Some(Rejection::new(
                        "RESULT_KIND_MISMATCH",
                        format!("{} returned a result for {}", kind, result.kind),
                        "Set the result kind to the phase that produced it",
                    ));
                }
                let node = result.curation.as_ref()?;
                node.validate_for(kind).err().map(|e| {
                    Rejection::new(
                        "CURATION_MISMATCH",
                        e.to_string(),
                        "Attach the curation family this collector finalizes",
                    )
                })
            }
            _ => None,
        }
    }

    /// Record `decision` for `request` and compute what runs next.
    pub fn apply_decision(
        &self,
        run_id: &str,
        request: &PhaseRequest,
        decision: RoutingDecision,
    ) -> EngineResult<PhaseOutcome> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(PhaseOutcome::Rejected(Rejection::unknown_run(run_id)));
        };
        let mut run = Self::write(&handle)?;
        if let Err(rejection) = Self::accepts_phases(&run) {
            return Ok(PhaseOutcome::Rejected(rejection));
        }
        let kind = request.kind;
        if let Some(rejection) = Self::check_decision(kind, &decision) {
            warn!(run_id, phase = %kind, code = %rejection.code, "Decision rejected");
            return Ok(PhaseOutcome::Rejected(rejection.with_run(run_id)));
        }

        let node_id = request.context_id.to_string();
        run.history.append(
            kind.as_str(),
            HistoryPayload::Routing {
                kind,
                node_id: node_id.clone(),
                decision: decision.clone(),
            },
        )?;
        if let Some(step) = run.step_mut(&node_id) {
            step.branch = Some(decision.branch_name().to_string());
        }
        Self::finish_interrupt(&mut run, request, decision.is_interrupt())?;

        let outcome = match decision {
            RoutingDecision::Advance { request: next }
            | RoutingDecision::RouteBack { request: next } => {
                if !registry::is_listed_target(kind, next.kind) {
                    warn!(
                        run_id,
                        from = %kind,
                        to = %next.kind,
                        "Routing to a phase the registry does not list for this node"
                    );
                }
                PhaseOutcome::Next(next)
            }
            RoutingDecision::FanOut { requests } => PhaseOutcome::FanOut(requests),
            RoutingDecision::Consolidate { result } => self.consolidate(&mut run, request, result)?,
            RoutingDecision::Interrupt(interrupt) => {
                return Self::raise_interrupt(&mut run, request, interrupt);
            }
        };
        run.history
            .record_event(WorkflowEvent::action_completed(node_id, kind));
        Ok(outcome)
    }

    fn consolidate(
        &self,
        run: &mut WorkflowRun,
        request: &PhaseRequest,
        result: PhaseResult,
    ) -> EngineResult<PhaseOutcome> {
        let kind = request.kind;
        if let Some(node) = &result.curation {
            self.persist_curation(node);
        }
        run.history
            .append(kind.as_str(), HistoryPayload::Result(result.clone()))?;

        let Some(routes) = collector_routes(kind) else {
            return Ok(PhaseOutcome::AgentCompleted(result));
        };
        let follow_up = |target: PhaseKind| {
            let next = request.follow_up(target);
            match &result.curation {
                Some(node) => next.with_curation(node.clone()),
                None => next,
            }
        };
        if !result.advances() {
            info!(run_id = %run.id, phase = %kind, to = %routes.route_back, "Collector routed back");
            return Ok(PhaseOutcome::Next(follow_up(routes.route_back)));
        }
        match routes.advance {
            Some(target) => {
                info!(run_id = %run.id, phase = %kind, to = %target, "Collector advanced");
                Ok(PhaseOutcome::Next(follow_up(target)))
            }
            None => {
                run.status = RunStatus::Completed;
                info!(run_id = %run.id, "Workflow run completed");
                Ok(PhaseOutcome::Completed(result))
            }
        }
    }

    fn raise_interrupt(
        run: &mut WorkflowRun,
        request: &PhaseRequest,
        interrupt: InterruptRequest,
    ) -> EngineResult<PhaseOutcome> {
        let kind = request.kind;
        let node_id = request.context_id.to_string();

        if interrupt.interrupt_type == InterruptType::Stop {
            run.history.append(
                kind.as_str(),
                HistoryPayload::Interrupt(InterruptPayload {
                    kind,
                    interrupt_id: Uuid::new_v4().to_string(),
                    origin_node_id: node_id,
                    request: interrupt,
                }),
            )?;
            run.status = RunStatus::Stopped;
            info!(run_id = %run.id, phase = %kind, "Workflow run stopped by interrupt");
            return Ok(PhaseOutcome::Stopped);
        }

        let context = match run.interrupts.request(kind, &node_id, &interrupt) {
            Ok(context) => context.clone(),
            Err(InterruptError::AlreadyPending { pending }) => {
                return Ok(PhaseOutcome::Rejected(
                    Rejection::new(
                        "INTERRUPT_ALREADY_PENDING",
                        format!("Interrupt '{}' is still pending", pending),
                        "Resolve and resume the pending interrupt first",
                    )
                    .with_run(&run.id)
                    .with_context("interrupt_id", pending),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        run.history.append(
            kind.as_str(),
            HistoryPayload::Interrupt(InterruptPayload {
                kind,
                interrupt_id: context.id.clone(),
                origin_node_id: node_id,
                request: interrupt,
            }),
        )?;
        run.history.record_event(WorkflowEvent::interrupt_status(
            context.interrupt_node_id.clone(),
            &context.origin_node_id,
            &context.resume_node_id,
            context.status,
        ));
        run.status = RunStatus::Suspended;
        run.suspended_request = Some(request.clone());
        Ok(PhaseOutcome::Suspended(context))
    }

    /// A resumed phase's decision consumes its interrupt resolution.
    ///
    /// Answering with another interrupt also closes the earlier one, since
    /// only one interrupt may be pending, but the transition is recorded as
    /// superseded rather than consumed.
    fn finish_interrupt(
        run: &mut WorkflowRun,
        request: &PhaseRequest,
        interrupts_again: bool,
    ) -> EngineResult<()> {
        let Some(feedback) = &request.interrupt_feedback else {
            return Ok(());
        };
        let emitted = run
            .interrupts
            .get(&feedback.interrupt_id)
            .map(|c| c.status == InterruptStatus::StatusEmitted)
            .unwrap_or(false);
        if !emitted {
            return Ok(());
        }
        let context = if interrupts_again {
            run.interrupts
                .supersede(&feedback.interrupt_id, &request.context_id.to_string())?
                .clone()
        } else {
            run.interrupts.resolve(&feedback.interrupt_id)?.clone()
        };
        run.history.record_event(WorkflowEvent::interrupt_status(
            context.interrupt_node_id.clone(),
            &context.origin_node_id,
            &context.resume_node_id,
            context.status,
        ));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Interrupt resolution
    // ------------------------------------------------------------------

    /// Store an external resolution for a `REQUESTED` interrupt.
    pub fn resolve_interrupt(
        &self,
        run_id: &str,
        interrupt_id: &str,
        resolution: impl Into<String>,
    ) -> EngineResult<ResolveOutcome> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(ResolveOutcome::Rejected(Rejection::unknown_run(run_id)));
        };
        let mut run = Self::write(&handle)?;
        if run.status.is_terminal() {
            return Ok(ResolveOutcome::Rejected(Rejection::run_not_active(
                run_id, run.status,
            )));
        }
        let status = match run.interrupts.get(interrupt_id) {
            Some(context) => context.status,
            None => {
                return Ok(ResolveOutcome::Rejected(
                    Rejection::new(
                        "UNKNOWN_INTERRUPT",
                        format!("Interrupt '{}' does not exist in run '{}'", interrupt_id, run_id),
                        "Call pending_interrupt to find the interrupt awaiting resolution",
                    )
                    .with_run(run_id)
                    .with_context("interrupt_id", interrupt_id.to_string()),
                ));
            }
        };
        if status != InterruptStatus::Requested {
            return Ok(ResolveOutcome::Rejected(
                Rejection::new(
                    "INTERRUPT_NOT_PENDING",
                    format!("Interrupt '{}' is {}, not awaiting a resolution", interrupt_id, status),
                    "Only a REQUESTED interrupt accepts a resolution",
                )
                .with_run(run_id)
                .with_context("status", status.to_string()),
            ));
        }

        let resolution = resolution.into();
        let context = run
            .interrupts
            .store_result(interrupt_id, resolution.clone())?
            .clone();
        run.history.append(
            context.interrupt_node_id.clone(),
            HistoryPayload::InterruptResolution {
                interrupt_id: context.id.clone(),
                kind: context.origin_phase,
                resolution,
            },
        )?;
        run.history.record_event(
            WorkflowEvent::new(EventKind::ResolveInterrupt, context.interrupt_node_id.clone())
                .with_parent(context.origin_node_id.clone())
                .with_phase(context.origin_phase)
                .with_message(context.status.to_string()),
        );
        Ok(ResolveOutcome::Stored(context))
    }

    /// Re-issue the suspended phase with its resolution attached.
    ///
    /// The returned request has a fresh node id, so re-entry after an
    /// interrupt never counts toward the degenerate-loop policy.
    pub fn resume(&self, run_id: &str) -> EngineResult<PhaseOutcome> {
        let Some(handle) = self.handle(run_id)? else {
            return Ok(PhaseOutcome::Rejected(Rejection::unknown_run(run_id)));
        };
        let mut run = Self::write(&handle)?;
        if run.status != RunStatus::Suspended {
            return Ok(PhaseOutcome::Rejected(
                Rejection::new(
                    "RUN_NOT_SUSPENDED",
                    format!("Workflow run '{}' is {}", run_id, run.status),
                    "resume only applies to a run suspended on an interrupt",
                )
                .with_run(run_id),
            ));
        }
        let Some(pending) = run.interrupts.pending().cloned() else {
            return Ok(PhaseOutcome::Rejected(
                Rejection::new(
                    "NO_PENDING_INTERRUPT",
                    format!("Workflow run '{}' has no pending interrupt", run_id),
                    "Abort the run and start again",
                )
                .with_run(run_id),
            ));
        };
        if pending.status != InterruptStatus::ResultStored {
            return Ok(PhaseOutcome::Rejected(
                Rejection::new(
                    "INTERRUPT_UNRESOLVED",
                    format!("Interrupt '{}' is {}", pending.id, pending.status),
                    "Call resolve_interrupt with the resolution first",
                )
                .with_run(run_id)
                .with_context("interrupt_id", pending.id.clone()),
            ));
        }

        let context = run.interrupts.emit_status(&pending.id)?.clone();
        run.history.record_event(WorkflowEvent::interrupt_status(
            context.interrupt_node_id.clone(),
            &context.origin_node_id,
            &context.resume_node_id,
            context.status,
        ));

        let origin = run
            .suspended_request
            .take()
            .unwrap_or_else(|| PhaseRequest::new(context.origin_phase, run.goal.clone()));
        let mut resumed = origin;
        resumed.context_id = ArtifactKey::generate();
        resumed.previous_attempt = None;
        resumed.interrupt_feedback = Some(InterruptFeedback {
            interrupt_id: context.id.clone(),
            interrupt_type: context.interrupt_type,
            reason: context.reason.clone(),
            resolution: context.result_payload.clone().unwrap_or_default(),
        });
        run.status = RunStatus::Active;
        info!(
            run_id,
            interrupt_id = %context.id,
            phase = %context.origin_phase,
            "Workflow run resumed"
        );
        Ok(PhaseOutcome::Next(resumed))
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// Follow decisions from `initial` until the run completes, suspends,
    /// stops, is turned away, or `max_drive_steps` phases have run.
    pub async fn drive(
        &self,
        run_id: &str,
        initial: PhaseRequest,
        maker: &dyn DecisionMaker,
    ) -> EngineResult<RunSummary> {
        let mut next = Some(initial);
        let mut executed = 0usize;
        let mut halted = None;

        while let Some(request) = next.take() {
            if executed >= self.config.max_drive_steps {
                warn!(run_id, steps = executed, "Drive step limit reached");
                halted = Some(
                    Rejection::new(
                        "MAX_DRIVE_STEPS",
                        format!("drive stopped after {} phases", executed),
                        "Inspect the history for a loop before continuing the run",
                    )
                    .with_run(run_id)
                    .with_context("max_drive_steps", self.config.max_drive_steps),
                );
                break;
            }
            executed += 1;
            let origin = request.clone();

            match self.run_phase(run_id, request, maker).await? {
                PhaseOutcome::Next(request) => next = Some(request),
                PhaseOutcome::FanOut(requests) => {
                    executed += requests.len();
                    let Some(fan) = fan_out_for(origin.kind) else {
                        continue;
                    };
                    let progress = FanOutProgress::new(origin, fan.agent, fan.dispatch);
                    match self.join_fan_out(run_id, progress, requests, maker).await? {
                        Join::Dispatch(dispatch) => next = Some(dispatch),
                        Join::Halted(rejection) => halted = rejection,
                    }
                }
                PhaseOutcome::AgentCompleted(result) => {
                    // A resumed sub-agent finishes the fan-out it was part of.
                    let Some(mut progress) = self.take_fan_out(run_id, result.kind)? else {
                        debug!(run_id, phase = %result.kind, "No follow-up phase, drive ends");
                        continue;
                    };
                    progress.results.push(result);
                    let deferred = std::mem::take(&mut progress.deferred);
                    executed += deferred.len();
                    match self.join_fan_out(run_id, progress, deferred, maker).await? {
                        Join::Dispatch(dispatch) => next = Some(dispatch),
                        Join::Halted(rejection) => halted = rejection,
                    }
                }
                PhaseOutcome::Suspended(context) => {
                    info!(run_id, interrupt_id = %context.id, "Drive paused on interrupt");
                }
                PhaseOutcome::Completed(_) | PhaseOutcome::Stopped => {}
                PhaseOutcome::Rejected(rejection) => halted = Some(rejection),
            }
        }

        let summary = self
            .summary(run_id)?
            .unwrap_or_else(|| RunSummary::unknown(run_id));
        Ok(summary.with_halted(halted))
    }

    /// Run sub-agents concurrently and join their results into the dispatch request.
    ///
    /// When a sub-agent suspends, siblings turned away with `RUN_SUSPENDED`
    /// are deferred and the progress is parked on the run until the suspended
    /// agent resumes and completes.
    async fn join_fan_out(
        &self,
        run_id: &str,
        mut progress: FanOutProgress,
        requests: Vec<PhaseRequest>,
        maker: &dyn DecisionMaker,
    ) -> EngineResult<Join> {
        info!(
            run_id,
            phase = %progress.origin.kind,
            agents = requests.len(),
            joined = progress.results.len(),
            "Fanning out"
        );

        let outcomes = join_all(
            requests
                .iter()
                .cloned()
                .map(|request| self.run_phase(run_id, request, maker)),
        )
        .await;

        let mut halted = None;
        let mut paused = false;
        for (request, outcome) in requests.into_iter().zip(outcomes) {
            match outcome? {
                PhaseOutcome::AgentCompleted(result) => progress.results.push(result),
                PhaseOutcome::Rejected(rejection) if rejection.code == "RUN_SUSPENDED" => {
                    debug!(run_id, node_id = %request.context_id, "Sub-agent deferred until resume");
                    progress.deferred.push(request);
                }
                PhaseOutcome::Rejected(rejection) => {
                    halted.get_or_insert(rejection);
                }
                PhaseOutcome::Suspended(_) | PhaseOutcome::Stopped | PhaseOutcome::Completed(_) => {
                    paused = true;
                }
                other => warn!(run_id, outcome = ?other, "Sub-agent outcome ignored by join"),
            }
        }

        if halted.is_some() {
            self.update(run_id, |run| run.fan_out = None)?;
            return Ok(Join::Halted(halted));
        }
        if paused {
            info!(
                run_id,
                joined = progress.results.len(),
                deferred = progress.deferred.len(),
                "Fan-out parked until the suspended sub-agent resumes"
            );
            self.update(run_id, |run| {
                if !run.status.is_terminal() {
                    run.fan_out = Some(progress);
                }
            })?;
            return Ok(Join::Halted(None));
        }
        debug!(
            run_id,
            dispatch = %progress.dispatch,
            results = progress.results.len(),
            "Fan-out joined"
        );
        Ok(Join::Dispatch(progress.into_dispatch()))
    }

    /// Take the parked fan-out when `agent` is the kind it is waiting on.
    fn take_fan_out(&self, run_id: &str, agent: PhaseKind) -> EngineResult<Option<FanOutProgress>> {
        let taken = self.update(run_id, |run| {
            if run.fan_out.as_ref().map(|p| p.agent) == Some(agent) {
                run.fan_out.take()
            } else {
                None
            }
        })?;
        Ok(taken.flatten())
    }

    /// Fan-out waiting on a suspended sub-agent, if any.
    pub fn pending_fan_out(&self, run_id: &str) -> EngineResult<Option<FanOutProgress>> {
        Ok(self.inspect(run_id, |run| run.fan_out.clone())?.flatten())
    }

    // ------------------------------------------------------------------
    // Artifact store
    // ------------------------------------------------------------------

    fn persist(&self, key: &str, artifact: StoredArtifact) {
        if let Err(e) = self.store.put(key, artifact) {
            warn!(key, error = %e, "Artifact store write failed, continuing");
        }
    }

    /// Store a collector's curation under its key and its content address.
    fn persist_curation(&self, node: &CurationNode) {
        let hash = node.content_hash(self.hasher.as_ref());
        self.persist(node.key.as_str(), StoredArtifact::Curation(node.clone()));
        self.persist(&content_key(&hash), StoredArtifact::Curation(node.clone()));
    }
}
