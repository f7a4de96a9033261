//! Hosting process for scripted workflow runs.
//!
//! Builds a [`WorkflowEngine`] from [`RunnerConfig`], drives one run from the
//! orchestrator with a [`ScriptedDecisionMaker`], answers interrupts with the
//! supplied resolutions, and turns the final summary into a [`RunReport`].

pub mod config;
pub mod report;
pub mod scripted;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use workflow_coordination::{
    ArtifactStore, FileArtifactStore, InMemoryArtifactStore, PhaseKind,
    PhaseOutcome, PhaseRequest, ResolveOutcome, RunStatus, WorkflowEngine,
};

pub use config::RunnerConfig;
pub use report::{RunReport, StepReport};
pub use scripted::{ScriptStep, ScriptedDecisionMaker};

/// Engine configured with the store selected by `config`.
pub fn build_engine(config: &RunnerConfig) -> Result<WorkflowEngine> {
    let store: Arc<dyn ArtifactStore> = match &config.store_dir {
        Some(dir) => Arc::new(
            FileArtifactStore::open(dir)
                .with_context(|| format!("failed to open artifact store {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryArtifactStore::new()),
    };
    Ok(WorkflowEngine::new(config.engine.clone()).with_store(store))
}

/// Drive one run for `goal` until it ends or runs out of resolutions.
///
/// Each time the run suspends, the next entry of `resolutions` answers the
/// pending interrupt and the run resumes. Engine errors end the drive and are
/// recorded on the report rather than returned.
pub async fn execute(
    engine: &WorkflowEngine,
    maker: &ScriptedDecisionMaker,
    goal: &str,
    resolutions: &[String],
) -> Result<RunReport> {
    let run_id = engine.start_run(goal)?;
    info!(run_id = %run_id, goal, "Starting scripted run");

    let mut answers = resolutions.iter();
    let mut next = PhaseRequest::new(PhaseKind::Orchestrator, goal);
    let mut failure = None;

    let summary = loop {
        let summary = match engine.drive(&run_id, next, maker).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(run_id = %run_id, "Run ended with error: {e}");
                failure = Some(e.to_string());
                break engine
                    .summary(&run_id)?
                    .context("run disappeared from the engine")?;
            }
        };
        if summary.status != Some(RunStatus::Suspended) || summary.halted.is_some() {
            break summary;
        }
        let Some(pending) = engine.pending_interrupt(&run_id)? else {
            break summary;
        };
        let Some(answer) = answers.next() else {
            info!(run_id = %run_id, interrupt = %pending.id, "Run suspended with no resolution left");
            break summary;
        };

        if let ResolveOutcome::Rejected(rejection) =
            engine.resolve_interrupt(&run_id, &pending.id, answer)?
        {
            warn!(run_id = %run_id, code = %rejection.code, "Resolution rejected");
            break summary.with_halted(Some(rejection));
        }
        match engine.resume(&run_id)? {
            PhaseOutcome::Next(request) => next = request,
            PhaseOutcome::Rejected(rejection) => {
                warn!(run_id = %run_id, code = %rejection.code, "Resume rejected");
                break engine
                    .summary(&run_id)?
                    .context("run disappeared from the engine")?
                    .with_halted(Some(rejection));
            }
            other => {
                warn!(run_id = %run_id, "Unexpected resume outcome: {other:?}");
                break summary;
            }
        }
    };

    let mut report =
        RunReport::from_summary(&summary).with_unused_script_steps(maker.remaining());
    if let Some(message) = failure {
        report = report.with_error(message);
    }
    info!(
        run_id = %report.run_id,
        status = ?report.status,
        steps = report.steps.len(),
        "Run finished"
    );
    Ok(report)
}
