//! Per-run state owned by the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Rejection;
use crate::history::ExecutionHistory;
use crate::interrupt::{InterruptContext, InterruptLedger};
use crate::model::{PhaseKind, PhaseRequest, PhaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    /// Waiting on an interrupt resolution.
    Suspended,
    Completed,
    /// Ended by a STOP interrupt.
    Stopped,
    /// Ended by a fatal error or an explicit abort.
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Aborted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One phase invocation as seen from outside: what ran, with which
/// contributions, and which branch it chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStep {
    pub kind: PhaseKind,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub contributions: Vec<String>,
    pub started_at: DateTime<Utc>,
}

/// A workflow run: its history, interrupts and status.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: String,
    pub goal: String,
    pub status: RunStatus,
    pub history: ExecutionHistory,
    pub interrupts: InterruptLedger,
    pub steps: Vec<PhaseStep>,
    pub created_at: DateTime<Utc>,
    pub abort_reason: Option<String>,
    /// Request that raised the pending interrupt; `resume` re-issues it.
    pub(crate) suspended_request: Option<PhaseRequest>,
    /// Fan-out waiting on a suspended sub-agent before it can be joined.
    pub(crate) fan_out: Option<FanOutProgress>,
}

impl WorkflowRun {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal: goal.into(),
            status: RunStatus::Active,
            history: ExecutionHistory::new(),
            interrupts: InterruptLedger::new(),
            steps: Vec::new(),
            created_at: Utc::now(),
            abort_reason: None,
            suspended_request: None,
            fan_out: None,
        }
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.status = RunStatus::Aborted;
        self.abort_reason = Some(reason.into());
        self.suspended_request = None;
        self.fan_out = None;
    }

    pub(crate) fn step_mut(&mut self, node_id: &str) -> Option<&mut PhaseStep> {
        self.steps.iter_mut().rev().find(|s| s.node_id == node_id)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.id.clone(),
            goal: self.goal.clone(),
            status: Some(self.status),
            steps: self.steps.clone(),
            interrupts: self.interrupts.all().to_vec(),
            history_len: self.history.len(),
            history_summary: self.history.summary(),
            abort_reason: self.abort_reason.clone(),
            halted: None,
        }
    }
}

/// A fan-out that has not been joined yet.
///
/// Kept on the run while a sub-agent is suspended on an interrupt. Siblings
/// turned away during the suspension are deferred and run once the suspended
/// agent completes; the dispatch phase starts only after every agent has a
/// result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOutProgress {
    pub origin: PhaseRequest,
    pub agent: PhaseKind,
    pub dispatch: PhaseKind,
    pub results: Vec<PhaseResult>,
    pub deferred: Vec<PhaseRequest>,
}

impl FanOutProgress {
    pub fn new(origin: PhaseRequest, agent: PhaseKind, dispatch: PhaseKind) -> Self {
        Self {
            origin,
            agent,
            dispatch,
            results: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// The dispatch request carrying every joined agent result.
    pub fn into_dispatch(self) -> PhaseRequest {
        self.origin
            .follow_up(self.dispatch)
            .with_agent_results(self.results)
    }
}

/// Snapshot of a run returned by `drive` and used for reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub goal: String,
    /// `None` when the run id was never registered.
    pub status: Option<RunStatus>,
    pub steps: Vec<PhaseStep>,
    pub interrupts: Vec<InterruptContext>,
    pub history_len: usize,
    pub history_summary: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Why `drive` stopped early, when it was turned away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<Rejection>,
}

impl RunSummary {
    pub(crate) fn unknown(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            goal: String::new(),
            status: None,
            steps: Vec::new(),
            interrupts: Vec::new(),
            history_len: 0,
            history_summary: BTreeMap::new(),
            abort_reason: None,
            halted: Some(Rejection::unknown_run(run_id)),
        }
    }

    pub fn with_halted(mut self, halted: Option<Rejection>) -> Self {
        if halted.is_some() {
            self.halted = halted;
        }
        self
    }

    pub fn phases(&self) -> Vec<PhaseKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }
}
