//! Engine error types.
//!
//! Only the structural-loop failure aborts a run. Everything else a caller can
//! act on is converted into a [`Rejection`] value and returned as data.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::DecisionError;
use crate::history::HistoryError;
use crate::interrupt::InterruptError;
use crate::model::PhaseKind;
use crate::store::StoreError;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Structured "rejected" value returned instead of an error.
///
/// ```json
/// {
///   "code": "UNKNOWN_RUN",
///   "message": "Workflow run 'abc' does not exist",
///   "recovery_action": "Start a run with start_run before submitting phases",
///   "context": { "run_id": "abc" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Machine-readable code (e.g. "UNKNOWN_RUN", "INTERRUPT_NOT_PENDING")
    pub code: String,

    pub message: String,

    /// What the caller should do next
    pub recovery_action: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub retryable: bool,
}

impl Rejection {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        recovery_action: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recovery_action: recovery_action.into(),
            context: HashMap::new(),
            retryable: false,
        }
    }

    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn with_run(self, run_id: &str) -> Self {
        self.with_context("run_id", run_id.to_string())
    }

    pub fn unknown_run(run_id: &str) -> Self {
        Self::new(
            "UNKNOWN_RUN",
            format!("Workflow run '{}' does not exist", run_id),
            "Start a run with start_run before submitting phases",
        )
        .with_run(run_id)
    }

    pub fn run_not_active(run_id: &str, status: impl std::fmt::Display) -> Self {
        Self::new(
            "RUN_NOT_ACTIVE",
            format!("Workflow run '{}' is {}", run_id, status),
            "Inspect the run history; a finished or aborted run accepts no further phases",
        )
        .with_run(run_id)
        .with_context("status", status.to_string())
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Rejection {}

/// Fatal: the same execution node was re-entered without progress.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error(
    "Degenerate loop detected in {phase_name}: input {input_type} repeated {repetition_count} times"
)]
pub struct DegenerateLoopError {
    pub phase_name: String,
    pub input_type: String,
    pub repetition_count: usize,
}

/// Errors that unwind to the run boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    DegenerateLoop(#[from] DegenerateLoopError),

    #[error("Decision for {phase} failed: {source}")]
    DecisionFailed {
        phase: PhaseKind,
        #[source]
        source: DecisionError,
    },

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Interrupt error: {0}")]
    Interrupt(#[from] InterruptError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl EngineError {
    pub fn decision_failed(phase: PhaseKind, source: DecisionError) -> Self {
        Self::DecisionFailed { phase, source }
    }

    /// Only a structural loop terminates the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DegenerateLoop(_))
    }

    /// Structured form for tool responses and reports.
    pub fn to_rejection(&self) -> Rejection {
        let (code, recovery) = match self {
            Self::DegenerateLoop(_) => (
                "DEGENERATE_LOOP",
                "The run was aborted. Start a new run with a reformulated goal",
            ),
            Self::DecisionFailed { .. } => (
                "DECISION_FAILED",
                "Retry the phase; its failure is recorded for the next attempt",
            ),
            Self::History(_) => ("HISTORY_ERROR", "Check the arguments against the history bounds"),
            Self::Interrupt(_) => ("INTERRUPT_ERROR", "Inspect pending_interrupt for the current state"),
            Self::Store(_) => ("STORE_ERROR", "Check the artifact store location and permissions"),
            Self::Config(_) => ("CONFIG_ERROR", "Fix the configuration file or WORKFLOW_* variables"),
            Self::Json(_) => ("JSON_ERROR", "Validate the payload against the decision schema"),
            Self::LockPoisoned(_) => ("LOCK_POISONED", "Restart the hosting process"),
        };
        let rejection = Rejection::new(code, self.to_string(), recovery);
        match self {
            Self::DecisionFailed { phase, .. } => {
                rejection.with_context("phase", phase.to_string()).retryable()
            }
            Self::DegenerateLoop(e) => rejection
                .with_context("phase_name", e.phase_name.clone())
                .with_context("repetition_count", e.repetition_count),
            _ => rejection,
        }
    }
}
