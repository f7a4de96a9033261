//! Decision maker that replays a JSON script.
//!
//! A script is an array of `{ "phase": <kind>, "decision": <RoutingDecision> }`
//! steps consumed strictly in order. Asking for a decision while the next step
//! belongs to another phase fails without consuming the step.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use workflow_coordination::{
    AssembledContext, DecisionError, DecisionMaker, PhaseKind, PhaseRequest, RoutingDecision,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub phase: PhaseKind,
    pub decision: RoutingDecision,
}

impl ScriptStep {
    pub fn new(phase: PhaseKind, decision: RoutingDecision) -> Self {
        Self { phase, decision }
    }
}

pub struct ScriptedDecisionMaker {
    steps: Mutex<VecDeque<ScriptStep>>,
    print_context: bool,
}

impl ScriptedDecisionMaker {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            print_context: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DecisionError> {
        let steps: Vec<ScriptStep> = serde_json::from_str(json)?;
        Ok(Self::new(steps))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid script {}", path.display()))
    }

    /// Print every assembled context to stdout before answering.
    pub fn with_print_context(mut self, print_context: bool) -> Self {
        self.print_context = print_context;
        self
    }

    /// Steps not yet consumed; zero when the lock is poisoned.
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|steps| steps.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DecisionMaker for ScriptedDecisionMaker {
    async fn decide(
        &self,
        request: &PhaseRequest,
        context: &AssembledContext,
    ) -> Result<RoutingDecision, DecisionError> {
        if self.print_context {
            println!(
                "==== {} ({}) ====\n{}\n",
                request.kind, request.context_id, context.text
            );
        }

        let mut steps = self
            .steps
            .lock()
            .map_err(|_| DecisionError::Unavailable("script lock poisoned".to_string()))?;
        let expected = steps
            .front()
            .map(|step| step.phase)
            .ok_or(DecisionError::Exhausted(request.kind))?;
        if expected != request.kind {
            return Err(DecisionError::UnexpectedPhase {
                expected,
                actual: request.kind,
            });
        }
        let step = steps
            .pop_front()
            .ok_or(DecisionError::Exhausted(request.kind))?;
        debug!(
            phase = %request.kind,
            branch = step.decision.branch_name(),
            remaining = steps.len(),
            "Replayed scripted decision"
        );
        Ok(step.decision)
    }
}
