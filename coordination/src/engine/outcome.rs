use crate::contribution::AssembledContext;
use crate::error::Rejection;
use crate::interrupt::InterruptContext;
use crate::model::{PhaseRequest, PhaseResult};
use crate::previous::PreviousAttemptContext;

/// What happened after a phase's decision was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// Run this request next.
    Next(PhaseRequest),
    /// Run these sub-agent requests concurrently, then join into the dispatch phase.
    FanOut(Vec<PhaseRequest>),
    /// A sub-agent (or a phase with no follow-up) finished with a result.
    AgentCompleted(PhaseResult),
    /// The run is waiting on this interrupt.
    Suspended(InterruptContext),
    /// The workflow-level collector advanced past the last phase.
    Completed(PhaseResult),
    Stopped,
    Rejected(Rejection),
}

impl PhaseOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The resolution was stored; the interrupt is now `RESULT_STORED`.
    Stored(InterruptContext),
    Rejected(Rejection),
}

/// A phase ready for its decision: recorded in history, context assembled.
#[derive(Debug, Clone)]
pub struct PreparedPhase {
    pub run_id: String,
    pub request: PhaseRequest,
    pub context: AssembledContext,
    pub previous_attempt: Option<PreviousAttemptContext>,
}

#[derive(Debug, Clone)]
pub enum Preparation {
    Ready(PreparedPhase),
    Rejected(Rejection),
}
