//! Loop detection over execution history.
//!
//! Two consumers share one pattern search:
//! - [`NodeRepetitionPolicy`] fails the run when execution node ids repeat.
//! - [`InterruptLoopGuard`] produces advisory text when a phase keeps interrupting.

mod interrupt_guard;

use tracing::error;

pub use interrupt_guard::{InterruptLoopAdvisory, InterruptLoopGuard, PriorInterrupt};

use crate::error::DegenerateLoopError;
use crate::history::ExecutionHistory;
use crate::model::PhaseKind;

/// Default minimum repetitions for a block to count as a loop.
pub const DEFAULT_REPETITIONS: usize = 3;

/// First `(start, length)` whose block repeats `repetitions` times back to back.
///
/// Shorter blocks are tried first, then earlier offsets. The first hit wins,
/// which is not necessarily the longest loop in the sequence.
pub fn find_repeated_pattern<T: PartialEq>(
    sequence: &[T],
    repetitions: usize,
) -> Option<(usize, usize)> {
    if sequence.is_empty() || repetitions < 2 {
        return None;
    }
    let total = sequence.len();
    for length in 1..=total / repetitions {
        let window = length * repetitions;
        for start in 0..=total - window {
            if block_repeats(sequence, start, length, repetitions) {
                return Some((start, length));
            }
        }
    }
    None
}

pub fn detect_repeated_pattern<T: PartialEq>(sequence: &[T], repetitions: usize) -> bool {
    find_repeated_pattern(sequence, repetitions).is_some()
}

fn block_repeats<T: PartialEq>(
    sequence: &[T],
    start: usize,
    length: usize,
    repetitions: usize,
) -> bool {
    let first = &sequence[start..start + length];
    (1..repetitions).all(|rep| {
        let offset = start + rep * length;
        &sequence[offset..offset + length] == first
    })
}

/// Decides whether the run has structurally stopped making progress.
pub trait DegenerateLoopPolicy: Send + Sync {
    /// Called before `kind` executes, after its `ActionStarted` event was recorded.
    fn detect_loop(
        &self,
        history: &ExecutionHistory,
        kind: PhaseKind,
    ) -> Option<DegenerateLoopError>;
}

/// Fails when the sequence of started execution nodes contains a repeated block.
#[derive(Debug, Clone)]
pub struct NodeRepetitionPolicy {
    pub repetitions: usize,
}

impl NodeRepetitionPolicy {
    pub fn new(repetitions: usize) -> Self {
        Self { repetitions }
    }
}

impl Default for NodeRepetitionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REPETITIONS)
    }
}

impl DegenerateLoopPolicy for NodeRepetitionPolicy {
    fn detect_loop(
        &self,
        history: &ExecutionHistory,
        kind: PhaseKind,
    ) -> Option<DegenerateLoopError> {
        let nodes = history.action_started_nodes();
        let (start, length) = find_repeated_pattern(&nodes, self.repetitions)?;
        error!(
            phase = %kind,
            start,
            length,
            repetitions = self.repetitions,
            "Degenerate loop detected by node repetition policy"
        );
        Some(DegenerateLoopError {
            phase_name: kind.to_string(),
            input_type: kind.request_type_name(),
            repetition_count: self.repetitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::WorkflowEvent;

    #[test]
    fn test_alternating_block_detected() {
        let seq = ["A", "B", "A", "B", "A", "B"];
        assert!(detect_repeated_pattern(&seq, 3));
        assert_eq!(find_repeated_pattern(&seq, 3), Some((0, 2)));
    }

    #[test]
    fn test_distinct_elements_never_loop() {
        let seq = ["A", "B", "C", "D", "E", "F"];
        assert!(!detect_repeated_pattern(&seq, 3));
        assert!(!detect_repeated_pattern(&seq, 2));
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty: [&str; 0] = [];
        assert!(!detect_repeated_pattern(&empty, 3));
        assert!(!detect_repeated_pattern(&["A", "A", "A"], 1));
        assert!(!detect_repeated_pattern(&["A", "A"], 3));
    }

    #[test]
    fn test_shortest_block_wins_over_earlier_offset() {
        // [X,Y,X,Y] repeats at offset 0 with length 2, but the run of Zs
        // at offset 4 has length 1 and is tried first.
        let seq = ["X", "Y", "X", "Y", "Z", "Z"];
        assert_eq!(find_repeated_pattern(&seq, 2), Some((4, 1)));
    }

    #[test]
    fn test_repeat_must_be_contiguous() {
        let seq = ["A", "B", "C", "A", "B", "D", "A", "B"];
        assert!(!detect_repeated_pattern(&seq, 3));
    }

    #[test]
    fn test_policy_ignores_fresh_nodes() {
        let mut history = ExecutionHistory::new();
        for node in ["n1", "n2", "n3", "n4"] {
            history.record_event(WorkflowEvent::action_started(node, PhaseKind::DiscoveryCollector));
        }
        let policy = NodeRepetitionPolicy::default();
        assert!(policy.detect_loop(&history, PhaseKind::DiscoveryCollector).is_none());
    }

    #[test]
    fn test_policy_reports_reentered_node() {
        let mut history = ExecutionHistory::new();
        for _ in 0..3 {
            history.record_event(WorkflowEvent::action_started("same", PhaseKind::PlanningCollector));
        }
        let err = NodeRepetitionPolicy::default()
            .detect_loop(&history, PhaseKind::PlanningCollector)
            .unwrap();
        assert_eq!(err.phase_name, "planning_collector");
        assert_eq!(err.input_type, "PlanningCollectorRequest");
        assert_eq!(err.repetition_count, 3);
    }
}
