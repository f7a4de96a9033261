//! Interrupt lifecycle for a workflow run.
//!
//! A phase may answer with an interrupt instead of a routing decision. The
//! ledger tracks each interrupt through
//! `REQUESTED → RESULT_STORED → STATUS_EMITTED → RESOLVED`.
//! At most one interrupt per run is pending at a time, because the run is
//! suspended while it is.

mod state;

use thiserror::Error;
use tracing::info;

pub use state::{InterruptContext, InterruptStatus, InterruptTransition, TransitionError};

use crate::model::{InterruptRequest, PhaseKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterruptError {
    #[error("Interrupt requires an origin node id")]
    MissingOrigin,

    #[error("Interrupt {0} not found")]
    NotFound(String),

    #[error("Interrupt {pending} is still pending")]
    AlreadyPending { pending: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type InterruptResult<T> = Result<T, InterruptError>;

/// All interrupts raised during one run, in request order.
#[derive(Debug, Clone, Default)]
pub struct InterruptLedger {
    contexts: Vec<InterruptContext>,
}

impl InterruptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[InterruptContext] {
        &self.contexts
    }

    pub fn get(&self, id: &str) -> Option<&InterruptContext> {
        self.contexts.iter().find(|c| c.id == id)
    }

    /// The interrupt the run is waiting on, if any.
    pub fn pending(&self) -> Option<&InterruptContext> {
        self.contexts.iter().find(|c| c.is_pending())
    }

    /// Open a new interrupt in `REQUESTED`.
    pub fn request(
        &mut self,
        origin_phase: PhaseKind,
        origin_node_id: &str,
        request: &InterruptRequest,
    ) -> InterruptResult<&InterruptContext> {
        if origin_node_id.trim().is_empty() {
            return Err(InterruptError::MissingOrigin);
        }
        if let Some(pending) = self.pending() {
            return Err(InterruptError::AlreadyPending {
                pending: pending.id.clone(),
            });
        }
        let context = InterruptContext::new(origin_phase, origin_node_id, request);
        info!(
            interrupt_id = %context.id,
            phase = %origin_phase,
            interrupt_type = %context.interrupt_type,
            origin_node_id,
            "Interrupt requested"
        );
        self.contexts.push(context);
        let last = self.contexts.len() - 1;
        Ok(&self.contexts[last])
    }

    pub fn store_result(
        &mut self,
        id: &str,
        payload: impl Into<String>,
    ) -> InterruptResult<&InterruptContext> {
        let payload = payload.into();
        let context = self.advance(id, InterruptStatus::ResultStored, "resolution stored")?;
        context.result_payload = Some(payload);
        Ok(&*context)
    }

    pub fn emit_status(&mut self, id: &str) -> InterruptResult<&InterruptContext> {
        self.advance(id, InterruptStatus::StatusEmitted, "origin phase notified")
            .map(|c| &*c)
    }

    pub fn resolve(&mut self, id: &str) -> InterruptResult<&InterruptContext> {
        self.advance(id, InterruptStatus::Resolved, "resolution consumed")
            .map(|c| &*c)
    }

    /// Close an interrupt whose resumed phase answered with another interrupt.
    ///
    /// Reaches `RESOLVED` like [`resolve`](Self::resolve) but records why, so the
    /// transition log tells a consumed resolution from a superseded one.
    pub fn supersede(&mut self, id: &str, by: &str) -> InterruptResult<&InterruptContext> {
        let reason = format!("superseded by follow-up interrupt from {}", by);
        self.advance(id, InterruptStatus::Resolved, &reason)
            .map(|c| &*c)
    }

    fn advance(
        &mut self,
        id: &str,
        to: InterruptStatus,
        reason: &str,
    ) -> InterruptResult<&mut InterruptContext> {
        let context = self
            .contexts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| InterruptError::NotFound(id.to_string()))?;
        let from = context.status;
        context.transition(to, reason)?;
        info!(interrupt_id = %id, from = %from, to = %to, reason, "Interrupt transition");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InterruptType;

    fn request() -> InterruptRequest {
        InterruptRequest::new(InterruptType::AgentReview, "second opinion")
    }

    #[test]
    fn test_full_lifecycle() {
        let mut ledger = InterruptLedger::new();
        let id = ledger
            .request(PhaseKind::TicketCollector, "node-1", &request())
            .unwrap()
            .id
            .clone();
        assert_eq!(ledger.pending().unwrap().id, id);

        let ctx = ledger.store_result(&id, "looks fine").unwrap();
        assert_eq!(ctx.result_payload.as_deref(), Some("looks fine"));
        ledger.emit_status(&id).unwrap();
        let ctx = ledger.resolve(&id).unwrap();
        assert_eq!(ctx.status, InterruptStatus::Resolved);
        assert!(ledger.pending().is_none());
    }

    #[test]
    fn test_missing_origin_rejected() {
        let mut ledger = InterruptLedger::new();
        let err = ledger.request(PhaseKind::Review, " ", &request()).unwrap_err();
        assert_eq!(err, InterruptError::MissingOrigin);
        assert!(ledger.all().is_empty());
    }

    #[test]
    fn test_second_request_while_pending() {
        let mut ledger = InterruptLedger::new();
        ledger.request(PhaseKind::Review, "a", &request()).unwrap();
        let err = ledger.request(PhaseKind::Review, "b", &request()).unwrap_err();
        assert!(matches!(err, InterruptError::AlreadyPending { .. }));
    }

    #[test]
    fn test_resolve_before_result_keeps_state() {
        let mut ledger = InterruptLedger::new();
        let id = ledger
            .request(PhaseKind::Merger, "n", &request())
            .unwrap()
            .id
            .clone();
        let err = ledger.resolve(&id).unwrap_err();
        assert!(matches!(err, InterruptError::Transition(_)));
        assert_eq!(ledger.get(&id).unwrap().status, InterruptStatus::Requested);
        assert!(ledger.get(&id).unwrap().result_payload.is_none());
    }

    #[test]
    fn test_supersede_records_reason() {
        let mut ledger = InterruptLedger::new();
        let id = ledger
            .request(PhaseKind::Review, "n1", &request())
            .unwrap()
            .id
            .clone();
        assert!(ledger.supersede(&id, "n2").is_err());

        ledger.store_result(&id, "later").unwrap();
        ledger.emit_status(&id).unwrap();
        let ctx = ledger.supersede(&id, "n2").unwrap();
        assert_eq!(ctx.status, InterruptStatus::Resolved);
        assert_eq!(
            ctx.transitions.last().unwrap().reason,
            "superseded by follow-up interrupt from n2"
        );
        assert!(ledger.pending().is_none());
    }

    #[test]
    fn test_unknown_id() {
        let mut ledger = InterruptLedger::new();
        assert_eq!(
            ledger.store_result("nope", "x").unwrap_err(),
            InterruptError::NotFound("nope".to_string())
        );
    }
}
