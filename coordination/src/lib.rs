//! Workflow Coordination Library
//!
//! Routing, history and context-assembly engine for multi-phase agent
//! workflows. A run moves through orchestrator, discovery, planning, ticket,
//! review and merge phases; every phase receives a prompt context assembled
//! from the run's append-only history and answers with one routing decision.
//!
//! # Features
//!
//! ## Execution history
//! - Append-only, per-run log of requests, routing decisions, results,
//!   interrupts and workflow events
//! - Paging, search, notes and snapshots for context-reconstruction phases
//!
//! ## Routing
//! - Static registry of which phase may route to which
//! - Collector advance / route-back, sub-agent fan-out and join
//! - Degenerate-loop detection over started execution nodes
//!
//! ## Interrupts
//! - `REQUESTED -> RESULT_STORED -> STATUS_EMITTED -> RESOLVED` lifecycle
//! - Suspend, external resolution, resume with feedback attached
//!
//! ## Context assembly
//! - Priority-ordered contribution providers (curation narrative,
//!   previous attempt, guardrails, workflow position, output format)
//! - Content-addressed curation tree
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngine::new(EngineConfig::from_env()?);
//! let run_id = engine.start_run("add a --dry-run flag")?;
//! let summary = engine
//!     .drive(&run_id, PhaseRequest::new(PhaseKind::Orchestrator, "add a --dry-run flag"), &maker)
//!     .await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod contribution;
pub mod curation;
pub mod engine;
pub mod error;
pub mod history;
pub mod interrupt;
pub mod loop_detect;
pub mod model;
pub mod previous;
pub mod registry;
pub mod store;
pub mod tools;

pub use config::{ConfigError, EngineConfig};
pub use contribution::{AssembledContext, ContributionContext, ContributionPipeline};
pub use curation::{Blake3Hasher, ContentHasher, CurationBody, CurationFamily, CurationNode};
pub use engine::{
    DecisionError, DecisionMaker, FanOutProgress, PhaseOutcome, PhaseStep, ResolveOutcome,
    RunStatus, RunSummary, WorkflowEngine, WorkflowRun,
};
pub use error::{DegenerateLoopError, EngineError, EngineResult, Rejection};
pub use history::{ExecutionHistory, ExecutionRecord, HistoryPayload, PayloadType};
pub use interrupt::{InterruptContext, InterruptLedger, InterruptStatus};
pub use loop_detect::{DegenerateLoopPolicy, NodeRepetitionPolicy};
pub use model::{
    ArtifactKey, CollectorDecision, InterruptRequest, InterruptType, PhaseKind, PhaseRequest,
    PhaseResult, RoutingDecision,
};
pub use previous::PreviousAttemptContext;
pub use store::{ArtifactStore, FileArtifactStore, InMemoryArtifactStore, StoredArtifact};
pub use tools::{ContextTools, ToolResponse, ToolStatus};
