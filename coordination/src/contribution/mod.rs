//! Context assembly for a single decision point.
//!
//! Providers each render one block of guidance. The pipeline collects the
//! registered providers plus whatever the factories create for this context,
//! keeps the applicable ones, deduplicates by name (first registered wins),
//! sorts by `(priority, name)` and joins the rendered bodies with a visible
//! delimiter. A failing provider is skipped; assembly always completes.
//!
//! Priority bands:
//! - `>= 10000` hard output constraints
//! - `0..=100` workflow position and guardrails
//! - `< 0` chronological curation narrative

mod curation_history;
mod guardrails;
mod output_format;
mod position;
mod resume;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use curation_history::{CurationHistoryFactory, CURATION_BASE_PRIORITY};
pub use guardrails::{
    ContextManagerRoutingProvider, InterruptLoopBreakerFactory, OrchestratorRouteBackProvider,
    ReturnRouteProvider,
};
pub use output_format::OutputFormatProvider;
pub use position::WorkflowPositionProvider;
pub use resume::{FirstOrchestratorRequestProvider, InterruptFeedbackProvider, PreviousAttemptProvider};

use crate::config::EngineConfig;
use crate::history::ExecutionHistory;
use crate::model::{PhaseKind, PhaseRequest};
use crate::previous::PreviousAttemptContext;

#[derive(Debug, Error)]
pub enum ContributionError {
    #[error("Contribution '{name}' failed to render: {message}")]
    Render { name: String, message: String },

    #[error("Contribution serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ContributionResult<T> = Result<T, ContributionError>;

/// Everything a provider may read. Nothing in it is mutable.
#[derive(Debug, Clone, Copy)]
pub struct ContributionContext<'a> {
    pub request: &'a PhaseRequest,
    /// History as of just before `request` is appended.
    pub history: &'a ExecutionHistory,
    pub config: &'a EngineConfig,
    pub previous_attempt: Option<&'a PreviousAttemptContext>,
}

impl<'a> ContributionContext<'a> {
    pub fn new(
        request: &'a PhaseRequest,
        history: &'a ExecutionHistory,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            request,
            history,
            config,
            previous_attempt: None,
        }
    }

    pub fn with_previous_attempt(mut self, previous: Option<&'a PreviousAttemptContext>) -> Self {
        self.previous_attempt = previous;
        self
    }

    pub fn kind(&self) -> PhaseKind {
        self.request.kind
    }
}

/// One independent source of decision context.
pub trait ContributionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    /// Phases this provider renders for. Empty means every phase.
    fn applicable_phases(&self) -> &[PhaseKind] {
        &[]
    }

    /// Pure applicability check. The default consults `applicable_phases`.
    fn applies_to(&self, ctx: &ContributionContext<'_>) -> bool {
        let phases = self.applicable_phases();
        phases.is_empty() || phases.contains(&ctx.kind())
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String>;
}

/// Creates providers whose existence depends on the context, e.g. one per
/// curation found in history.
pub trait ContributionFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        ctx: &ContributionContext<'_>,
    ) -> ContributionResult<Vec<Box<dyn ContributionProvider>>>;
}

/// A provider whose body was computed up front by a factory.
#[derive(Debug, Clone)]
pub struct StaticContribution {
    name: String,
    priority: i32,
    body: String,
}

impl StaticContribution {
    pub fn new(name: impl Into<String>, priority: i32, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority,
            body: body.into(),
        }
    }
}

impl ContributionProvider for StaticContribution {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        Ok(self.body.clone())
    }
}

/// One rendered block, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub name: String,
    pub priority: i32,
    /// Empty means every phase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applicable_phases: Vec<PhaseKind>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedContribution {
    pub name: String,
    pub reason: String,
}

/// Result of one assembly: the ordered records, what was skipped, and the joined text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub records: Vec<ContributionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedContribution>,
    pub text: String,
}

impl AssembledContext {
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    pub fn record(&self, name: &str) -> Option<&ContributionRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

/// Ordered set of providers and factories.
#[derive(Default, Clone)]
pub struct ContributionPipeline {
    providers: Vec<Arc<dyn ContributionProvider>>,
    factories: Vec<Arc<dyn ContributionFactory>>,
}

impl std::fmt::Debug for ContributionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionPipeline")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            )
            .field(
                "factories",
                &self.factories.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ContributionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard provider set.
    pub fn with_defaults(config: &EngineConfig) -> Self {
        Self::new()
            .with_provider(OutputFormatProvider::new(config.include_decision_schema))
            .with_provider(PreviousAttemptProvider)
            .with_provider(WorkflowPositionProvider)
            .with_provider(ContextManagerRoutingProvider)
            .with_provider(OrchestratorRouteBackProvider)
            .with_provider(InterruptFeedbackProvider)
            .with_provider(ReturnRouteProvider)
            .with_provider(FirstOrchestratorRequestProvider)
            .with_factory(InterruptLoopBreakerFactory)
            .with_factory(CurationHistoryFactory)
    }

    pub fn with_provider(mut self, provider: impl ContributionProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn with_factory(mut self, factory: impl ContributionFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn register_provider(&mut self, provider: Arc<dyn ContributionProvider>) {
        self.providers.push(provider);
    }

    pub fn register_factory(&mut self, factory: Arc<dyn ContributionFactory>) {
        self.factories.push(factory);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn assemble(&self, ctx: &ContributionContext<'_>) -> AssembledContext {
        let mut skipped = Vec::new();

        // Registered providers first, then factory output in factory order.
        let mut candidates: Vec<Arc<dyn ContributionProvider>> = self.providers.clone();
        for factory in &self.factories {
            match factory.create(ctx) {
                Ok(created) => candidates.extend(
                    created
                        .into_iter()
                        .map(Arc::<dyn ContributionProvider>::from),
                ),
                Err(e) => {
                    warn!(factory = factory.name(), phase = %ctx.kind(), error = %e, "Contribution factory failed, skipping");
                    skipped.push(SkippedContribution {
                        name: factory.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        let mut active: Vec<Arc<dyn ContributionProvider>> = candidates
            .into_iter()
            .filter(|p| p.applies_to(ctx))
            .filter(|p| seen.insert(p.name().to_string()))
            .collect();
        active.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.name().cmp(b.name()))
        });

        let mut records = Vec::with_capacity(active.len());
        for provider in active {
            match provider.contribute(ctx) {
                Ok(body) if body.trim().is_empty() => {
                    debug!(provider = provider.name(), "Contribution rendered empty, omitted");
                }
                Ok(body) => records.push(ContributionRecord {
                    name: provider.name().to_string(),
                    priority: provider.priority(),
                    applicable_phases: provider.applicable_phases().to_vec(),
                    body,
                }),
                Err(e) => {
                    warn!(provider = provider.name(), phase = %ctx.kind(), error = %e, "Contribution failed, skipping");
                    skipped.push(SkippedContribution {
                        name: provider.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let text = records
            .iter()
            .map(|r| {
                format!(
                    "{}\n{}",
                    ctx.config.render_delimiter(&r.name, r.priority),
                    r.body.trim_end()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(
            phase = %ctx.kind(),
            contributions = records.len(),
            skipped = skipped.len(),
            "Context assembled"
        );
        AssembledContext {
            records,
            skipped,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ContributionProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
            Err(ContributionError::Render {
                name: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    struct OnlyFor(PhaseKind);

    impl ContributionProvider for OnlyFor {
        fn name(&self) -> &str {
            "only-for"
        }

        fn priority(&self) -> i32 {
            2
        }

        fn applicable_phases(&self) -> &[PhaseKind] {
            std::slice::from_ref(&self.0)
        }

        fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
            Ok("scoped".to_string())
        }
    }

    struct Pair;

    impl ContributionFactory for Pair {
        fn name(&self) -> &str {
            "pair"
        }

        fn create(
            &self,
            _ctx: &ContributionContext<'_>,
        ) -> ContributionResult<Vec<Box<dyn ContributionProvider>>> {
            Ok(vec![
                Box::new(StaticContribution::new("b-late", 5, "from factory")),
                Box::new(StaticContribution::new("first", 99, "shadowed")),
            ])
        }
    }

    fn request() -> PhaseRequest {
        PhaseRequest::new(PhaseKind::Review, "check the diff")
    }

    #[test]
    fn test_order_dedup_and_skip() {
        let config = EngineConfig::default();
        let history = ExecutionHistory::new();
        let request = request();
        let ctx = ContributionContext::new(&request, &history, &config);
        let pipeline = ContributionPipeline::new()
            .with_provider(StaticContribution::new("first", 5, "one"))
            .with_provider(Failing)
            .with_provider(StaticContribution::new("a-early", 5, "two"))
            .with_provider(StaticContribution::new("blank", 0, "   "))
            .with_factory(Pair);

        let assembled = pipeline.assemble(&ctx);
        assert_eq!(assembled.names(), vec!["a-early", "b-late", "first"]);
        assert_eq!(assembled.record("first").unwrap().body, "one");
        assert_eq!(assembled.skipped.len(), 1);
        assert_eq!(assembled.skipped[0].name, "failing");
        assert!(assembled.text.starts_with("--- a-early ---\ntwo"));
    }

    #[test]
    fn test_phase_scoped_provider() {
        let config = EngineConfig::default();
        let history = ExecutionHistory::new();
        let request = request();
        let ctx = ContributionContext::new(&request, &history, &config);

        let pipeline = ContributionPipeline::new().with_provider(OnlyFor(PhaseKind::Merger));
        assert!(pipeline.assemble(&ctx).records.is_empty());

        let pipeline = ContributionPipeline::new().with_provider(OnlyFor(PhaseKind::Review));
        let assembled = pipeline.assemble(&ctx);
        assert_eq!(assembled.records[0].applicable_phases, vec![PhaseKind::Review]);
    }

    #[test]
    fn test_repeated_assembly_is_identical() {
        let config = EngineConfig::default();
        let history = ExecutionHistory::new();
        let request = PhaseRequest::new(PhaseKind::Orchestrator, "ship it");
        let ctx = ContributionContext::new(&request, &history, &config);
        let pipeline = ContributionPipeline::with_defaults(&config);

        let first = pipeline.assemble(&ctx);
        let second = pipeline.assemble(&ctx);
        assert_eq!(first, second);
        assert!(first.contains("output-format"));
        assert!(first.contains("first-orchestrator-request"));
    }
}
