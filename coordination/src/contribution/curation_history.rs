//! Chronological narrative of what earlier phases produced.
//!
//! Walks history in append order and emits one contribution per curation,
//! agent result, interrupt and request, with short binder paragraphs where
//! the narrative moves from one phase to another. Priorities start at
//! [`CURATION_BASE_PRIORITY`] and grow with each emitted block, so the
//! pipeline's sort preserves history order and places the whole narrative
//! before any guidance.

use std::collections::HashSet;

use super::{
    ContributionContext, ContributionFactory, ContributionProvider, ContributionResult,
    StaticContribution,
};
use crate::curation::{CurationFamily, CurationNode};
use crate::history::{ExecutionHistory, ExecutionRecord, HistoryPayload, InterruptPayload};
use crate::model::{InterruptType, PhaseKind, PhaseRequest, PhaseResult};
use crate::registry::{self, allowed_history, branches_for, AllowedHistory};

pub const CURATION_BASE_PRIORITY: i32 = -1100;

const PREAMBLE: &str = "--- Curated Workflow Context ---

The following context has been curated from prior workflow phases. This represents the \
accumulated knowledge from discovery, planning, and/or ticket execution that has been completed \
so far. Use this context to inform your current task. Each section is labeled by its source phase \
and type, presented in the order they occurred.
";

const REQUEST_CONTEXT_HEADER: &str = "## Request Context
Current request context in this step. Route using exactly one non-null routing field.
";

fn curation_header(family: CurationFamily) -> &'static str {
    match family {
        CurationFamily::Discovery => {
            "## Discovery Curation\n\
             The consolidated curation from the discovery collector, summarizing code analysis,\n\
             architecture findings, and recommendations from discovery agents.\n"
        }
        CurationFamily::Planning => {
            "## Planning Curation\n\
             The consolidated curation from the planning collector, including finalized tickets,\n\
             dependency graphs, and planning summaries.\n"
        }
        CurationFamily::Ticket => {
            "## Ticket Curation\n\
             The consolidated curation from the ticket collector, including completion status,\n\
             follow-up items, and execution summaries.\n"
        }
    }
}

/// Where a block sits in the narrative. Binders are chosen from transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NarrativePhase {
    DiscoveryCuration,
    DiscoveryAgent,
    PlanningCuration,
    PlanningAgent,
    TicketCuration,
    TicketAgent,
    Interrupt,
    Other,
}

impl NarrativePhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::DiscoveryCuration => "discovery_curation",
            Self::DiscoveryAgent => "discovery_agent",
            Self::PlanningCuration => "planning_curation",
            Self::PlanningAgent => "planning_agent",
            Self::TicketCuration => "ticket_curation",
            Self::TicketAgent => "ticket_agent",
            Self::Interrupt => "interrupt",
            Self::Other => "other",
        }
    }

    fn curation(family: CurationFamily) -> Self {
        match family {
            CurationFamily::Discovery => Self::DiscoveryCuration,
            CurationFamily::Planning => Self::PlanningCuration,
            CurationFamily::Ticket => Self::TicketCuration,
        }
    }

    fn agent(family: CurationFamily) -> Self {
        match family {
            CurationFamily::Discovery => Self::DiscoveryAgent,
            CurationFamily::Planning => Self::PlanningAgent,
            CurationFamily::Ticket => Self::TicketAgent,
        }
    }

    /// Collectors narrate as their curation, the rest of a family as its agents.
    fn of_request(kind: PhaseKind) -> Self {
        match (kind.produces_curation(), kind.family()) {
            (Some(family), _) => Self::curation(family),
            (None, Some(family)) => Self::agent(family),
            (None, None) => Self::Other,
        }
    }

    fn is_discovery(self) -> bool {
        matches!(self, Self::DiscoveryCuration | Self::DiscoveryAgent)
    }

    fn is_planning(self) -> bool {
        matches!(self, Self::PlanningCuration | Self::PlanningAgent)
    }

    fn is_ticket(self) -> bool {
        matches!(self, Self::TicketCuration | Self::TicketAgent)
    }
}

fn binder_text(from: Option<NarrativePhase>, to: NarrativePhase) -> Option<&'static str> {
    use NarrativePhase::*;
    let from = from?;
    if from == to {
        return None;
    }
    let text = if to == Interrupt {
        "At this point in the workflow, clarification or review was needed:"
    } else if from == Interrupt {
        "With the feedback incorporated, the workflow continued:"
    } else if from == DiscoveryCuration && to == DiscoveryAgent {
        "Following the discovery curation above, individual discovery agents each produced \
         detailed reports with their specific findings. These reports informed the consolidated \
         curation and provide additional granular detail:"
    } else if from.is_discovery() && to.is_planning() {
        "With discovery complete, the workflow advanced to the planning phase. The planning \
         process used the discovery findings above to formulate implementation strategies, \
         tickets, and dependency graphs:"
    } else if from == PlanningCuration && to == PlanningAgent {
        "The following individual planning agent results contain the detailed tickets, \
         architecture decisions, and implementation strategies that were synthesized into \
         the planning curation above:"
    } else if from.is_planning() && to.is_ticket() {
        "After planning was finalized, ticket execution began. Ticket agents worked on \
         implementing the planned changes, running tests, and verifying results:"
    } else if from == TicketCuration && to == TicketAgent {
        "The individual ticket execution results below detail what each ticket agent \
         accomplished, including files modified, test outcomes, and verification status:"
    } else if from.is_ticket() && to.is_discovery() {
        "The workflow looped back to re-run discovery with the accumulated context from \
         the previous iteration:"
    } else if from.is_ticket() && to.is_planning() {
        "The workflow looped back to re-run planning with the accumulated context from \
         ticket execution:"
    } else if from.is_planning() && to.is_discovery() {
        "The workflow looped back to re-run discovery with the accumulated context from \
         the previous planning iteration:"
    } else {
        "The workflow then progressed to the next phase:"
    };
    Some(text)
}

/// Name stem, header and narrative phase for a non-collector result.
fn result_section(kind: PhaseKind) -> Option<(&'static str, &'static str, NarrativePhase)> {
    use NarrativePhase::*;
    let section = match kind {
        PhaseKind::DiscoveryAgent => (
            "curation-discovery-report",
            "## Discovery Agent Report\n\
             Individual report from a discovery agent with detailed code findings, file references,\n\
             and subdomain analysis.\n",
            DiscoveryAgent,
        ),
        PhaseKind::PlanningAgent => (
            "curation-planning-result",
            "## Planning Agent Result\n\
             Individual result from a planning agent with proposed tickets, architecture decisions,\n\
             and implementation strategies.\n",
            PlanningAgent,
        ),
        PhaseKind::TicketAgent => (
            "curation-ticket-result",
            "## Ticket Agent Result\n\
             Individual result from a ticket execution agent with implementation summary,\n\
             files modified, test results, and verification status.\n",
            TicketAgent,
        ),
        PhaseKind::DiscoveryOrchestrator => (
            "curation-discovery-orchestrator-result",
            "## Discovery Orchestrator Result\n\
             Orchestrator output for discovery-phase delegation and synthesis.\n",
            DiscoveryAgent,
        ),
        PhaseKind::PlanningOrchestrator => (
            "curation-planning-orchestrator-result",
            "## Planning Orchestrator Result\n\
             Orchestrator output for planning-phase delegation and synthesis.\n",
            PlanningAgent,
        ),
        PhaseKind::TicketOrchestrator => (
            "curation-ticket-orchestrator-result",
            "## Ticket Orchestrator Result\n\
             Orchestrator output for ticket-phase execution coordination.\n",
            TicketAgent,
        ),
        PhaseKind::Orchestrator => (
            "curation-orchestrator-agent-result",
            "## Orchestrator Agent Result\n\
             Top-level orchestrator output coordinating multi-phase workflow progress.\n",
            Other,
        ),
        PhaseKind::OrchestratorCollector => (
            "curation-orchestrator-collector-result",
            "## Orchestrator Collector Result\n\
             Consolidated workflow-level collector output spanning discovery, planning, and ticket phases.\n",
            Other,
        ),
        PhaseKind::Review => (
            "curation-review-agent-result",
            "## Review Agent Result\n\
             Review agent assessment and feedback captured during workflow execution.\n",
            Other,
        ),
        PhaseKind::Merger => (
            "curation-merger-agent-result",
            "## Merger Agent Result\n\
             Merge assessment and conflict-resolution guidance from the merger agent.\n",
            Other,
        ),
        _ => return None,
    };
    Some(section)
}

fn data_block(header: &str, rendered: &str) -> String {
    let rendered = rendered.trim();
    format!(
        "{}{}",
        header,
        if rendered.is_empty() { "(none)" } else { rendered }
    )
}

/// Accumulates contributions with monotonically increasing priorities.
struct Narrative {
    blocks: Vec<StaticContribution>,
    seq: i32,
    last: Option<NarrativePhase>,
    interrupts: usize,
}

impl Narrative {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            seq: 0,
            last: None,
            interrupts: 0,
        }
    }

    fn push(&mut self, phase: NarrativePhase, name: String, body: String) {
        if let Some(binder) = binder_text(self.last, phase) {
            let from = self.last.map(|p| p.as_str()).unwrap_or("start");
            let binder_name = format!("curation-binder-{}-to-{}-{}", from, phase.as_str(), self.seq);
            self.emit(binder_name, binder.to_string());
        }
        self.emit(name, body);
        self.last = Some(phase);
    }

    fn emit(&mut self, name: String, body: String) {
        self.blocks.push(StaticContribution::new(
            name,
            CURATION_BASE_PRIORITY + self.seq,
            body,
        ));
        self.seq += 1;
    }
}

/// Resolution of the interrupt at `index`: the first matching resolution
/// record or review result appended after it.
fn resolution_after(history: &ExecutionHistory, index: usize, interrupt_id: &str) -> Option<String> {
    history.records().iter().skip(index + 1).find_map(|r| match &r.payload {
        HistoryPayload::InterruptResolution {
            interrupt_id: id,
            resolution,
            ..
        } if id == interrupt_id => Some(resolution.clone()),
        HistoryPayload::Result(result) if result.kind == PhaseKind::Review => {
            Some(result.output.clone())
        }
        _ => None,
    })
}

fn render_interrupt(
    number: usize,
    record: &ExecutionRecord,
    interrupt: &InterruptPayload,
    resolution: Option<&str>,
) -> String {
    let request = &interrupt.request;
    let mut out = format!(
        "### Interrupt {} - {} (at {})\n",
        number,
        request.interrupt_type,
        record.timestamp.to_rfc3339()
    );
    if !request.reason.trim().is_empty() {
        out.push_str(&format!("We asked: \"{}\"\n", request.reason.trim()));
    }
    if let Some(context) = request
        .context_for_decision
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        out.push_str(&format!("Context for decision: {}\n", context.trim()));
    }
    if !request.choices.is_empty() {
        out.push_str("Options presented:");
        for choice in &request.choices {
            for (label, option) in &choice.options {
                out.push_str(&format!(" ({}) {}", label, option));
            }
        }
        out.push('\n');
    }
    if let Some(resolution) = resolution.filter(|r| !r.trim().is_empty()) {
        let responder = if request.interrupt_type == InterruptType::AgentReview {
            "The agent"
        } else {
            "The user"
        };
        out.push_str(&format!("{} responded: \"{}\"\n", responder, resolution.trim()));
    }
    out.trim().to_string()
}

fn render_request(action: &str, request: &PhaseRequest) -> String {
    let mut out = String::from(REQUEST_CONTEXT_HEADER);
    if !action.trim().is_empty() {
        out.push_str(&format!("Action: {}\n", action));
    }
    out.push_str(&format!(
        "Now, you are in this phase: {}\n",
        registry::display_name(request.kind)
    ));
    if !request.goal.trim().is_empty() {
        out.push_str(&format!("Goal extraction: {}\n", request.goal.trim()));
    }
    out.push_str(&format!(
        "Current request type: {}\n",
        request.kind.request_type_name()
    ));
    let fields: Vec<&str> = branches_for(request.kind)
        .iter()
        .map(|b| b.field_name)
        .collect();
    out.push_str(&format!("Routing guardrails: {}\n", fields.join(", ")));
    let details = request.pretty_print();
    if !details.trim().is_empty() {
        out.push_str(&format!(
            "Request details: {}\n",
            details.trim().replace('\n', " | ")
        ));
    }
    out.trim().to_string()
}

/// Builds the curated narrative for the current phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurationHistoryFactory;

impl CurationHistoryFactory {
    fn curation_block(
        narrative: &mut Narrative,
        node: &CurationNode,
    ) {
        let family = node.family();
        narrative.push(
            NarrativePhase::curation(family),
            format!("curation-{}-curation", family),
            data_block(curation_header(family), &node.pretty_print()),
        );
    }

    fn result_block(
        narrative: &mut Narrative,
        allowed: &AllowedHistory,
        record: &ExecutionRecord,
        result: &PhaseResult,
    ) {
        if let Some(family) = result.kind.family() {
            if result.kind.is_sub_agent() && !allowed.allows_agent_result(family) {
                return;
            }
        }
        let Some((stem, header, phase)) = result_section(result.kind) else {
            return;
        };
        if result.output.trim().is_empty() {
            return;
        }
        narrative.push(
            phase,
            format!("{}-{}", stem, record.index),
            data_block(header, &result.output),
        );
    }
}

impl ContributionFactory for CurationHistoryFactory {
    fn name(&self) -> &str {
        "curation-history"
    }

    fn create(
        &self,
        ctx: &ContributionContext<'_>,
    ) -> ContributionResult<Vec<Box<dyn ContributionProvider>>> {
        let history = ctx.history;
        if history.is_empty() {
            return Ok(Vec::new());
        }
        let allowed = allowed_history(ctx.kind());
        let overrides = &ctx.request.upstream;

        // Only the latest request of each kind is narrated.
        let mut latest_request = std::collections::HashMap::new();
        for record in history.records() {
            if let Some(request) = record.payload.as_request() {
                latest_request.insert(request.kind, record.index);
            }
        }

        let mut narrative = Narrative::new();
        let mut emitted: HashSet<CurationFamily> = HashSet::new();

        for record in history.records() {
            match &record.payload {
                HistoryPayload::Result(result) => {
                    if let (Some(family), Some(found)) =
                        (result.kind.produces_curation(), result.curation.as_ref())
                    {
                        if allowed.allows_curation(family) && emitted.insert(family) {
                            let node = overrides.get(family).unwrap_or(found);
                            Self::curation_block(&mut narrative, node);
                        }
                        continue;
                    }
                    Self::result_block(&mut narrative, &allowed, record, result);
                }
                HistoryPayload::Interrupt(interrupt) => {
                    narrative.interrupts += 1;
                    let number = narrative.interrupts;
                    let resolution =
                        resolution_after(history, record.index, &interrupt.interrupt_id);
                    narrative.push(
                        NarrativePhase::Interrupt,
                        format!("curation-interrupt-resolution-{}", number),
                        render_interrupt(number, record, interrupt, resolution.as_deref()),
                    );
                }
                HistoryPayload::Request(request) => {
                    if latest_request.get(&request.kind) != Some(&record.index) {
                        continue;
                    }
                    narrative.push(
                        NarrativePhase::of_request(request.kind),
                        format!(
                            "curation-request-context-{}",
                            request.kind.request_type_name().to_lowercase()
                        ),
                        render_request(&record.phase_name, request),
                    );
                }
                _ => {}
            }
        }

        // Request-carried curations with no collector result in history yet.
        for node in overrides.iter() {
            let family = node.family();
            if allowed.allows_curation(family) && emitted.insert(family) {
                Self::curation_block(&mut narrative, node);
            }
        }

        if narrative.blocks.is_empty() {
            return Ok(Vec::new());
        }
        let mut created: Vec<Box<dyn ContributionProvider>> =
            Vec::with_capacity(narrative.blocks.len() + 1);
        created.push(Box::new(StaticContribution::new(
            "curation-workflow-instructions",
            CURATION_BASE_PRIORITY - 1,
            PREAMBLE,
        )));
        created.extend(
            narrative
                .blocks
                .into_iter()
                .map(|b| Box::new(b) as Box<dyn ContributionProvider>),
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::curation::{CurationBody, DiscoveryCuration, PlanningCuration};
    use crate::model::{InterruptChoice, InterruptRequest};

    fn discovery(summary: &str) -> CurationNode {
        CurationNode::new(
            CurationBody::Discovery(DiscoveryCuration::new(summary)),
            "reports agreed",
        )
    }

    fn create(history: &ExecutionHistory, request: &PhaseRequest) -> Vec<(String, i32, String)> {
        let config = EngineConfig::default();
        let ctx = ContributionContext::new(request, history, &config);
        CurationHistoryFactory
            .create(&ctx)
            .unwrap()
            .into_iter()
            .map(|p| {
                let body = p.contribute(&ctx).unwrap();
                (p.name().to_string(), p.priority(), body)
            })
            .collect()
    }

    #[test]
    fn test_empty_history_emits_nothing() {
        let request = PhaseRequest::new(PhaseKind::PlanningOrchestrator, "g");
        assert!(create(&ExecutionHistory::new(), &request).is_empty());
    }

    #[test]
    fn test_narrative_order_and_binders() {
        let mut history = ExecutionHistory::new();
        history
            .append(
                "discovery_agent",
                HistoryPayload::Result(PhaseResult::new(PhaseKind::DiscoveryAgent, "found the parser")),
            )
            .unwrap();
        history
            .append(
                "discovery_collector",
                HistoryPayload::Result(
                    PhaseResult::new(PhaseKind::DiscoveryCollector, "done")
                        .with_curation(discovery("mapped")),
                ),
            )
            .unwrap();
        history
            .append(
                "planning_agent",
                HistoryPayload::Result(PhaseResult::new(PhaseKind::PlanningAgent, "three tickets")),
            )
            .unwrap();

        let request = PhaseRequest::new(PhaseKind::TicketOrchestrator, "g");
        let blocks = create(&history, &request);
        let names: Vec<&str> = blocks.iter().map(|b| b.0.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "curation-workflow-instructions",
                "curation-discovery-report-0",
                "curation-binder-discovery_agent-to-discovery_curation-1",
                "curation-discovery-curation",
                "curation-binder-discovery_curation-to-planning_agent-3",
                "curation-planning-result-2",
            ]
        );
        let priorities: Vec<i32> = blocks.iter().map(|b| b.1).collect();
        assert_eq!(priorities, vec![-1101, -1100, -1099, -1098, -1097, -1096]);
        assert!(blocks[3].2.starts_with("## Discovery Curation\n"));
        assert!(blocks[4].2.starts_with("With discovery complete"));
    }

    #[test]
    fn test_request_override_wins_and_filter_applies() {
        let mut history = ExecutionHistory::new();
        history
            .append(
                "discovery_collector",
                HistoryPayload::Result(
                    PhaseResult::new(PhaseKind::DiscoveryCollector, "done")
                        .with_curation(discovery("from history")),
                ),
            )
            .unwrap();

        let request = PhaseRequest::new(PhaseKind::PlanningOrchestrator, "g")
            .with_curation(discovery("from request"));
        let blocks = create(&history, &request);
        let body = &blocks.iter().find(|b| b.0 == "curation-discovery-curation").unwrap().2;
        assert!(body.contains("from request"));
        assert!(!body.contains("from history"));

        // A discovery collector never sees the discovery curation it replaces.
        let request = PhaseRequest::new(PhaseKind::DiscoveryCollector, "g");
        assert!(create(&history, &request).is_empty());
    }

    #[test]
    fn test_override_without_history_entry_is_appended() {
        let mut history = ExecutionHistory::new();
        history
            .append("review", HistoryPayload::Result(PhaseResult::new(PhaseKind::Review, "lgtm")))
            .unwrap();
        let planning = CurationNode::new(CurationBody::Planning(PlanningCuration::new("plan")), "r");
        let request = PhaseRequest::new(PhaseKind::TicketOrchestrator, "g").with_curation(planning);
        let blocks = create(&history, &request);
        assert_eq!(blocks.last().unwrap().0, "curation-planning-curation");
    }

    #[test]
    fn test_interrupt_paired_with_resolution() {
        let mut history = ExecutionHistory::new();
        let request = InterruptRequest::new(InterruptType::HumanReview, "which module?")
            .with_context_for_decision("two candidates")
            .with_choice(InterruptChoice {
                question: "pick".to_string(),
                options: [("a".to_string(), "parser".to_string())].into_iter().collect(),
            });
        history
            .append(
                "planning_collector",
                HistoryPayload::Interrupt(InterruptPayload {
                    kind: PhaseKind::PlanningCollector,
                    interrupt_id: "i-1".to_string(),
                    origin_node_id: "n-1".to_string(),
                    request,
                }),
            )
            .unwrap();
        history
            .append(
                "interrupt-i-1",
                HistoryPayload::InterruptResolution {
                    interrupt_id: "i-1".to_string(),
                    kind: PhaseKind::PlanningCollector,
                    resolution: "the parser".to_string(),
                },
            )
            .unwrap();

        let current = PhaseRequest::new(PhaseKind::PlanningCollector, "g");
        let blocks = create(&history, &current);
        let body = &blocks
            .iter()
            .find(|b| b.0 == "curation-interrupt-resolution-1")
            .unwrap()
            .2;
        assert!(body.starts_with("### Interrupt 1 - HUMAN_REVIEW (at "));
        assert!(body.contains("We asked: \"which module?\""));
        assert!(body.contains("Context for decision: two candidates"));
        assert!(body.contains("Options presented: (a) parser"));
        assert!(body.contains("The user responded: \"the parser\""));
    }

    #[test]
    fn test_request_context_rendering() {
        let request = PhaseRequest::new(PhaseKind::DiscoveryCollector, "map the crate")
            .with_detail("line one\nline two");
        let text = render_request("discovery_collector", &request);
        assert!(text.starts_with("## Request Context\n"));
        assert!(text.contains("Now, you are in this phase: Discovery Collector"));
        assert!(text.contains("Current request type: DiscoveryCollectorRequest"));
        assert!(text.contains("Request details: Goal: map the crate | Detail: line one | line two"));
    }
}
