//! "You are here" rendering: the workflow graph with the current phase
//! marked, the requests executed so far, and the routing options from here.

use std::collections::{BTreeMap, HashSet};

use super::{ContributionContext, ContributionProvider, ContributionResult};
use crate::history::ExecutionHistory;
use crate::model::PhaseKind;
use crate::registry::{self, branches_for, collector_routes, graph_order, guidance_for};

const SEPARATOR_WIDTH: usize = 77;

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowPositionProvider;

impl ContributionProvider for WorkflowPositionProvider {
    fn name(&self) -> &str {
        "workflow-position"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn contribute(&self, ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        let current = ctx.kind();
        let mut out = String::from("## Workflow Position\n\n### Workflow Graph\n\n```\n");
        out.push_str(&render_graph(current, &visited(ctx.history)));
        out.push_str("```\n\n### Execution History\n\n");
        out.push_str(&render_history(ctx.history, ctx.config.visit_warning_threshold));
        out.push_str("\n### Available Routing Options\n\n");
        out.push_str(&render_options(current));
        Ok(out)
    }
}

fn visited(history: &ExecutionHistory) -> HashSet<PhaseKind> {
    history.request_sequence().into_iter().collect()
}

fn render_node(kind: PhaseKind, current: PhaseKind, visited: &HashSet<PhaseKind>) -> String {
    let name = registry::display_name(kind);
    let mut out = if kind == current {
        format!(">>> [{}] <<< YOU ARE HERE\n", name)
    } else if visited.contains(&kind) {
        format!("    [{}] [visited]\n", name)
    } else {
        format!("    [{}]\n", name)
    };

    let routing = registry::mapping(kind).routing_type_name();
    if kind.is_sub_agent() {
        out.push_str(&format!("    │ (each agent returns {})\n", routing));
    } else {
        out.push_str(&format!("    │ (returns {})\n", routing));
    }

    let branches = branches_for(kind);
    for (i, branch) in branches.iter().enumerate() {
        let connector = if i + 1 == branches.len() { "└─▶" } else { "├─▶" };
        out.push_str(&format!(
            "    {} If {} → {}\n",
            connector, branch.field_name, branch.description
        ));
        if branch.field_name == "collectorResult" {
            if let Some(routes) = collector_routes(kind) {
                out.push_str(&format!(
                    "    │     ├─▶ {} (ROUTE_BACK)\n",
                    routes.route_back_field
                ));
                out.push_str(&format!(
                    "    │     └─▶ {} (ADVANCE_PHASE)\n",
                    routes.advance_field
                ));
            }
        }
    }
    out
}

fn render_graph(current: PhaseKind, visited: &HashSet<PhaseKind>) -> String {
    let (main, side) = graph_order();
    let mut out = String::new();
    for kind in main {
        out.push_str(&render_node(*kind, current, visited));
        out.push_str("    ▼\n");
    }
    out.push_str("      COMPLETE\n");

    let rule = "─".repeat(SEPARATOR_WIDTH);
    out.push_str(&format!(
        "{rule}\nSIDE NODES (can be reached from collectors and route back to collectors)\n{rule}\n",
        rule = rule
    ));
    for kind in side {
        out.push_str(&render_node(*kind, current, visited));
    }
    out
}

fn render_history(history: &ExecutionHistory, warn_at: usize) -> String {
    let requests: Vec<_> = history
        .records()
        .iter()
        .filter(|r| r.payload.as_request().is_some())
        .collect();
    if requests.is_empty() {
        return "_No prior actions in this workflow run._\n".to_string();
    }

    let mut out = String::from("| # | Action | Input Type |\n|---|--------|------------|\n");
    for (i, record) in requests.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            i + 1,
            record.phase_name,
            record.payload_type
        ));
    }

    let mut visits: BTreeMap<PhaseKind, usize> = BTreeMap::new();
    for kind in history.request_sequence() {
        *visits.entry(kind).or_insert(0) += 1;
    }
    for (kind, count) in visits {
        if count >= warn_at.max(1) {
            out.push_str(&format!(
                "\n**Warning:** {} has been visited {} times. Consider whether the workflow is \
                 making progress or looping.\n",
                registry::display_name(kind),
                count
            ));
        }
    }
    out
}

fn render_options(current: PhaseKind) -> String {
    let mut out = format!(
        "From **{}**, you can route to:\n\n",
        registry::display_name(current)
    );
    for branch in branches_for(current) {
        out.push_str(&format!(
            "- **{}** → {}\n",
            branch.field_name, branch.description
        ));
    }
    out.push('\n');
    out.push_str(&guidance_for(current));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::history::HistoryPayload;
    use crate::model::PhaseRequest;

    fn history_of(kinds: &[PhaseKind]) -> ExecutionHistory {
        let mut history = ExecutionHistory::new();
        for kind in kinds {
            history
                .append(kind.as_str(), HistoryPayload::Request(PhaseRequest::new(*kind, "g")))
                .unwrap();
        }
        history
    }

    #[test]
    fn test_markers() {
        let visited: HashSet<PhaseKind> = [PhaseKind::Orchestrator].into_iter().collect();
        let graph = render_graph(PhaseKind::DiscoveryOrchestrator, &visited);
        assert!(graph.contains(">>> [Discovery Orchestrator] <<< YOU ARE HERE"));
        assert!(graph.contains("    [Orchestrator] [visited]"));
        assert!(graph.contains("    [Planning Collector]\n"));
        assert!(graph.contains("│ (each agent returns DiscoveryAgentRouting)"));
        assert!(graph.contains("│     └─▶ planningRequest (ADVANCE_PHASE)"));
        assert!(graph.contains("SIDE NODES"));
    }

    #[test]
    fn test_empty_history() {
        let text = render_history(&ExecutionHistory::new(), 2);
        assert_eq!(text, "_No prior actions in this workflow run._\n");
    }

    #[test]
    fn test_visit_warning() {
        let history = history_of(&[
            PhaseKind::Orchestrator,
            PhaseKind::DiscoveryOrchestrator,
            PhaseKind::DiscoveryCollector,
            PhaseKind::DiscoveryOrchestrator,
            PhaseKind::DiscoveryCollector,
        ]);
        let text = render_history(&history, 2);
        assert!(text.contains("| 3 | discovery_collector | DiscoveryCollectorRequest |"));
        assert!(text.contains(
            "**Warning:** Discovery Collector has been visited 2 times. Consider whether the \
             workflow is making progress or looping."
        ));
        assert!(!text.contains("Orchestrator has been visited 1"));
    }

    #[test]
    fn test_full_contribution() {
        let config = EngineConfig::default();
        let history = history_of(&[PhaseKind::Orchestrator]);
        let request = PhaseRequest::new(PhaseKind::DiscoveryCollector, "g");
        let ctx = ContributionContext::new(&request, &history, &config);
        let body = WorkflowPositionProvider.contribute(&ctx).unwrap();
        assert!(body.starts_with("## Workflow Position"));
        assert!(body.contains("From **Discovery Collector**, you can route to:"));
        assert!(body.contains("**Branching behavior when `collectorResult` is set:**"));
    }
}
