//! Per-family curation bodies.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::artifact::{
    children_of_type, push_list, Artifact, CurationChild, DiscoveryReport, PlanningAgentResult,
    PlanningTicket, TicketAgentResult,
};
use super::CurationFamily;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Recommendation {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Recommendation {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Consolidated discovery output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveryCuration {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub reports: Vec<DiscoveryReport>,
}

impl DiscoveryCuration {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_report(mut self, report: DiscoveryReport) -> Self {
        self.reports.push(report);
        self
    }

    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendations.push(recommendation);
        self
    }
}

/// Consolidated planning output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanningCuration {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub agent_results: Vec<PlanningAgentResult>,
    #[serde(default)]
    pub finalized_tickets: Vec<PlanningTicket>,
}

impl PlanningCuration {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_agent_result(mut self, result: PlanningAgentResult) -> Self {
        self.agent_results.push(result);
        self
    }

    pub fn with_ticket(mut self, ticket: PlanningTicket) -> Self {
        self.finalized_tickets.push(ticket);
        self
    }
}

/// Consolidated ticket execution output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TicketCuration {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub completion_status: String,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    #[serde(default)]
    pub agent_results: Vec<TicketAgentResult>,
}

impl TicketCuration {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_agent_result(mut self, result: TicketAgentResult) -> Self {
        self.agent_results.push(result);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.completion_status = status.into();
        self
    }
}

/// The family-specific content of a curation node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum CurationBody {
    Discovery(DiscoveryCuration),
    Planning(PlanningCuration),
    Ticket(TicketCuration),
}

impl CurationBody {
    pub fn family(&self) -> CurationFamily {
        match self {
            Self::Discovery(_) => CurationFamily::Discovery,
            Self::Planning(_) => CurationFamily::Planning,
            Self::Ticket(_) => CurationFamily::Ticket,
        }
    }

    /// New body with matching slots replaced; unmatched slots keep their value.
    pub fn with_children(&self, children: &[CurationChild]) -> Self {
        match self {
            Self::Discovery(c) => Self::Discovery(DiscoveryCuration {
                reports: children_of_type(children, &c.reports, |child| match child {
                    CurationChild::Report(r) => Some(r),
                    _ => None,
                }),
                ..c.clone()
            }),
            Self::Planning(c) => Self::Planning(PlanningCuration {
                agent_results: children_of_type(children, &c.agent_results, |child| match child {
                    CurationChild::PlanningResult(r) => Some(r),
                    _ => None,
                }),
                finalized_tickets: children_of_type(children, &c.finalized_tickets, |child| {
                    match child {
                        CurationChild::Ticket(t) => Some(t),
                        _ => None,
                    }
                }),
                ..c.clone()
            }),
            Self::Ticket(c) => Self::Ticket(TicketCuration {
                agent_results: children_of_type(children, &c.agent_results, |child| match child {
                    CurationChild::TicketResult(r) => Some(r),
                    _ => None,
                }),
                ..c.clone()
            }),
        }
    }

    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Discovery(c) => {
                push_summary(&mut out, &c.summary);
                let recs: Vec<String> = c
                    .recommendations
                    .iter()
                    .map(|r| format!("{}: {}", r.title.trim(), r.description.trim()))
                    .collect();
                push_list(&mut out, "Recommendations", &recs);
                let reports: Vec<String> = c.reports.iter().map(|r| r.pretty_print()).collect();
                push_list(&mut out, "Discovery Reports", &reports);
            }
            Self::Planning(c) => {
                push_summary(&mut out, &c.summary);
                let tickets: Vec<String> =
                    c.finalized_tickets.iter().map(|t| t.pretty_print()).collect();
                push_list(&mut out, "Tickets", &tickets);
                let results: Vec<String> =
                    c.agent_results.iter().map(|r| r.pretty_print()).collect();
                push_list(&mut out, "Planning Results", &results);
            }
            Self::Ticket(c) => {
                if !c.completion_status.trim().is_empty() {
                    out.push_str(&format!("Status: {}\n", c.completion_status.trim()));
                }
                push_summary(&mut out, &c.summary);
                push_list(&mut out, "Follow Ups", &c.follow_ups);
                let results: Vec<String> =
                    c.agent_results.iter().map(|r| r.pretty_print()).collect();
                push_list(&mut out, "Ticket Results", &results);
            }
        }
        out.trim().to_string()
    }
}

fn push_summary(out: &mut String, summary: &str) {
    if !summary.trim().is_empty() {
        out.push_str(summary.trim());
        out.push('\n');
    }
}

impl Artifact for CurationBody {
    fn scalar_view(&self) -> String {
        match self {
            Self::Discovery(c) => json!({
                "family": "discovery",
                "summary": c.summary,
                "recommendations": c.recommendations
                    .iter()
                    .map(|r| json!([r.title, r.description]))
                    .collect::<Vec<_>>(),
            }),
            Self::Planning(c) => json!({
                "family": "planning",
                "summary": c.summary,
            }),
            Self::Ticket(c) => json!({
                "family": "ticket",
                "summary": c.summary,
                "completion_status": c.completion_status,
                "follow_ups": c.follow_ups,
            }),
        }
        .to_string()
    }

    fn children(&self) -> Vec<CurationChild> {
        match self {
            Self::Discovery(c) => c.reports.iter().cloned().map(CurationChild::Report).collect(),
            Self::Planning(c) => c
                .agent_results
                .iter()
                .cloned()
                .map(CurationChild::PlanningResult)
                .chain(c.finalized_tickets.iter().cloned().map(CurationChild::Ticket))
                .collect(),
            Self::Ticket(c) => c
                .agent_results
                .iter()
                .cloned()
                .map(CurationChild::TicketResult)
                .collect(),
        }
    }
}
