//! Leaf artifacts embedded in curations, and the hashing contract they share.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::body::CurationBody;
use super::hasher::ContentHasher;
use crate::model::ArtifactKey;

/// Anything that participates in the curation tree.
///
/// `content_hash` covers `scalar_view` plus the hashes of `children`, in order.
/// Identity keys are never part of either.
pub trait Artifact {
    /// Canonical rendering of the artifact's own scalar fields.
    fn scalar_view(&self) -> String;

    fn children(&self) -> Vec<CurationChild>;

    fn content_hash(&self, hasher: &dyn ContentHasher) -> String {
        let mut input = self.scalar_view();
        for child in self.children() {
            input.push('\n');
            input.push_str(&child.content_hash(hasher));
        }
        hasher.hash(&input)
    }
}

/// Owned child of a curation artifact, tagged by slot type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CurationChild {
    Body(CurationBody),
    Report(DiscoveryReport),
    PlanningResult(PlanningAgentResult),
    Ticket(PlanningTicket),
    TicketResult(TicketAgentResult),
}

impl CurationChild {
    pub fn content_hash(&self, hasher: &dyn ContentHasher) -> String {
        match self {
            Self::Body(body) => body.content_hash(hasher),
            Self::Report(report) => report.content_hash(hasher),
            Self::PlanningResult(result) => result.content_hash(hasher),
            Self::Ticket(ticket) => ticket.content_hash(hasher),
            Self::TicketResult(result) => result.content_hash(hasher),
        }
    }

    pub fn pretty_print(&self) -> String {
        match self {
            Self::Body(body) => body.pretty_print(),
            Self::Report(report) => report.pretty_print(),
            Self::PlanningResult(result) => result.pretty_print(),
            Self::Ticket(ticket) => ticket.pretty_print(),
            Self::TicketResult(result) => result.pretty_print(),
        }
    }
}

/// Keep `current` unless `children` supplies at least one item for this slot.
pub(crate) fn children_of_type<T: Clone>(
    children: &[CurationChild],
    current: &[T],
    pick: impl Fn(&CurationChild) -> Option<&T>,
) -> Vec<T> {
    let matched: Vec<T> = children.iter().filter_map(|c| pick(c).cloned()).collect();
    if matched.is_empty() {
        current.to_vec()
    } else {
        matched
    }
}

pub(crate) fn push_list(out: &mut String, heading: &str, items: &[String]) {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str(":\n");
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
}

/// One discovery agent's findings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveryReport {
    #[serde(default)]
    pub report_id: ArtifactKey,
    #[serde(default)]
    pub architecture_overview: String,
    #[serde(default)]
    pub key_patterns: Vec<String>,
    #[serde(default)]
    pub integration_points: Vec<String>,
}

impl DiscoveryReport {
    pub fn new(architecture_overview: impl Into<String>) -> Self {
        Self {
            architecture_overview: architecture_overview.into(),
            ..Self::default()
        }
    }

    pub fn with_key_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.key_patterns.push(pattern.into());
        self
    }

    pub fn with_integration_point(mut self, point: impl Into<String>) -> Self {
        self.integration_points.push(point.into());
        self
    }

    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        if !self.architecture_overview.trim().is_empty() {
            out.push_str("Architecture Overview:\n");
            out.push_str(self.architecture_overview.trim());
            out.push('\n');
        }
        push_list(&mut out, "Key Patterns", &self.key_patterns);
        push_list(&mut out, "Integration Points", &self.integration_points);
        out.trim().to_string()
    }
}

impl Artifact for DiscoveryReport {
    fn scalar_view(&self) -> String {
        json!({
            "architecture_overview": self.architecture_overview,
            "key_patterns": self.key_patterns,
            "integration_points": self.integration_points,
        })
        .to_string()
    }

    fn children(&self) -> Vec<CurationChild> {
        Vec::new()
    }
}

/// A unit of work proposed by planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanningTicket {
    pub ticket_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: i32,
}

impl PlanningTicket {
    pub fn new(ticket_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn pretty_print(&self) -> String {
        let mut out = self.ticket_id.trim().to_string();
        if !self.title.trim().is_empty() {
            if !out.is_empty() {
                out.push_str(": ");
            }
            out.push_str(self.title.trim());
        }
        if !self.description.trim().is_empty() {
            out.push_str(" - ");
            out.push_str(self.description.trim());
        }
        out
    }
}

impl Artifact for PlanningTicket {
    fn scalar_view(&self) -> String {
        json!({
            "ticket_id": self.ticket_id,
            "title": self.title,
            "description": self.description,
            "dependencies": self.dependencies,
            "acceptance_criteria": self.acceptance_criteria,
            "priority": self.priority,
        })
        .to_string()
    }

    fn children(&self) -> Vec<CurationChild> {
        Vec::new()
    }
}

/// One planning agent's output, with the tickets it proposed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanningAgentResult {
    #[serde(default)]
    pub result_id: ArtifactKey,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub tickets: Vec<PlanningTicket>,
}

impl PlanningAgentResult {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_ticket(mut self, ticket: PlanningTicket) -> Self {
        self.tickets.push(ticket);
        self
    }

    pub fn pretty_print(&self) -> String {
        let mut out = self.output.trim().to_string();
        if !self.tickets.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Tickets:\n");
            for ticket in &self.tickets {
                out.push_str("- ");
                out.push_str(&ticket.pretty_print());
                out.push('\n');
            }
        }
        out.trim().to_string()
    }
}

impl Artifact for PlanningAgentResult {
    fn scalar_view(&self) -> String {
        json!({ "output": self.output }).to_string()
    }

    fn children(&self) -> Vec<CurationChild> {
        self.tickets.iter().cloned().map(CurationChild::Ticket).collect()
    }
}

/// One ticket agent's implementation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TicketAgentResult {
    #[serde(default)]
    pub result_id: ArtifactKey,
    #[serde(default)]
    pub ticket_id: String,
    #[serde(default)]
    pub implementation_summary: String,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub test_results: Vec<String>,
    #[serde(default)]
    pub verification_status: String,
    #[serde(default)]
    pub output: String,
}

impl TicketAgentResult {
    pub fn new(ticket_id: impl Into<String>, implementation_summary: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            implementation_summary: implementation_summary.into(),
            ..Self::default()
        }
    }

    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        if !self.ticket_id.trim().is_empty() {
            out.push_str(&format!("Ticket Id: {}\n", self.ticket_id.trim()));
        }
        if !self.verification_status.trim().is_empty() {
            out.push_str(&format!(
                "Verification Status: {}\n",
                self.verification_status.trim()
            ));
        }
        if !self.implementation_summary.trim().is_empty() {
            out.push_str("Implementation Summary:\n");
            out.push_str(self.implementation_summary.trim());
            out.push('\n');
        }
        push_list(&mut out, "Files Modified", &self.files_modified);
        push_list(&mut out, "Test Results", &self.test_results);
        if !self.output.trim().is_empty() {
            out.push_str("Output:\n");
            out.push_str(self.output.trim());
            out.push('\n');
        }
        out.trim().to_string()
    }
}

impl Artifact for TicketAgentResult {
    fn scalar_view(&self) -> String {
        json!({
            "ticket_id": self.ticket_id,
            "implementation_summary": self.implementation_summary,
            "files_modified": self.files_modified,
            "test_results": self.test_results,
            "verification_status": self.verification_status,
            "output": self.output,
        })
        .to_string()
    }

    fn children(&self) -> Vec<CurationChild> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::Blake3Hasher;

    #[test]
    fn test_keys_do_not_affect_hash() {
        let a = DiscoveryReport::new("layered service").with_key_pattern("repository");
        let mut b = a.clone();
        b.report_id = ArtifactKey::new("some-other-key");
        assert_eq!(a.content_hash(&Blake3Hasher), b.content_hash(&Blake3Hasher));
    }

    #[test]
    fn test_ticket_change_changes_result_hash() {
        let result = PlanningAgentResult::new("plan").with_ticket(PlanningTicket::new("T-1", "parser"));
        let before = result.content_hash(&Blake3Hasher);
        let mut changed = result.clone();
        changed.tickets[0].title = "lexer".to_string();
        assert_ne!(before, changed.content_hash(&Blake3Hasher));
    }

    #[test]
    fn test_children_of_type_keeps_current_when_absent() {
        let current = vec![PlanningTicket::new("T-1", "a")];
        let supplied = vec![CurationChild::Report(DiscoveryReport::new("x"))];
        let kept = children_of_type(&supplied, &current, |c| match c {
            CurationChild::Ticket(t) => Some(t),
            _ => None,
        });
        assert_eq!(kept, current);
    }

    #[test]
    fn test_ticket_pretty_print() {
        let ticket = PlanningTicket::new("T-7", "Add cache").with_description("LRU in front of store");
        assert_eq!(ticket.pretty_print(), "T-7: Add cache - LRU in front of store");
    }
}
