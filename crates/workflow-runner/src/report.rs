//! JSON run report written at the end of a run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use workflow_coordination::{
    InterruptContext, PhaseKind, PhaseStep, Rejection, RunStatus, RunSummary,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub kind: PhaseKind,
    pub node_id: String,
    pub branch: Option<String>,
    pub contributions: Vec<String>,
}

impl From<&PhaseStep> for StepReport {
    fn from(step: &PhaseStep) -> Self {
        Self {
            kind: step.kind,
            node_id: step.node_id.clone(),
            branch: step.branch.clone(),
            contributions: step.contributions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub goal: String,
    pub status: Option<RunStatus>,
    pub steps: Vec<StepReport>,
    pub interrupts: Vec<InterruptContext>,
    pub history_len: usize,
    pub history_summary: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<Rejection>,
    /// Engine error that ended the drive, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub unused_script_steps: usize,
    pub generated_at: DateTime<Utc>,
}

impl RunReport {
    pub fn from_summary(summary: &RunSummary) -> Self {
        Self {
            run_id: summary.run_id.clone(),
            goal: summary.goal.clone(),
            status: summary.status,
            steps: summary.steps.iter().map(StepReport::from).collect(),
            interrupts: summary.interrupts.clone(),
            history_len: summary.history_len,
            history_summary: summary.history_summary.clone(),
            abort_reason: summary.abort_reason.clone(),
            halted: summary.halted.clone(),
            error: None,
            unused_script_steps: 0,
            generated_at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_unused_script_steps(mut self, count: usize) -> Self {
        self.unused_script_steps = count;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(RunStatus::Completed) && self.halted.is_none() && self.error.is_none()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize run report")
    }

    /// Write the report, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        let mut history_summary = BTreeMap::new();
        history_summary.insert("orchestrator".to_string(), 3);
        RunSummary {
            run_id: "run-1".to_string(),
            goal: "ship it".to_string(),
            status: Some(RunStatus::Completed),
            steps: vec![PhaseStep {
                kind: PhaseKind::Orchestrator,
                node_id: "node-1".to_string(),
                branch: Some("advance".to_string()),
                contributions: vec!["first-orchestrator-request".to_string()],
                started_at: Utc::now(),
            }],
            interrupts: Vec::new(),
            history_len: 3,
            history_summary,
            abort_reason: None,
            halted: None,
        }
    }

    #[test]
    fn test_report_mirrors_summary() {
        let report = RunReport::from_summary(&summary());
        assert!(report.is_success());
        assert_eq!(report.steps[0].node_id, "node-1");
        assert_eq!(report.steps[0].branch.as_deref(), Some("advance"));
        assert_eq!(report.history_summary.get("orchestrator"), Some(&3));

        let failed = report.with_error("Decision for review failed");
        assert!(!failed.is_success());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        RunReport::from_summary(&summary())
            .with_unused_script_steps(2)
            .write(&path)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["steps"][0]["kind"], "orchestrator");
        assert_eq!(value["unused_script_steps"], 2);
        assert!(value.get("error").is_none());
    }
}
