//! Runner configuration.
//!
//! A TOML file supplies the engine section and the runner paths; `WORKFLOW_*`
//! and `WORKFLOW_RUNNER_*` environment variables override it, and command line
//! flags override both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use workflow_coordination::EngineConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub engine: EngineConfig,
    /// JSON decision script.
    pub script: Option<PathBuf>,
    /// Where the run report is written. Printed to stdout when unset.
    pub report: Option<PathBuf>,
    pub goal: Option<String>,
    /// Directory for the file-backed artifact store. In-memory when unset.
    pub store_dir: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunnerConfig = toml::from_str(content).context("invalid runner config")?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `path` when given, otherwise start from defaults, then apply the
    /// process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(script) = non_empty("WORKFLOW_RUNNER_SCRIPT") {
            self.script = Some(PathBuf::from(script));
        }
        if let Some(report) = non_empty("WORKFLOW_RUNNER_REPORT") {
            self.report = Some(PathBuf::from(report));
        }
        if let Some(goal) = non_empty("WORKFLOW_RUNNER_GOAL") {
            self.goal = Some(goal);
        }
        if let Some(dir) = non_empty("WORKFLOW_RUNNER_STORE_DIR") {
            self.store_dir = Some(PathBuf::from(dir));
        }
        self.engine = self.engine.with_overrides(&lookup);
        self
    }
}
