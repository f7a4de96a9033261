//! Engine configuration.
//!
//! Defaults cover every field; a TOML file or `WORKFLOW_*` environment
//! variables override individual values.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum repetitions before a repeated node block counts as a degenerate loop
    pub loop_repetition_threshold: usize,
    /// Same-phase interrupt count that triggers the loop breaker
    pub interrupt_loop_threshold: usize,
    /// Request count at which workflow-position warns about revisits
    pub visit_warning_threshold: usize,
    pub history_page_default: usize,
    pub history_page_max: usize,
    pub search_default: usize,
    pub search_max: usize,
    /// Preview length including the `...` suffix
    pub entry_preview_chars: usize,
    /// Upper bound on phases executed by a single `drive`
    pub max_drive_steps: usize,
    /// Per-provider delimiter; `{name}` and `{priority}` are substituted
    pub contribution_delimiter: String,
    pub include_decision_schema: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            loop_repetition_threshold: 3,
            interrupt_loop_threshold: 2,
            visit_warning_threshold: 2,
            history_page_default: 50,
            history_page_max: 100,
            search_default: 20,
            search_max: 50,
            entry_preview_chars: 200,
            max_drive_steps: 200,
            contribution_delimiter: "--- {name} ---".to_string(),
            include_decision_schema: false,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `WORKFLOW_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from `lookup`. Unparseable or zero values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
        };

        if let Some(n) = number("WORKFLOW_LOOP_REPETITION_THRESHOLD") {
            self.loop_repetition_threshold = n;
        }
        if let Some(n) = number("WORKFLOW_INTERRUPT_LOOP_THRESHOLD") {
            self.interrupt_loop_threshold = n;
        }
        if let Some(n) = number("WORKFLOW_VISIT_WARNING_THRESHOLD") {
            self.visit_warning_threshold = n;
        }
        if let Some(n) = number("WORKFLOW_HISTORY_PAGE_DEFAULT") {
            self.history_page_default = n;
        }
        if let Some(n) = number("WORKFLOW_HISTORY_PAGE_MAX") {
            self.history_page_max = n;
        }
        if let Some(n) = number("WORKFLOW_SEARCH_DEFAULT") {
            self.search_default = n;
        }
        if let Some(n) = number("WORKFLOW_SEARCH_MAX") {
            self.search_max = n;
        }
        if let Some(n) = number("WORKFLOW_ENTRY_PREVIEW_CHARS") {
            self.entry_preview_chars = n;
        }
        if let Some(n) = number("WORKFLOW_MAX_DRIVE_STEPS") {
            self.max_drive_steps = n;
        }
        if let Some(delimiter) = lookup("WORKFLOW_CONTRIBUTION_DELIMITER") {
            if !delimiter.trim().is_empty() {
                self.contribution_delimiter = delimiter;
            }
        }
        if let Some(val) = lookup("WORKFLOW_INCLUDE_DECISION_SCHEMA") {
            self.include_decision_schema = val.to_lowercase() == "true" || val == "1";
        }
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.loop_repetition_threshold < 2 {
            return Err(ConfigError::Invalid {
                field: "loop_repetition_threshold",
                message: "must be at least 2".to_string(),
            });
        }
        if self.history_page_default > self.history_page_max {
            return Err(ConfigError::Invalid {
                field: "history_page_default",
                message: format!("exceeds history_page_max ({})", self.history_page_max),
            });
        }
        if self.search_default > self.search_max {
            return Err(ConfigError::Invalid {
                field: "search_default",
                message: format!("exceeds search_max ({})", self.search_max),
            });
        }
        if self.entry_preview_chars < 4 {
            return Err(ConfigError::Invalid {
                field: "entry_preview_chars",
                message: "must leave room for the ... suffix".to_string(),
            });
        }
        Ok(())
    }

    /// Clamp a requested page size into `1..=history_page_max`.
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.history_page_default)
            .min(self.history_page_max)
    }

    pub fn search_limit(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .unwrap_or(self.search_default)
            .min(self.search_max)
    }

    pub fn render_delimiter(&self, name: &str, priority: i32) -> String {
        self.contribution_delimiter
            .replace("{name}", name)
            .replace("{priority}", &priority.to_string())
    }
}
