use serde::{Deserialize, Serialize};

use super::defaults;

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive (`info`, `debug`, `knowflow_pipeline=trace`, ...)
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(defaults::DEFAULT_LOG_LEVEL)
    }
}
