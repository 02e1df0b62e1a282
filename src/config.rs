//! Deserializable logger configuration.

use serde::{Deserialize, Serialize};

use crate::{
    Context, Result,
    level::{IntoSeverity, Severity},
    record::FieldPolicy,
};

/// A level as written in configuration: a rank or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelSetting {
    Rank(i64),
    Name(String),
}

impl IntoSeverity for LevelSetting {
    fn into_severity(self) -> Result<Severity> {
        match self {
            Self::Rank(rank) => Severity::from_rank(rank),
            Self::Name(name) => name.parse(),
        }
    }
}

/// Settings for [`ContextLogger::from_config`](crate::ContextLogger::from_config).
///
/// ```
/// use context_redact_logger::{ContextLogger, LoggerConfig, MemorySink, Severity, ContextualLog};
///
/// let config: LoggerConfig = serde_json::from_str(r#"{
///     "level": "warn",
///     "global_context": { "service": "billing" },
///     "secrets": ["hunter2"]
/// }"#).unwrap();
///
/// let logger = ContextLogger::from_config(config, MemorySink::new()).unwrap();
/// assert_eq!(logger.level(), Severity::Warn);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    pub level: Option<LevelSetting>,
    pub progname: Option<String>,
    pub global_context: Context,
    pub redaction_marker: Option<String>,
    pub field_policy: FieldPolicy,
    /// Literal secrets registered with the redactor.
    pub secrets: Vec<String>,
    /// Regular expressions registered with the redactor.
    pub secret_patterns: Vec<String>,
}
