//! Pipeline configuration.
//!
//! Loaded from JSON; every field is optional and falls back to the defaults
//! below. Validation runs once at load time so later stages can trust it.

use crate::classify::rules::{RuleTableError, RuleTables};
use crate::exec::executor::DEFAULT_CONCURRENCY;
use crate::logging::default_log_level;
use crate::plan::batch::IdentifierMatchMode;
use crate::plan::mutation::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default name of the identifier column in dense files.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "gene_id";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
    Rules(RuleTableError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Rules(err) => write!(f, "invalid rule tables: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
            Self::Rules(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<RuleTableError> for ConfigError {
    fn from(value: RuleTableError) -> Self {
        Self::Rules(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub rules: RuleTables,
    /// Dense-file identifier column; the first column is used when absent.
    pub identifier_column: String,
    pub match_mode: IdentifierMatchMode,
    /// Rows per engine transaction.
    pub batch_size: usize,
    /// Batches in flight.
    pub concurrency: usize,
    /// Where plan artifacts are written; none disables persistence.
    pub artifact_dir: Option<PathBuf>,
    /// Where columnar association tables are written; none disables them.
    pub columnar_dir: Option<PathBuf>,
    pub log_level: String,
    /// No file logging when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: RuleTables::default(),
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            match_mode: IdentifierMatchMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            artifact_dir: None,
            columnar_dir: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.identifier_column.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "identifier_column cannot be empty".to_string(),
            ));
        }
        self.rules.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PipelineConfig, DEFAULT_IDENTIFIER_COLUMN};
    use crate::plan::batch::IdentifierMatchMode;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.batch_size, 2000);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.identifier_column, DEFAULT_IDENTIFIER_COLUMN);
        assert_eq!(config.match_mode, IdentifierMatchMode::Exact);
    }

    #[test]
    fn partial_rules_keep_remaining_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"batch_size": 50, "match_mode": "ALIAS_CASE_NORMALIZED", "rules": {"renames": {"GWAS": "OpenTargets", "Expression": "TE"}}}"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.match_mode, IdentifierMatchMode::AliasCaseNormalized);
        assert!(!config.rules.general_symbols.is_empty());
        assert_eq!(config.rules.renames.len(), 2);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"concurrency": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("concurrency")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"batchsize": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
