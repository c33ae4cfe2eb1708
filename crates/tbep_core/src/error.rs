//! Pipeline error taxonomy.
//!
//! # Responsibility
//! - Separate fatal input problems (`ValidationError`) from engine failures
//!   (`Execution`) and registry failures.
//! - Keep warnings (dropped headers, skipped cells, registry drift) out of the
//!   error path; those travel in reports.
//!
//! # Invariants
//! - A `ValidationError` is always raised before any mutation is attempted.
//! - Engine errors are surfaced unchanged; nothing here retries.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::plan::artifact::ArtifactError;
use crate::repo::graph::EngineError;
use crate::repo::registry::RegistryError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal input problems detected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingFile(PathBuf),
    UnsupportedExtension(PathBuf),
    EmptyInput(PathBuf),
    TooFewColumns {
        found: usize,
    },
    NoClassifiedHeaders {
        dropped: usize,
    },
    /// Two raw headers resolve to one canonical property.
    AmbiguousTarget {
        canonical: String,
        first: String,
        second: String,
    },
    MissingColumn(String),
    UnknownInteractionType(String),
    UnknownIdType(String),
    InvalidSelector(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile(path) => write!(f, "input file not found: {}", path.display()),
            Self::UnsupportedExtension(path) => write!(
                f,
                "unsupported input extension (expected .csv, .tsv or .txt): {}",
                path.display()
            ),
            Self::EmptyInput(path) => write!(f, "input file has no rows: {}", path.display()),
            Self::TooFewColumns { found } => {
                write!(f, "input needs at least 2 columns, found {found}")
            }
            Self::NoClassifiedHeaders { dropped } => write!(
                f,
                "no header could be classified ({dropped} dropped); nothing to seed"
            ),
            Self::AmbiguousTarget {
                canonical,
                first,
                second,
            } => write!(
                f,
                "headers `{first}` and `{second}` both map to property `{canonical}`"
            ),
            Self::MissingColumn(column) => write!(f, "required column `{column}` is missing"),
            Self::UnknownInteractionType(value) => write!(
                f,
                "unknown interaction type `{value}`; expected PPI|FUN_PPI|BIO_GRID|INT_ACT|STRING"
            ),
            Self::UnknownIdType(value) => write!(
                f,
                "unknown id type `{value}`; expected ENSEMBL-ID|HGNC-Symbol"
            ),
            Self::InvalidSelector(message) => write!(f, "invalid deletion selector: {message}"),
        }
    }
}

impl Error for ValidationError {}

/// Top-level error for pipeline operations.
#[derive(Debug)]
pub enum PipelineError {
    Validation(ValidationError),
    /// Graph engine unreachable or statement rejected.
    Execution(EngineError),
    Registry(RegistryError),
    Artifact(ArtifactError),
    Config(ConfigError),
    Db(DbError),
    Csv(csv::Error),
    Io(std::io::Error),
    /// Executor worker pool could not be started.
    Pool(rayon::ThreadPoolBuildError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Execution(err) => write!(f, "execution failed: {err}"),
            Self::Registry(err) => write!(f, "registry failed: {err}"),
            Self::Artifact(err) => write!(f, "plan artifact failed: {err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "malformed input: {err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Pool(err) => write!(f, "cannot start executor pool: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Execution(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Artifact(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Pool(err) => Some(err),
        }
    }
}

impl From<ValidationError> for PipelineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<EngineError> for PipelineError {
    fn from(value: EngineError) -> Self {
        Self::Execution(value)
    }
}

impl From<RegistryError> for PipelineError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(value: ArtifactError) -> Self {
        Self::Artifact(value)
    }
}

impl From<ConfigError> for PipelineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for PipelineError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<csv::Error> for PipelineError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
