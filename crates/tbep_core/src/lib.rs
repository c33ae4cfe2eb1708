//! Core pipeline for normalizing heterogeneous gene data files into a
//! gene-centric property graph.
//! This crate is the single source of truth for naming and scoping rules.

pub mod classify;
pub mod columnar;
pub mod config;
pub mod db;
pub mod error;
pub mod exec;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod plan;
pub mod repo;
pub mod service;

pub use classify::classifier::{Classification, HeaderClassifier};
pub use classify::mapping::HeaderMapping;
pub use classify::rules::RuleTables;
pub use config::{ConfigError, PipelineConfig};
pub use error::{PipelineError, PipelineResult, ValidationError};
pub use exec::deletion::{DeletionReport, DeletionSelector};
pub use exec::executor::{BulkExecutor, ConsistencyWarning, ExecutionReport};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::canonical::{CanonicalName, Category, Scope};
pub use plan::batch::IdentifierMatchMode;
pub use plan::mutation::{MutationPlan, MutationPlanner};
pub use repo::graph::{EngineError, GraphEngine, SqliteGraphEngine};
pub use repo::registry::{PropertyRegistry, SqlitePropertyRegistry};
pub use service::seed_service::{ReferenceReport, SeedReport, SeedService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
