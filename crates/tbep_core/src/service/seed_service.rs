//! Seed and deletion use-cases.
//!
//! # Responsibility
//! - Validate input files before any mutation.
//! - Wire classifier, planner, executor and sinks for each operation.
//! - Emit one start/ok/error event pair per operation.
//!
//! # Invariants
//! - Plan artifacts are persisted before the plan is executed.
//! - Columnar rows are written only after the graph mutation succeeded.

use crate::classify::classifier::HeaderClassifier;
use crate::columnar::{association_rows, ColumnarSink, CsvColumnarSink};
use crate::config::{ConfigError, PipelineConfig};
use crate::error::{PipelineError, PipelineResult, ValidationError};
use crate::exec::deletion::{DeletionExecutor, DeletionPlanner, DeletionReport, DeletionSelector};
use crate::exec::executor::{consistency_warning, BulkExecutor, ExecutionReport};
use crate::ingest::metadata::{read_disease_names, read_property_descriptions};
use crate::ingest::reference::read_reference_genes;
use crate::ingest::{header_row, open_reader};
use crate::model::canonical::Scope;
use crate::model::property::PropertyEntry;
use crate::plan::artifact::{ArtifactSink, DirectoryArtifactSink, PlanArtifact};
use crate::plan::interaction::{plan_interactions, IdType, InteractionKind};
use crate::plan::mutation::{MutationPlan, MutationPlanner};
use crate::repo::graph::GraphEngine;
use crate::repo::registry::PropertyRegistry;
use log::{error, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of a seed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub execution: ExecutionReport,
    /// Raw headers no rule matched.
    pub dropped_headers: Vec<String>,
    pub skipped_cells: usize,
    pub skipped_rows: usize,
    pub unparsed_names: BTreeSet<String>,
    /// Registered names per scope key.
    pub names_by_scope: BTreeMap<String, usize>,
    pub associations_written: usize,
    pub artifact: Option<PathBuf>,
}

/// Outcome of a reference genome import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceReport {
    pub execution: ExecutionReport,
    pub genes_before: usize,
    pub genes_after: usize,
    pub skipped_rows: usize,
}

/// Use-case service over one graph engine and one registry.
pub struct SeedService<E: GraphEngine, R: PropertyRegistry> {
    engine: E,
    registry: R,
    classifier: HeaderClassifier,
    planner: MutationPlanner,
    executor: BulkExecutor,
    identifier_column: String,
    batch_size: usize,
    artifacts: Option<Box<dyn ArtifactSink>>,
    columnar: Option<Box<dyn ColumnarSink>>,
}

impl<E: GraphEngine, R: PropertyRegistry> SeedService<E, R> {
    /// Builds a service from validated configuration.
    pub fn new(engine: E, registry: R, config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let classifier = HeaderClassifier::new(&config.rules).map_err(ConfigError::from)?;
        Ok(Self {
            engine,
            registry,
            classifier,
            planner: MutationPlanner::new(config.batch_size, config.match_mode),
            executor: BulkExecutor::new(config.concurrency)?,
            identifier_column: config.identifier_column.clone(),
            batch_size: config.batch_size,
            artifacts: config
                .artifact_dir
                .as_ref()
                .map(|dir| Box::new(DirectoryArtifactSink::new(dir)) as Box<dyn ArtifactSink>),
            columnar: config
                .columnar_dir
                .as_ref()
                .map(|dir| Box::new(CsvColumnarSink::new(dir)) as Box<dyn ColumnarSink>),
        })
    }

    /// Replaces the artifact sink.
    pub fn with_artifact_sink(mut self, sink: Box<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    /// Replaces the columnar sink.
    pub fn with_columnar_sink(mut self, sink: Box<dyn ColumnarSink>) -> Self {
        self.columnar = Some(sink);
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Seeds a dense matrix file; `disease` scopes disease-dependent columns.
    pub fn seed_dense(&self, path: &Path, disease: Option<&str>) -> PipelineResult<SeedReport> {
        self.observed("seed_dense", path, || {
            let mut reader = open_reader(path, true)?;
            let headers = header_row(&mut reader)?;
            if headers.is_empty() {
                return Err(ValidationError::EmptyInput(path.to_path_buf()).into());
            }
            let mapping = self
                .classifier
                .map_headers(&headers, &self.identifier_column, disease)?;
            let plan = self.planner.plan_dense(&mapping, reader.records())?;
            ensure_rows(path, &plan)?;

            let mut report = self.apply_plan(&plan)?;
            report.dropped_headers = mapping.dropped;
            Ok(report)
        })
    }

    /// Seeds headerless `(gene, canonical_name, value)` triples.
    pub fn seed_sparse(&self, path: &Path) -> PipelineResult<SeedReport> {
        self.observed("seed_sparse", path, || {
            let mut reader = open_reader(path, false)?;
            let plan = self.planner.plan_sparse(reader.records())?;
            ensure_rows(path, &plan)?;

            self.apply_plan(&plan)
        })
    }

    /// Seeds headerless `(gene1, gene2, score)` interaction triples.
    pub fn seed_interactions(
        &self,
        path: &Path,
        kind: &str,
        id_type: Option<&str>,
    ) -> PipelineResult<SeedReport> {
        let kind = InteractionKind::parse(kind)?;
        let id_type = id_type.map(IdType::parse).transpose()?;
        self.observed("seed_interactions", path, || {
            let mut reader = open_reader(path, false)?;
            let plan = plan_interactions(reader.records(), kind, id_type, self.batch_size)?;
            if plan.batches.is_empty() {
                return Err(ValidationError::EmptyInput(path.to_path_buf()).into());
            }
            let artifact = self.persist_artifact(&PlanArtifact::interactions(&plan))?;
            let execution = self.executor.execute_interactions(&plan, &self.engine)?;
            Ok(SeedReport {
                execution,
                dropped_headers: Vec::new(),
                skipped_cells: 0,
                skipped_rows: plan.skipped_rows,
                unparsed_names: BTreeSet::new(),
                names_by_scope: BTreeMap::new(),
                associations_written: 0,
                artifact,
            })
        })
    }

    /// Merges an HGNC-style reference genome file.
    pub fn import_reference(&self, path: &Path) -> PipelineResult<ReferenceReport> {
        self.observed("import_reference", path, || {
            let mut reader = open_reader(path, true)?;
            let genome = read_reference_genes(&mut reader)?;
            if genome.genes.is_empty() {
                return Err(ValidationError::EmptyInput(path.to_path_buf()).into());
            }
            let genes_before = self.engine.gene_count()?;
            let execution =
                self.executor
                    .execute_reference(&genome.genes, self.batch_size, &self.engine)?;
            Ok(ReferenceReport {
                execution,
                genes_before,
                genes_after: self.engine.gene_count()?,
                skipped_rows: genome.skipped_rows,
            })
        })
    }

    /// Sets names on registered diseases from a headerless `id,name` file.
    pub fn update_disease_names(&self, path: &Path) -> PipelineResult<usize> {
        self.observed("update_disease_names", path, || {
            let mut reader = open_reader(path, false)?;
            let pairs = read_disease_names(&mut reader)?;
            Ok(self.registry.set_disease_names(&pairs)?)
        })
    }

    /// Sets descriptions on registered properties.
    pub fn update_property_descriptions(&self, path: &Path) -> PipelineResult<usize> {
        self.observed("update_property_descriptions", path, || {
            let mut reader = open_reader(path, true)?;
            let pairs = read_property_descriptions(&mut reader)?;
            Ok(self.registry.set_property_descriptions(&pairs)?)
        })
    }

    /// Removes a category (plus explicit names) from the selected scopes.
    pub fn delete(&self, selector: &DeletionSelector) -> PipelineResult<DeletionReport> {
        let started_at = Instant::now();
        info!(
            "event=delete module=service status=start category={} explicit_names={}",
            selector.category,
            selector.explicit_names.len()
        );
        let result = DeletionPlanner::plan(selector, &self.registry)
            .map_err(PipelineError::from)
            .and_then(|plan| {
                let names = DeletionExecutor::resolve(&plan, &self.registry)?;
                self.persist_artifact(&PlanArtifact::removal(&names))?;
                DeletionExecutor::execute(&plan, &self.engine, &self.registry)
            });
        match &result {
            Ok(report) => info!(
                "event=delete module=service status=ok names={} genes_affected={} duration_ms={}",
                report.removed_names.len(),
                report.affected_genes,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=delete module=service status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Registry entries, optionally limited to one scope.
    pub fn list(&self, scope: Option<&Scope>) -> PipelineResult<Vec<PropertyEntry>> {
        Ok(self.registry.entries(scope)?)
    }

    /// Persists the artifact, executes, then mirrors associations into the
    /// columnar store.
    fn apply_plan(&self, plan: &MutationPlan) -> PipelineResult<SeedReport> {
        let artifact = self.persist_artifact(&PlanArtifact::upsert(plan))?;
        let mut execution = self.executor.execute(plan, &self.engine, &self.registry)?;
        let associations_written = self.write_associations(plan, &mut execution)?;
        Ok(SeedReport {
            execution,
            dropped_headers: Vec::new(),
            skipped_cells: plan.skipped_cells,
            skipped_rows: plan.skipped_rows,
            unparsed_names: plan.unparsed_names.clone(),
            names_by_scope: plan
                .names_by_scope
                .iter()
                .map(|(scope, names)| (scope.key().to_string(), names.len()))
                .collect(),
            associations_written,
            artifact,
        })
    }

    /// Runs after the graph commit; a failed write is a consistency warning.
    fn write_associations(
        &self,
        plan: &MutationPlan,
        execution: &mut ExecutionReport,
    ) -> PipelineResult<usize> {
        let Some(sink) = &self.columnar else {
            return Ok(0);
        };
        if plan.associations.is_empty() {
            return Ok(0);
        }
        let ids: BTreeSet<String> = plan
            .associations
            .iter()
            .map(|association| association.gene_id.clone())
            .collect();
        let gene_names = self.engine.gene_names(&ids)?;
        let rows = association_rows(&plan.associations, &gene_names);
        match sink.write_rows(&rows) {
            Ok(written) => Ok(written),
            Err(err) => {
                execution.consistency_warnings.push(consistency_warning(
                    "columnar_write",
                    "columnar",
                    rows.len(),
                    &err,
                ));
                Ok(0)
            }
        }
    }

    fn persist_artifact(&self, artifact: &PlanArtifact) -> PipelineResult<Option<PathBuf>> {
        let Some(sink) = &self.artifacts else {
            return Ok(None);
        };
        let path = sink.persist(artifact)?;
        info!(
            "event=plan_artifact module=service status=ok id={} rows={}",
            artifact.id, artifact.row_count
        );
        Ok(Some(path))
    }

    fn observed<T>(
        &self,
        event: &str,
        path: &Path,
        operation: impl FnOnce() -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        let started_at = Instant::now();
        info!(
            "event={event} module=service status=start file={}",
            path.display()
        );
        let result = operation();
        match &result {
            Ok(_) => info!(
                "event={event} module=service status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={event} module=service status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

fn ensure_rows(path: &Path, plan: &MutationPlan) -> Result<(), ValidationError> {
    if plan.is_empty() {
        return Err(ValidationError::EmptyInput(path.to_path_buf()));
    }
    Ok(())
}
