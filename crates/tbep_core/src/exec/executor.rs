//! Bounded-concurrency batch execution.
//!
//! # Responsibility
//! - Dispatch plan batches to the graph engine on a dedicated pool.
//! - Mirror planned names into the registry once the graph commit succeeded.
//!
//! # Invariants
//! - At most `concurrency` batches are in flight.
//! - The first failing batch stops dispatch of batches not yet started;
//!   committed batches stay committed and nothing is retried.
//! - Registry failures after a successful mutation are reported as
//!   consistency warnings, never as errors.

use crate::error::{PipelineError, PipelineResult};
use crate::ingest::reference::ReferenceGene;
use crate::model::canonical::Scope;
use crate::plan::interaction::InteractionPlan;
use crate::plan::mutation::MutationPlan;
use crate::repo::graph::{EngineResult, GraphEngine, MutationCounters};
use crate::repo::registry::PropertyRegistry;
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Default number of batches in flight.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Registry drift left behind by a successful graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyWarning {
    pub scope: String,
    pub names: usize,
    pub message: String,
}

/// Outcome of one executed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub properties_set: usize,
    pub elapsed_ms: u64,
    pub batches_total: usize,
    pub batches_committed: usize,
    pub counters: MutationCounters,
    pub consistency_warnings: Vec<ConsistencyWarning>,
}

/// Applies batches with a bounded worker pool.
pub struct BulkExecutor {
    pool: rayon::ThreadPool,
    concurrency: usize,
}

impl BulkExecutor {
    /// Builds a pool of `concurrency` workers (at least one).
    pub fn new(concurrency: usize) -> PipelineResult<Self> {
        let concurrency = concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|index| format!("tbep-exec-{index}"))
            .build()
            .map_err(PipelineError::Pool)?;
        Ok(Self { pool, concurrency })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Applies every batch of `plan`, then registers the planned names.
    pub fn execute<E, R>(
        &self,
        plan: &MutationPlan,
        engine: &E,
        registry: &R,
    ) -> PipelineResult<ExecutionReport>
    where
        E: GraphEngine + ?Sized,
        R: PropertyRegistry + ?Sized,
    {
        let mut report = self.run("upsert", &plan.batches, |batch| engine.apply_upserts(batch))?;
        report.consistency_warnings = register_names(registry, &plan.names_by_scope);
        Ok(report)
    }

    /// Applies every batch of an interaction plan.
    pub fn execute_interactions<E>(
        &self,
        plan: &InteractionPlan,
        engine: &E,
    ) -> PipelineResult<ExecutionReport>
    where
        E: GraphEngine + ?Sized,
    {
        self.run("interactions", &plan.batches, |batch| {
            engine.merge_interactions(batch)
        })
    }

    /// Merges reference genes in chunks of `batch_size`.
    pub fn execute_reference<E>(
        &self,
        genes: &[ReferenceGene],
        batch_size: usize,
        engine: &E,
    ) -> PipelineResult<ExecutionReport>
    where
        E: GraphEngine + ?Sized,
    {
        let chunks: Vec<&[ReferenceGene]> = genes.chunks(batch_size.max(1)).collect();
        self.run("reference", &chunks, |chunk| engine.upsert_reference_genes(chunk))
    }

    /// Runs `apply` over `batches` on the pool and folds the counters.
    fn run<B, F>(&self, operation: &str, batches: &[B], apply: F) -> PipelineResult<ExecutionReport>
    where
        B: Sync,
        F: Fn(&B) -> EngineResult<MutationCounters> + Sync,
    {
        let started_at = Instant::now();
        info!(
            "event=bulk_execute module=exec status=start operation={operation} batches={} concurrency={}",
            batches.len(),
            self.concurrency
        );

        let failed = AtomicBool::new(false);
        let committed = AtomicUsize::new(0);
        let outcome = self.pool.install(|| {
            batches
                .par_iter()
                .map(|batch| {
                    if failed.load(Ordering::Acquire) {
                        return Ok(MutationCounters::default());
                    }
                    let result = apply(batch);
                    match &result {
                        Ok(_) => {
                            committed.fetch_add(1, Ordering::AcqRel);
                        }
                        Err(_) => failed.store(true, Ordering::Release),
                    }
                    result
                })
                .try_reduce(MutationCounters::default, |left, right| Ok(left.merge(right)))
        });

        let batches_committed = committed.load(Ordering::Acquire);
        let elapsed_ms = elapsed_ms(started_at);
        match outcome {
            Ok(counters) => {
                info!(
                    "event=bulk_execute module=exec status=ok operation={operation} batches={} properties_set={} nodes_created={} relationships_created={} rows_unmatched={} duration_ms={elapsed_ms}",
                    batches.len(),
                    counters.properties_set,
                    counters.nodes_created,
                    counters.relationships_created,
                    counters.rows_unmatched
                );
                Ok(ExecutionReport {
                    properties_set: counters.properties_set,
                    elapsed_ms,
                    batches_total: batches.len(),
                    batches_committed,
                    counters,
                    consistency_warnings: Vec::new(),
                })
            }
            Err(err) => {
                error!(
                    "event=bulk_execute module=exec status=error operation={operation} batches={} batches_committed={batches_committed} duration_ms={elapsed_ms} error={err}",
                    batches.len()
                );
                Err(PipelineError::Execution(err))
            }
        }
    }
}

pub(crate) fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Adds names to the registry once per scope; failures become warnings.
pub(crate) fn register_names<R>(
    registry: &R,
    names_by_scope: &BTreeMap<Scope, BTreeSet<String>>,
) -> Vec<ConsistencyWarning>
where
    R: PropertyRegistry + ?Sized,
{
    let mut warnings = Vec::new();
    for (scope, names) in names_by_scope {
        match registry.add(scope, names) {
            Ok(added) => info!(
                "event=registry_add module=exec status=ok scope={scope} names={} added={added}",
                names.len()
            ),
            Err(err) => warnings.push(consistency_warning(
                "registry_add",
                scope.key(),
                names.len(),
                &err,
            )),
        }
    }
    warnings
}

pub(crate) fn consistency_warning(
    event: &str,
    scope: &str,
    names: usize,
    err: &dyn std::error::Error,
) -> ConsistencyWarning {
    warn!("event={event} module=exec status=inconsistent scope={scope} names={names} error={err}");
    ConsistencyWarning {
        scope: scope.to_string(),
        names,
        message: err.to_string(),
    }
}
