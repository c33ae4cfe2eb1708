//! Registry-backed property deletion.
//!
//! # Responsibility
//! - Turn a `(category, scope, explicit names)` selector into per-scope
//!   prefix filters.
//! - Strip resolved names from every gene, then bring the registry and
//!   disease metadata in line.
//!
//! # Invariants
//! - Prefix matching is anchored at the start of the name. `ALS_TE_` never
//!   matches `ALSX_TE_x` or `BALS_TE_x`.
//! - The common-scope prefix is `<Category>_`; a disease scope prefix is
//!   `<DiseaseID>_<Category>_`.
//! - Genes are stripped before any registry row is removed.

use crate::error::{PipelineResult, ValidationError};
use crate::exec::executor::{consistency_warning, elapsed_ms, ConsistencyWarning};
use crate::model::canonical::{CanonicalName, Category, Scope, COMMON_SCOPE_KEY};
use crate::repo::graph::{GraphEngine, MutationCounters};
use crate::repo::registry::{NameFilter, PropertyRegistry, RegistryResult};
use log::{error, info};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Keyword selecting every disease scope plus common.
pub const ALL_SCOPES_KEY: &str = "all";

/// Which scopes a deletion targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionScope {
    Disease(String),
    Common,
    All,
}

impl DeletionScope {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::InvalidSelector(
                "scope must be a disease id, `common` or `all`".to_string(),
            ));
        }
        if value.eq_ignore_ascii_case(ALL_SCOPES_KEY) {
            return Ok(Self::All);
        }
        if value.eq_ignore_ascii_case(COMMON_SCOPE_KEY) {
            return Ok(Self::Common);
        }
        Ok(Self::Disease(value.to_string()))
    }
}

/// What to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSelector {
    pub category: Category,
    pub scope: DeletionScope,
    /// Extra names removed regardless of the prefix filter.
    pub explicit_names: BTreeSet<String>,
}

impl DeletionSelector {
    pub fn parse<I>(category: &str, scope: &str, explicit_names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let category = Category::from_label(category).ok_or_else(|| {
            ValidationError::InvalidSelector(format!("unknown category `{}`", category.trim()))
        })?;
        Ok(Self {
            category,
            scope: DeletionScope::parse(scope)?,
            explicit_names: explicit_names
                .into_iter()
                .map(|name| name.as_ref().trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        })
    }
}

/// Anchored prefix filter for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    pub scope: Scope,
    pub prefix: String,
}

/// Resolved deletion plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    pub filters: Vec<ScopeFilter>,
    pub explicit_names: BTreeSet<String>,
}

impl DeletionPlan {
    /// Registry filter per scope, including scopes only named by explicit
    /// names.
    fn registry_filters(&self) -> BTreeMap<Scope, NameFilter> {
        let explicit = NameFilter::Exact(self.explicit_names.clone());
        let mut filters: BTreeMap<Scope, NameFilter> = self
            .filters
            .iter()
            .map(|filter| {
                (
                    filter.scope.clone(),
                    NameFilter::AnyOf(vec![
                        NameFilter::Prefix(filter.prefix.clone()),
                        explicit.clone(),
                    ]),
                )
            })
            .collect();
        for name in &self.explicit_names {
            if let Some(parsed) = CanonicalName::parse(name) {
                filters.entry(parsed.scope).or_insert_with(|| explicit.clone());
            }
        }
        filters
    }
}

/// Builds deletion plans from selectors.
pub struct DeletionPlanner;

impl DeletionPlanner {
    /// `all` expands to every scope the registry knows plus common.
    pub fn plan<R>(selector: &DeletionSelector, registry: &R) -> RegistryResult<DeletionPlan>
    where
        R: PropertyRegistry + ?Sized,
    {
        let scopes = match &selector.scope {
            DeletionScope::Common => vec![Scope::Common],
            DeletionScope::Disease(id) => vec![Scope::disease(id.clone())],
            DeletionScope::All => {
                let mut scopes: BTreeSet<Scope> = registry.scopes()?.into_iter().collect();
                scopes.insert(Scope::Common);
                scopes.into_iter().collect()
            }
        };

        Ok(DeletionPlan {
            filters: scopes
                .into_iter()
                .map(|scope| ScopeFilter {
                    prefix: CanonicalName::category_prefix(&scope, selector.category),
                    scope,
                })
                .collect(),
            explicit_names: selector.explicit_names.clone(),
        })
    }
}

/// Outcome of an executed deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub removed_names: BTreeSet<String>,
    pub affected_genes: usize,
    pub properties_removed: usize,
    pub pruned_diseases: Vec<String>,
    pub elapsed_ms: u64,
    pub consistency_warnings: Vec<ConsistencyWarning>,
}

/// Applies deletion plans.
pub struct DeletionExecutor;

impl DeletionExecutor {
    /// Resolves names, strips genes, updates the registry, prunes diseases.
    ///
    /// Fails only when name resolution or the graph mutation fails; later
    /// registry failures become consistency warnings.
    pub fn execute<E, R>(plan: &DeletionPlan, engine: &E, registry: &R) -> PipelineResult<DeletionReport>
    where
        E: GraphEngine + ?Sized,
        R: PropertyRegistry + ?Sized,
    {
        let started_at = Instant::now();
        let names = Self::resolve(plan, registry)?;
        info!(
            "event=delete_properties module=exec status=start scopes={} names={}",
            plan.filters.len(),
            names.len()
        );

        let counters = if names.is_empty() {
            MutationCounters::default()
        } else {
            engine.remove_properties(&names).map_err(|err| {
                error!(
                    "event=delete_properties module=exec status=error names={} error={err}",
                    names.len()
                );
                err
            })?
        };

        let mut warnings = Vec::new();
        let mut touched_disease = false;
        let mut pruned = BTreeSet::new();
        for (scope, filter) in plan.registry_filters() {
            touched_disease |= scope.disease_id().is_some();
            match registry.remove(&scope, &filter) {
                Ok(removal) => pruned.extend(removal.dropped_disease),
                Err(err) => warnings.push(consistency_warning(
                    "registry_remove",
                    scope.key(),
                    names.len(),
                    &err,
                )),
            }
        }

        // Catches diseases emptied earlier whose prune never completed.
        if touched_disease {
            match registry.prune_empty_diseases() {
                Ok(orphans) => pruned.extend(orphans),
                Err(err) => {
                    warnings.push(consistency_warning("prune_diseases", "diseases", 0, &err))
                }
            }
        }
        let pruned_diseases: Vec<String> = pruned.into_iter().collect();

        let report = DeletionReport {
            removed_names: names,
            affected_genes: counters.genes_affected,
            properties_removed: counters.properties_removed,
            pruned_diseases,
            elapsed_ms: elapsed_ms(started_at),
            consistency_warnings: warnings,
        };
        info!(
            "event=delete_properties module=exec status=ok names={} genes_affected={} properties_removed={} diseases_pruned={} duration_ms={}",
            report.removed_names.len(),
            report.affected_genes,
            report.properties_removed,
            report.pruned_diseases.len(),
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Registered names matching each scope's prefix, plus explicit names.
    pub fn resolve<R>(plan: &DeletionPlan, registry: &R) -> RegistryResult<BTreeSet<String>>
    where
        R: PropertyRegistry + ?Sized,
    {
        let mut names = plan.explicit_names.clone();
        for filter in &plan.filters {
            names.extend(
                registry
                    .list(&filter.scope)?
                    .into_iter()
                    .filter(|name| name.starts_with(filter.prefix.as_str())),
            );
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::{DeletionScope, DeletionSelector};
    use crate::error::ValidationError;
    use crate::model::canonical::Category;

    #[test]
    fn selector_parses_keywords_case_insensitively() {
        let selector = DeletionSelector::parse("te", "ALL", ["  ", "ALS_TE_x"]).unwrap();
        assert_eq!(selector.category, Category::TissueExpression);
        assert_eq!(selector.scope, DeletionScope::All);
        assert_eq!(selector.explicit_names.len(), 1);

        assert_eq!(
            DeletionScope::parse("Common").unwrap(),
            DeletionScope::Common
        );
        assert_eq!(
            DeletionScope::parse("MONDO_0004976").unwrap(),
            DeletionScope::Disease("MONDO_0004976".to_string())
        );
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = DeletionSelector::parse("Expression", "common", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSelector(_)));
    }
}
