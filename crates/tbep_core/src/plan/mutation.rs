//! Mutation planning for dense and sparse property files.
//!
//! # Responsibility
//! - Turn classified columns plus streamed rows into capped upsert batches.
//! - Collect the canonical names touched per scope for registry bookkeeping.
//!
//! # Invariants
//! - Planning never touches the graph or the registry.
//! - A canonical name is recorded for its scope only if at least one value
//!   for it was planned.
//! - Each gene key appears in at most one row of a sparse plan.

use crate::classify::classifier::HeaderTarget;
use crate::classify::mapping::HeaderMapping;
use crate::columnar::PendingAssociation;
use crate::model::canonical::{CanonicalName, Scope};
use crate::model::gene::PropertyValue;
use crate::plan::batch::{chunk_rows, IdentifierMatchMode, UpsertBatch, UpsertRow};
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Batched upserts plus the bookkeeping the executor needs afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationPlan {
    pub match_mode: IdentifierMatchMode,
    pub batches: Vec<UpsertBatch>,
    /// Names actually planned, by scope.
    pub names_by_scope: BTreeMap<Scope, BTreeSet<String>>,
    /// Non-numeric or empty property cells.
    pub skipped_cells: usize,
    /// Rows without an identifier, without any value, or with an unparsable
    /// property name.
    pub skipped_rows: usize,
    /// Sparse property names that are not canonical.
    pub unparsed_names: BTreeSet<String>,
    /// Disease-scoped association values for the columnar store.
    pub associations: Vec<PendingAssociation>,
}

impl MutationPlan {
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.rows.len()).sum()
    }

    pub fn value_count(&self) -> usize {
        self.batches.iter().map(UpsertBatch::value_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Plans upserts with a fixed batch size and match mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPlanner {
    batch_size: usize,
    match_mode: IdentifierMatchMode,
}

impl Default for MutationPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, IdentifierMatchMode::Exact)
    }
}

impl MutationPlanner {
    /// `batch_size` below one is treated as one.
    pub fn new(batch_size: usize, match_mode: IdentifierMatchMode) -> Self {
        Self {
            batch_size: batch_size.max(1),
            match_mode,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Plans a dense file: one row per record, one value per mapped column.
    ///
    /// Property cells must parse as finite floats; gene attribute cells are
    /// kept as text. Disease-scoped `OpenTargets` values are also captured
    /// for the columnar store.
    pub fn plan_dense<I>(&self, mapping: &HeaderMapping, records: I) -> Result<MutationPlan, csv::Error>
    where
        I: IntoIterator<Item = Result<csv::StringRecord, csv::Error>>,
    {
        let mut plan = self.empty_plan();
        let mut rows = Vec::new();

        for record in records {
            let record = record?;
            let key = cell(&record, mapping.identifier_index);
            if key.is_empty() {
                plan.skipped_rows += 1;
                continue;
            }

            let mut values = Vec::with_capacity(mapping.columns.len());
            for column in &mapping.columns {
                let raw = cell(&record, column.index);
                match &column.header.target {
                    HeaderTarget::GeneAttribute => {
                        if !raw.is_empty() {
                            values.push((
                                column.header.canonical.clone(),
                                PropertyValue::Text(raw.to_string()),
                            ));
                        }
                    }
                    HeaderTarget::Property(name) => match parse_number(raw) {
                        Some(number) => {
                            plan.names_by_scope
                                .entry(name.scope.clone())
                                .or_default()
                                .insert(column.header.canonical.clone());
                            if let Some(association) =
                                PendingAssociation::from_name(key, name, number)
                            {
                                plan.associations.push(association);
                            }
                            values.push((
                                column.header.canonical.clone(),
                                PropertyValue::Number(number),
                            ));
                        }
                        None => plan.skipped_cells += 1,
                    },
                }
            }

            if values.is_empty() {
                plan.skipped_rows += 1;
                continue;
            }
            rows.push(UpsertRow {
                key: key.to_string(),
                values,
            });
        }

        plan.batches = chunk_rows(rows, self.batch_size, self.match_mode);
        self.log_skips("dense", &plan);
        Ok(plan)
    }

    /// Plans headerless `(gene, canonical_property_name, value)` triples.
    ///
    /// Values for the same gene are grouped into one row; the scope of each
    /// property is derived from its name.
    pub fn plan_sparse<I>(&self, records: I) -> Result<MutationPlan, csv::Error>
    where
        I: IntoIterator<Item = Result<csv::StringRecord, csv::Error>>,
    {
        let mut plan = self.empty_plan();
        let mut rows: Vec<UpsertRow> = Vec::new();
        let mut row_index: HashMap<String, usize> = HashMap::new();
        let mut parsed: HashMap<String, Option<CanonicalName>> = HashMap::new();

        for record in records {
            let record = record?;
            let key = cell(&record, 0);
            let property = cell(&record, 1);
            if key.is_empty() || property.is_empty() {
                plan.skipped_rows += 1;
                continue;
            }

            let name = parsed
                .entry(property.to_string())
                .or_insert_with(|| CanonicalName::parse(property));
            let Some(name) = name else {
                plan.unparsed_names.insert(property.to_string());
                plan.skipped_rows += 1;
                continue;
            };
            let Some(number) = parse_number(cell(&record, 2)) else {
                plan.skipped_cells += 1;
                continue;
            };

            plan.names_by_scope
                .entry(name.scope.clone())
                .or_default()
                .insert(property.to_string());
            if let Some(association) = PendingAssociation::from_name(key, name, number) {
                plan.associations.push(association);
            }

            let index = *row_index.entry(key.to_string()).or_insert_with(|| {
                rows.push(UpsertRow {
                    key: key.to_string(),
                    values: Vec::new(),
                });
                rows.len() - 1
            });
            rows[index]
                .values
                .push((property.to_string(), PropertyValue::Number(number)));
        }

        if !plan.unparsed_names.is_empty() {
            warn!(
                "event=sparse_names module=plan status=skipped unparsed_names={}",
                plan.unparsed_names.len()
            );
        }
        plan.batches = chunk_rows(rows, self.batch_size, self.match_mode);
        self.log_skips("sparse", &plan);
        Ok(plan)
    }

    fn empty_plan(&self) -> MutationPlan {
        MutationPlan {
            match_mode: self.match_mode,
            ..MutationPlan::default()
        }
    }

    fn log_skips(&self, format: &str, plan: &MutationPlan) {
        if plan.skipped_cells > 0 || plan.skipped_rows > 0 {
            warn!(
                "event=mutation_plan module=plan status=skipped format={format} skipped_cells={} skipped_rows={}",
                plan.skipped_cells, plan.skipped_rows
            );
        }
    }
}

fn cell(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).map(str::trim).unwrap_or_default()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::MutationPlanner;
    use crate::classify::classifier::HeaderClassifier;
    use crate::classify::rules::RuleTables;
    use crate::model::canonical::Scope;
    use crate::model::gene::PropertyValue;
    use crate::plan::batch::IdentifierMatchMode;

    fn records(rows: &[&[&str]]) -> Vec<Result<csv::StringRecord, csv::Error>> {
        rows.iter()
            .map(|row| Ok(csv::StringRecord::from(row.to_vec())))
            .collect()
    }

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn dense_plan_skips_non_numeric_cells() {
        let classifier = HeaderClassifier::new(&RuleTables::default()).unwrap();
        let mapping = classifier
            .map_headers(
                &headers(&["gene_id", "Gene name", "DEG_logFC", "TE_liver"]),
                "gene_id",
                Some("ALS"),
            )
            .unwrap();
        let planner = MutationPlanner::new(1, IdentifierMatchMode::Exact);
        let plan = planner
            .plan_dense(
                &mapping,
                records(&[
                    &["ENSG1", "tp53", "1.5", "n/a"],
                    &["ENSG2", "", "", ""],
                    &["", "BRCA1", "0.1", "0.2"],
                ]),
            )
            .unwrap();

        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.skipped_cells, 3);
        assert_eq!(plan.skipped_rows, 2);
        let row = &plan.batches[0].rows[0];
        assert_eq!(row.values[0], ("Gene_name".to_string(), PropertyValue::Text("tp53".to_string())));
        assert_eq!(row.values[1].0, "ALS_DEG_logFC");
        assert_eq!(
            plan.names_by_scope.get(&Scope::disease("ALS")).map(|names| names.len()),
            Some(1)
        );
        assert!(!plan.names_by_scope.contains_key(&Scope::Common));
    }

    #[test]
    fn dense_open_targets_columns_become_associations() {
        let classifier = HeaderClassifier::new(&RuleTables::default()).unwrap();
        let mapping = classifier
            .map_headers(
                &headers(&[
                    "gene_id",
                    "OpenTargets_overall_association_score",
                    "OpenTargets_chembl",
                    "DEG_logFC",
                ]),
                "gene_id",
                Some("EFO_0000095"),
            )
            .unwrap();
        let plan = MutationPlanner::default()
            .plan_dense(
                &mapping,
                records(&[&["ENSG1", "0.9", "", "1.2"], &["ENSG2", "0.4", "0.7", "0.1"]]),
            )
            .unwrap();

        let captured: Vec<_> = plan
            .associations
            .iter()
            .map(|association| {
                (
                    association.gene_id.as_str(),
                    association.disease_id.as_str(),
                    association.label.as_str(),
                    association.score,
                )
            })
            .collect();
        assert_eq!(
            captured,
            vec![
                ("ENSG1", "EFO_0000095", "overall_association_score", 0.9),
                ("ENSG2", "EFO_0000095", "overall_association_score", 0.4),
                ("ENSG2", "EFO_0000095", "chembl", 0.7),
            ]
        );
    }

    #[test]
    fn sparse_rows_group_by_gene_and_scope_by_prefix() {
        let planner = MutationPlanner::default();
        let plan = planner
            .plan_sparse(records(&[
                &["ENSG000001", "EFO_0000095_OpenTargets_score", "0.6"],
                &["ENSG000001", "Pathway_kegg", "1"],
                &["ENSG000002", "mystery", "1"],
                &["ENSG000002", "TE_liver", "high"],
            ]))
            .unwrap();

        assert_eq!(plan.row_count(), 1);
        assert_eq!(plan.value_count(), 2);
        assert_eq!(plan.skipped_rows, 1);
        assert_eq!(plan.skipped_cells, 1);
        assert!(plan.unparsed_names.contains("mystery"));
        assert!(plan
            .names_by_scope
            .get(&Scope::disease("EFO_0000095"))
            .is_some_and(|names| names.contains("EFO_0000095_OpenTargets_score")));
        assert_eq!(plan.associations.len(), 1);
        assert_eq!(plan.associations[0].score, 0.6);
    }
}
