//! Sparse disease-association rows for the columnar store.
//!
//! # Responsibility
//! - Turn disease-scoped `OpenTargets` values into table rows.
//! - Route `overall_association_score` to its own table, every other label
//!   to `datasource_association_score`.
//!
//! # Invariants
//! - Rows are emitted only after the graph mutation succeeded.
//! - `gene_name` is empty when the graph does not know the gene.

use crate::model::canonical::{CanonicalName, Category};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::PathBuf;

pub const OVERALL_TABLE: &str = "overall_association_score";
pub const DATASOURCE_TABLE: &str = "datasource_association_score";

/// Disease-scoped association value captured while planning.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAssociation {
    pub gene_id: String,
    pub disease_id: String,
    pub label: String,
    pub score: f64,
}

impl PendingAssociation {
    /// Captures `name` when it is a disease-scoped `OpenTargets` property.
    pub fn from_name(gene_id: &str, name: &CanonicalName, score: f64) -> Option<Self> {
        if name.category != Category::OpenTargets {
            return None;
        }
        Some(Self {
            gene_id: gene_id.to_string(),
            disease_id: name.scope.disease_id()?.to_string(),
            label: name.label.clone(),
            score,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssociationRow {
    Overall {
        gene_id: String,
        gene_name: String,
        disease_id: String,
        score: f64,
    },
    Datasource {
        gene_id: String,
        gene_name: String,
        datasource_id: String,
        score: f64,
        disease_id: String,
    },
}

impl AssociationRow {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Overall { .. } => OVERALL_TABLE,
            Self::Datasource { .. } => DATASOURCE_TABLE,
        }
    }
}

/// Resolves pending values into table rows using known gene names.
pub fn association_rows(
    pending: &[PendingAssociation],
    gene_names: &BTreeMap<String, String>,
) -> Vec<AssociationRow> {
    pending
        .iter()
        .map(|association| {
            let gene_name = gene_names
                .get(&association.gene_id)
                .cloned()
                .unwrap_or_default();
            if is_overall_label(&association.label) {
                AssociationRow::Overall {
                    gene_id: association.gene_id.clone(),
                    gene_name,
                    disease_id: association.disease_id.clone(),
                    score: association.score,
                }
            } else {
                AssociationRow::Datasource {
                    gene_id: association.gene_id.clone(),
                    gene_name,
                    datasource_id: association.label.clone(),
                    score: association.score,
                    disease_id: association.disease_id.clone(),
                }
            }
        })
        .collect()
}

fn is_overall_label(label: &str) -> bool {
    label.trim().replace(' ', "_").eq_ignore_ascii_case(OVERALL_TABLE)
}

/// Receiver of association rows.
pub trait ColumnarSink {
    /// Stores `rows`; returns how many were written.
    fn write_rows(&self, rows: &[AssociationRow]) -> std::io::Result<usize>;
}

/// Writes one CSV file per table into a directory, appending across calls.
pub struct CsvColumnarSink {
    dir: PathBuf,
}

impl CsvColumnarSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.csv"))
    }

    fn writer(&self, table: &str, header: &[&str]) -> std::io::Result<csv::Writer<File>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.table_path(table);
        let is_new = !path.exists();
        let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer.write_record(header)?;
        }
        Ok(writer)
    }
}

impl ColumnarSink for CsvColumnarSink {
    fn write_rows(&self, rows: &[AssociationRow]) -> std::io::Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut overall =
            self.writer(OVERALL_TABLE, &["gene_id", "gene_name", "disease_id", "score"])?;
        let mut datasource = self.writer(
            DATASOURCE_TABLE,
            &["gene_id", "gene_name", "datasource_id", "score", "disease_id"],
        )?;

        for row in rows {
            match row {
                AssociationRow::Overall {
                    gene_id,
                    gene_name,
                    disease_id,
                    score,
                } => overall.write_record([
                    gene_id.as_str(),
                    gene_name.as_str(),
                    disease_id.as_str(),
                    score.to_string().as_str(),
                ])?,
                AssociationRow::Datasource {
                    gene_id,
                    gene_name,
                    datasource_id,
                    score,
                    disease_id,
                } => datasource.write_record([
                    gene_id.as_str(),
                    gene_name.as_str(),
                    datasource_id.as_str(),
                    score.to_string().as_str(),
                    disease_id.as_str(),
                ])?,
            }
        }
        overall.flush()?;
        datasource.flush()?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        association_rows, AssociationRow, PendingAssociation, DATASOURCE_TABLE, OVERALL_TABLE,
    };
    use crate::model::canonical::CanonicalName;
    use std::collections::BTreeMap;

    #[test]
    fn only_disease_scoped_open_targets_values_are_captured() {
        let scoped = CanonicalName::parse("EFO_0000095_OpenTargets_score").unwrap();
        let common = CanonicalName::parse("OpenTargets_score").unwrap();
        let pathway = CanonicalName::parse("ALS_Pathway_kegg").unwrap();

        let pending = PendingAssociation::from_name("ENSG1", &scoped, 0.6).unwrap();
        assert_eq!(pending.disease_id, "EFO_0000095");
        assert_eq!(pending.label, "score");
        assert!(PendingAssociation::from_name("ENSG1", &common, 0.6).is_none());
        assert!(PendingAssociation::from_name("ENSG1", &pathway, 0.6).is_none());
    }

    #[test]
    fn overall_label_is_routed_case_insensitively() {
        let pending = vec![
            PendingAssociation {
                gene_id: "ENSG1".to_string(),
                disease_id: "ALS".to_string(),
                label: "Overall Association Score".to_string(),
                score: 0.9,
            },
            PendingAssociation {
                gene_id: "ENSG2".to_string(),
                disease_id: "ALS".to_string(),
                label: "europepmc".to_string(),
                score: 0.1,
            },
        ];
        let names = BTreeMap::from([("ENSG1".to_string(), "TP53".to_string())]);
        let rows = association_rows(&pending, &names);

        assert_eq!(rows[0].table(), OVERALL_TABLE);
        assert_eq!(rows[1].table(), DATASOURCE_TABLE);
        assert!(matches!(
            &rows[1],
            AssociationRow::Datasource { gene_name, datasource_id, .. }
                if gene_name.is_empty() && datasource_id == "europepmc"
        ));
    }
}
