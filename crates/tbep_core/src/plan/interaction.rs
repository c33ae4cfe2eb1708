//! Gene-gene interaction planning.
//!
//! Input rows are headerless `gene1, gene2, score` triples. The relationship
//! type is supplied by the caller and applies to the whole load.

use crate::error::ValidationError;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt::{Display, Formatter};

static ENSEMBL_GENE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ENSG\d+(\.\d+)?$").expect("valid ensembl id regex"));

/// Relationship type of an interaction load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum InteractionKind {
    #[serde(rename = "PPI")]
    Ppi,
    #[serde(rename = "FUN_PPI")]
    FunPpi,
    #[serde(rename = "BIO_GRID")]
    BioGrid,
    #[serde(rename = "INT_ACT")]
    IntAct,
}

impl InteractionKind {
    /// Parses a label; upper-cases, maps spaces to `_`, and folds `STRING`
    /// into `PPI`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let normalized = value.trim().to_ascii_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "PPI" | "STRING" => Ok(Self::Ppi),
            "FUN_PPI" => Ok(Self::FunPpi),
            "BIO_GRID" => Ok(Self::BioGrid),
            "INT_ACT" => Ok(Self::IntAct),
            _ => Err(ValidationError::UnknownInteractionType(value.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ppi => "PPI",
            Self::FunPpi => "FUN_PPI",
            Self::BioGrid => "BIO_GRID",
            Self::IntAct => "INT_ACT",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        Self::parse(value).ok()
    }
}

impl Display for InteractionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which gene field interaction endpoints refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    EnsemblId,
    HgncSymbol,
}

impl IdType {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_uppercase().replace(' ', "-").as_str() {
            "ENSEMBL-ID" => Ok(Self::EnsemblId),
            "HGNC-SYMBOL" => Ok(Self::HgncSymbol),
            _ => Err(ValidationError::UnknownIdType(value.to_string())),
        }
    }

    /// Guesses from a sample endpoint: Ensembl IDs look like `ENSG…`.
    pub fn infer(sample: &str) -> Self {
        if ENSEMBL_GENE_ID_RE.is_match(sample.trim()) {
            Self::EnsemblId
        } else {
            Self::HgncSymbol
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEdge {
    pub source: String,
    pub target: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionBatch {
    pub kind: InteractionKind,
    pub id_type: IdType,
    pub edges: Vec<InteractionEdge>,
}

/// Batched interaction load.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionPlan {
    pub kind: InteractionKind,
    pub id_type: IdType,
    pub batches: Vec<InteractionBatch>,
    /// Rows with missing endpoints or a non-numeric score.
    pub skipped_rows: usize,
}

impl InteractionPlan {
    pub fn edge_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.edges.len()).sum()
    }
}

/// Builds an interaction plan from headerless records.
///
/// `id_type` is inferred from the first record when not given.
pub fn plan_interactions<I>(
    records: I,
    kind: InteractionKind,
    id_type: Option<IdType>,
    batch_size: usize,
) -> Result<InteractionPlan, csv::Error>
where
    I: IntoIterator<Item = Result<csv::StringRecord, csv::Error>>,
{
    let batch_size = batch_size.max(1);
    let mut id_type = id_type;
    let mut batches = Vec::new();
    let mut edges = Vec::new();
    let mut skipped_rows = 0;

    for record in records {
        let record = record?;
        let source = record.get(0).map(str::trim).unwrap_or_default();
        let target = record.get(1).map(str::trim).unwrap_or_default();
        let score = record.get(2).and_then(|value| value.trim().parse::<f64>().ok());

        let resolved_type = *id_type.get_or_insert_with(|| IdType::infer(source));
        match score {
            Some(score) if !source.is_empty() && !target.is_empty() && score.is_finite() => {
                edges.push(InteractionEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                    score,
                });
            }
            _ => {
                skipped_rows += 1;
                continue;
            }
        }

        if edges.len() == batch_size {
            batches.push(InteractionBatch {
                kind,
                id_type: resolved_type,
                edges: std::mem::take(&mut edges),
            });
        }
    }

    let id_type = id_type.unwrap_or(IdType::EnsemblId);
    if !edges.is_empty() {
        batches.push(InteractionBatch {
            kind,
            id_type,
            edges,
        });
    }
    if skipped_rows > 0 {
        warn!(
            "event=interaction_plan module=plan status=skipped kind={kind} skipped_rows={skipped_rows}"
        );
    }

    Ok(InteractionPlan {
        kind,
        id_type,
        batches,
        skipped_rows,
    })
}
