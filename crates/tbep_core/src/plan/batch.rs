//! Batch shapes handed to the graph engine.

use crate::model::gene::PropertyValue;
use serde::{Deserialize, Serialize};

/// How a row key is matched against gene nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierMatchMode {
    /// Key is the stable gene `ID`; missing genes are created.
    #[default]
    Exact,
    /// Key is a symbol; upper-cased and matched against `Gene_name` or
    /// `Aliases`. Unmatched rows are skipped.
    AliasCaseNormalized,
}

/// One gene's worth of property assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRow {
    pub key: String,
    pub values: Vec<(String, PropertyValue)>,
}

/// Rows committed together as one engine transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertBatch {
    pub match_mode: IdentifierMatchMode,
    pub rows: Vec<UpsertRow>,
}

impl UpsertBatch {
    pub fn value_count(&self) -> usize {
        self.rows.iter().map(|row| row.values.len()).sum()
    }
}

/// Splits `rows` into batches of at most `batch_size` rows.
pub(crate) fn chunk_rows(
    rows: Vec<UpsertRow>,
    batch_size: usize,
    match_mode: IdentifierMatchMode,
) -> Vec<UpsertBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(rows.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size.min(rows.len()));
    for row in rows {
        current.push(row);
        if current.len() == batch_size {
            batches.push(UpsertBatch {
                match_mode,
                rows: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        batches.push(UpsertBatch {
            match_mode,
            rows: current,
        });
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::{chunk_rows, IdentifierMatchMode, UpsertRow};

    fn rows(count: usize) -> Vec<UpsertRow> {
        (0..count)
            .map(|index| UpsertRow {
                key: format!("ENSG{index:011}"),
                values: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn batches_are_capped_and_keep_order() {
        let batches = chunk_rows(rows(5), 2, IdentifierMatchMode::Exact);
        let sizes: Vec<_> = batches.iter().map(|batch| batch.rows.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(batches[2].rows[0].key, "ENSG00000000004");
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        assert_eq!(chunk_rows(rows(3), 0, IdentifierMatchMode::Exact).len(), 3);
    }

    #[test]
    fn match_mode_uses_screaming_case_on_the_wire() {
        let json = serde_json::to_string(&IdentifierMatchMode::AliasCaseNormalized).unwrap();
        assert_eq!(json, "\"ALIAS_CASE_NORMALIZED\"");
    }
}
