//! File-level header mapping.
//!
//! # Invariants
//! - Exactly one column is the identifier column and is never classified.
//! - Every canonical target maps to exactly one source column.
//! - A mapping with zero classified columns is never returned.

use crate::classify::classifier::{
    normalize_header, Classification, ClassifiedHeader, HeaderClassifier,
};
use crate::error::ValidationError;
use crate::model::canonical::Scope;
use log::warn;
use std::collections::{BTreeMap, BTreeSet};

/// One classified source column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    /// Zero-based position in the source row.
    pub index: usize,
    pub raw_header: String,
    pub header: ClassifiedHeader,
}

/// Classified header row of one dense input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMapping {
    pub identifier_index: usize,
    pub identifier_header: String,
    pub columns: Vec<MappedColumn>,
    /// Raw headers no rule matched (classification warnings).
    pub dropped: Vec<String>,
}

impl HeaderMapping {
    /// Canonical property names per scope; gene attributes are excluded.
    pub fn names_by_scope(&self) -> BTreeMap<Scope, BTreeSet<String>> {
        let mut scopes: BTreeMap<Scope, BTreeSet<String>> = BTreeMap::new();
        for column in &self.columns {
            if let Some(scope) = column.header.scope() {
                scopes
                    .entry(scope.clone())
                    .or_default()
                    .insert(column.header.canonical.clone());
            }
        }
        scopes
    }
}

impl HeaderClassifier {
    /// Classifies a full header row.
    ///
    /// The identifier column is the one named `identifier` (case-insensitive);
    /// when absent the first column is used.
    ///
    /// # Errors
    /// - `TooFewColumns` for fewer than two headers.
    /// - `AmbiguousTarget` when two headers produce one canonical name.
    /// - `NoClassifiedHeaders` when nothing but the identifier remains.
    pub fn map_headers(
        &self,
        headers: &[String],
        identifier: &str,
        disease: Option<&str>,
    ) -> Result<HeaderMapping, ValidationError> {
        if headers.len() < 2 {
            return Err(ValidationError::TooFewColumns {
                found: headers.len(),
            });
        }

        let identifier_index = headers
            .iter()
            .position(|header| {
                normalize_header(header).eq_ignore_ascii_case(identifier.trim())
            })
            .unwrap_or_else(|| {
                warn!(
                    "event=identifier_column module=classify status=fallback requested={} used={}",
                    identifier, headers[0]
                );
                0
            });

        let mut columns = Vec::new();
        let mut dropped = Vec::new();
        let mut claimed: BTreeMap<String, String> = BTreeMap::new();

        for (index, raw) in headers.iter().enumerate() {
            if index == identifier_index {
                continue;
            }
            match self.classify(raw, disease) {
                Classification::Mapped(header) => {
                    if let Some(first) = claimed.insert(header.canonical.clone(), raw.clone()) {
                        return Err(ValidationError::AmbiguousTarget {
                            canonical: header.canonical,
                            first,
                            second: raw.clone(),
                        });
                    }
                    columns.push(MappedColumn {
                        index,
                        raw_header: raw.clone(),
                        header,
                    });
                }
                Classification::Dropped { header } => {
                    warn!(
                        "event=header_dropped module=classify status=skipped header={header}"
                    );
                    dropped.push(raw.clone());
                }
            }
        }

        if columns.is_empty() {
            return Err(ValidationError::NoClassifiedHeaders {
                dropped: dropped.len(),
            });
        }

        Ok(HeaderMapping {
            identifier_index,
            identifier_header: headers[identifier_index].clone(),
            columns,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::classify::classifier::HeaderClassifier;
    use crate::classify::rules::RuleTables;
    use crate::error::ValidationError;
    use crate::model::canonical::Scope;

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn classifier() -> HeaderClassifier {
        HeaderClassifier::new(&RuleTables::default()).unwrap()
    }

    #[test]
    fn maps_columns_and_reports_dropped_headers() {
        let mapping = classifier()
            .map_headers(
                &headers(&["symbol", "gene_id", "DEG_logFC", "mystery", "TE_liver"]),
                "gene_id",
                Some("ALS"),
            )
            .unwrap();

        assert_eq!(mapping.identifier_index, 1);
        assert_eq!(mapping.dropped, vec!["symbol".to_string(), "mystery".to_string()]);
        let names: Vec<_> = mapping
            .columns
            .iter()
            .map(|column| (column.index, column.header.canonical.as_str()))
            .collect();
        assert_eq!(names, vec![(2, "ALS_DEG_logFC"), (4, "TE_liver")]);

        let scopes = mapping.names_by_scope();
        assert!(scopes[&Scope::disease("ALS")].contains("ALS_DEG_logFC"));
        assert!(scopes[&Scope::Common].contains("TE_liver"));
    }

    #[test]
    fn score_suffixed_druggability_is_a_distinct_label() {
        let mapping = classifier()
            .map_headers(
                &headers(&["gene_id", "Druggability_Score_x", "Druggability_x"]),
                "gene_id",
                None,
            )
            .unwrap();

        let names: Vec<_> = mapping
            .columns
            .iter()
            .map(|column| column.header.canonical.as_str())
            .collect();
        assert_eq!(names, vec!["Druggability_Score_x", "Druggability_x"]);
    }

    #[test]
    fn falls_back_to_first_column_for_identifier() {
        let mapping = classifier()
            .map_headers(&headers(&["ensembl", "Pathway_WNT"]), "gene_id", None)
            .unwrap();
        assert_eq!(mapping.identifier_index, 0);
        assert_eq!(mapping.identifier_header, "ensembl");
    }

    #[test]
    fn duplicate_canonical_target_is_rejected() {
        let err = classifier()
            .map_headers(
                &headers(&["gene_id", "GWAS_score", "OpenTargets_score"]),
                "gene_id",
                Some("ALS"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmbiguousTarget {
                canonical: "ALS_OpenTargets_score".to_string(),
                first: "GWAS_score".to_string(),
                second: "OpenTargets_score".to_string(),
            }
        );
    }

    #[test]
    fn zero_classified_headers_is_fatal() {
        let err = classifier()
            .map_headers(&headers(&["gene_id", "foo", "bar"]), "gene_id", None)
            .unwrap_err();
        assert_eq!(err, ValidationError::NoClassifiedHeaders { dropped: 2 });
    }

    #[test]
    fn single_column_is_rejected() {
        let err = classifier()
            .map_headers(&headers(&["gene_id"]), "gene_id", None)
            .unwrap_err();
        assert_eq!(err, ValidationError::TooFewColumns { found: 1 });
    }
}
