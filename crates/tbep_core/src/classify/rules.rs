//! Data-driven header rule tables.
//!
//! # Responsibility
//! - Hold the symbol lists and the rename map injected into the classifier.
//! - Validate that every category rename lands in the closed `Category` set.
//!
//! # Invariants
//! - Entries are non-empty and unique (case-insensitive) per list.
//! - A name may not be both disease-dependent and disease-independent.

use crate::model::canonical::Category;
use crate::model::gene;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rule table validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTableError {
    EmptyEntry(&'static str),
    DuplicateEntry { table: &'static str, value: String },
    /// Name listed as both disease-dependent and disease-independent.
    ConflictingScope(String),
    UnknownCategory { raw: String, resolved: String },
    EmptyRename(String),
}

impl Display for RuleTableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyEntry(table) => write!(f, "rule table `{table}` contains an empty entry"),
            Self::DuplicateEntry { table, value } => {
                write!(f, "rule table `{table}` lists `{value}` more than once")
            }
            Self::ConflictingScope(value) => write!(
                f,
                "`{value}` is listed as both disease-dependent and disease-independent"
            ),
            Self::UnknownCategory { raw, resolved } => write!(
                f,
                "category `{raw}` resolves to `{resolved}`, which is not a known category"
            ),
            Self::EmptyRename(key) => write!(f, "rename for `{key}` is empty"),
        }
    }
}

impl Error for RuleTableError {}

/// Injected classification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    /// Identity headers matched exactly (case-insensitive).
    pub general_symbols: Vec<String>,
    /// Categories that need a disease context.
    pub disease_dependent: Vec<String>,
    /// Categories valid without a disease context.
    pub disease_independent: Vec<String>,
    /// Legacy or synonymous names mapped to current canonical names.
    pub renames: BTreeMap<String, String>,
}

impl Default for RuleTables {
    fn default() -> Self {
        let owned = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        Self {
            general_symbols: owned(&[
                "Gene name",
                gene::GENE_NAME,
                gene::DESCRIPTION,
                gene::HGNC_GENE_ID,
                "HGNC ID",
            ]),
            disease_dependent: owned(&["DEG", "OpenTargets", "GWAS"]),
            disease_independent: owned(&[
                "Pathway",
                "Druggability",
                "TE",
                "OT_Prioritization",
                "Database",
            ]),
            renames: [
                ("Gene name", gene::GENE_NAME),
                ("HGNC ID", gene::HGNC_GENE_ID),
                ("GWAS", "OpenTargets"),
            ]
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect(),
        }
    }
}

impl RuleTables {
    /// Returns the rename target for `name`, or `name` itself.
    pub fn renamed<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map_or(name, String::as_str)
    }

    /// Resolves a configured category name to its canonical category.
    pub fn resolve_category(&self, raw: &str) -> Option<Category> {
        Category::from_label(self.renamed(raw))
    }

    /// Checks declaration-level invariants.
    pub fn validate(&self) -> Result<(), RuleTableError> {
        check_entries("general_symbols", &self.general_symbols)?;
        let dependent = check_entries("disease_dependent", &self.disease_dependent)?;
        let independent = check_entries("disease_independent", &self.disease_independent)?;

        if let Some(shared) = dependent.intersection(&independent).next() {
            return Err(RuleTableError::ConflictingScope(shared.clone()));
        }

        for (key, target) in &self.renames {
            if target.trim().is_empty() {
                return Err(RuleTableError::EmptyRename(key.clone()));
            }
        }

        for raw in self.disease_dependent.iter().chain(&self.disease_independent) {
            if self.resolve_category(raw).is_none() {
                return Err(RuleTableError::UnknownCategory {
                    raw: raw.clone(),
                    resolved: self.renamed(raw).to_string(),
                });
            }
        }

        Ok(())
    }
}

fn check_entries(
    table: &'static str,
    values: &[String],
) -> Result<BTreeSet<String>, RuleTableError> {
    let mut seen = BTreeSet::new();
    for value in values {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(RuleTableError::EmptyEntry(table));
        }
        if !seen.insert(normalized.to_ascii_lowercase()) {
            return Err(RuleTableError::DuplicateEntry {
                table,
                value: normalized.to_string(),
            });
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::{RuleTableError, RuleTables};
    use crate::model::canonical::Category;

    #[test]
    fn default_tables_are_valid() {
        RuleTables::default().validate().unwrap();
    }

    #[test]
    fn renames_resolve_legacy_categories() {
        let rules = RuleTables::default();
        assert_eq!(rules.resolve_category("GWAS"), Some(Category::OpenTargets));
        assert_eq!(rules.resolve_category("Druggability_Score"), None);
        assert_eq!(rules.renamed("TE"), "TE");
    }

    #[test]
    fn validate_rejects_unknown_category() {
        let mut rules = RuleTables::default();
        rules.disease_independent.push("Expression".to_string());
        let err = rules.validate().unwrap_err();
        assert!(matches!(err, RuleTableError::UnknownCategory { raw, .. } if raw == "Expression"));
    }

    #[test]
    fn validate_rejects_duplicates_ignoring_case() {
        let mut rules = RuleTables::default();
        rules.disease_dependent.push("deg".to_string());
        assert!(matches!(
            rules.validate().unwrap_err(),
            RuleTableError::DuplicateEntry { table: "disease_dependent", .. }
        ));
    }

    #[test]
    fn validate_rejects_category_in_both_lists() {
        let mut rules = RuleTables::default();
        rules.disease_independent.push("DEG".to_string());
        assert_eq!(
            rules.validate().unwrap_err(),
            RuleTableError::ConflictingScope("deg".to_string())
        );
    }

    #[test]
    fn tables_deserialize_with_defaults_for_missing_fields() {
        let rules: RuleTables =
            serde_json::from_str(r#"{ "renames": { "GWAS": "OpenTargets" } }"#).unwrap();
        assert_eq!(rules.general_symbols, RuleTables::default().general_symbols);
        assert_eq!(rules.renames.len(), 1);
    }
}
