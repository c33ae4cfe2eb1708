//! Canonical property naming.
//!
//! Canonical names have the shape `<DiseaseID>_<Category>_<Label>` for
//! disease-scoped properties and `<Category>_<Label>` for common ones.
//! Disease IDs may themselves contain `_` (`EFO_0000095`), so parsing looks
//! for the first `_<Category>_` delimiter instead of splitting blindly.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Delimiter between name segments.
pub const SEGMENT_DELIMITER: char = '_';

/// Registry key of the disease-independent scope.
pub const COMMON_SCOPE_KEY: &str = "common";

/// Closed set of property categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "TE")]
    TissueExpression,
    #[serde(rename = "Pathway")]
    Pathway,
    #[serde(rename = "Druggability")]
    Druggability,
    #[serde(rename = "OT_Prioritization")]
    TargetPrioritization,
    #[serde(rename = "DEG")]
    DifferentialExpression,
    #[serde(rename = "OpenTargets")]
    OpenTargets,
    #[serde(rename = "Database")]
    Database,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::TissueExpression,
        Category::Pathway,
        Category::Druggability,
        Category::TargetPrioritization,
        Category::DifferentialExpression,
        Category::OpenTargets,
        Category::Database,
    ];

    /// Label used inside canonical names.
    pub fn label(self) -> &'static str {
        match self {
            Self::TissueExpression => "TE",
            Self::Pathway => "Pathway",
            Self::Druggability => "Druggability",
            Self::TargetPrioritization => "OT_Prioritization",
            Self::DifferentialExpression => "DEG",
            Self::OpenTargets => "OpenTargets",
            Self::Database => "Database",
        }
    }

    /// Resolves a label case-insensitively.
    pub fn from_label(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(value))
    }

    /// Splits `<Label>_<rest>` into its category and non-empty remainder.
    ///
    /// Longer labels are tried first so `OT_Prioritization_x` never reads as
    /// an unknown `OT` category.
    pub fn split_prefix(text: &str) -> Option<(Self, &str)> {
        let mut candidates = Self::ALL;
        candidates.sort_by_key(|category| std::cmp::Reverse(category.label().len()));
        candidates.into_iter().find_map(|category| {
            let rest = text
                .strip_prefix(category.label())?
                .strip_prefix(SEGMENT_DELIMITER)?;
            (!rest.is_empty()).then_some((category, rest))
        })
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Registry partition: disease-independent data or one disease.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Common,
    Disease(String),
}

impl Scope {
    /// Parses a registry key; `common` (any case) is the common scope.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.eq_ignore_ascii_case(COMMON_SCOPE_KEY) {
            return Some(Self::Common);
        }
        Some(Self::Disease(value.to_string()))
    }

    pub fn disease(id: impl Into<String>) -> Self {
        Self::Disease(id.into())
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Common => COMMON_SCOPE_KEY,
            Self::Disease(id) => id,
        }
    }

    pub fn disease_id(&self) -> Option<&str> {
        match self {
            Self::Common => None,
            Self::Disease(id) => Some(id),
        }
    }

    /// Prefix every canonical name in this scope starts with.
    pub fn name_prefix(&self) -> String {
        match self {
            Self::Common => String::new(),
            Self::Disease(id) => format!("{id}{SEGMENT_DELIMITER}"),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Structured form of a canonical property name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalName {
    pub scope: Scope,
    pub category: Category,
    pub label: String,
}

impl CanonicalName {
    pub fn new(scope: Scope, category: Category, label: impl Into<String>) -> Self {
        Self {
            scope,
            category,
            label: label.into(),
        }
    }

    /// Parses a fully qualified name.
    ///
    /// Returns `None` when no category delimiter can be found.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some((category, label)) = Category::split_prefix(name) {
            return Some(Self::new(Scope::Common, category, label));
        }

        name.match_indices(SEGMENT_DELIMITER)
            .filter(|(index, _)| *index > 0)
            .find_map(|(index, _)| {
                let (category, label) = Category::split_prefix(&name[index + 1..])?;
                Some(Self::new(
                    Scope::disease(&name[..index]),
                    category,
                    label,
                ))
            })
    }

    /// Prefix shared by every name of `category` within `scope`.
    pub fn category_prefix(scope: &Scope, category: Category) -> String {
        format!(
            "{}{}{SEGMENT_DELIMITER}",
            scope.name_prefix(),
            category.label()
        )
    }
}

impl Display for CanonicalName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            Self::category_prefix(&self.scope, self.category),
            self.label
        )
    }
}
