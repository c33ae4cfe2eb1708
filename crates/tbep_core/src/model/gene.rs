//! Gene node record.

use serde::Serialize;
use std::collections::BTreeMap;

/// Gene attribute holding the upper-cased approved symbol.
pub const GENE_NAME: &str = "Gene_name";
/// Gene attribute holding the approved long name.
pub const DESCRIPTION: &str = "Description";
/// Gene attribute holding the HGNC identifier.
pub const HGNC_GENE_ID: &str = "hgnc_gene_id";
/// Gene attribute holding previous/alias symbols.
pub const ALIASES: &str = "Aliases";

/// Value stored under a canonical property key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

/// Gene node as materialized in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gene {
    /// Stable external identifier (Ensembl gene ID).
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Gene_name")]
    pub gene_name: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    pub hgnc_gene_id: Option<String>,
    /// Ordered as imported; upper-cased.
    #[serde(rename = "Aliases")]
    pub aliases: Vec<String>,
    /// Canonical property bag.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Gene {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gene_name: None,
            description: None,
            hgnc_gene_id: None,
            aliases: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Returns whether `name` addresses a fixed gene attribute rather than the
/// property bag.
pub fn is_gene_attribute(name: &str) -> bool {
    matches!(name, GENE_NAME | DESCRIPTION | HGNC_GENE_ID | ALIASES)
}
