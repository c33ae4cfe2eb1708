//! HGNC-style reference genome rows.
//!
//! Required headers: `HGNC ID`, `Approved symbol`, `Approved name`,
//! `Previous symbols`, `Alias symbols`, `Ensembl gene ID`,
//! `Ensembl ID(supplied by Ensembl)`.

use crate::error::{PipelineResult, ValidationError};
use std::collections::BTreeSet;

const HGNC_ID: &str = "HGNC ID";
const APPROVED_SYMBOL: &str = "Approved symbol";
const APPROVED_NAME: &str = "Approved name";
const PREVIOUS_SYMBOLS: &str = "Previous symbols";
const ALIAS_SYMBOLS: &str = "Alias symbols";
const ENSEMBL_GENE_ID: &str = "Ensembl gene ID";
const ENSEMBL_SUPPLIED_ID: &str = "Ensembl ID(supplied by Ensembl)";

const REQUIRED_HEADERS: [&str; 7] = [
    HGNC_ID,
    APPROVED_SYMBOL,
    APPROVED_NAME,
    PREVIOUS_SYMBOLS,
    ALIAS_SYMBOLS,
    ENSEMBL_GENE_ID,
    ENSEMBL_SUPPLIED_ID,
];

/// One gene of the reference genome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceGene {
    pub id: String,
    pub gene_name: String,
    pub description: Option<String>,
    pub hgnc_gene_id: Option<String>,
    /// Alias symbols then previous symbols, upper-cased, first occurrence kept.
    pub aliases: Vec<String>,
}

/// Parsed reference file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceGenome {
    pub genes: Vec<ReferenceGene>,
    /// Rows without any Ensembl identifier.
    pub skipped_rows: usize,
}

/// Reads reference genes from a headed reader.
pub fn read_reference_genes<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
) -> PipelineResult<ReferenceGenome> {
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|header| header.trim() == name);
    let mut columns = [0usize; 7];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_HEADERS) {
        *slot = position(name).ok_or_else(|| ValidationError::MissingColumn(name.to_string()))?;
    }
    let [hgnc, symbol, name, previous, alias, ensembl, supplied] = columns;

    let mut genome = ReferenceGenome::default();
    for record in reader.records() {
        let record = record?;
        let field = |index: usize| {
            record
                .get(index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let Some(id) = field(supplied).or_else(|| field(ensembl)) else {
            genome.skipped_rows += 1;
            continue;
        };
        let Some(gene_name) = field(symbol) else {
            genome.skipped_rows += 1;
            continue;
        };

        genome.genes.push(ReferenceGene {
            id: id.to_string(),
            gene_name: gene_name.to_ascii_uppercase(),
            description: field(name).map(str::to_string),
            hgnc_gene_id: field(hgnc).map(str::to_string),
            aliases: split_symbols(field(alias).into_iter().chain(field(previous))),
        });
    }
    Ok(genome)
}

fn split_symbols<'a>(lists: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    lists
        .flat_map(|list| list.split(','))
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty() && seen.insert(symbol.clone()))
        .collect()
}
