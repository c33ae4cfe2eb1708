//! Header classification.
//!
//! # Responsibility
//! - Map one raw column header (plus optional disease context) to a
//!   canonical name, or report it as dropped.
//!
//! # Invariants
//! - Classification is a pure function of header, context and rule tables.
//! - Rules are evaluated once per header in a fixed order: general symbols,
//!   disease-dependent categories (with context), disease-independent
//!   categories, then embedded-disease categories (without context).
//! - Within one rule group longer names win.
//! - Everything after the matched category prefix is the label, so
//!   `Druggability_Score_x` keeps label `Score_x`.

use crate::classify::rules::{RuleTableError, RuleTables};
use crate::model::canonical::{CanonicalName, Category, Scope, SEGMENT_DELIMITER};
use std::cmp::Reverse;

/// Where a classified column is written on the gene node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderTarget {
    /// Fixed identity attribute such as `Gene_name`.
    GeneAttribute,
    /// Scoped canonical property tracked by the registry.
    Property(CanonicalName),
}

/// Successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedHeader {
    pub canonical: String,
    pub target: HeaderTarget,
}

impl ClassifiedHeader {
    fn property(name: CanonicalName) -> Self {
        Self {
            canonical: name.to_string(),
            target: HeaderTarget::Property(name),
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        match &self.target {
            HeaderTarget::GeneAttribute => None,
            HeaderTarget::Property(name) => Some(&name.scope),
        }
    }
}

/// Outcome of classifying one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Mapped(ClassifiedHeader),
    /// No rule matched; the caller reports a classification warning.
    Dropped { header: String },
}

#[derive(Debug, Clone)]
enum Rule {
    General {
        symbol: String,
        canonical: String,
    },
    DiseaseDependent {
        raw: String,
        category: Category,
    },
    DiseaseIndependent {
        raw: String,
        category: Category,
    },
    EmbeddedDisease {
        delimiter: String,
        category: Category,
    },
}

impl Rule {
    fn apply(&self, header: &str, disease: Option<&str>) -> Option<ClassifiedHeader> {
        match self {
            Self::General { symbol, canonical } => {
                header
                    .eq_ignore_ascii_case(symbol)
                    .then(|| ClassifiedHeader {
                        canonical: canonical.clone(),
                        target: HeaderTarget::GeneAttribute,
                    })
            }
            Self::DiseaseDependent { raw, category } => {
                let disease = disease?;
                let unprefixed = strip_segment_ignore_case(header, disease).unwrap_or(header);
                let label = strip_segment_ignore_case(unprefixed, raw)?;
                Some(ClassifiedHeader::property(CanonicalName::new(
                    Scope::disease(disease),
                    *category,
                    label,
                )))
            }
            Self::DiseaseIndependent { raw, category } => {
                let label = strip_segment_ignore_case(header, raw)?;
                Some(ClassifiedHeader::property(CanonicalName::new(
                    Scope::Common,
                    *category,
                    label,
                )))
            }
            Self::EmbeddedDisease {
                delimiter,
                category,
            } => {
                if disease.is_some() {
                    return None;
                }
                let at = header.to_ascii_lowercase().find(delimiter.as_str())?;
                let label = &header[at + delimiter.len()..];
                if at == 0 || label.is_empty() {
                    return None;
                }
                Some(ClassifiedHeader::property(CanonicalName::new(
                    Scope::disease(&header[..at]),
                    *category,
                    label,
                )))
            }
        }
    }
}

/// Header classifier compiled from validated rule tables.
#[derive(Debug, Clone)]
pub struct HeaderClassifier {
    rules: Vec<Rule>,
}

impl HeaderClassifier {
    /// Validates `tables` and compiles them into the ordered rule list.
    pub fn new(tables: &RuleTables) -> Result<Self, RuleTableError> {
        tables.validate()?;

        let mut rules: Vec<Rule> = tables
            .general_symbols
            .iter()
            .map(|symbol| Rule::General {
                symbol: symbol.trim().to_string(),
                canonical: tables.renamed(symbol.trim()).to_string(),
            })
            .collect();

        let dependent = category_rules(tables, &tables.disease_dependent);
        let independent = category_rules(tables, &tables.disease_independent);

        rules.extend(
            dependent
                .iter()
                .map(|(raw, category)| Rule::DiseaseDependent {
                    raw: raw.clone(),
                    category: *category,
                }),
        );
        rules.extend(
            independent
                .into_iter()
                .map(|(raw, category)| Rule::DiseaseIndependent { raw, category }),
        );
        rules.extend(
            dependent
                .into_iter()
                .map(|(raw, category)| Rule::EmbeddedDisease {
                    delimiter: format!(
                        "{SEGMENT_DELIMITER}{}{SEGMENT_DELIMITER}",
                        raw.to_ascii_lowercase()
                    ),
                    category,
                }),
        );

        Ok(Self { rules })
    }

    /// Classifies one raw header.
    pub fn classify(&self, raw_header: &str, disease: Option<&str>) -> Classification {
        let header = normalize_header(raw_header);
        let disease = disease.map(str::trim).filter(|value| !value.is_empty());

        if !header.is_empty() {
            if let Some(classified) = self
                .rules
                .iter()
                .find_map(|rule| rule.apply(header, disease))
            {
                return Classification::Mapped(classified);
            }
        }

        Classification::Dropped {
            header: header.to_string(),
        }
    }
}

fn category_rules(tables: &RuleTables, names: &[String]) -> Vec<(String, Category)> {
    let mut rules: Vec<(String, Category)> = names
        .iter()
        .filter_map(|raw| {
            let raw = raw.trim();
            tables
                .resolve_category(raw)
                .map(|category| (raw.to_string(), category))
        })
        .collect();
    rules.sort_by_key(|(raw, _)| Reverse(raw.len()));
    rules
}

/// Trims whitespace and surrounding quote characters.
pub fn normalize_header(raw: &str) -> &str {
    raw.trim().trim_matches(['"', '\'']).trim()
}

/// Strips `<segment>_` from the start of `text`, ignoring ASCII case.
fn strip_segment_ignore_case<'a>(text: &'a str, segment: &str) -> Option<&'a str> {
    let head = text.get(..segment.len())?;
    if !head.eq_ignore_ascii_case(segment) {
        return None;
    }
    let rest = text[segment.len()..].strip_prefix(SEGMENT_DELIMITER)?;
    (!rest.is_empty()).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::{normalize_header, Classification, HeaderClassifier, HeaderTarget};
    use crate::classify::rules::RuleTables;
    use crate::model::canonical::{Category, Scope};

    fn classifier() -> HeaderClassifier {
        HeaderClassifier::new(&RuleTables::default()).unwrap()
    }

    fn canonical(result: Classification) -> String {
        match result {
            Classification::Mapped(header) => header.canonical,
            Classification::Dropped { header } => panic!("header `{header}` was dropped"),
        }
    }

    #[test]
    fn renamed_disease_dependent_category_uses_context() {
        let result = classifier().classify("GWAS_p-value", Some("ALS"));
        assert_eq!(canonical(result), "ALS_OpenTargets_p-value");
    }

    #[test]
    fn general_symbol_ignores_disease_context() {
        let classifier = classifier();
        assert_eq!(canonical(classifier.classify("Gene name", Some("ALS"))), "Gene_name");
        assert_eq!(canonical(classifier.classify("GENE NAME", None)), "Gene_name");
        assert!(matches!(
            classifier.classify("gene name", None),
            Classification::Mapped(header) if header.target == HeaderTarget::GeneAttribute
        ));
    }

    #[test]
    fn disease_prefix_is_stripped_case_insensitively() {
        let result = classifier().classify("als_DEG_logFC", Some("ALS"));
        assert_eq!(canonical(result), "ALS_DEG_logFC");
    }

    #[test]
    fn independent_category_keeps_label_case() {
        let classifier = classifier();
        assert_eq!(canonical(classifier.classify("te_Brain Cortex", None)), "TE_Brain Cortex");
        assert_eq!(
            canonical(classifier.classify("Druggability_Score_high", None)),
            "Druggability_Score_high"
        );
        assert_eq!(
            canonical(classifier.classify("OT_Prioritization_safety", Some("ALS"))),
            "OT_Prioritization_safety"
        );
    }

    #[test]
    fn quotes_and_whitespace_are_trimmed() {
        assert_eq!(normalize_header("  \"Pathway_WNT\" "), "Pathway_WNT");
        assert_eq!(canonical(classifier().classify(" 'Pathway_WNT' ", None)), "Pathway_WNT");
    }

    #[test]
    fn disease_dependent_header_without_context_infers_embedded_disease() {
        match classifier().classify("EFO_0000095_OpenTargets_score", None) {
            Classification::Mapped(header) => {
                assert_eq!(header.canonical, "EFO_0000095_OpenTargets_score");
                assert_eq!(header.scope(), Some(&Scope::disease("EFO_0000095")));
                assert!(matches!(
                    header.target,
                    HeaderTarget::Property(name) if name.category == Category::OpenTargets
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bare_disease_dependent_header_without_context_is_dropped() {
        assert_eq!(
            classifier().classify("DEG_logFC", None),
            Classification::Dropped {
                header: "DEG_logFC".to_string()
            }
        );
    }

    #[test]
    fn unknown_and_empty_headers_are_dropped() {
        let classifier = classifier();
        assert!(matches!(
            classifier.classify("random column", Some("ALS")),
            Classification::Dropped { .. }
        ));
        assert!(matches!(classifier.classify("  ", None), Classification::Dropped { .. }));
        assert!(matches!(classifier.classify("Pathway_", None), Classification::Dropped { .. }));
    }

    #[test]
    fn classification_is_repeatable() {
        let classifier = classifier();
        for header in ["GWAS_p-value", "Gene name", "TE_liver", "nothing"] {
            assert_eq!(
                classifier.classify(header, Some("ALS")),
                classifier.classify(header, Some("ALS"))
            );
        }
    }
}
