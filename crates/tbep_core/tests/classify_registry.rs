use rusqlite::Connection;
use std::collections::BTreeSet;
use std::fs;
use tbep_core::classify::classifier::HeaderTarget;
use tbep_core::db::{open_db, open_db_in_memory};
use tbep_core::model::gene::PropertyValue;
use tbep_core::repo::registry::NameFilter;
use tbep_core::{
    Classification, GraphEngine, HeaderClassifier, PipelineConfig, PropertyRegistry, RuleTables,
    Scope, SeedService, SqliteGraphEngine, SqlitePropertyRegistry,
};

fn names(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn classification_is_pure_over_repeated_calls() {
    let classifier = HeaderClassifier::new(&RuleTables::default()).unwrap();
    let headers = [
        "GWAS_p-value",
        "Gene name",
        "TE_liver",
        "EFO_0000095_DEG_logFC",
        "unmatched",
    ];

    for disease in [None, Some("ALS")] {
        for header in headers {
            let first = classifier.classify(header, disease);
            for _ in 0..3 {
                assert_eq!(classifier.classify(header, disease), first);
            }
        }
    }
}

#[test]
fn general_symbol_is_a_gene_attribute_under_any_context() {
    let classifier = HeaderClassifier::new(&RuleTables::default()).unwrap();
    for disease in [None, Some("ALS"), Some("EFO_0000095")] {
        match classifier.classify("Gene name", disease) {
            Classification::Mapped(header) => {
                assert_eq!(header.canonical, "Gene_name");
                assert_eq!(header.target, HeaderTarget::GeneAttribute);
            }
            Classification::Dropped { header } => panic!("`{header}` was dropped"),
        }
    }
}

#[test]
fn custom_rule_tables_are_injected() {
    let mut rules = RuleTables::default();
    rules
        .renames
        .insert("Expression".to_string(), "TE".to_string());
    rules.disease_independent.push("Expression".to_string());
    let classifier = HeaderClassifier::new(&rules).unwrap();

    match classifier.classify("Expression_brain", None) {
        Classification::Mapped(header) => assert_eq!(header.canonical, "TE_brain"),
        Classification::Dropped { header } => panic!("`{header}` was dropped"),
    }
    let defaults = HeaderClassifier::new(&RuleTables::default()).unwrap();
    assert!(matches!(
        defaults.classify("Expression_brain", None),
        Classification::Dropped { .. }
    ));
}

#[test]
fn add_then_exact_remove_restores_registry() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqlitePropertyRegistry::try_new(&conn).unwrap();
    let scope = Scope::disease("ALS");
    registry.add(&scope, &names(&["ALS_DEG_logFC"])).unwrap();
    let before = registry.list(&scope).unwrap();

    let added = names(&["ALS_TE_tissueA", "ALS_OpenTargets_score"]);
    registry.add(&scope, &added).unwrap();
    let removal = registry
        .remove(&scope, &NameFilter::Exact(added.clone()))
        .unwrap();

    assert_eq!(removal.names, added);
    assert_eq!(removal.dropped_disease, None);
    assert_eq!(registry.list(&scope).unwrap(), before);
}

fn disease_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM diseases;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn round_trip_on_new_disease_leaves_no_disease_behind() {
    let conn = open_db_in_memory().unwrap();
    let registry = SqlitePropertyRegistry::try_new(&conn).unwrap();
    let scope = Scope::disease("ALS");
    let rename = [("ALS".to_string(), "amyotrophic lateral sclerosis".to_string())];
    assert_eq!(registry.set_disease_names(&rename).unwrap(), 0);

    let added = names(&["ALS_DEG_x"]);
    registry.add(&scope, &added).unwrap();
    assert_eq!(disease_rows(&conn), 1);
    let removal = registry.remove(&scope, &NameFilter::Exact(added)).unwrap();

    assert_eq!(removal.dropped_disease.as_deref(), Some("ALS"));
    assert_eq!(disease_rows(&conn), 0);
    assert!(registry.scopes().unwrap().is_empty());
    assert_eq!(registry.set_disease_names(&rename).unwrap(), 0);
}

#[test]
fn sparse_row_lands_on_gene_and_registry_scope() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("graph.db");
    let registry_conn = open_db(&db).unwrap();
    let service = SeedService::new(
        SqliteGraphEngine::try_new(open_db(&db).unwrap()).unwrap(),
        SqlitePropertyRegistry::try_new(&registry_conn).unwrap(),
        &PipelineConfig::default(),
    )
    .unwrap();
    let input = dir.path().join("row.txt");
    fs::write(&input, "ENSG000001,EFO_0000095_OpenTargets_score,0.6\n").unwrap();

    service.seed_sparse(&input).unwrap();

    let gene = service.engine().gene("ENSG000001").unwrap().unwrap();
    assert_eq!(
        gene.property("EFO_0000095_OpenTargets_score"),
        Some(&PropertyValue::Number(0.6))
    );
    assert_eq!(
        service
            .registry()
            .list(&Scope::disease("EFO_0000095"))
            .unwrap(),
        names(&["EFO_0000095_OpenTargets_score"])
    );
}
