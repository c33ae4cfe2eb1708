//! Graph engine contracts and SQLite implementation.
//!
//! # Responsibility
//! - Apply batched merge/set/remove mutations to gene nodes.
//! - Merge interaction edges and reference genome genes.
//! - Report mutation counters per batch.
//!
//! # Invariants
//! - Each call commits in exactly one transaction or not at all.
//! - Merging by gene identifier is idempotent: re-applying a batch creates no
//!   duplicate nodes or edges and leaves values unchanged.
//! - `Gene_name` and aliases are stored upper-cased.

use crate::db::migrations::latest_version;
use crate::db::{schema_version, table_exists, DbError};
use crate::ingest::reference::ReferenceGene;
use crate::model::gene::{Gene, PropertyValue, ALIASES, DESCRIPTION, GENE_NAME, HGNC_GENE_ID};
use crate::plan::batch::{IdentifierMatchMode, UpsertBatch};
use crate::plan::interaction::{IdType, InteractionBatch, InteractionKind};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};

pub type EngineResult<T> = Result<T, EngineError>;

const REQUIRED_TABLES: [&str; 4] = ["genes", "gene_aliases", "gene_properties", "interactions"];

#[derive(Debug)]
pub enum EngineError {
    /// Engine could not be reached (locked, busy, unopenable, poisoned).
    Unreachable(String),
    /// Engine refused a statement.
    Rejected(rusqlite::Error),
    Db(DbError),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreachable(message) => write!(f, "graph engine unreachable: {message}"),
            Self::Rejected(err) => write!(f, "graph engine rejected statement: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "graph engine requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "graph engine requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
                Self::Unreachable(value.to_string())
            }
            _ => Self::Rejected(value),
        }
    }
}

impl From<DbError> for EngineError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

/// Counters returned by the engine for one mutation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationCounters {
    pub nodes_created: usize,
    pub properties_set: usize,
    pub properties_removed: usize,
    pub relationships_created: usize,
    pub genes_affected: usize,
    /// Rows (or edges) whose gene could not be matched.
    pub rows_unmatched: usize,
}

impl MutationCounters {
    pub fn merge(self, other: Self) -> Self {
        Self {
            nodes_created: self.nodes_created + other.nodes_created,
            properties_set: self.properties_set + other.properties_set,
            properties_removed: self.properties_removed + other.properties_removed,
            relationships_created: self.relationships_created + other.relationships_created,
            genes_affected: self.genes_affected + other.genes_affected,
            rows_unmatched: self.rows_unmatched + other.rows_unmatched,
        }
    }
}

/// Stored interaction edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaction {
    pub source_id: String,
    pub target_id: String,
    pub kind: InteractionKind,
    pub score: Option<f64>,
}

/// Batched mutation surface of the gene graph.
///
/// Implementations must tolerate concurrent calls from the executor pool.
pub trait GraphEngine: Send + Sync {
    /// Cheap liveness probe.
    fn ping(&self) -> EngineResult<()>;
    /// Merges genes by key and sets every value of every row.
    fn apply_upserts(&self, batch: &UpsertBatch) -> EngineResult<MutationCounters>;
    /// Removes the named properties from every gene holding them.
    fn remove_properties(&self, names: &BTreeSet<String>) -> EngineResult<MutationCounters>;
    /// Merges edges between existing genes; the score is only set on creation.
    fn merge_interactions(&self, batch: &InteractionBatch) -> EngineResult<MutationCounters>;
    /// Merges reference genes by ID and rebuilds their alias lists.
    fn upsert_reference_genes(&self, genes: &[ReferenceGene]) -> EngineResult<MutationCounters>;
    fn gene(&self, id: &str) -> EngineResult<Option<Gene>>;
    /// Returns `Gene_name` for every known id that has one.
    fn gene_names(&self, ids: &BTreeSet<String>) -> EngineResult<BTreeMap<String, String>>;
    fn gene_count(&self) -> EngineResult<usize>;
    /// Edges touching `gene_id` in either direction.
    fn interactions(&self, gene_id: &str) -> EngineResult<Vec<Interaction>>;
}

/// SQLite-backed graph engine.
///
/// Owns its connection so it can be shared across executor threads.
pub struct SqliteGraphEngine {
    conn: Mutex<Connection>,
}

impl SqliteGraphEngine {
    /// Wraps a migrated connection.
    pub fn try_new(conn: Connection) -> EngineResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(&conn)?;
        if actual_version != expected_version {
            return Err(EngineError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        for table in REQUIRED_TABLES {
            if !table_exists(&conn, table)? {
                return Err(EngineError::MissingRequiredTable(table));
            }
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EngineError::Unreachable("graph connection poisoned".to_string()))
    }
}

impl GraphEngine for SqliteGraphEngine {
    fn ping(&self) -> EngineResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn apply_upserts(&self, batch: &UpsertBatch) -> EngineResult<MutationCounters> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counters = MutationCounters::default();

        for row in &batch.rows {
            let gene_ids = match batch.match_mode {
                IdentifierMatchMode::Exact => {
                    counters.nodes_created += tx
                        .prepare_cached(
                            "INSERT INTO genes (id) VALUES (?1) ON CONFLICT(id) DO NOTHING;",
                        )?
                        .execute([row.key.as_str()])?;
                    vec![row.key.clone()]
                }
                IdentifierMatchMode::AliasCaseNormalized => {
                    let ids = genes_by_symbol(&tx, &row.key.to_ascii_uppercase(), true)?;
                    if ids.is_empty() {
                        counters.rows_unmatched += 1;
                        continue;
                    }
                    ids
                }
            };

            for gene_id in &gene_ids {
                for (name, value) in &row.values {
                    set_value(&tx, gene_id, name, value)?;
                    counters.properties_set += 1;
                }
            }
            counters.genes_affected += gene_ids.len();
        }

        tx.commit()?;
        Ok(counters)
    }

    fn remove_properties(&self, names: &BTreeSet<String>) -> EngineResult<MutationCounters> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counters = MutationCounters::default();
        let mut affected = BTreeSet::new();
        {
            let mut delete = tx.prepare_cached(
                "DELETE FROM gene_properties
                 WHERE name = ?1
                 RETURNING gene_id;",
            )?;
            for name in names {
                let mut rows = delete.query([name])?;
                while let Some(row) = rows.next()? {
                    affected.insert(row.get::<_, String>(0)?);
                    counters.properties_removed += 1;
                }
            }
        }
        tx.commit()?;

        counters.genes_affected = affected.len();
        Ok(counters)
    }

    fn merge_interactions(&self, batch: &InteractionBatch) -> EngineResult<MutationCounters> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counters = MutationCounters::default();
        let kind = batch.kind.label();

        for edge in &batch.edges {
            let sources = endpoint_ids(&tx, batch.id_type, &edge.source)?;
            let targets = endpoint_ids(&tx, batch.id_type, &edge.target)?;
            if sources.is_empty() || targets.is_empty() {
                counters.rows_unmatched += 1;
                continue;
            }

            let mut insert = tx.prepare_cached(
                "INSERT INTO interactions (source_id, target_id, kind, score)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(source_id, target_id, kind) DO NOTHING;",
            )?;
            for source in &sources {
                for target in &targets {
                    counters.relationships_created +=
                        insert.execute(params![source, target, kind, edge.score])?;
                }
            }
        }

        tx.commit()?;
        Ok(counters)
    }

    fn upsert_reference_genes(&self, genes: &[ReferenceGene]) -> EngineResult<MutationCounters> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counters = MutationCounters::default();

        for gene in genes {
            let exists: i64 = tx
                .prepare_cached("SELECT EXISTS(SELECT 1 FROM genes WHERE id = ?1);")?
                .query_row([gene.id.as_str()], |row| row.get(0))?;
            tx.prepare_cached(
                "INSERT INTO genes (id, gene_name, description, hgnc_gene_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    gene_name = excluded.gene_name,
                    description = excluded.description,
                    hgnc_gene_id = excluded.hgnc_gene_id;",
            )?
            .execute(params![
                gene.id,
                gene.gene_name.to_ascii_uppercase(),
                gene.description,
                gene.hgnc_gene_id
            ])?;
            replace_aliases(&tx, &gene.id, &gene.aliases)?;

            if exists == 0 {
                counters.nodes_created += 1;
            }
            counters.properties_set += 2
                + usize::from(gene.description.is_some())
                + usize::from(gene.hgnc_gene_id.is_some());
            counters.genes_affected += 1;
        }

        tx.commit()?;
        Ok(counters)
    }

    fn gene(&self, id: &str) -> EngineResult<Option<Gene>> {
        let conn = self.lock()?;
        let Some(mut gene) = conn
            .query_row(
                "SELECT id, gene_name, description, hgnc_gene_id
                 FROM genes
                 WHERE id = ?1;",
                [id],
                |row| {
                    let mut gene = Gene::new(row.get::<_, String>("id")?);
                    gene.gene_name = row.get("gene_name")?;
                    gene.description = row.get("description")?;
                    gene.hgnc_gene_id = row.get("hgnc_gene_id")?;
                    Ok(gene)
                },
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut aliases = conn.prepare_cached(
            "SELECT alias FROM gene_aliases WHERE gene_id = ?1 ORDER BY position ASC;",
        )?;
        gene.aliases = aliases
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        let mut properties = conn.prepare_cached(
            "SELECT name, num_value, text_value
             FROM gene_properties
             WHERE gene_id = ?1;",
        )?;
        let mut rows = properties.query([id])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let value = match row.get::<_, Option<f64>>("num_value")? {
                Some(number) => PropertyValue::Number(number),
                None => PropertyValue::Text(row.get("text_value")?),
            };
            gene.properties.insert(name, value);
        }

        Ok(Some(gene))
    }

    fn gene_names(&self, ids: &BTreeSet<String>) -> EngineResult<BTreeMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT gene_name FROM genes WHERE id = ?1 AND gene_name IS NOT NULL;",
        )?;
        let mut names = BTreeMap::new();
        for id in ids {
            if let Some(name) = stmt
                .query_row([id], |row| row.get::<_, String>(0))
                .optional()?
            {
                names.insert(id.clone(), name);
            }
        }
        Ok(names)
    }

    fn gene_count(&self) -> EngineResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM genes;", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn interactions(&self, gene_id: &str) -> EngineResult<Vec<Interaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT source_id, target_id, kind, score
             FROM interactions
             WHERE source_id = ?1 OR target_id = ?1
             ORDER BY kind ASC, source_id ASC, target_id ASC;",
        )?;
        let mut rows = stmt.query([gene_id])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            let label: String = row.get("kind")?;
            let Some(kind) = InteractionKind::from_label(&label) else {
                return Err(EngineError::InvalidData(format!(
                    "unknown interaction kind `{label}` in interactions.kind"
                )));
            };
            edges.push(Interaction {
                source_id: row.get("source_id")?,
                target_id: row.get("target_id")?,
                kind,
                score: row.get("score")?,
            });
        }
        Ok(edges)
    }
}

/// Looks genes up by upper-cased symbol; optionally also through aliases.
fn genes_by_symbol(
    tx: &Transaction<'_>,
    symbol: &str,
    include_aliases: bool,
) -> EngineResult<Vec<String>> {
    let sql = if include_aliases {
        "SELECT id FROM genes WHERE gene_name = ?1
         UNION
         SELECT gene_id FROM gene_aliases WHERE alias = ?1
         ORDER BY 1;"
    } else {
        "SELECT id FROM genes WHERE gene_name = ?1 ORDER BY id;"
    };
    let mut stmt = tx.prepare_cached(sql)?;
    let ids = stmt
        .query_map([symbol], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn endpoint_ids(tx: &Transaction<'_>, id_type: IdType, key: &str) -> EngineResult<Vec<String>> {
    let key = key.to_ascii_uppercase();
    match id_type {
        IdType::EnsemblId => {
            let found = tx
                .prepare_cached("SELECT id FROM genes WHERE id = ?1;")?
                .query_row([key.as_str()], |row| row.get::<_, String>(0))
                .optional()?;
            Ok(found.into_iter().collect())
        }
        IdType::HgncSymbol => genes_by_symbol(tx, &key, false),
    }
}

fn set_value(
    tx: &Transaction<'_>,
    gene_id: &str,
    name: &str,
    value: &PropertyValue,
) -> EngineResult<()> {
    let text = match value {
        PropertyValue::Number(number) => number.to_string(),
        PropertyValue::Text(text) => text.clone(),
    };
    match name {
        GENE_NAME => {
            tx.prepare_cached("UPDATE genes SET gene_name = ?2 WHERE id = ?1;")?
                .execute(params![gene_id, text.to_ascii_uppercase()])?;
        }
        DESCRIPTION => {
            tx.prepare_cached("UPDATE genes SET description = ?2 WHERE id = ?1;")?
                .execute(params![gene_id, text])?;
        }
        HGNC_GENE_ID => {
            tx.prepare_cached("UPDATE genes SET hgnc_gene_id = ?2 WHERE id = ?1;")?
                .execute(params![gene_id, text])?;
        }
        ALIASES => {
            let aliases: Vec<String> = text
                .split(',')
                .map(|alias| alias.trim().to_ascii_uppercase())
                .filter(|alias| !alias.is_empty())
                .collect();
            replace_aliases(tx, gene_id, &aliases)?;
        }
        _ => {
            let (num_value, text_value) = match value {
                PropertyValue::Number(number) => (Some(*number), None),
                PropertyValue::Text(text) => (None, Some(text.as_str())),
            };
            tx.prepare_cached(
                "INSERT INTO gene_properties (gene_id, name, num_value, text_value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(gene_id, name) DO UPDATE SET
                    num_value = excluded.num_value,
                    text_value = excluded.text_value;",
            )?
            .execute(params![gene_id, name, num_value, text_value])?;
        }
    }
    Ok(())
}

fn replace_aliases(tx: &Transaction<'_>, gene_id: &str, aliases: &[String]) -> EngineResult<()> {
    tx.prepare_cached("DELETE FROM gene_aliases WHERE gene_id = ?1;")?
        .execute([gene_id])?;
    let mut insert = tx.prepare_cached(
        "INSERT INTO gene_aliases (gene_id, position, alias) VALUES (?1, ?2, ?3);",
    )?;
    for (position, alias) in aliases.iter().enumerate() {
        insert.execute(params![gene_id, position as i64, alias])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EngineError, GraphEngine, MutationCounters, SqliteGraphEngine};
    use crate::db::open_db_in_memory;
    use crate::model::gene::PropertyValue;
    use crate::plan::batch::{IdentifierMatchMode, UpsertBatch, UpsertRow};
    use std::collections::BTreeSet;

    fn engine() -> SqliteGraphEngine {
        SqliteGraphEngine::try_new(open_db_in_memory().unwrap()).unwrap()
    }

    fn batch(mode: IdentifierMatchMode, key: &str, name: &str, value: f64) -> UpsertBatch {
        UpsertBatch {
            match_mode: mode,
            rows: vec![UpsertRow {
                key: key.to_string(),
                values: vec![(name.to_string(), PropertyValue::Number(value))],
            }],
        }
    }

    #[test]
    fn rejects_unmigrated_connection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = SqliteGraphEngine::try_new(conn).err().unwrap();
        assert!(matches!(
            err,
            EngineError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn exact_upsert_is_idempotent() {
        let engine = engine();
        let upsert = batch(IdentifierMatchMode::Exact, "ENSG000001", "TE_liver", 1.5);

        let first = engine.apply_upserts(&upsert).unwrap();
        let second = engine.apply_upserts(&upsert).unwrap();

        assert_eq!(first.nodes_created, 1);
        assert_eq!(second.nodes_created, 0);
        assert_eq!(engine.gene_count().unwrap(), 1);
        let gene = engine.gene("ENSG000001").unwrap().unwrap();
        assert_eq!(gene.property("TE_liver"), Some(&PropertyValue::Number(1.5)));
    }

    #[test]
    fn alias_mode_skips_unknown_symbols() {
        let engine = engine();
        let counters = engine
            .apply_upserts(&batch(
                IdentifierMatchMode::AliasCaseNormalized,
                "tp53",
                "TE_liver",
                2.0,
            ))
            .unwrap();
        assert_eq!(
            counters,
            MutationCounters {
                rows_unmatched: 1,
                ..MutationCounters::default()
            }
        );
        assert_eq!(engine.gene_count().unwrap(), 0);
    }

    #[test]
    fn remove_properties_counts_distinct_genes() {
        let engine = engine();
        engine
            .apply_upserts(&batch(IdentifierMatchMode::Exact, "G1", "TE_liver", 1.0))
            .unwrap();
        engine
            .apply_upserts(&batch(IdentifierMatchMode::Exact, "G1", "TE_lung", 1.0))
            .unwrap();
        engine
            .apply_upserts(&batch(IdentifierMatchMode::Exact, "G2", "TE_liver", 1.0))
            .unwrap();

        let names: BTreeSet<String> = ["TE_liver".to_string(), "TE_lung".to_string()].into();
        let counters = engine.remove_properties(&names).unwrap();

        assert_eq!(counters.properties_removed, 3);
        assert_eq!(counters.genes_affected, 2);
        assert!(engine.gene("G1").unwrap().unwrap().properties.is_empty());
    }
}
