//! Property registry contracts and SQLite implementation.
//!
//! # Responsibility
//! - Track which canonical property names exist, per scope.
//! - Own disease and property metadata (`Disease -HAS_PROPERTY-> Property`).
//! - Back schema discovery and safe, bounded deletion.
//!
//! # Invariants
//! - `add` is an idempotent union; a name is only accepted in the scope its
//!   prefix names.
//! - A disease row exists for every disease-scoped property.
//! - `remove` deletes a disease it leaves without properties.
//! - The registry is a best-effort mirror of the graph, never rolled back
//!   together with it.

use crate::db::migrations::latest_version;
use crate::db::{schema_version, table_exists, DbError};
use crate::model::canonical::{Category, Scope};
use crate::model::property::PropertyEntry;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug)]
pub enum RegistryError {
    Db(DbError),
    /// Name does not belong to the scope it was registered under.
    InvalidName {
        scope: String,
        name: String,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidName { scope, name } => {
                write!(f, "`{name}` is not a canonical property name in scope `{scope}`")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "registry requires table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid registry data: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Selection predicate for `PropertyRegistry::remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Name starts with the prefix. Never a substring match.
    Prefix(String),
    /// Name is one of the set.
    Exact(BTreeSet<String>),
    /// Any of the nested filters matches.
    AnyOf(Vec<NameFilter>),
}

impl NameFilter {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Exact(names) => names.contains(name),
            Self::AnyOf(filters) => filters.iter().any(|filter| filter.matches(name)),
        }
    }
}

/// Outcome of `PropertyRegistry::remove`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Removal {
    pub names: BTreeSet<String>,
    /// Disease deleted because this removal left it without properties.
    pub dropped_disease: Option<String>,
}

/// Registry of canonical property names per scope.
pub trait PropertyRegistry {
    /// Unions `names` into `scope`; returns how many were new.
    fn add(&self, scope: &Scope, names: &BTreeSet<String>) -> RegistryResult<usize>;
    /// Removes every name in `scope` matching `filter`.
    ///
    /// A disease emptied by the removal is deleted in the same transaction,
    /// so `add` followed by an exact `remove` restores the prior state.
    fn remove(&self, scope: &Scope, filter: &NameFilter) -> RegistryResult<Removal>;
    /// Lists names currently registered in `scope`.
    fn list(&self, scope: &Scope) -> RegistryResult<BTreeSet<String>>;
    /// Lists scopes holding at least one name, common first.
    fn scopes(&self) -> RegistryResult<Vec<Scope>>;
    /// Discovery tuples, sorted by name; all scopes when `scope` is `None`.
    fn entries(&self, scope: Option<&Scope>) -> RegistryResult<Vec<PropertyEntry>>;
    /// Deletes diseases without properties; returns their IDs.
    fn prune_empty_diseases(&self) -> RegistryResult<Vec<String>>;
    /// Sets names on already registered diseases; returns rows updated.
    fn set_disease_names(&self, names: &[(String, String)]) -> RegistryResult<usize>;
    /// Sets descriptions on already registered properties; returns rows updated.
    fn set_property_descriptions(&self, descriptions: &[(String, String)])
        -> RegistryResult<usize>;
    fn disease_name(&self, disease_id: &str) -> RegistryResult<Option<String>>;
}

/// SQLite-backed property registry.
pub struct SqlitePropertyRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePropertyRegistry<'conn> {
    /// Creates a registry over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RegistryResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(RegistryError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        for table in ["diseases", "properties"] {
            if !table_exists(conn, table)? {
                return Err(RegistryError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl PropertyRegistry for SqlitePropertyRegistry<'_> {
    fn add(&self, scope: &Scope, names: &BTreeSet<String>) -> RegistryResult<usize> {
        let categorized = names
            .iter()
            .map(|name| {
                category_in_scope(scope, name)
                    .map(|category| (name.as_str(), category))
                    .ok_or_else(|| RegistryError::InvalidName {
                        scope: scope.key().to_string(),
                        name: name.clone(),
                    })
            })
            .collect::<RegistryResult<Vec<_>>>()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(disease_id) = scope.disease_id() {
            tx.execute(
                "INSERT INTO diseases (id) VALUES (?1) ON CONFLICT(id) DO NOTHING;",
                [disease_id],
            )?;
        }

        let mut added = 0;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO properties (name, category, disease_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO NOTHING;",
            )?;
            for (name, category) in categorized {
                added += insert.execute(params![name, category.label(), scope.disease_id()])?;
            }
        }
        tx.commit()?;

        Ok(added)
    }

    fn remove(&self, scope: &Scope, filter: &NameFilter) -> RegistryResult<Removal> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let (names, remaining): (BTreeSet<String>, BTreeSet<String>) = list_scope(&tx, scope)?
            .into_iter()
            .partition(|name| filter.matches(name));
        {
            let mut delete = tx.prepare_cached("DELETE FROM properties WHERE name = ?1;")?;
            for name in &names {
                delete.execute([name])?;
            }
        }

        let mut dropped_disease = None;
        if let Some(disease_id) = scope.disease_id() {
            if !names.is_empty() && remaining.is_empty() {
                let deleted = tx.execute("DELETE FROM diseases WHERE id = ?1;", [disease_id])?;
                if deleted > 0 {
                    dropped_disease = Some(disease_id.to_string());
                }
            }
        }
        tx.commit()?;

        Ok(Removal {
            names,
            dropped_disease,
        })
    }

    fn list(&self, scope: &Scope) -> RegistryResult<BTreeSet<String>> {
        list_scope(self.conn, scope)
    }

    fn scopes(&self) -> RegistryResult<Vec<Scope>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT disease_id FROM properties;")?;
        let mut rows = stmt.query([])?;
        let mut scopes = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let disease_id: Option<String> = row.get(0)?;
            scopes.insert(disease_id.map_or(Scope::Common, Scope::Disease));
        }
        Ok(scopes.into_iter().collect())
    }

    fn entries(&self, scope: Option<&Scope>) -> RegistryResult<Vec<PropertyEntry>> {
        let mut sql = String::from(
            "SELECT name, category, disease_id, description
             FROM properties",
        );
        if scope.is_some() {
            sql.push_str(" WHERE disease_id IS ?1");
        }
        sql.push_str(" ORDER BY name ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match scope {
            Some(scope) => stmt.query([scope.disease_id()])?,
            None => stmt.query([])?,
        };

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let category_label: String = row.get("category")?;
            let category = Category::from_label(&category_label).ok_or_else(|| {
                RegistryError::InvalidData(format!(
                    "unknown category `{category_label}` in properties.category"
                ))
            })?;
            entries.push(PropertyEntry {
                name: row.get("name")?,
                description: row.get("description")?,
                category,
                disease_id: row.get("disease_id")?,
            });
        }
        Ok(entries)
    }

    fn prune_empty_diseases(&self) -> RegistryResult<Vec<String>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let pruned = {
            let mut stmt = tx.prepare(
                "SELECT id
                 FROM diseases d
                 WHERE NOT EXISTS (
                     SELECT 1 FROM properties p WHERE p.disease_id = d.id
                 )
                 ORDER BY id ASC;",
            )?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        for id in &pruned {
            tx.execute("DELETE FROM diseases WHERE id = ?1;", [id])?;
        }
        tx.commit()?;
        Ok(pruned)
    }

    fn set_disease_names(&self, names: &[(String, String)]) -> RegistryResult<usize> {
        update_pairs(
            self.conn,
            "UPDATE diseases SET name = ?2 WHERE id = ?1;",
            names,
        )
    }

    fn set_property_descriptions(
        &self,
        descriptions: &[(String, String)],
    ) -> RegistryResult<usize> {
        update_pairs(
            self.conn,
            "UPDATE properties SET description = ?2 WHERE name = ?1;",
            descriptions,
        )
    }

    fn disease_name(&self, disease_id: &str) -> RegistryResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM diseases WHERE id = ?1;",
                [disease_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(name.flatten())
    }
}

/// Category of `name` if its prefix places it in `scope`.
fn category_in_scope(scope: &Scope, name: &str) -> Option<Category> {
    let rest = name.strip_prefix(scope.name_prefix().as_str())?;
    Category::split_prefix(rest).map(|(category, _)| category)
}

fn list_scope(conn: &Connection, scope: &Scope) -> RegistryResult<BTreeSet<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT name FROM properties WHERE disease_id IS ?1;")?;
    let names = stmt
        .query_map([scope.disease_id()], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

fn update_pairs(conn: &Connection, sql: &str, pairs: &[(String, String)]) -> RegistryResult<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut updated = 0;
    {
        let mut stmt = tx.prepare_cached(sql)?;
        for (key, value) in pairs {
            updated += stmt.execute(params![key.trim(), value.trim()])?;
        }
    }
    tx.commit()?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::{NameFilter, PropertyRegistry, RegistryError, SqlitePropertyRegistry};
    use crate::db::open_db_in_memory;
    use crate::model::canonical::{Category, Scope};
    use std::collections::BTreeSet;

    fn names(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn add_is_idempotent_union() {
        let conn = open_db_in_memory().unwrap();
        let registry = SqlitePropertyRegistry::try_new(&conn).unwrap();
        let scope = Scope::disease("ALS");

        assert_eq!(registry.add(&scope, &names(&["ALS_DEG_logFC"])).unwrap(), 1);
        assert_eq!(
            registry
                .add(&scope, &names(&["ALS_DEG_logFC", "ALS_DEG_pval"]))
                .unwrap(),
            1
        );
        assert_eq!(
            registry.list(&scope).unwrap(),
            names(&["ALS_DEG_logFC", "ALS_DEG_pval"])
        );
    }

    #[test]
    fn add_rejects_name_outside_scope() {
        let conn = open_db_in_memory().unwrap();
        let registry = SqlitePropertyRegistry::try_new(&conn).unwrap();

        let err = registry
            .add(&Scope::Common, &names(&["ALS_DEG_logFC"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }));
        assert!(registry.list(&Scope::Common).unwrap().is_empty());
    }

    #[test]
    fn prefix_filter_is_anchored() {
        let filter = NameFilter::Prefix("ALS_TE_".to_string());
        assert!(filter.matches("ALS_TE_tissueA"));
        assert!(!filter.matches("ALSX_TE_tissueA"));
        assert!(!filter.matches("BALS_TE_tissueA"));
    }

    #[test]
    fn entries_carry_category_and_scope() {
        let conn = open_db_in_memory().unwrap();
        let registry = SqlitePropertyRegistry::try_new(&conn).unwrap();
        registry
            .add(&Scope::Common, &names(&["OT_Prioritization_safety"]))
            .unwrap();
        registry
            .add(&Scope::disease("EFO_0000095"), &names(&["EFO_0000095_OpenTargets_score"]))
            .unwrap();

        let entries = registry.entries(None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "EFO_0000095_OpenTargets_score");
        assert_eq!(entries[0].category, Category::OpenTargets);
        assert_eq!(entries[0].disease_id.as_deref(), Some("EFO_0000095"));
        assert_eq!(entries[1].category, Category::TargetPrioritization);
        assert_eq!(entries[1].disease_id, None);

        let common = registry.entries(Some(&Scope::Common)).unwrap();
        assert_eq!(common.len(), 1);
        assert_eq!(
            registry.scopes().unwrap(),
            vec![Scope::Common, Scope::disease("EFO_0000095")]
        );
    }
}
