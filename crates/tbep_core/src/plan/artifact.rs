//! Plan artifacts: the mutation statement text emitted for audit and replay.
//!
//! Planners only build artifacts; persisting them is the job of an
//! `ArtifactSink` chosen by the caller.

use crate::plan::batch::IdentifierMatchMode;
use crate::plan::interaction::{IdType, InteractionPlan};
use crate::plan::mutation::MutationPlan;
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug)]
pub enum ArtifactError {
    Io { path: PathBuf, source: std::io::Error },
    Encode(serde_json::Error),
}

impl Display for ArtifactError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot write plan artifact {}: {source}", path.display())
            }
            Self::Encode(err) => write!(f, "cannot encode plan artifact header: {err}"),
        }
    }
}

impl Error for ArtifactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Kind of operation an artifact describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOperation {
    Upsert,
    Interactions,
    Removal,
}

/// Rendered mutation statement plus plan shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanArtifact {
    pub id: Uuid,
    pub operation: ArtifactOperation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_mode: Option<IdentifierMatchMode>,
    pub batch_count: usize,
    pub row_count: usize,
    #[serde(skip)]
    pub statement: String,
}

impl PlanArtifact {
    pub fn upsert(plan: &MutationPlan) -> Self {
        let matcher = match plan.match_mode {
            IdentifierMatchMode::Exact => "MERGE (g:Gene { ID: row.key })",
            IdentifierMatchMode::AliasCaseNormalized => {
                "MATCH (g:Gene)\nWHERE g.Gene_name = toUpper(row.key) OR toUpper(row.key) IN g.Aliases"
            }
        };
        Self {
            id: Uuid::new_v4(),
            operation: ArtifactOperation::Upsert,
            match_mode: Some(plan.match_mode),
            batch_count: plan.batches.len(),
            row_count: plan.row_count(),
            statement: format!(
                "UNWIND $rows AS row\n{matcher}\nSET g += row.values"
            ),
        }
    }

    pub fn interactions(plan: &InteractionPlan) -> Self {
        let key = match plan.id_type {
            IdType::EnsemblId => "ID",
            IdType::HgncSymbol => "Gene_name",
        };
        Self {
            id: Uuid::new_v4(),
            operation: ArtifactOperation::Interactions,
            match_mode: None,
            batch_count: plan.batches.len(),
            row_count: plan.edge_count(),
            statement: format!(
                "UNWIND $edges AS edge\n\
                 MATCH (g1:Gene {{ {key}: toUpper(edge.source) }})\n\
                 MATCH (g2:Gene {{ {key}: toUpper(edge.target) }})\n\
                 MERGE (g1)-[r:{}]->(g2)\n\
                 ON CREATE SET r.score = edge.score",
                plan.kind
            ),
        }
    }

    pub fn removal(names: &BTreeSet<String>) -> Self {
        let properties = names
            .iter()
            .map(|name| format!("g.`{}`", name.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            id: Uuid::new_v4(),
            operation: ArtifactOperation::Removal,
            match_mode: None,
            batch_count: usize::from(!names.is_empty()),
            row_count: names.len(),
            statement: format!(
                "MATCH (g:Gene)\nREMOVE {properties}\n\
                 WITH DISTINCT 1 AS done\n\
                 MATCH (p:Property) WHERE p.name IN $names\n\
                 DETACH DELETE p"
            ),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.cypher", self.id)
    }

    /// Statement text prefixed with a one-line JSON header comment.
    pub fn render(&self) -> ArtifactResult<String> {
        let header = serde_json::to_string(self)?;
        Ok(format!("// {header}\n{}\n", self.statement))
    }
}

/// Destination for plan artifacts.
pub trait ArtifactSink: Send + Sync {
    /// Persists `artifact`; returns where it was stored.
    fn persist(&self, artifact: &PlanArtifact) -> ArtifactResult<PathBuf>;
}

/// Writes `<dir>/<id>.cypher` files.
pub struct DirectoryArtifactSink {
    dir: PathBuf,
}

impl DirectoryArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectoryArtifactSink {
    fn persist(&self, artifact: &PlanArtifact) -> ArtifactResult<PathBuf> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ArtifactError::Io { path, source }
        };
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = self.dir.join(artifact.file_name());
        fs::write(&path, artifact.render()?).map_err(io_error(&path))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArtifactSink, DirectoryArtifactSink, PlanArtifact};
    use crate::plan::batch::IdentifierMatchMode;
    use crate::plan::mutation::MutationPlan;
    use std::collections::BTreeSet;

    #[test]
    fn alias_mode_statement_matches_symbols() {
        let plan = MutationPlan {
            match_mode: IdentifierMatchMode::AliasCaseNormalized,
            ..MutationPlan::default()
        };
        let artifact = PlanArtifact::upsert(&plan);
        assert!(artifact.statement.contains("toUpper(row.key) IN g.Aliases"));
        assert_eq!(artifact.row_count, 0);
    }

    #[test]
    fn directory_sink_writes_header_and_statement() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryArtifactSink::new(dir.path().join("artifacts"));
        let names: BTreeSet<String> = ["ALS_TE_liver".to_string()].into();
        let artifact = PlanArtifact::removal(&names);

        let path = sink.persist(&artifact).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();

        assert!(path.ends_with(format!("{}.cypher", artifact.id)));
        assert!(written.starts_with("// {\"id\":"));
        assert!(written.contains("\"operation\":\"removal\""));
        assert!(written.contains("REMOVE g.`ALS_TE_liver`"));
    }
}
