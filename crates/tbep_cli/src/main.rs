//! Command-line entry point for the seeding pipeline.
//!
//! # Responsibility
//! - Parse arguments, load configuration and open the store.
//! - Print operation reports as JSON on stdout.
//!
//! # Invariants
//! - Exit code 2 marks input validation failures; 1 marks everything else.

use clap::{Parser, Subcommand};
use log::error;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tbep_core::db::open_db;
use tbep_core::{
    init_logging, DeletionSelector, PipelineConfig, PipelineError, Scope, SeedService,
    SqliteGraphEngine, SqlitePropertyRegistry,
};

#[derive(Parser)]
#[command(name = "tbep")]
#[command(about = "Normalize gene data files into the property graph")]
#[command(version)]
struct Cli {
    /// JSON pipeline configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file (created and migrated on first use).
    #[arg(long, default_value = "tbep.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed a dense gene x property matrix
    SeedDense {
        file: PathBuf,
        /// Disease ID scoping disease-dependent columns
        #[arg(long)]
        disease: Option<String>,
    },

    /// Seed headerless (gene, property, value) triples
    SeedSparse { file: PathBuf },

    /// Seed headerless (gene1, gene2, score) interactions
    SeedInteractions {
        file: PathBuf,
        /// PPI | FUN_PPI | BIO_GRID | INT_ACT | STRING
        #[arg(long)]
        kind: String,
        /// ENSEMBL-ID | HGNC-Symbol; inferred from the first row when omitted
        #[arg(long)]
        id_type: Option<String>,
    },

    /// Merge an HGNC reference genome export
    Reference { file: PathBuf },

    /// Set disease display names from headerless id,name pairs
    DiseaseNames { file: PathBuf },

    /// Set property descriptions
    PropertyDescriptions { file: PathBuf },

    /// Delete a property category from one scope, common, or all
    Delete {
        #[arg(long)]
        category: String,
        #[arg(long)]
        scope: String,
        /// Extra canonical names to delete
        #[arg(long = "name")]
        names: Vec<String>,
    },

    /// List registered properties
    List {
        /// Disease ID or `common`
        #[arg(long)]
        scope: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            match err {
                PipelineError::Validation(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("warning: file logging disabled: {err}");
        }
    }

    let engine = SqliteGraphEngine::try_new(open_db(&cli.db)?)?;
    let registry_conn = open_db(&cli.db)?;
    let registry = SqlitePropertyRegistry::try_new(&registry_conn)?;
    let service = SeedService::new(engine, registry, &config)?;

    match cli.command {
        Command::SeedDense { file, disease } => {
            print_json(&service.seed_dense(&file, disease.as_deref())?)
        }
        Command::SeedSparse { file } => print_json(&service.seed_sparse(&file)?),
        Command::SeedInteractions {
            file,
            kind,
            id_type,
        } => print_json(&service.seed_interactions(&file, &kind, id_type.as_deref())?),
        Command::Reference { file } => print_json(&service.import_reference(&file)?),
        Command::DiseaseNames { file } => print_json(&Updated {
            updated: service.update_disease_names(&file)?,
        }),
        Command::PropertyDescriptions { file } => print_json(&Updated {
            updated: service.update_property_descriptions(&file)?,
        }),
        Command::Delete {
            category,
            scope,
            names,
        } => {
            let selector = DeletionSelector::parse(&category, &scope, &names)?;
            print_json(&service.delete(&selector)?)
        }
        Command::List { scope } => {
            let scope = scope.as_deref().and_then(Scope::parse);
            print_json(&service.list(scope.as_ref())?)
        }
    }
}

#[derive(Serialize)]
struct Updated {
    updated: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PipelineError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| PipelineError::Io(std::io::Error::other(err)))?;
    println!("{rendered}");
    Ok(())
}
