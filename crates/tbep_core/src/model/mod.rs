//! Domain model for the gene-centric property graph.
//!
//! # Responsibility
//! - Define canonical property naming (`Category`, `Scope`, `CanonicalName`).
//! - Define the gene record and property values written by the pipeline.
//! - Define the registry entry shape exposed to discovery callers.
//!
//! # Invariants
//! - A canonical name's scope is fully determined by its prefix.
//! - Categories form a closed set; rule tables may only rename into it.

pub mod canonical;
pub mod gene;
pub mod property;
