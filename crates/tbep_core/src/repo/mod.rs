//! Storage-facing contracts and their SQLite implementations.
//!
//! # Responsibility
//! - `graph`: batched gene mutations (the graph engine).
//! - `registry`: canonical property names per scope plus their metadata.
//!
//! # Invariants
//! - Both components validate the schema version before use.
//! - Neither component retries a failed statement.

pub mod graph;
pub mod registry;
