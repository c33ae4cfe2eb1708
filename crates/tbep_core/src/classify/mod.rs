//! Header normalization: raw CSV headers to canonical property names.
//!
//! # Responsibility
//! - Hold injected rule tables (`rules`).
//! - Classify single headers (`classifier`) and whole header rows (`mapping`).
//!
//! # Invariants
//! - Rule tables are immutable once a classifier is built.
//! - Dropped headers are warnings; ambiguity and emptiness are fatal.

pub mod classifier;
pub mod mapping;
pub mod rules;
