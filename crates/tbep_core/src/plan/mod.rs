//! Planning: classified input becomes batched, engine-ready mutations.
//!
//! # Responsibility
//! - Shape upsert and interaction batches capped at a configured size.
//! - Render plan artifacts for audit without persisting them.
//!
//! # Invariants
//! - Planners are pure over their input rows; no I/O besides reading records.

pub mod artifact;
pub mod batch;
pub mod interaction;
pub mod mutation;
