//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate ingest, planning and execution into caller-level operations.
//! - Keep callers (CLI, tests) decoupled from storage details.

pub mod seed_service;
