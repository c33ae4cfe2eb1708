//! Execution: applying plans to the graph engine and the registry.

pub mod deletion;
pub mod executor;
