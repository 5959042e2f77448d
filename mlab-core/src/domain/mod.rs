//! Core domain types
//!
//! These types represent the entities the orchestrator persists (jobs, task
//! results, the model/dataset catalog) and the availability reported by runners.

pub mod catalog;
pub mod job;
pub mod result;
pub mod runner;
