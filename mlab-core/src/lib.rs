//! MLab Core
//!
//! Core types shared by the MLab orchestrator and the runner client.
//!
//! This crate contains:
//! - Domain types: Jobs, task results, models, datasets and runner availability
//! - DTOs: Job requests and the runner RPC wire contract

pub mod domain;
pub mod dto;
