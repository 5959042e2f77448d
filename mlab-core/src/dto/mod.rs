//! Data Transfer Objects
//!
//! DTOs exchanged with API callers (`job`), with runners over RPC (`task`)
//! and with runner discovery sources (`runner`).

pub mod job;
pub mod runner;
pub mod task;
