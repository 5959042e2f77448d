//! MLab Orchestrator
//!
//! Routes train and test jobs to remote runners and tracks their lifecycle.
//!
//! - [`balancer`] picks runners and queues failed operations for retry
//! - [`service`] owns the job/result state machine and the task-run protocol
//! - [`repository`] persists jobs, results and queues
//! - [`api`] exposes the service over HTTP

pub mod api;
pub mod balancer;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod workspace;
