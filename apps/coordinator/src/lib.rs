//! Swarm Coordinator Library
//!
//! Task-coordination core for a swarm of worker agents: agent and task
//! aggregates, repository ports with in-memory and PostgreSQL adapters, and
//! the coordination service that assigns work, cascades dependency
//! completions, retries failures and reports swarm health.

pub mod config;
pub mod coordination;
pub mod domain;
pub mod infrastructure;
