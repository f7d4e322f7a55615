use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::RepositoryResult;
use crate::domain::agent::{Agent, AgentId};

/// Aggregate counts over the agent pool
///
/// Terminated agents are excluded from `total` and from
/// `average_utilization`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatistics {
    pub total: usize,
    pub active: usize,
    pub busy: usize,
    pub idle: usize,
    pub error: usize,
    pub terminated: usize,
    pub average_utilization: f64,
}

/// Repository trait for Agent aggregate
///
/// Defines the contract for persisting and retrieving agents.
/// Implementations should handle storage-specific details.
///
/// Saves are not transactional with [`super::TaskRepository`]. The
/// coordination service writes the task first and, when the agent save
/// fails, writes the previous task state back; if that rollback also fails
/// the two records disagree until an operator reconciles them.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Save an agent (insert or update)
    async fn save(&self, agent: &Agent) -> RepositoryResult<()>;

    /// Find an agent by its ID
    async fn find_by_id(&self, id: &AgentId) -> RepositoryResult<Option<Agent>>;

    /// Find agents that are active or idle with spare capacity
    async fn find_available(&self) -> RepositoryResult<Vec<Agent>>;

    /// Aggregate pool statistics
    async fn get_statistics(&self) -> RepositoryResult<AgentStatistics>;
}
