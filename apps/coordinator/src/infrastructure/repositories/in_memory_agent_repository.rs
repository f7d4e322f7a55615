use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::agent::{Agent, AgentId, AgentStatus};
use crate::domain::repositories::{AgentRepository, AgentStatistics, RepositoryResult};

/// In-memory implementation of AgentRepository
///
/// Clones share the same storage. Used by tests and single-process
/// deployments that do not need durability.
#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> RepositoryResult<()> {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id().clone(), agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> RepositoryResult<Option<Agent>> {
        let agents = self.agents.read().await;
        Ok(agents.get(id).cloned())
    }

    async fn find_available(&self) -> RepositoryResult<Vec<Agent>> {
        let agents = self.agents.read().await;
        let mut available: Vec<Agent> = agents
            .values()
            .filter(|agent| agent.is_available())
            .cloned()
            .collect();
        available.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(available)
    }

    async fn get_statistics(&self) -> RepositoryResult<AgentStatistics> {
        let agents = self.agents.read().await;
        let mut stats = AgentStatistics::default();
        let mut utilization_sum = 0.0;

        for agent in agents.values() {
            match agent.status() {
                AgentStatus::Active => stats.active += 1,
                AgentStatus::Busy => stats.busy += 1,
                AgentStatus::Idle => stats.idle += 1,
                AgentStatus::Error => stats.error += 1,
                AgentStatus::Terminated => {
                    stats.terminated += 1;
                    continue;
                }
            }
            stats.total += 1;
            utilization_sum += agent.utilization();
        }

        if stats.total > 0 {
            stats.average_utilization = utilization_sum / stats.total as f64;
        }
        Ok(stats)
    }
}
