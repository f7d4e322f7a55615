use serde::{Deserialize, Serialize};

use super::value_objects::{AgentId, AgentStatus};
use crate::domain::task::TaskId;

/// Domain events emitted by the Agent aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A worker registered with the swarm
    Registered {
        agent_id: AgentId,
        capabilities: Vec<String>,
        capacity: u32,
    },
    /// The agent's status changed as a side effect of load or health
    StatusChanged {
        agent_id: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },
    /// The agent was deregistered; its tasks need re-queuing
    Terminated {
        agent_id: AgentId,
        released_tasks: Vec<TaskId>,
    },
}

impl AgentEvent {
    pub fn agent_id(&self) -> &AgentId {
        match self {
            AgentEvent::Registered { agent_id, .. }
            | AgentEvent::StatusChanged { agent_id, .. }
            | AgentEvent::Terminated { agent_id, .. } => agent_id,
        }
    }
}
