use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentEvent;
use crate::domain::task::TaskEvent;

/// Event published to subscribers of the coordination service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum SwarmEvent {
    Task(TaskEvent),
    Agent(AgentEvent),
}

impl From<TaskEvent> for SwarmEvent {
    fn from(event: TaskEvent) -> Self {
        SwarmEvent::Task(event)
    }
}

impl From<AgentEvent> for SwarmEvent {
    fn from(event: AgentEvent) -> Self {
        SwarmEvent::Agent(event)
    }
}
