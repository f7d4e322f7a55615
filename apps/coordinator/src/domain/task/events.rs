use serde::{Deserialize, Serialize};

use super::value_objects::TaskId;
use crate::domain::agent::AgentId;

/// Domain events emitted by the Task aggregate
///
/// Returned from every task mutation and forwarded to subscribers of the
/// coordination service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Task was submitted
    Submitted { task_id: TaskId, task_type: String },
    /// Dependencies were satisfied and the task entered the queue
    Queued { task_id: TaskId },
    /// Task was handed to an agent
    Assigned { task_id: TaskId, agent_id: AgentId },
    /// Task finished successfully
    Completed { task_id: TaskId },
    /// Task failed but will be retried
    Retrying {
        task_id: TaskId,
        retry_count: u32,
        error: String,
    },
    /// Task was returned to the queue without consuming a retry
    Released { task_id: TaskId, agent_id: AgentId },
    /// Task failed permanently
    Failed { task_id: TaskId, error: String },
}

impl TaskEvent {
    /// Returns the task this event concerns
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::Submitted { task_id, .. }
            | TaskEvent::Queued { task_id }
            | TaskEvent::Assigned { task_id, .. }
            | TaskEvent::Completed { task_id }
            | TaskEvent::Retrying { task_id, .. }
            | TaskEvent::Released { task_id, .. }
            | TaskEvent::Failed { task_id, .. } => task_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_accessor_covers_variants() {
        let task_id = TaskId::new("t1").unwrap();
        let agent_id = AgentId::new("a1").unwrap();

        let events = vec![
            TaskEvent::Queued {
                task_id: task_id.clone(),
            },
            TaskEvent::Assigned {
                task_id: task_id.clone(),
                agent_id,
            },
            TaskEvent::Failed {
                task_id: task_id.clone(),
                error: "boom".to_string(),
            },
        ];

        for event in &events {
            assert_eq!(event.task_id(), &task_id);
        }
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = TaskEvent::Completed {
            task_id: TaskId::new("t9").unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "completed");
        assert_eq!(json["task_id"], "t9");
    }
}
