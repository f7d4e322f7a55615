use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::task::TaskId;

/// Why an assignment did not happen
///
/// These are expected outcomes in a concurrent scheduler and are returned as
/// data rather than errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentFailure {
    #[serde(rename = "Task not found")]
    TaskNotFound,
    #[serde(rename = "Task already assigned")]
    AlreadyAssigned,
    #[serde(rename = "Task is not assignable")]
    NotAssignable,
    #[serde(rename = "Dependencies not satisfied")]
    DependenciesNotSatisfied,
    #[serde(rename = "No available agents")]
    NoAvailableAgents,
}

impl std::fmt::Display for AssignmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentFailure::TaskNotFound => write!(f, "Task not found"),
            AssignmentFailure::AlreadyAssigned => write!(f, "Task already assigned"),
            AssignmentFailure::NotAssignable => write!(f, "Task is not assignable"),
            AssignmentFailure::DependenciesNotSatisfied => write!(f, "Dependencies not satisfied"),
            AssignmentFailure::NoAvailableAgents => write!(f, "No available agents"),
        }
    }
}

/// Outcome of [`super::CoordinationService::assign_task`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignmentResult {
    pub success: bool,
    pub task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<AssignmentFailure>,
}

impl TaskAssignmentResult {
    pub fn assigned(task_id: TaskId, agent_id: AgentId) -> Self {
        Self {
            success: true,
            task_id,
            agent_id: Some(agent_id),
            reason: None,
        }
    }

    pub fn rejected(task_id: TaskId, reason: AssignmentFailure) -> Self {
        Self {
            success: false,
            task_id,
            agent_id: None,
            reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejected_result_serializes_reason_text() {
        let result = TaskAssignmentResult::rejected(
            TaskId::new("t2").unwrap(),
            AssignmentFailure::DependenciesNotSatisfied,
        );

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": false,
                "task_id": "t2",
                "reason": "Dependencies not satisfied"
            })
        );
    }

    #[test]
    fn assigned_result_omits_reason() {
        let result =
            TaskAssignmentResult::assigned(TaskId::new("t1").unwrap(), AgentId::new("a1").unwrap());

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "success": true, "task_id": "t1", "agent_id": "a1" })
        );
    }

    #[test]
    fn display_matches_serialized_text() {
        for reason in [
            AssignmentFailure::TaskNotFound,
            AssignmentFailure::AlreadyAssigned,
            AssignmentFailure::NotAssignable,
            AssignmentFailure::DependenciesNotSatisfied,
            AssignmentFailure::NoAvailableAgents,
        ] {
            assert_eq!(serde_json::to_value(reason).unwrap(), json!(reason.to_string()));
        }
    }
}
