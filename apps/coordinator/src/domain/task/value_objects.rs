use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Identifier of a task
///
/// # Invariants
/// - Never empty
/// - Immutable after construction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a task id from a caller-supplied string
    ///
    /// # Example
    /// ```
    /// use swarm_coordinator::domain::task::TaskId;
    ///
    /// let id = TaskId::new("t1").expect("valid id");
    /// assert_eq!(id.as_str(), "t1");
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::EmptyIdentifier);
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task
///
/// # Status Transitions
/// ```text
/// Pending -> Queued -> Running -> Completed
///    |                   |  \
///    +-------------------+   +--> Queued (retry / release)
///    |                   |
///    +-----> Failed <----+
/// ```
/// `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for dependencies
    Pending,
    /// Dependencies satisfied, waiting for an agent
    Queued,
    /// Assigned to an agent
    Running,
    /// Finished successfully
    Completed,
    /// Retry budget exhausted
    Failed,
}

impl TaskStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Valid Transitions
    /// - Pending -> Queued | Running | Failed
    /// - Queued -> Running | Queued | Failed
    /// - Running -> Completed | Queued | Failed
    ///
    /// # Example
    /// ```
    /// use swarm_coordinator::domain::task::TaskStatus;
    ///
    /// assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
    /// assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Queued));
    /// ```
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, Running)
                | (Pending, Failed)
                | (Queued, Running)
                | (Queued, Queued)
                | (Queued, Failed)
                | (Running, Completed)
                | (Running, Queued)
                | (Running, Failed)
        )
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of applying the retry rule to a failed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryDecision {
    /// Budget remained; the task is eligible for reassignment
    Requeued { retry_count: u32 },
    /// Budget exhausted; the task is permanently failed
    Exhausted,
}

impl RetryDecision {
    pub fn is_requeued(&self) -> bool {
        matches!(self, RetryDecision::Requeued { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transition_pending_to_queued() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Queued));
    }

    #[test]
    fn valid_transition_queued_to_running() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn valid_transition_running_back_to_queued() {
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Queued));
    }

    #[test]
    fn completed_is_absorbing() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Failed,
        ] {
            assert!(!TaskStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn failed_is_absorbing() {
        for next in [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
        ] {
            assert!(!TaskStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn invalid_transition_pending_to_completed() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn status_display_matches_serialized_form() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Queued,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.to_string())
            );
        }
    }

    #[test]
    fn empty_task_id_rejected() {
        assert_eq!(TaskId::new("  "), Err(DomainError::EmptyIdentifier));
    }
}
