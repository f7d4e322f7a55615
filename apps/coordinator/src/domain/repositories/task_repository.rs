use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::RepositoryResult;
use crate::domain::task::{Task, TaskId, TaskStatus};

/// Task counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub pending: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Repository trait for Task aggregate
///
/// See [`super::AgentRepository`] for how two-record updates are kept
/// consistent without a shared transaction.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Save a task (insert or update)
    async fn save(&self, task: &Task) -> RepositoryResult<()>;

    /// Find a task by its ID
    async fn find_by_id(&self, id: &TaskId) -> RepositoryResult<Option<Task>>;

    /// Find all tasks in a given status
    async fn find_by_status(&self, status: TaskStatus) -> RepositoryResult<Vec<Task>>;

    /// Find tasks still waiting on dependencies
    async fn find_pending(&self) -> RepositoryResult<Vec<Task>> {
        self.find_by_status(TaskStatus::Pending).await
    }

    /// Find queued tasks, highest priority first, then oldest first
    async fn find_queued(&self) -> RepositoryResult<Vec<Task>>;

    /// Find running tasks that exceeded the adapter's timeout policy
    async fn find_timed_out(&self) -> RepositoryResult<Vec<Task>>;

    /// Aggregate task statistics
    async fn get_statistics(&self) -> RepositoryResult<TaskStatistics>;
}
