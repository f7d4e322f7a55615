use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::repositories::{RepositoryResult, TaskRepository, TaskStatistics};
use crate::domain::task::{Task, TaskId, TaskStatus};

/// Running time after which a task is reported as timed out
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// In-memory implementation of TaskRepository
///
/// Clones share the same storage.
#[derive(Clone)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    timeout: Duration,
}

impl Default for InMemoryTaskRepository {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TASK_TIMEOUT)
    }
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &Task) -> RepositoryResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id().clone(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> RepositoryResult<Option<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(id).cloned())
    }

    async fn find_by_status(&self, status: TaskStatus) -> RepositoryResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|task| task.status() == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(matching)
    }

    async fn find_queued(&self) -> RepositoryResult<Vec<Task>> {
        let mut queued = self.find_by_status(TaskStatus::Queued).await?;
        // Stable sort keeps creation order within a priority
        queued.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Ok(queued)
    }

    async fn find_timed_out(&self) -> RepositoryResult<Vec<Task>> {
        let now = Utc::now();
        let tasks = self.tasks.read().await;

        Ok(tasks
            .values()
            .filter(|task| task.status() == TaskStatus::Running)
            .filter(|task| {
                task.started_at()
                    .and_then(|started| (now - started).to_std().ok())
                    .is_some_and(|elapsed| elapsed > self.timeout)
            })
            .cloned()
            .collect())
    }

    async fn get_statistics(&self) -> RepositoryResult<TaskStatistics> {
        let tasks = self.tasks.read().await;
        let mut stats = TaskStatistics {
            total: tasks.len(),
            ..Default::default()
        };

        for task in tasks.values() {
            match task.status() {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Queued => stats.queued += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
