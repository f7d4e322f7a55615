use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::in_memory_task_repository::DEFAULT_TASK_TIMEOUT;
use crate::domain::agent::AgentId;
use crate::domain::repositories::{
    RepositoryError, RepositoryResult, TaskRepository, TaskStatistics,
};
use crate::domain::task::{Task, TaskId, TaskStatus};

const TASK_COLUMNS: &str = r#"
    id, task_type, status, dependencies, assigned_agent_id,
    priority, retry_count, max_retries, output, error,
    created_at, started_at, completed_at
"#;

/// PostgreSQL implementation of TaskRepository
///
/// Persists Task aggregates in the `tasks` table; dependencies are a
/// `TEXT[]` column and outputs are stored as JSONB.
pub struct PostgresTaskRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresTaskRepository {
    /// Creates a repository reporting tasks as timed out after five minutes
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeout(pool, DEFAULT_TASK_TIMEOUT)
    }

    pub fn with_timeout(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

fn task_from_row(row: &PgRow) -> RepositoryResult<Task> {
    let id: String = row.try_get("id")?;
    let corrupt = |reason: String| RepositoryError::CorruptRecord {
        id: id.clone(),
        reason,
    };

    let task_type: String = row.try_get("task_type")?;
    let status: TaskStatus = row.try_get("status")?;
    let dependencies: Vec<String> = row.try_get("dependencies")?;
    let assigned_agent_id: Option<String> = row.try_get("assigned_agent_id")?;
    let priority: i32 = row.try_get("priority")?;
    let retry_count: i32 = row.try_get("retry_count")?;
    let max_retries: i32 = row.try_get("max_retries")?;
    let output: Option<Value> = row.try_get("output")?;
    let error: Option<String> = row.try_get("error")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let started_at: Option<DateTime<Utc>> = row.try_get("started_at")?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at")?;

    let dependencies = dependencies
        .into_iter()
        .map(TaskId::new)
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| corrupt(e.to_string()))?;
    let assigned_agent_id = assigned_agent_id
        .map(AgentId::new)
        .transpose()
        .map_err(|e| corrupt(e.to_string()))?;
    let retry_count = u32::try_from(retry_count)
        .map_err(|_| corrupt(format!("negative retry_count {}", retry_count)))?;
    let max_retries = u32::try_from(max_retries)
        .map_err(|_| corrupt(format!("negative max_retries {}", max_retries)))?;
    let task_id = TaskId::new(id.clone()).map_err(|e| corrupt(e.to_string()))?;

    Ok(Task::from_persistence(
        task_id,
        task_type,
        status,
        dependencies,
        assigned_agent_id,
        priority,
        retry_count,
        max_retries,
        output,
        error,
        created_at,
        started_at,
        completed_at,
    ))
}

fn to_i32(task: &Task, field: &str, value: u32) -> RepositoryResult<i32> {
    i32::try_from(value).map_err(|_| RepositoryError::CorruptRecord {
        id: task.id().to_string(),
        reason: format!("{} {} out of range", field, value),
    })
}

impl PostgresTaskRepository {
    async fn fetch_where(&self, clause: &str, status: TaskStatus) -> RepositoryResult<Vec<Task>> {
        let rows = sqlx::query(&format!("SELECT {} FROM tasks {}", TASK_COLUMNS, clause))
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to query tasks: {}", e)))?;

        rows.iter().map(task_from_row).collect()
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn save(&self, task: &Task) -> RepositoryResult<()> {
        let dependencies: Vec<String> = task
            .dependencies()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, task_type, status, dependencies, assigned_agent_id,
                priority, retry_count, max_retries, output, error,
                created_at, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                assigned_agent_id = EXCLUDED.assigned_agent_id,
                priority = EXCLUDED.priority,
                retry_count = EXCLUDED.retry_count,
                max_retries = EXCLUDED.max_retries,
                output = EXCLUDED.output,
                error = EXCLUDED.error,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(task.id().as_str())
        .bind(task.task_type())
        .bind(task.status())
        .bind(dependencies)
        .bind(task.assigned_agent_id().map(|id| id.as_str().to_string()))
        .bind(task.priority())
        .bind(to_i32(task, "retry_count", task.retry_count())?)
        .bind(to_i32(task, "max_retries", task.max_retries())?)
        .bind(task.output().cloned())
        .bind(task.error().map(str::to_string))
        .bind(task.created_at())
        .bind(task.started_at())
        .bind(task.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save task: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> RepositoryResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to find task by id: {}", e)))?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_by_status(&self, status: TaskStatus) -> RepositoryResult<Vec<Task>> {
        self.fetch_where("WHERE status = $1 ORDER BY created_at, id", status)
            .await
    }

    async fn find_queued(&self) -> RepositoryResult<Vec<Task>> {
        self.fetch_where(
            "WHERE status = $1 ORDER BY priority DESC, created_at, id",
            TaskStatus::Queued,
        )
        .await
    }

    async fn find_timed_out(&self) -> RepositoryResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM tasks
            WHERE status = $1
              AND started_at < NOW() - make_interval(secs => $2)
            ORDER BY started_at
            "#,
            TASK_COLUMNS
        ))
        .bind(TaskStatus::Running)
        .bind(self.timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to find timed out tasks: {}", e)))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn get_statistics(&self) -> RepositoryResult<TaskStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'running') AS running,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM tasks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to load task statistics: {}", e)))?;

        let count = |column: &str| -> RepositoryResult<usize> {
            let value: i64 = row.try_get(column)?;
            Ok(value.max(0) as usize)
        };

        Ok(TaskStatistics {
            total: count("total")?,
            pending: count("pending")?,
            queued: count("queued")?,
            running: count("running")?,
            completed: count("completed")?,
            failed: count("failed")?,
        })
    }
}
