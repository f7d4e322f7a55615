use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::agent::{Agent, AgentId, AgentStatus};
use crate::domain::repositories::{
    AgentRepository, AgentStatistics, RepositoryError, RepositoryResult,
};
use crate::domain::task::TaskId;

const AGENT_COLUMNS: &str = r#"
    id, status, capabilities, capacity, assigned_task_ids,
    registered_at, last_active_at
"#;

/// PostgreSQL implementation of AgentRepository
///
/// Persists Agent aggregates in the `agents` table. Capability and
/// assignment sets are stored as `TEXT[]` columns.
pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    /// Creates a new PostgresAgentRepository
    ///
    /// # Arguments
    /// * `pool` - SQLx connection pool for PostgreSQL
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn agent_from_row(row: &PgRow) -> RepositoryResult<Agent> {
    let id: String = row.try_get("id")?;
    let corrupt = |reason: String| RepositoryError::CorruptRecord {
        id: id.clone(),
        reason,
    };

    let status: AgentStatus = row.try_get("status")?;
    let capabilities: Vec<String> = row.try_get("capabilities")?;
    let capacity: i32 = row.try_get("capacity")?;
    let assigned: Vec<String> = row.try_get("assigned_task_ids")?;
    let registered_at: DateTime<Utc> = row.try_get("registered_at")?;
    let last_active_at: DateTime<Utc> = row.try_get("last_active_at")?;

    let capacity = u32::try_from(capacity)
        .map_err(|_| corrupt(format!("negative capacity {}", capacity)))?;
    let assigned_task_ids = assigned
        .into_iter()
        .map(TaskId::new)
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| corrupt(e.to_string()))?;
    let agent_id = AgentId::new(id.clone()).map_err(|e| corrupt(e.to_string()))?;

    Ok(Agent::from_persistence(
        agent_id,
        status,
        capabilities.into_iter().collect(),
        capacity,
        assigned_task_ids,
        registered_at,
        last_active_at,
    ))
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> RepositoryResult<()> {
        let capacity = i32::try_from(agent.capacity()).map_err(|_| RepositoryError::CorruptRecord {
            id: agent.id().to_string(),
            reason: format!("capacity {} out of range", agent.capacity()),
        })?;
        let capabilities: Vec<String> = agent.capabilities().iter().cloned().collect();
        let assigned: Vec<String> = agent
            .assigned_task_ids()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, status, capabilities, capacity, assigned_task_ids,
                registered_at, last_active_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                capabilities = EXCLUDED.capabilities,
                capacity = EXCLUDED.capacity,
                assigned_task_ids = EXCLUDED.assigned_task_ids,
                last_active_at = EXCLUDED.last_active_at
            "#,
        )
        .bind(agent.id().as_str())
        .bind(agent.status())
        .bind(capabilities)
        .bind(capacity)
        .bind(assigned)
        .bind(agent.registered_at())
        .bind(agent.last_active_at())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save agent: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AgentId) -> RepositoryResult<Option<Agent>> {
        let row = sqlx::query(&format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to find agent by id: {}", e)))?;

        row.as_ref().map(agent_from_row).transpose()
    }

    async fn find_available(&self) -> RepositoryResult<Vec<Agent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM agents
            WHERE status IN ('active', 'idle')
              AND cardinality(assigned_task_ids) < capacity
            ORDER BY id
            "#,
            AGENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to find available agents: {}", e)))?;

        rows.iter().map(agent_from_row).collect()
    }

    async fn get_statistics(&self) -> RepositoryResult<AgentStatistics> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status <> 'terminated') AS total,
                COUNT(*) FILTER (WHERE status = 'active') AS active,
                COUNT(*) FILTER (WHERE status = 'busy') AS busy,
                COUNT(*) FILTER (WHERE status = 'idle') AS idle,
                COUNT(*) FILTER (WHERE status = 'error') AS error,
                COUNT(*) FILTER (WHERE status = 'terminated') AS terminated,
                COALESCE(
                    AVG(LEAST(cardinality(assigned_task_ids)::float8 / capacity, 1.0))
                        FILTER (WHERE status <> 'terminated'),
                    0.0
                ) AS average_utilization
            FROM agents
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to load agent statistics: {}", e)))?;

        let count = |column: &str| -> RepositoryResult<usize> {
            let value: i64 = row.try_get(column)?;
            Ok(value.max(0) as usize)
        };

        Ok(AgentStatistics {
            total: count("total")?,
            active: count("active")?,
            busy: count("busy")?,
            idle: count("idle")?,
            error: count("error")?,
            terminated: count("terminated")?,
            average_utilization: row.try_get("average_utilization")?,
        })
    }
}
