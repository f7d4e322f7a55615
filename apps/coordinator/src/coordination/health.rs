use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::repositories::{AgentStatistics, TaskStatistics};

/// Thresholds used to flag an unhealthy swarm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Queued tasks tolerated per active agent before reporting a backlog
    pub backlog_per_agent: usize,
    /// Average utilization above which the pool is considered saturated
    pub high_utilization: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            backlog_per_agent: 10,
            high_utilization: 0.9,
        }
    }
}

/// Point-in-time health snapshot of the swarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmHealth {
    pub healthy: bool,
    pub total_agents: usize,
    /// Agents that are active or busy
    pub active_agents: usize,
    pub error_agents: usize,
    pub pending_tasks: usize,
    pub running_tasks: usize,
    /// Number of queued tasks
    pub queue_depth: usize,
    pub average_utilization: f64,
    pub timed_out_tasks: usize,
    pub issues: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl SwarmHealth {
    /// Builds a snapshot from repository statistics
    ///
    /// Every rule is evaluated independently and all triggered issues are
    /// reported.
    pub fn assess(
        agents: &AgentStatistics,
        tasks: &TaskStatistics,
        timed_out_tasks: usize,
        thresholds: &HealthThresholds,
    ) -> Self {
        let active_agents = agents.active + agents.busy;
        let queue_depth = tasks.queued;
        let mut issues = Vec::new();

        if agents.error > 0 {
            issues.push(format!("{} agents in error state", agents.error));
        }
        if queue_depth > active_agents * thresholds.backlog_per_agent {
            issues.push("Task queue backlog detected".to_string());
        }
        if agents.average_utilization > thresholds.high_utilization {
            issues.push("High agent utilization".to_string());
        }
        if timed_out_tasks > 0 {
            issues.push(format!("{} timed out tasks", timed_out_tasks));
        }

        Self {
            healthy: issues.is_empty(),
            total_agents: agents.total,
            active_agents,
            error_agents: agents.error,
            pending_tasks: tasks.pending,
            running_tasks: tasks.running,
            queue_depth,
            average_utilization: agents.average_utilization,
            timed_out_tasks,
            issues,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(active: usize, busy: usize, error: usize, utilization: f64) -> AgentStatistics {
        AgentStatistics {
            total: active + busy + error,
            active,
            busy,
            error,
            average_utilization: utilization,
            ..Default::default()
        }
    }

    fn tasks(queued: usize) -> TaskStatistics {
        TaskStatistics {
            queued,
            total: queued,
            ..Default::default()
        }
    }

    #[test]
    fn quiet_swarm_is_healthy() {
        let health = SwarmHealth::assess(&agents(3, 1, 0, 0.5), &tasks(5), 0, &Default::default());

        assert!(health.healthy);
        assert!(health.issues.is_empty());
        assert_eq!(health.active_agents, 4);
        assert_eq!(health.queue_depth, 5);
    }

    #[test]
    fn error_agents_reported_with_count() {
        let health = SwarmHealth::assess(&agents(2, 0, 2, 0.1), &tasks(0), 0, &Default::default());

        assert!(!health.healthy);
        assert_eq!(health.issues, vec!["2 agents in error state".to_string()]);
    }

    #[test]
    fn backlog_requires_strictly_more_than_ten_per_agent() {
        let at_limit = SwarmHealth::assess(&agents(2, 0, 0, 0.5), &tasks(20), 0, &Default::default());
        assert!(at_limit.healthy);

        let over = SwarmHealth::assess(&agents(2, 0, 0, 0.5), &tasks(21), 0, &Default::default());
        assert_eq!(over.issues, vec!["Task queue backlog detected".to_string()]);
    }

    #[test]
    fn any_queue_without_active_agents_is_a_backlog() {
        let health = SwarmHealth::assess(&agents(0, 0, 0, 0.0), &tasks(1), 0, &Default::default());
        assert!(health
            .issues
            .contains(&"Task queue backlog detected".to_string()));
    }

    #[test]
    fn all_issues_reported_together() {
        let health = SwarmHealth::assess(&agents(0, 1, 1, 0.95), &tasks(50), 3, &Default::default());

        assert_eq!(
            health.issues,
            vec![
                "1 agents in error state".to_string(),
                "Task queue backlog detected".to_string(),
                "High agent utilization".to_string(),
                "3 timed out tasks".to_string(),
            ]
        );
        assert!(!health.healthy);
    }

    #[test]
    fn custom_thresholds_apply() {
        let thresholds = HealthThresholds {
            backlog_per_agent: 1,
            high_utilization: 0.5,
        };
        let health = SwarmHealth::assess(&agents(2, 0, 0, 0.6), &tasks(3), 0, &thresholds);

        assert_eq!(health.issues.len(), 2);
    }
}
