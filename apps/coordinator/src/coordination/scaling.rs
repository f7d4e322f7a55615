use serde::{Deserialize, Serialize};

use super::health::SwarmHealth;

/// Direction of a capacity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    None,
}

impl std::fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalingAction::ScaleUp => write!(f, "scale-up"),
            ScalingAction::ScaleDown => write!(f, "scale-down"),
            ScalingAction::None => write!(f, "none"),
        }
    }
}

/// Advisory capacity change; never applied by the coordinator itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingRecommendation {
    pub action: ScalingAction,
    pub count: usize,
    pub reason: String,
}

impl ScalingRecommendation {
    fn none() -> Self {
        Self {
            action: ScalingAction::None,
            count: 0,
            reason: "Current scaling is appropriate".to_string(),
        }
    }
}

/// Thresholds driving scaling recommendations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Queue depth that must be exceeded before scaling up
    pub scale_up_queue_depth: usize,
    /// Average utilization that must be exceeded before scaling up
    pub scale_up_utilization: f64,
    /// Queued tasks covered by each recommended new agent
    pub tasks_per_new_agent: usize,
    /// Average utilization below which an idle swarm scales down
    pub scale_down_utilization: f64,
    /// Fraction of the pool to remove when scaling down
    pub scale_down_fraction: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            scale_up_queue_depth: 10,
            scale_up_utilization: 0.8,
            tasks_per_new_agent: 5,
            scale_down_utilization: 0.2,
            scale_down_fraction: 0.3,
        }
    }
}

impl ScalingPolicy {
    /// Derives a recommendation from a health snapshot
    ///
    /// # Example
    /// ```
    /// use swarm_coordinator::coordination::health::{HealthThresholds, SwarmHealth};
    /// use swarm_coordinator::coordination::scaling::{ScalingAction, ScalingPolicy};
    /// use swarm_coordinator::domain::repositories::{AgentStatistics, TaskStatistics};
    ///
    /// let agents = AgentStatistics { total: 4, busy: 4, average_utilization: 0.85, ..Default::default() };
    /// let tasks = TaskStatistics { queued: 15, ..Default::default() };
    /// let health = SwarmHealth::assess(&agents, &tasks, 0, &HealthThresholds::default());
    ///
    /// let recommendation = ScalingPolicy::default().recommend(&health);
    /// assert_eq!(recommendation.action, ScalingAction::ScaleUp);
    /// assert_eq!(recommendation.count, 3);
    /// ```
    pub fn recommend(&self, health: &SwarmHealth) -> ScalingRecommendation {
        if health.queue_depth > self.scale_up_queue_depth
            && health.average_utilization > self.scale_up_utilization
        {
            return ScalingRecommendation {
                action: ScalingAction::ScaleUp,
                count: health.queue_depth.div_ceil(self.tasks_per_new_agent.max(1)),
                reason: "High queue depth with high agent utilization".to_string(),
            };
        }

        if health.queue_depth == 0 && health.average_utilization < self.scale_down_utilization {
            // Epsilon absorbs float error in products like n * 0.3 before flooring.
            let count = (health.total_agents as f64 * self.scale_down_fraction + 1e-9).floor() as usize;
            if count > 0 {
                return ScalingRecommendation {
                    action: ScalingAction::ScaleDown,
                    count,
                    reason: "Low utilization with empty queue".to_string(),
                };
            }
        }

        ScalingRecommendation::none()
    }
}
