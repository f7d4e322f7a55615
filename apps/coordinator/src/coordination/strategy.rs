use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::domain::agent::Agent;
use crate::domain::task::Task;

/// Weight of current utilization in the capability-match score
const UTILIZATION_PENALTY: f64 = 0.5;

/// How an available agent is chosen for a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStrategy {
    /// Least-recently-active agent first
    RoundRobin,
    /// Lowest utilization first
    LeastLoaded,
    /// Best overlap between task requirements and agent capabilities
    #[default]
    CapabilityMatch,
    /// Uniformly random
    Random,
}

impl AssignmentStrategy {
    /// Picks one agent from `candidates`
    ///
    /// Candidates are expected to be available already. Returns `None` only
    /// when `candidates` is empty.
    pub fn select<'a>(&self, task: &Task, candidates: &'a [Agent]) -> Option<&'a Agent> {
        match self {
            AssignmentStrategy::RoundRobin => round_robin(candidates),
            AssignmentStrategy::LeastLoaded => least_loaded(candidates),
            AssignmentStrategy::CapabilityMatch => capability_match(task, candidates),
            AssignmentStrategy::Random => candidates.choose(&mut rand::rng()),
        }
    }
}

impl fmt::Display for AssignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStrategy::RoundRobin => write!(f, "round-robin"),
            AssignmentStrategy::LeastLoaded => write!(f, "least-loaded"),
            AssignmentStrategy::CapabilityMatch => write!(f, "capability-match"),
            AssignmentStrategy::Random => write!(f, "random"),
        }
    }
}

impl FromStr for AssignmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(AssignmentStrategy::RoundRobin),
            "least-loaded" => Ok(AssignmentStrategy::LeastLoaded),
            "capability-match" => Ok(AssignmentStrategy::CapabilityMatch),
            "random" => Ok(AssignmentStrategy::Random),
            other => Err(format!("Unknown assignment strategy: {}", other)),
        }
    }
}

/// Capabilities a task of the given type calls for
///
/// The type itself always counts as a capability; well-known types expand
/// to related skills.
///
/// # Example
/// ```
/// use swarm_coordinator::coordination::strategy::required_capabilities;
///
/// let caps = required_capabilities("review");
/// assert!(caps.contains("review"));
/// assert!(caps.contains("analysis"));
/// ```
pub fn required_capabilities(task_type: &str) -> BTreeSet<String> {
    let task_type = task_type.trim().to_lowercase();
    let expansion: &[&str] = match task_type.as_str() {
        "implementation" => &["coding", "testing"],
        "review" => &["review", "analysis"],
        "testing" => &["testing", "qa"],
        "documentation" => &["documentation", "writing"],
        "security" => &["security", "audit"],
        "performance" => &["performance", "optimization"],
        _ => &[],
    };

    let mut required: BTreeSet<String> = expansion.iter().map(|c| c.to_string()).collect();
    required.insert(task_type);
    required
}

/// Capability-match score: overlap minus a utilization penalty
pub fn capability_score(required: &BTreeSet<String>, agent: &Agent) -> f64 {
    let overlap = required.iter().filter(|c| agent.has_capability(c)).count();
    overlap as f64 - UTILIZATION_PENALTY * agent.utilization()
}

/// Candidates ordered by id so every tie resolves the same way
fn by_id(candidates: &[Agent]) -> Vec<&Agent> {
    let mut sorted: Vec<&Agent> = candidates.iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));
    sorted
}

fn round_robin(candidates: &[Agent]) -> Option<&Agent> {
    by_id(candidates)
        .into_iter()
        .min_by(|a, b| a.last_active_at().cmp(&b.last_active_at()))
}

fn least_loaded(candidates: &[Agent]) -> Option<&Agent> {
    by_id(candidates).into_iter().min_by(|a, b| {
        a.utilization()
            .partial_cmp(&b.utilization())
            .unwrap_or(Ordering::Equal)
    })
}

fn capability_match<'a>(task: &Task, candidates: &'a [Agent]) -> Option<&'a Agent> {
    let required = required_capabilities(task.task_type());

    let mut best: Option<(&Agent, f64)> = None;
    for agent in by_id(candidates) {
        let score = capability_score(&required, agent);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((agent, score));
        }
    }

    match best {
        Some((agent, score)) if score > 0.0 => Some(agent),
        _ => least_loaded(candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentId, AgentStatus};
    use crate::domain::task::TaskId;
    use chrono::{Duration, Utc};

    fn agent(id: &str, capabilities: &[&str], capacity: u32, load: u32, idle_minutes: i64) -> Agent {
        let assigned = (0..load)
            .map(|i| TaskId::new(format!("{}-held-{}", id, i)).unwrap())
            .collect();
        let status = if load == 0 {
            AgentStatus::Idle
        } else {
            AgentStatus::Active
        };
        Agent::from_persistence(
            AgentId::new(id).unwrap(),
            status,
            capabilities.iter().map(|c| c.to_string()).collect(),
            capacity,
            assigned,
            Utc::now() - Duration::hours(1),
            Utc::now() - Duration::minutes(idle_minutes),
        )
    }

    fn task(task_type: &str) -> Task {
        Task::new(TaskId::new("t1").unwrap(), task_type, []).unwrap().0
    }

    #[test]
    fn parse_and_display_round_trip() {
        for strategy in [
            AssignmentStrategy::RoundRobin,
            AssignmentStrategy::LeastLoaded,
            AssignmentStrategy::CapabilityMatch,
            AssignmentStrategy::Random,
        ] {
            assert_eq!(strategy.to_string().parse::<AssignmentStrategy>(), Ok(strategy));
        }
        assert!("fastest".parse::<AssignmentStrategy>().is_err());
    }

    #[test]
    fn default_is_capability_match() {
        assert_eq!(AssignmentStrategy::default(), AssignmentStrategy::CapabilityMatch);
    }

    #[test]
    fn expansion_table() {
        let caps = required_capabilities("implementation");
        assert_eq!(
            caps,
            ["coding", "implementation", "testing"]
                .iter()
                .map(|c| c.to_string())
                .collect::<BTreeSet<String>>()
        );

        let caps = required_capabilities("Performance");
        assert!(caps.contains("optimization"));

        let caps = required_capabilities("deploy");
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn round_robin_picks_least_recently_active() {
        let agents = vec![
            agent("a1", &[], 2, 0, 1),
            agent("a2", &[], 2, 0, 30),
            agent("a3", &[], 2, 0, 5),
        ];

        let chosen = AssignmentStrategy::RoundRobin.select(&task("x"), &agents);
        assert_eq!(chosen.unwrap().id().as_str(), "a2");
    }

    #[test]
    fn least_loaded_breaks_ties_by_id() {
        let agents = vec![
            agent("b", &[], 4, 1, 0),
            agent("c", &[], 4, 3, 0),
            agent("a", &[], 2, 1, 0),
            agent("d", &[], 4, 1, 0),
        ];

        let chosen = AssignmentStrategy::LeastLoaded.select(&task("x"), &agents);
        assert_eq!(chosen.unwrap().id().as_str(), "b");
    }

    #[test]
    fn capability_match_prefers_overlap() {
        let agents = vec![
            agent("a1", &["writing"], 2, 0, 0),
            agent("a2", &["coding", "testing"], 2, 1, 0),
            agent("a3", &["coding"], 2, 0, 0),
        ];

        // a2: 2 - 0.25 = 1.75, a3: 1 - 0 = 1
        let chosen = AssignmentStrategy::CapabilityMatch.select(&task("implementation"), &agents);
        assert_eq!(chosen.unwrap().id().as_str(), "a2");
    }

    #[test]
    fn capability_match_penalizes_utilization() {
        let agents = vec![
            agent("a1", &["review"], 4, 3, 0),
            agent("a2", &["analysis"], 4, 0, 0),
        ];

        // a1: 1 - 0.375, a2: 1 - 0
        let chosen = AssignmentStrategy::CapabilityMatch.select(&task("review"), &agents);
        assert_eq!(chosen.unwrap().id().as_str(), "a2");
    }

    #[test]
    fn capability_match_without_overlap_falls_back_to_least_loaded() {
        let agents = vec![
            agent("a1", &["writing"], 2, 1, 0),
            agent("a2", &["design"], 4, 1, 0),
        ];

        let chosen = AssignmentStrategy::CapabilityMatch.select(&task("security"), &agents);
        assert_eq!(chosen.unwrap().id().as_str(), "a2");
    }

    #[test]
    fn random_picks_a_candidate() {
        let agents = vec![agent("a1", &[], 1, 0, 0), agent("a2", &[], 1, 0, 0)];

        for _ in 0..20 {
            let chosen = AssignmentStrategy::Random.select(&task("x"), &agents).unwrap();
            assert!(["a1", "a2"].contains(&chosen.id().as_str()));
        }
    }

    #[test]
    fn every_strategy_returns_none_for_empty_pool() {
        for strategy in [
            AssignmentStrategy::RoundRobin,
            AssignmentStrategy::LeastLoaded,
            AssignmentStrategy::CapabilityMatch,
            AssignmentStrategy::Random,
        ] {
            assert!(strategy.select(&task("x"), &[]).is_none());
        }
    }
}
