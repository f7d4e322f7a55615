use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Identifier of a worker agent
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an agent id from the identifier the worker registered with
    ///
    /// # Example
    /// ```
    /// use swarm_coordinator::domain::agent::AgentId;
    ///
    /// let id = AgentId::new("a1").expect("valid id");
    /// assert_eq!(id.to_string(), "a1");
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::EmptyIdentifier);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an agent
///
/// # Status Transitions
/// ```text
/// Idle <-> Active <-> Busy
///   \        |        /
///    +----> Error <--+      (Error -> Idle | Active on recovery)
///
/// any non-terminated status -> Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "agent_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Holding work with spare capacity
    Active,
    /// At capacity
    Busy,
    /// Registered with no work
    Idle,
    /// Failed a health check
    Error,
    /// Deregistered
    Terminated,
}

impl AgentStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use swarm_coordinator::domain::agent::AgentStatus;
    ///
    /// assert!(AgentStatus::Idle.can_transition_to(AgentStatus::Busy));
    /// assert!(!AgentStatus::Terminated.can_transition_to(AgentStatus::Idle));
    /// ```
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        matches!(
            (self, next),
            (Idle, Active)
                | (Idle, Busy)
                | (Active, Active)
                | (Active, Busy)
                | (Active, Idle)
                | (Busy, Active)
                | (Busy, Idle)
                | (Idle | Active | Busy, Error)
                | (Error, Idle)
                | (Error, Active)
                | (Error, Busy)
                | (Idle | Active | Busy | Error, Terminated)
        )
    }

    /// Whether agents in this status may receive new work
    pub fn accepts_work(&self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::Idle)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Terminated => write!(f, "terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_and_idle_accept_work() {
        assert!(AgentStatus::Active.accepts_work());
        assert!(AgentStatus::Idle.accepts_work());
        assert!(!AgentStatus::Busy.accepts_work());
        assert!(!AgentStatus::Error.accepts_work());
        assert!(!AgentStatus::Terminated.accepts_work());
    }

    #[test]
    fn terminated_is_absorbing() {
        for next in [
            AgentStatus::Active,
            AgentStatus::Busy,
            AgentStatus::Idle,
            AgentStatus::Error,
            AgentStatus::Terminated,
        ] {
            assert!(!AgentStatus::Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn error_reachable_from_working_states() {
        assert!(AgentStatus::Idle.can_transition_to(AgentStatus::Error));
        assert!(AgentStatus::Active.can_transition_to(AgentStatus::Error));
        assert!(AgentStatus::Busy.can_transition_to(AgentStatus::Error));
    }

    #[test]
    fn busy_cannot_go_busy_again() {
        assert!(!AgentStatus::Busy.can_transition_to(AgentStatus::Busy));
    }

    #[test]
    fn status_display_matches_serialized_form() {
        assert_eq!(AgentStatus::Busy.to_string(), "busy");
        assert_eq!(
            serde_json::to_value(AgentStatus::Terminated).unwrap(),
            serde_json::json!("terminated")
        );
    }
}
