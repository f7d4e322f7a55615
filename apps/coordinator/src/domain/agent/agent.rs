use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::AgentEvent;
use super::value_objects::{AgentId, AgentStatus};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::task::TaskId;

/// Agent aggregate root
///
/// One worker with a finite number of concurrent task slots.
///
/// # Invariants
/// - Capacity is at least 1
/// - `assigned_task_ids.len() <= capacity`
/// - Agents in `Error` or `Terminated` are never available for assignment
/// - Status transitions follow [`AgentStatus::can_transition_to`]
///
/// # Example
/// ```
/// use swarm_coordinator::domain::agent::{Agent, AgentId, AgentStatus};
///
/// let (agent, _event) = Agent::new(AgentId::new("a1").unwrap(), ["coding"], 2)
///     .expect("valid agent");
///
/// assert_eq!(agent.status(), AgentStatus::Idle);
/// assert!(agent.is_available());
/// assert_eq!(agent.utilization(), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    id: AgentId,
    status: AgentStatus,
    capabilities: BTreeSet<String>,
    capacity: u32,
    assigned_task_ids: BTreeSet<TaskId>,
    registered_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl Agent {
    /// Registers a new idle agent
    ///
    /// # Arguments
    /// * `id` - Identifier the worker registered with
    /// * `capabilities` - Capability tags supplied by the worker
    /// * `capacity` - Maximum concurrently assigned tasks (must be >= 1)
    pub fn new<I, S>(id: AgentId, capabilities: I, capacity: u32) -> DomainResult<(Self, AgentEvent)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if capacity == 0 {
            return Err(DomainError::InvalidCapacity);
        }

        let capabilities: BTreeSet<String> = capabilities
            .into_iter()
            .map(|c| c.into().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        let now = Utc::now();
        let agent = Self {
            id,
            status: AgentStatus::Idle,
            capabilities,
            capacity,
            assigned_task_ids: BTreeSet::new(),
            registered_at: now,
            last_active_at: now,
        };

        let event = AgentEvent::Registered {
            agent_id: agent.id.clone(),
            capabilities: agent.capabilities.iter().cloned().collect(),
            capacity,
        };

        Ok((agent, event))
    }

    /// Fraction of capacity in use, clamped to [0, 1]
    pub fn utilization(&self) -> f64 {
        (self.assigned_task_ids.len() as f64 / self.capacity as f64).clamp(0.0, 1.0)
    }

    /// Whether the agent may receive another task right now
    pub fn is_available(&self) -> bool {
        self.status.accepts_work() && self.load() < self.capacity
    }

    /// Number of tasks currently held
    pub fn load(&self) -> u32 {
        self.assigned_task_ids.len() as u32
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Takes a task slot
    ///
    /// # Business Rules
    /// - Agent must be active or idle with a free slot
    /// - Becomes `Busy` when the last slot fills, `Active` otherwise
    /// - Refreshes `last_active_at`
    pub fn assign_task(&mut self, task_id: TaskId) -> DomainResult<Option<AgentEvent>> {
        if !self.status.accepts_work() {
            return Err(DomainError::InvalidTransition {
                entity: "agent",
                from: self.status.to_string(),
                to: AgentStatus::Busy.to_string(),
            });
        }
        if self.load() >= self.capacity {
            return Err(DomainError::CapacityExceeded {
                agent_id: self.id.to_string(),
                capacity: self.capacity,
            });
        }

        self.assigned_task_ids.insert(task_id);
        self.last_active_at = Utc::now();
        let next = self.status_for_load();
        self.transition(next)
    }

    /// Frees the slot held by a task
    ///
    /// Returns `Ok(None)` without changes when the task was not held. An
    /// agent in `Error` keeps its status; a working agent drops to `Active`,
    /// or `Idle` once empty.
    pub fn release_task(&mut self, task_id: &TaskId) -> DomainResult<Option<AgentEvent>> {
        if !self.assigned_task_ids.remove(task_id) {
            return Ok(None);
        }
        self.last_active_at = Utc::now();

        if self.status == AgentStatus::Error {
            return Ok(None);
        }
        let next = self.status_for_load();
        self.transition(next)
    }

    /// Marks the agent as failing its health check
    pub fn mark_error(&mut self) -> DomainResult<Option<AgentEvent>> {
        self.transition(AgentStatus::Error)
    }

    /// Brings an errored agent back into rotation
    pub fn recover(&mut self) -> DomainResult<Option<AgentEvent>> {
        if self.status != AgentStatus::Error {
            return Err(DomainError::InvalidTransition {
                entity: "agent",
                from: self.status.to_string(),
                to: self.status_for_load().to_string(),
            });
        }
        let next = self.status_for_load();
        self.transition(next)
    }

    /// Deregisters the agent, handing back every task it held
    pub fn terminate(&mut self) -> DomainResult<AgentEvent> {
        self.transition(AgentStatus::Terminated)?;
        let released_tasks: Vec<TaskId> = std::mem::take(&mut self.assigned_task_ids)
            .into_iter()
            .collect();

        Ok(AgentEvent::Terminated {
            agent_id: self.id.clone(),
            released_tasks,
        })
    }

    fn status_for_load(&self) -> AgentStatus {
        match self.load() {
            0 => AgentStatus::Idle,
            n if n >= self.capacity => AgentStatus::Busy,
            _ => AgentStatus::Active,
        }
    }

    fn transition(&mut self, next: AgentStatus) -> DomainResult<Option<AgentEvent>> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                entity: "agent",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let from = std::mem::replace(&mut self.status, next);
        if from == next {
            return Ok(None);
        }
        Ok(Some(AgentEvent::StatusChanged {
            agent_id: self.id.clone(),
            from,
            to: next,
        }))
    }

    // ===== Getters =====

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn assigned_task_ids(&self) -> &BTreeSet<TaskId> {
        &self.assigned_task_ids
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    /// Reconstructs an Agent from persistence layer data
    ///
    /// Only to be used by repository implementations.
    pub fn from_persistence(
        id: AgentId,
        status: AgentStatus,
        capabilities: BTreeSet<String>,
        capacity: u32,
        assigned_task_ids: BTreeSet<TaskId>,
        registered_at: DateTime<Utc>,
        last_active_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            status,
            capabilities,
            capacity,
            assigned_task_ids,
            registered_at,
            last_active_at,
        }
    }
}
