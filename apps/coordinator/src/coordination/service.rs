use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::assignment::{AssignmentFailure, TaskAssignmentResult};
use super::errors::{CoordinationError, CoordinationResult};
use super::events::SwarmEvent;
use super::health::{HealthThresholds, SwarmHealth};
use super::locks::StripedLocks;
use super::scaling::{ScalingPolicy, ScalingRecommendation};
use super::strategy::AssignmentStrategy;
use crate::domain::agent::{Agent, AgentEvent, AgentId, AgentStatus};
use crate::domain::repositories::{AgentRepository, TaskRepository};
use crate::domain::task::{Task, TaskEvent, TaskId, TaskStatus};

/// Tunables of the coordination service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    pub health: HealthThresholds,
    pub scaling: ScalingPolicy,
    /// Mutex stripes per entity kind
    pub lock_stripes: usize,
    /// Events buffered per subscriber before the oldest are dropped
    pub event_buffer: usize,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            health: HealthThresholds::default(),
            scaling: ScalingPolicy::default(),
            lock_stripes: 64,
            event_buffer: 1024,
        }
    }
}

/// Assigns tasks to agents and drives both through their lifecycles
///
/// The service is the only component that mutates task status, assignment
/// fields and retry counts. Every mutating operation holds the task's lock
/// (when a task is involved) before the agent's lock, and never holds two
/// locks of the same kind at once.
///
/// # Example
/// ```
/// use std::collections::HashSet;
/// use std::sync::Arc;
/// use swarm_coordinator::coordination::{AssignmentStrategy, CoordinationService};
/// use swarm_coordinator::domain::agent::AgentId;
/// use swarm_coordinator::domain::task::{Task, TaskId};
/// use swarm_coordinator::infrastructure::repositories::{
///     InMemoryAgentRepository, InMemoryTaskRepository,
/// };
///
/// # #[tokio::main]
/// # async fn main() {
/// let service = CoordinationService::new(
///     Arc::new(InMemoryAgentRepository::new()),
///     Arc::new(InMemoryTaskRepository::new()),
/// );
///
/// service
///     .register_agent(AgentId::new("a1").unwrap(), vec!["coding".to_string()], 1)
///     .await
///     .unwrap();
/// let (task, _) = Task::new(TaskId::new("t1").unwrap(), "implementation", []).unwrap();
/// service.submit_task(task).await.unwrap();
///
/// let result = service
///     .assign_task(&TaskId::new("t1").unwrap(), AssignmentStrategy::CapabilityMatch)
///     .await
///     .unwrap();
/// assert!(result.success);
/// # }
/// ```
pub struct CoordinationService {
    agents: Arc<dyn AgentRepository>,
    tasks: Arc<dyn TaskRepository>,
    config: CoordinationConfig,
    task_locks: StripedLocks,
    agent_locks: StripedLocks,
    events: broadcast::Sender<SwarmEvent>,
}

impl CoordinationService {
    /// Creates a service with default thresholds
    pub fn new(agents: Arc<dyn AgentRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self::with_config(agents, tasks, CoordinationConfig::default())
    }

    pub fn with_config(
        agents: Arc<dyn AgentRepository>,
        tasks: Arc<dyn TaskRepository>,
        config: CoordinationConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            agents,
            tasks,
            task_locks: StripedLocks::new(config.lock_stripes),
            agent_locks: StripedLocks::new(config.lock_stripes),
            config,
            events,
        }
    }

    /// Subscribes to task and agent events
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    // ===== Agent lifecycle =====

    /// Registers a worker as a new idle agent
    pub async fn register_agent(
        &self,
        id: AgentId,
        capabilities: Vec<String>,
        capacity: u32,
    ) -> CoordinationResult<Agent> {
        let _agent_guard = self.agent_locks.lock(id.as_str()).await;

        if self.agents.find_by_id(&id).await?.is_some() {
            return Err(CoordinationError::AgentAlreadyRegistered(id));
        }

        let (agent, event) = Agent::new(id, capabilities, capacity)?;
        self.agents.save(&agent).await?;

        info!(agent_id = %agent.id(), capacity, "Agent registered");
        self.publish(event);
        Ok(agent)
    }

    /// Takes an agent out of rotation after a failed health check
    ///
    /// Returns `false` when the agent is unknown, already errored or
    /// terminated.
    pub async fn mark_agent_error(&self, agent_id: &AgentId) -> CoordinationResult<bool> {
        let _agent_guard = self.agent_locks.lock(agent_id.as_str()).await;

        let Some(mut agent) = self.agents.find_by_id(agent_id).await? else {
            return Ok(false);
        };
        if matches!(agent.status(), AgentStatus::Error | AgentStatus::Terminated) {
            return Ok(false);
        }

        let event = agent.mark_error()?;
        self.agents.save(&agent).await?;

        warn!(agent_id = %agent_id, held_tasks = agent.load(), "Agent marked as errored");
        if let Some(event) = event {
            self.publish(event);
        }
        Ok(true)
    }

    /// Returns an errored agent to rotation
    pub async fn recover_agent(&self, agent_id: &AgentId) -> CoordinationResult<bool> {
        let _agent_guard = self.agent_locks.lock(agent_id.as_str()).await;

        let Some(mut agent) = self.agents.find_by_id(agent_id).await? else {
            return Ok(false);
        };
        if agent.status() != AgentStatus::Error {
            return Ok(false);
        }

        let event = agent.recover()?;
        self.agents.save(&agent).await?;

        info!(agent_id = %agent_id, status = %agent.status(), "Agent recovered");
        if let Some(event) = event {
            self.publish(event);
        }
        Ok(true)
    }

    /// Terminates an agent
    ///
    /// Returns the tasks it held, which the caller must hand to
    /// [`Self::release_task`] to re-queue. `None` when the agent is unknown.
    pub async fn deregister_agent(
        &self,
        agent_id: &AgentId,
    ) -> CoordinationResult<Option<Vec<TaskId>>> {
        let _agent_guard = self.agent_locks.lock(agent_id.as_str()).await;

        let Some(mut agent) = self.agents.find_by_id(agent_id).await? else {
            return Ok(None);
        };
        if agent.status() == AgentStatus::Terminated {
            return Ok(Some(Vec::new()));
        }

        let event = agent.terminate()?;
        self.agents.save(&agent).await?;

        let released = match &event {
            AgentEvent::Terminated { released_tasks, .. } => {
                released_tasks.clone()
            }
            _ => Vec::new(),
        };
        info!(agent_id = %agent_id, released = released.len(), "Agent deregistered");
        self.publish(event);
        Ok(Some(released))
    }

    // ===== Task lifecycle =====

    /// Persists a new task
    ///
    /// The task is queued right away when its dependencies are already
    /// completed, otherwise it stays pending until a completion cascades to
    /// it.
    pub async fn submit_task(&self, mut task: Task) -> CoordinationResult<Task> {
        let task_id = task.id().clone();
        let _task_guard = self.task_locks.lock(task_id.as_str()).await;

        if task.status() != TaskStatus::Pending {
            return Err(CoordinationError::TaskNotPending(task_id));
        }
        if self.tasks.find_by_id(&task_id).await?.is_some() {
            return Err(CoordinationError::TaskAlreadyExists(task_id));
        }

        let mut events = vec![TaskEvent::Submitted {
            task_id: task_id.clone(),
            task_type: task.task_type().to_string(),
        }];
        if self.dependencies_satisfied(&task).await? {
            events.push(task.queue()?);
        }
        self.tasks.save(&task).await?;

        // A dependency may have completed between the check and the save,
        // after its cascade already scanned the pending set.
        if task.status() == TaskStatus::Pending && self.dependencies_satisfied(&task).await? {
            events.push(task.queue()?);
            self.tasks.save(&task).await?;
        }

        info!(
            task_id = %task_id,
            task_type = task.task_type(),
            status = %task.status(),
            "Task submitted"
        );
        for event in events {
            self.publish(event);
        }
        Ok(task)
    }

    /// Assigns a task to an available agent chosen by `strategy`
    ///
    /// Policy outcomes (missing task, unmet dependencies, no agents) come
    /// back as an unsuccessful [`TaskAssignmentResult`]; only repository and
    /// invariant failures are errors.
    pub async fn assign_task(
        &self,
        task_id: &TaskId,
        strategy: AssignmentStrategy,
    ) -> CoordinationResult<TaskAssignmentResult> {
        let _task_guard = self.task_locks.lock(task_id.as_str()).await;

        let Some(mut task) = self.tasks.find_by_id(task_id).await? else {
            return Ok(self.reject(task_id, AssignmentFailure::TaskNotFound));
        };
        match task.status() {
            TaskStatus::Running => {
                return Ok(self.reject(task_id, AssignmentFailure::AlreadyAssigned));
            }
            TaskStatus::Completed | TaskStatus::Failed => {
                return Ok(self.reject(task_id, AssignmentFailure::NotAssignable));
            }
            TaskStatus::Pending | TaskStatus::Queued => {}
        }
        if !self.dependencies_satisfied(&task).await? {
            return Ok(self.reject(task_id, AssignmentFailure::DependenciesNotSatisfied));
        }

        let mut candidates: Vec<Agent> = self
            .agents
            .find_available()
            .await?
            .into_iter()
            .filter(Agent::is_available)
            .collect();

        loop {
            let Some(agent_id) = strategy
                .select(&task, &candidates)
                .map(|agent| agent.id().clone())
            else {
                return Ok(self.reject(task_id, AssignmentFailure::NoAvailableAgents));
            };

            let _agent_guard = self.agent_locks.lock(agent_id.as_str()).await;

            // The candidate list is a snapshot; re-read under the lock.
            let mut agent = match self.agents.find_by_id(&agent_id).await? {
                Some(agent) if agent.is_available() => agent,
                _ => {
                    debug!(task_id = %task_id, agent_id = %agent_id, "Candidate no longer available");
                    candidates.retain(|candidate| candidate.id() != &agent_id);
                    continue;
                }
            };

            let before = task.clone();
            let task_event = task.start(agent_id.clone())?;
            let agent_event = agent.assign_task(task_id.clone())?;

            self.tasks.save(&task).await?;
            if let Err(e) = self.agents.save(&agent).await {
                self.restore_task(&before).await;
                return Err(e.into());
            }

            info!(
                task_id = %task_id,
                agent_id = %agent_id,
                strategy = %strategy,
                utilization = agent.utilization(),
                "Task assigned"
            );
            self.publish(task_event);
            if let Some(event) = agent_event {
                self.publish(event);
            }
            return Ok(TaskAssignmentResult::assigned(task_id.clone(), agent_id));
        }
    }

    /// Assigns queued tasks in priority order until agents run out
    pub async fn dispatch_queued(
        &self,
        strategy: AssignmentStrategy,
    ) -> CoordinationResult<Vec<TaskAssignmentResult>> {
        let mut results = Vec::new();

        for task in self.tasks.find_queued().await? {
            let result = self.assign_task(task.id(), strategy).await?;
            let exhausted = result.reason == Some(AssignmentFailure::NoAvailableAgents);
            results.push(result);
            if exhausted {
                break;
            }
        }

        Ok(results)
    }

    /// Records a successful execution and queues newly unblocked dependents
    ///
    /// Unknown or unassigned tasks are ignored.
    pub async fn process_task_completion(
        &self,
        task_id: &TaskId,
        output: Value,
    ) -> CoordinationResult<()> {
        {
            let _task_guard = self.task_locks.lock(task_id.as_str()).await;

            let Some(mut task) = self.tasks.find_by_id(task_id).await? else {
                debug!(task_id = %task_id, "Completion for unknown task ignored");
                return Ok(());
            };
            if task.status() != TaskStatus::Running || task.assigned_agent_id().is_none() {
                debug!(task_id = %task_id, status = %task.status(), "Completion for unassigned task ignored");
                return Ok(());
            }

            let before = task.clone();
            let (owner, event) = task.complete(output)?;
            self.tasks.save(&task).await?;
            if let Some(agent_id) = owner {
                self.release_or_restore(&agent_id, &before).await?;
            }

            info!(task_id = %task_id, "Task completed");
            self.publish(event);
        }

        let queued = self.cascade_completion(task_id).await?;
        if !queued.is_empty() {
            info!(task_id = %task_id, unblocked = queued.len(), "Dependents queued");
        }
        Ok(())
    }

    /// Records a failed execution and applies the retry rule
    ///
    /// # Returns
    /// * `Ok(true)` - the task is eligible for reassignment
    /// * `Ok(false)` - the task is unknown or has permanently failed
    pub async fn process_task_failure(
        &self,
        task_id: &TaskId,
        error: impl Into<String>,
    ) -> CoordinationResult<bool> {
        let _task_guard = self.task_locks.lock(task_id.as_str()).await;

        let Some(mut task) = self.tasks.find_by_id(task_id).await? else {
            return Ok(false);
        };
        if task.status().is_terminal() {
            debug!(task_id = %task_id, status = %task.status(), "Failure for finished task ignored");
            return Ok(false);
        }

        let before = task.clone();
        let (decision, owner, event) = task.fail(error)?;
        self.tasks.save(&task).await?;
        if let Some(agent_id) = owner {
            self.release_or_restore(&agent_id, &before).await?;
        }

        if decision.is_requeued() {
            info!(
                task_id = %task_id,
                retry_count = task.retry_count(),
                max_retries = task.max_retries(),
                "Task failed, retrying"
            );
        } else {
            warn!(task_id = %task_id, error = task.error().unwrap_or_default(), "Task failed permanently");
        }
        self.publish(event);
        Ok(decision.is_requeued())
    }

    /// Returns a running task to the queue without consuming a retry
    ///
    /// Returns `false` when the task is unknown or not running.
    pub async fn release_task(&self, task_id: &TaskId) -> CoordinationResult<bool> {
        let _task_guard = self.task_locks.lock(task_id.as_str()).await;

        let Some(mut task) = self.tasks.find_by_id(task_id).await? else {
            return Ok(false);
        };
        if task.status() != TaskStatus::Running {
            return Ok(false);
        }

        let before = task.clone();
        let (agent_id, event) = task.release()?;
        self.tasks.save(&task).await?;
        self.release_or_restore(&agent_id, &before).await?;

        info!(task_id = %task_id, agent_id = %agent_id, "Task released back to queue");
        self.publish(event);
        Ok(true)
    }

    // ===== Monitoring =====

    /// Aggregates repository statistics into a health snapshot
    ///
    /// Reads without locks; the snapshot may trail in-flight mutations.
    pub async fn get_swarm_health(&self) -> CoordinationResult<SwarmHealth> {
        let agent_stats = self.agents.get_statistics().await?;
        let task_stats = self.tasks.get_statistics().await?;
        let timed_out = self.tasks.find_timed_out().await?.len();

        let health = SwarmHealth::assess(&agent_stats, &task_stats, timed_out, &self.config.health);
        debug!(
            healthy = health.healthy,
            queue_depth = health.queue_depth,
            average_utilization = health.average_utilization,
            "Swarm health assessed"
        );
        Ok(health)
    }

    /// Advises on adding or removing agents; never changes state
    pub async fn calculate_scaling_recommendation(
        &self,
    ) -> CoordinationResult<ScalingRecommendation> {
        let health = self.get_swarm_health().await?;
        Ok(self.config.scaling.recommend(&health))
    }

    // ===== Internals =====

    async fn dependencies_satisfied(&self, task: &Task) -> CoordinationResult<bool> {
        let mut completed = HashSet::new();
        for dependency in task.dependencies() {
            match self.tasks.find_by_id(dependency).await? {
                Some(dep) if dep.status() == TaskStatus::Completed => {
                    completed.insert(dependency.clone());
                }
                // One unmet dependency settles it
                _ => return Ok(false),
            }
        }
        Ok(task.dependencies_satisfied(|id| completed.contains(id)))
    }

    /// Frees the agent slot of a task whose new state is already saved,
    /// putting the task record back to `before` if the agent side fails
    async fn release_or_restore(&self, agent_id: &AgentId, before: &Task) -> CoordinationResult<()> {
        if let Err(e) = self.release_agent_slot(agent_id, before.id()).await {
            self.restore_task(before).await;
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort compensation after the agent half of a two-record update
    /// failed
    async fn restore_task(&self, before: &Task) {
        match self.tasks.save(before).await {
            Ok(()) => warn!(task_id = %before.id(), status = %before.status(), "Task update rolled back"),
            Err(e) => error!(
                task_id = %before.id(),
                error = %e,
                "Task update could not be rolled back; task and agent records disagree"
            ),
        }
    }

    async fn release_agent_slot(&self, agent_id: &AgentId, task_id: &TaskId) -> CoordinationResult<()> {
        let _agent_guard = self.agent_locks.lock(agent_id.as_str()).await;

        let Some(mut agent) = self.agents.find_by_id(agent_id).await? else {
            debug!(agent_id = %agent_id, task_id = %task_id, "Owning agent gone; nothing to release");
            return Ok(());
        };

        let event = agent.release_task(task_id)?;
        self.agents.save(&agent).await?;
        if let Some(event) = event {
            self.publish(event);
        }
        Ok(())
    }

    /// Queues every pending dependent of `completed` whose dependencies are
    /// now all completed
    ///
    /// Each dependent is re-read under its own lock and only moved while
    /// still pending, so a completion queues it at most once.
    async fn cascade_completion(&self, completed: &TaskId) -> CoordinationResult<Vec<TaskId>> {
        let dependents: Vec<TaskId> = self
            .tasks
            .find_pending()
            .await?
            .into_iter()
            .filter(|task| task.depends_on(completed))
            .map(|task| task.id().clone())
            .collect();

        let mut queued = Vec::new();
        for dependent_id in dependents {
            let _task_guard = self.task_locks.lock(dependent_id.as_str()).await;

            let Some(mut dependent) = self.tasks.find_by_id(&dependent_id).await? else {
                continue;
            };
            if dependent.status() != TaskStatus::Pending
                || !self.dependencies_satisfied(&dependent).await?
            {
                continue;
            }

            let event = dependent.queue()?;
            self.tasks.save(&dependent).await?;
            debug!(task_id = %dependent_id, after = %completed, "Dependent task queued");
            self.publish(event);
            queued.push(dependent_id);
        }

        Ok(queued)
    }

    fn reject(&self, task_id: &TaskId, reason: AssignmentFailure) -> TaskAssignmentResult {
        debug!(task_id = %task_id, reason = %reason, "Task not assigned");
        TaskAssignmentResult::rejected(task_id.clone(), reason)
    }

    fn publish(&self, event: impl Into<SwarmEvent>) {
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event.into());
    }
}
