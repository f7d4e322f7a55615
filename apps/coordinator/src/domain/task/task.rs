use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::TaskEvent;
use super::value_objects::{RetryDecision, TaskId, TaskStatus};
use crate::domain::agent::AgentId;
use crate::domain::errors::{DomainError, DomainResult};

/// Retry budget given to tasks that do not specify one
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Task aggregate root
///
/// One unit of schedulable work with dependencies and a bounded retry budget.
///
/// # Invariants
/// - Type cannot be empty and a task never depends on itself
/// - `Running` implies an assigned agent; no other status carries one
/// - `retry_count <= max_retries`
/// - Status transitions follow [`TaskStatus::can_transition_to`]
///
/// # Example
/// ```
/// use swarm_coordinator::domain::task::{Task, TaskId, TaskStatus};
///
/// let (task, _event) = Task::new(TaskId::new("t1").unwrap(), "implementation", [])
///     .expect("valid task");
///
/// assert_eq!(task.status(), TaskStatus::Pending);
/// assert_eq!(task.task_type(), "implementation");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    task_type: String,
    status: TaskStatus,
    dependencies: BTreeSet<TaskId>,
    assigned_agent_id: Option<AgentId>,
    priority: i32,
    retry_count: u32,
    max_retries: u32,
    output: Option<Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new pending task
    ///
    /// # Arguments
    /// * `id` - Caller-supplied identifier
    /// * `task_type` - Category used for capability matching
    /// * `dependencies` - Tasks that must complete before this one is queued
    ///
    /// # Returns
    /// * `Ok((Task, TaskEvent))` - New task and its `Submitted` event
    /// * `Err(DomainError)` - Empty type or self-dependency
    pub fn new(
        id: TaskId,
        task_type: impl Into<String>,
        dependencies: impl IntoIterator<Item = TaskId>,
    ) -> DomainResult<(Self, TaskEvent)> {
        let task_type = task_type.into();
        if task_type.trim().is_empty() {
            return Err(DomainError::EmptyTaskType);
        }

        let dependencies: BTreeSet<TaskId> = dependencies.into_iter().collect();
        if dependencies.contains(&id) {
            return Err(DomainError::SelfDependency(id.to_string()));
        }

        let task = Self {
            id,
            task_type,
            status: TaskStatus::Pending,
            dependencies,
            assigned_agent_id: None,
            priority: 0,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            output: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };

        let event = TaskEvent::Submitted {
            task_id: task.id.clone(),
            task_type: task.task_type.clone(),
        };

        Ok((task, event))
    }

    /// Sets the scheduling priority (higher is more urgent)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Checks the dependency set against a predicate telling whether a
    /// given task has completed
    pub fn dependencies_satisfied<F>(&self, is_completed: F) -> bool
    where
        F: Fn(&TaskId) -> bool,
    {
        self.dependencies.iter().all(is_completed)
    }

    /// Moves a pending task into the queue
    ///
    /// The caller is responsible for having verified the dependencies.
    pub fn queue(&mut self) -> DomainResult<TaskEvent> {
        self.transition(TaskStatus::Queued)?;
        Ok(TaskEvent::Queued {
            task_id: self.id.clone(),
        })
    }

    /// Assigns the task to an agent
    ///
    /// # Business Rules
    /// - Task must be pending or queued
    /// - Records the start timestamp
    pub fn start(&mut self, agent_id: AgentId) -> DomainResult<TaskEvent> {
        self.transition(TaskStatus::Running)?;
        self.assigned_agent_id = Some(agent_id.clone());
        self.started_at = Some(Utc::now());

        Ok(TaskEvent::Assigned {
            task_id: self.id.clone(),
            agent_id,
        })
    }

    /// Completes a running task, returning the agent that held it
    pub fn complete(&mut self, output: Value) -> DomainResult<(Option<AgentId>, TaskEvent)> {
        self.transition(TaskStatus::Completed)?;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());

        Ok((
            self.assigned_agent_id.take(),
            TaskEvent::Completed {
                task_id: self.id.clone(),
            },
        ))
    }

    /// Records a failure and applies the retry rule
    ///
    /// If `retry_count < max_retries` the count is incremented and the task
    /// becomes eligible again (queued, or still pending if it never left
    /// the dependency wait). Otherwise it fails permanently.
    ///
    /// # Returns
    /// * The retry decision
    /// * The agent whose slot must be released, if any
    /// * The event generated
    pub fn fail(
        &mut self,
        error: impl Into<String>,
    ) -> DomainResult<(RetryDecision, Option<AgentId>, TaskEvent)> {
        let error = error.into();

        if self.retry_count < self.max_retries {
            if self.status != TaskStatus::Pending {
                self.transition(TaskStatus::Queued)?;
            }
            self.retry_count += 1;
            self.error = Some(error.clone());
            self.started_at = None;
            let agent = self.assigned_agent_id.take();

            return Ok((
                RetryDecision::Requeued {
                    retry_count: self.retry_count,
                },
                agent,
                TaskEvent::Retrying {
                    task_id: self.id.clone(),
                    retry_count: self.retry_count,
                    error,
                },
            ));
        }

        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.clone());
        self.completed_at = Some(Utc::now());
        let agent = self.assigned_agent_id.take();

        Ok((
            RetryDecision::Exhausted,
            agent,
            TaskEvent::Failed {
                task_id: self.id.clone(),
                error,
            },
        ))
    }

    /// Returns a running task to the queue without consuming retry budget
    ///
    /// Used when the owning agent is deregistered.
    pub fn release(&mut self) -> DomainResult<(AgentId, TaskEvent)> {
        let agent_id = match (&self.status, &self.assigned_agent_id) {
            (TaskStatus::Running, Some(agent_id)) => agent_id.clone(),
            _ => {
                return Err(DomainError::InvalidTransition {
                    entity: "task",
                    from: self.status.to_string(),
                    to: TaskStatus::Queued.to_string(),
                })
            }
        };

        self.transition(TaskStatus::Queued)?;
        self.assigned_agent_id = None;
        self.started_at = None;

        Ok((
            agent_id.clone(),
            TaskEvent::Released {
                task_id: self.id.clone(),
                agent_id,
            },
        ))
    }

    fn transition(&mut self, next: TaskStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                entity: "task",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    // ===== Getters =====

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn dependencies(&self) -> &BTreeSet<TaskId> {
        &self.dependencies
    }

    /// Whether this task waits on the given task
    pub fn depends_on(&self, task_id: &TaskId) -> bool {
        self.dependencies.contains(task_id)
    }

    pub fn assigned_agent_id(&self) -> Option<&AgentId> {
        self.assigned_agent_id.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Reconstructs a Task from persistence layer data
    ///
    /// Bypasses validation since the data was validated before it was stored.
    /// Only to be used by repository implementations.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persistence(
        id: TaskId,
        task_type: String,
        status: TaskStatus,
        dependencies: BTreeSet<TaskId>,
        assigned_agent_id: Option<AgentId>,
        priority: i32,
        retry_count: u32,
        max_retries: u32,
        output: Option<Value>,
        error: Option<String>,
        created_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
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
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_id(id: &str) -> TaskId {
        TaskId::new(id).unwrap()
    }

    fn agent_id(id: &str) -> AgentId {
        AgentId::new(id).unwrap()
    }

    fn new_task(id: &str) -> Task {
        Task::new(task_id(id), "implementation", []).unwrap().0
    }

    #[test]
    fn create_task_starts_pending() {
        let (task, event) = Task::new(task_id("t1"), "review", [task_id("t0")]).unwrap();

        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.retry_count(), 0);
        assert_eq!(task.max_retries(), DEFAULT_MAX_RETRIES);
        assert!(task.depends_on(&task_id("t0")));
        assert!(task.assigned_agent_id().is_none());
        assert_eq!(
            event,
            TaskEvent::Submitted {
                task_id: task_id("t1"),
                task_type: "review".to_string(),
            }
        );
    }

    #[test]
    fn create_task_with_empty_type_fails() {
        let result = Task::new(task_id("t1"), "", []);
        assert_eq!(result.unwrap_err(), DomainError::EmptyTaskType);
    }

    #[test]
    fn create_task_depending_on_itself_fails() {
        let result = Task::new(task_id("t1"), "review", [task_id("t1")]);
        assert!(matches!(result, Err(DomainError::SelfDependency(_))));
    }

    #[test]
    fn start_sets_agent_and_timestamp() {
        let mut task = new_task("t1");
        task.queue().unwrap();
        task.start(agent_id("a1")).unwrap();

        assert_eq!(task.status(), TaskStatus::Running);
        assert_eq!(task.assigned_agent_id(), Some(&agent_id("a1")));
        assert!(task.started_at().is_some());
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut task = new_task("t1");
        task.start(agent_id("a1")).unwrap();

        let result = task.start(agent_id("a2"));
        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
        assert_eq!(task.assigned_agent_id(), Some(&agent_id("a1")));
    }

    #[test]
    fn complete_returns_owner_and_clears_assignment() {
        let mut task = new_task("t1");
        task.start(agent_id("a1")).unwrap();

        let (owner, event) = task.complete(json!({"ok": true})).unwrap();

        assert_eq!(owner, Some(agent_id("a1")));
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.output(), Some(&json!({"ok": true})));
        assert!(task.completed_at().is_some());
        assert!(task.assigned_agent_id().is_none());
        assert!(matches!(event, TaskEvent::Completed { .. }));
    }

    #[test]
    fn complete_queued_task_is_rejected() {
        let mut task = new_task("t1");
        task.queue().unwrap();

        assert!(task.complete(json!(null)).is_err());
    }

    #[test]
    fn fail_consumes_budget_then_exhausts() {
        let mut task = new_task("t1").with_max_retries(2);
        task.queue().unwrap();
        task.start(agent_id("a1")).unwrap();

        let (decision, owner, _) = task.fail("first").unwrap();
        assert_eq!(decision, RetryDecision::Requeued { retry_count: 1 });
        assert_eq!(owner, Some(agent_id("a1")));
        assert_eq!(task.status(), TaskStatus::Queued);
        assert!(task.assigned_agent_id().is_none());

        let (decision, owner, _) = task.fail("second").unwrap();
        assert_eq!(decision, RetryDecision::Requeued { retry_count: 2 });
        assert_eq!(owner, None);

        let (decision, _, event) = task.fail("third").unwrap();
        assert_eq!(decision, RetryDecision::Exhausted);
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.retry_count(), 2);
        assert_eq!(task.error(), Some("third"));
        assert!(matches!(event, TaskEvent::Failed { .. }));
    }

    #[test]
    fn fail_on_failed_task_is_rejected() {
        let mut task = new_task("t1").with_max_retries(0);
        task.fail("boom").unwrap();

        assert!(task.fail("again").is_err());
        assert_eq!(task.retry_count(), 0);
    }

    #[test]
    fn fail_on_pending_task_keeps_it_pending() {
        let mut task = Task::new(task_id("t2"), "review", [task_id("t1")])
            .unwrap()
            .0;

        let (decision, _, _) = task.fail("cancelled").unwrap();

        assert!(decision.is_requeued());
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.retry_count(), 1);
    }

    #[test]
    fn release_requeues_without_retry() {
        let mut task = new_task("t1");
        task.start(agent_id("a1")).unwrap();

        let (agent, _) = task.release().unwrap();

        assert_eq!(agent, agent_id("a1"));
        assert_eq!(task.status(), TaskStatus::Queued);
        assert_eq!(task.retry_count(), 0);
        assert!(task.assigned_agent_id().is_none());
    }

    #[test]
    fn release_unassigned_task_is_rejected() {
        let mut task = new_task("t1");
        assert!(task.release().is_err());
    }

    #[test]
    fn dependencies_satisfied_checks_every_dependency() {
        let (task, _) =
            Task::new(task_id("t3"), "review", [task_id("t1"), task_id("t2")]).unwrap();

        assert!(!task.dependencies_satisfied(|id| id.as_str() == "t1"));
        assert!(task.dependencies_satisfied(|_| true));
    }

    #[test]
    fn builder_methods_set_priority_and_budget() {
        let task = new_task("t1").with_priority(7).with_max_retries(5);

        assert_eq!(task.priority(), 7);
        assert_eq!(task.max_retries(), 5);
    }
}
