use thiserror::Error;

use crate::domain::agent::AgentId;
use crate::domain::errors::DomainError;
use crate::domain::repositories::RepositoryError;
use crate::domain::task::TaskId;

/// Errors that abort a coordination operation
///
/// Scheduling-policy outcomes (missing task, unmet dependencies, no agents)
/// are not errors; see [`super::TaskAssignmentResult`].
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(AgentId),

    #[error("Task already exists: {0}")]
    TaskAlreadyExists(TaskId),

    #[error("Task {0} must be submitted in pending status")]
    TaskNotPending(TaskId),
}

pub type CoordinationResult<T> = Result<T, CoordinationError>;
