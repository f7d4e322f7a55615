use thiserror::Error;

/// Errors raised when an aggregate refuses a mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid {entity} state transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Agent capacity must be at least 1")]
    InvalidCapacity,

    #[error("Agent {agent_id} is at capacity ({capacity})")]
    CapacityExceeded { agent_id: String, capacity: u32 },

    #[error("Task type cannot be empty")]
    EmptyTaskType,

    #[error("Task {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("Identifier cannot be empty")]
    EmptyIdentifier,
}

pub type DomainResult<T> = Result<T, DomainError>;
