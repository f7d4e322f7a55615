// Task domain module
// Contains the task aggregate root, value objects, and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod task;
pub mod value_objects;

// Re-export main types for convenience
pub use events::TaskEvent;
pub use task::{Task, DEFAULT_MAX_RETRIES};
pub use value_objects::{RetryDecision, TaskId, TaskStatus};
