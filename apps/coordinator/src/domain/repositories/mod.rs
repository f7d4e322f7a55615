// Repository contracts (ports)
// Implemented by adapters in crate::infrastructure::repositories

pub mod agent_repository;
pub mod errors;
pub mod task_repository;

pub use agent_repository::{AgentRepository, AgentStatistics};
pub use errors::{RepositoryError, RepositoryResult};
pub use task_repository::{TaskRepository, TaskStatistics};
