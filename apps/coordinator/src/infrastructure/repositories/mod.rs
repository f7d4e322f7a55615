// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_agent_repository;
pub mod in_memory_task_repository;
pub mod postgres_agent_repository;
pub mod postgres_task_repository;

pub use in_memory_agent_repository::InMemoryAgentRepository;
pub use in_memory_task_repository::{InMemoryTaskRepository, DEFAULT_TASK_TIMEOUT};
pub use postgres_agent_repository::PostgresAgentRepository;
pub use postgres_task_repository::PostgresTaskRepository;
