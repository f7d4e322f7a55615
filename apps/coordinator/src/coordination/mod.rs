// Coordination Layer
// Application services that schedule tasks onto agents

pub mod assignment;
pub mod errors;
pub mod events;
pub mod health;
pub(crate) mod locks;
pub mod scaling;
pub mod service;
pub mod strategy;

pub use assignment::{AssignmentFailure, TaskAssignmentResult};
pub use errors::{CoordinationError, CoordinationResult};
pub use events::SwarmEvent;
pub use health::{HealthThresholds, SwarmHealth};
pub use scaling::{ScalingAction, ScalingPolicy, ScalingRecommendation};
pub use service::{CoordinationConfig, CoordinationService};
pub use strategy::AssignmentStrategy;
