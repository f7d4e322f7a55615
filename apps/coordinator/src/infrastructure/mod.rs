// Infrastructure layer module
// Storage adapters for the coordination ports
// Follows Hexagonal Architecture

pub mod repositories;
