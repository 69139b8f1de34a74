// Activity follow store - read and write paths for follow relations

// Core types and primitives
pub mod core;

// Infrastructure - database, ledger and activity type registry
pub mod infrastructure;

// Follow repositories
pub mod repo;

// Common utilities
pub mod app_state;
pub mod config;
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use error::{AppError, AppResult};
