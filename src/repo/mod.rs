// Repositories exposed to application services

pub mod follow_action_repo;
pub mod follow_repo;

pub use follow_action_repo::FollowActionRepo;
pub use follow_repo::{FollowRepo, FollowState};
