//! Activity ledger - append-only rows of (user, object, activity type).
//!
//! Rows are never deleted. Undoing an activity flips its `cancelled` flag,
//! so every read here filters on the flag explicitly instead of treating
//! row presence as "active".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::strong_types::ActivityTypeCode;
use crate::error::AppResult;

/// Table name of the ledger
pub const ACTIVITY_TABLE: &str = "activity";

/// Value of the `cancelled` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelState {
    Active,
    Cancelled,
}

impl CancelState {
    pub fn flag(self) -> i32 {
        match self {
            CancelState::Active => 0,
            CancelState::Cancelled => 1,
        }
    }

    /// Anything other than 0 counts as cancelled
    pub fn from_flag(flag: i32) -> Self {
        if flag == 0 {
            CancelState::Active
        } else {
            CancelState::Cancelled
        }
    }
}

/// One ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub user_id: String,
    pub object_id: String,
    pub activity_type: ActivityTypeCode,
    pub cancelled: CancelState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    pub fn is_active(&self) -> bool {
        self.cancelled == CancelState::Active
    }
}

/// What a write did to a (user, object) relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowTransition {
    /// No row existed; a new active row was appended
    Inserted,
    /// A cancelled row was flipped back to active
    Reactivated,
    /// An active row was flipped to cancelled
    Cancelled,
    /// The relation was already in the requested state
    Unchanged,
}

impl FollowTransition {
    /// Change the transition applies to the follow counter
    pub fn counter_delta(self) -> i64 {
        match self {
            FollowTransition::Inserted | FollowTransition::Reactivated => 1,
            FollowTransition::Cancelled => -1,
            FollowTransition::Unchanged => 0,
        }
    }
}

/// Read surface of the ledger.
#[async_trait]
pub trait ActivityLedger: Send + Sync {
    /// Users with an active row on `object_id`. Order is unspecified.
    async fn find_user_ids(&self, object_id: &str, activity_type: ActivityTypeCode) -> AppResult<Vec<String>>;

    /// Objects `user_id` has an active row on. Order is unspecified.
    async fn find_object_ids(&self, user_id: &str, activity_type: ActivityTypeCode) -> AppResult<Vec<String>>;

    /// The newest row for the triple (highest id), active or not
    async fn find_one(
        &self,
        user_id: &str,
        object_id: &str,
        activity_type: ActivityTypeCode,
    ) -> AppResult<Option<ActivityRecord>>;

    /// Number of active rows on `object_id`
    async fn count_active(&self, object_id: &str, activity_type: ActivityTypeCode) -> AppResult<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_mapping() {
        assert_eq!(CancelState::from_flag(0), CancelState::Active);
        assert_eq!(CancelState::from_flag(1), CancelState::Cancelled);
        assert_eq!(CancelState::from_flag(CancelState::Cancelled.flag()), CancelState::Cancelled);
    }

    #[test]
    fn test_counter_delta() {
        assert_eq!(FollowTransition::Inserted.counter_delta(), 1);
        assert_eq!(FollowTransition::Reactivated.counter_delta(), 1);
        assert_eq!(FollowTransition::Cancelled.counter_delta(), -1);
        assert_eq!(FollowTransition::Unchanged.counter_delta(), 0);
    }
}
