//! Follow repository - read side of follow relations.
//!
//! Answers who follows an object, what a user follows, whether one user
//! follows one object, and how many followers an object has according to
//! its denormalized counter. The ledger is the source of truth; the counter
//! is a cache that [`FollowRepo::reconcile_follow_amount`] can rebuild.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::core::object_type::{object_type_str_by_object_id, FollowableKind, ObjectType};
use crate::core::strong_types::{ActivityTypeCode, FOLLOW_ACTION};
use crate::error::{AppError, AppResult};
use crate::infrastructure::activity_type_registry::ActivityTypeResolver;
use crate::infrastructure::database::DatabaseInterface;

/// Where a single (user, object) follow relation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    NoRecord,
    Active,
    Cancelled,
}

impl FollowState {
    pub fn is_following(self) -> bool {
        self == FollowState::Active
    }
}

#[derive(Clone)]
pub struct FollowRepo {
    database: Arc<dyn DatabaseInterface>,
    activity_types: Arc<dyn ActivityTypeResolver>,
}

impl FollowRepo {
    pub fn new(database: Arc<dyn DatabaseInterface>, activity_types: Arc<dyn ActivityTypeResolver>) -> Self {
        Self { database, activity_types }
    }

    /// Cached follower count of an object.
    ///
    /// Only questions, users and tags have a counter; any other object type
    /// fails with [`AppError::NotFollowable`]. A missing row is
    /// [`AppError::NotFound`], never a zero count: callers used to a `0`
    /// for unknown objects must handle the error explicitly.
    #[instrument(skip(self))]
    pub async fn get_follow_amount(&self, object_id: &str) -> AppResult<i64> {
        let kind = FollowableKind::from_object_id(object_id)?;

        match self.database.get_follow_count(kind, object_id).await? {
            Some(follows) => Ok(follows),
            None => Err(AppError::NotFound(format!("{} {} not found", kind, object_id))),
        }
    }

    /// Users actively following an object. Empty when nobody does.
    #[instrument(skip(self))]
    pub async fn get_follow_user_ids(&self, object_id: &str) -> AppResult<Vec<String>> {
        let object_type = object_type_str_by_object_id(object_id)?;
        let activity_type = self
            .activity_types
            .get_activity_type_by_obj_key(object_type, FOLLOW_ACTION)
            .await?;

        let user_ids = self.database.find_user_ids(object_id, activity_type).await?;
        debug!("{} has {} active followers", object_id, user_ids.len());
        Ok(user_ids)
    }

    /// Objects of type `object_key` that a user actively follows. Empty when none.
    #[instrument(skip(self))]
    pub async fn get_follow_ids(&self, user_id: &str, object_key: &str) -> AppResult<Vec<String>> {
        let activity_type = self
            .activity_types
            .get_activity_type_by_obj_key(object_key, FOLLOW_ACTION)
            .await?;

        self.database.find_object_ids(user_id, activity_type).await
    }

    /// Whether a user currently follows an object. A cancelled row and no
    /// row at all both read as `false`.
    #[instrument(skip(self))]
    pub async fn is_followed(&self, user_id: &str, object_id: &str) -> AppResult<bool> {
        Ok(self.follow_state(user_id, object_id).await?.is_following())
    }

    /// Distinguishes the two ways of not following an object.
    pub async fn follow_state(&self, user_id: &str, object_id: &str) -> AppResult<FollowState> {
        let info = self
            .activity_types
            .get_activity_type_by_obj_id(object_id, FOLLOW_ACTION)
            .await?;

        let state = match self.database.find_one(user_id, object_id, info.code).await? {
            None => {
                debug!("no follow record for {} -> {}", user_id, object_id);
                FollowState::NoRecord
            }
            Some(record) if record.is_active() => FollowState::Active,
            Some(record) => {
                debug!("follow record {} for {} -> {} is cancelled", record.id, user_id, object_id);
                FollowState::Cancelled
            }
        };
        Ok(state)
    }

    /// Recount active followers from the ledger and overwrite the cached counter.
    #[instrument(skip(self))]
    pub async fn reconcile_follow_amount(&self, object_id: &str) -> AppResult<i64> {
        let kind = FollowableKind::from_object_id(object_id)?;
        let activity_type = self.follow_activity_type(kind.object_type()).await?;

        let counted = self.database.count_active(object_id, activity_type).await?;
        let cached = self.database.get_follow_count(kind, object_id).await?;

        match cached {
            None => return Err(AppError::NotFound(format!("{} {} not found", kind, object_id))),
            Some(cached) if cached != counted => {
                warn!(
                    "follow_count drift on {} {}: cached {}, ledger {}",
                    kind, object_id, cached, counted
                );
                self.database.set_follow_count(kind, object_id, counted).await?;
            }
            Some(_) => {}
        }
        Ok(counted)
    }

    async fn follow_activity_type(&self, object_type: ObjectType) -> AppResult<ActivityTypeCode> {
        self.activity_types
            .get_activity_type_by_obj_key(object_type.as_str(), FOLLOW_ACTION)
            .await
    }
}
