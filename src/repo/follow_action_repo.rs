//! Follow write path. Each call is one transaction covering the ledger row
//! and the object's follow counter.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::core::object_type::FollowableKind;
use crate::core::strong_types::{ActivityTypeCode, FOLLOW_ACTION};
use crate::error::{AppError, AppResult};
use crate::infrastructure::activity_ledger::FollowTransition;
use crate::infrastructure::activity_type_registry::ActivityTypeResolver;
use crate::infrastructure::database::DatabaseInterface;

#[derive(Clone)]
pub struct FollowActionRepo {
    database: Arc<dyn DatabaseInterface>,
    activity_types: Arc<dyn ActivityTypeResolver>,
}

impl FollowActionRepo {
    pub fn new(database: Arc<dyn DatabaseInterface>, activity_types: Arc<dyn ActivityTypeResolver>) -> Self {
        Self { database, activity_types }
    }

    /// Start following. Re-following reactivates the original row.
    #[instrument(skip(self))]
    pub async fn follow(&self, user_id: &str, object_id: &str) -> AppResult<FollowTransition> {
        validate_ids(user_id, object_id)?;
        let (kind, activity_type) = self.resolve(object_id).await?;

        let transition = self
            .database
            .activate_follow(user_id, object_id, kind, activity_type)
            .await?;
        info!("{} follow {}: {:?}", user_id, object_id, transition);
        Ok(transition)
    }

    /// Stop following. The row stays, flagged as cancelled.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, user_id: &str, object_id: &str) -> AppResult<FollowTransition> {
        validate_ids(user_id, object_id)?;
        let (kind, activity_type) = self.resolve(object_id).await?;

        let transition = self
            .database
            .cancel_follow(user_id, object_id, kind, activity_type)
            .await?;
        info!("{} unfollow {}: {:?}", user_id, object_id, transition);
        Ok(transition)
    }

    /// Classify the object once, then look the follow activity up by its type key
    async fn resolve(&self, object_id: &str) -> AppResult<(FollowableKind, ActivityTypeCode)> {
        let kind = FollowableKind::from_object_id(object_id)?;
        let code = self
            .activity_types
            .get_activity_type_by_obj_key(kind.object_type().as_str(), FOLLOW_ACTION)
            .await?;
        Ok((kind, code))
    }
}

fn validate_ids(user_id: &str, object_id: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("user id must not be empty".to_string()));
    }
    if object_id.trim().is_empty() {
        return Err(AppError::Validation("object id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::activity_ledger::ActivityLedger;
    use crate::infrastructure::activity_type_registry::{ActivityTypeInfo, ActivityTypeRegistry};
    use crate::infrastructure::sqlite_database::SqliteDatabase;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry wrapper that counts how the write path resolves activity types
    struct CountingResolver {
        registry: ActivityTypeRegistry,
        by_key: AtomicUsize,
        by_id: AtomicUsize,
    }

    #[async_trait]
    impl ActivityTypeResolver for CountingResolver {
        async fn get_activity_type_by_obj_key(&self, object_key: &str, action: &str) -> AppResult<ActivityTypeCode> {
            self.by_key.fetch_add(1, Ordering::SeqCst);
            self.registry.get_activity_type_by_obj_key(object_key, action).await
        }

        async fn get_activity_type_by_obj_id(&self, object_id: &str, action: &str) -> AppResult<ActivityTypeInfo> {
            self.by_id.fetch_add(1, Ordering::SeqCst);
            self.registry.get_activity_type_by_obj_id(object_id, action).await
        }
    }

    #[tokio::test]
    async fn test_follow_resolves_activity_type_from_classified_kind() {
        let database = Arc::new(SqliteDatabase::new_in_memory().await.unwrap());
        database.create_followable(FollowableKind::Tag, "10030000000000001").await.unwrap();

        let resolver = Arc::new(CountingResolver {
            registry: ActivityTypeRegistry::new(),
            by_key: AtomicUsize::new(0),
            by_id: AtomicUsize::new(0),
        });
        let repo = FollowActionRepo::new(database.clone(), resolver.clone());

        assert_eq!(repo.follow("u1", "10030000000000001").await.unwrap(), FollowTransition::Inserted);
        assert_eq!(repo.unfollow("u1", "10030000000000001").await.unwrap(), FollowTransition::Cancelled);
        assert_eq!(resolver.by_key.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.by_id.load(Ordering::SeqCst), 0);

        let tag_follow = ActivityTypeRegistry::new().resolve("tag", "follow").unwrap().code;
        let record = database.find_one("u1", "10030000000000001", tag_follow).await.unwrap().unwrap();
        assert!(!record.is_active());
    }

    #[tokio::test]
    async fn test_unfollowable_object_fails_before_any_lookup() {
        let database = Arc::new(SqliteDatabase::new_in_memory().await.unwrap());
        let resolver = Arc::new(CountingResolver {
            registry: ActivityTypeRegistry::new(),
            by_key: AtomicUsize::new(0),
            by_id: AtomicUsize::new(0),
        });
        let repo = FollowActionRepo::new(database, resolver.clone());

        let err = repo.follow("u1", "10070000000000001").await.unwrap_err();
        assert!(matches!(err, AppError::NotFollowable(_)));
        let err = repo.follow("u1", "1001\u{0664}\u{0662}").await.unwrap_err();
        assert!(matches!(err, AppError::Classification(_)));
        assert_eq!(resolver.by_key.load(Ordering::SeqCst), 0);
    }
}
