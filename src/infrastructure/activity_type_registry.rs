//! A registry for activity types and their ledger discriminants.
//!
//! Every row in the activity ledger carries a numeric activity type that
//! identifies which (object type, action) pair it records. The registry is
//! built once at startup, either from the built-in table or from a JSON
//! file, and is read-only afterwards. Missing pairs are reported when they
//! are looked up, never papered over with a default code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::object_type::ObjectType;
use crate::core::strong_types::{ActivityKey, ActivityTypeCode};
use crate::error::{AppError, AppResult};

/// One registered activity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTypeEntry {
    pub code: ActivityTypeCode,
    /// Configured score attached to the activity (reputation delta); zero when unused
    #[serde(default)]
    pub extra: i64,
}

/// Result of resolving an activity type through an object ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTypeInfo {
    pub code: ActivityTypeCode,
    pub object_type: ObjectType,
    pub extra: i64,
}

/// Resolves activity type codes. This is the seam repositories depend on.
#[async_trait]
pub trait ActivityTypeResolver: Send + Sync {
    /// Resolve from an object type key the caller already knows (`question`, `tag`, ...)
    async fn get_activity_type_by_obj_key(&self, object_key: &str, action: &str) -> AppResult<ActivityTypeCode>;

    /// Classify the object ID first, then resolve
    async fn get_activity_type_by_obj_id(&self, object_id: &str, action: &str) -> AppResult<ActivityTypeInfo>;
}

/// Immutable mapping of `<object type>.<action>` keys to activity types.
#[derive(Debug, Clone)]
pub struct ActivityTypeRegistry {
    entries: Arc<HashMap<ActivityKey, ActivityTypeEntry>>,
}

impl ActivityTypeRegistry {
    /// Creates a registry with the built-in activity table.
    pub fn new() -> Self {
        let defaults: [(&str, &str, i64, i64); 12] = [
            ("question", "follow", 1, 0),
            ("question", "vote_up", 2, 10),
            ("question", "vote_down", 3, -2),
            ("answer", "vote_up", 4, 10),
            ("answer", "vote_down", 5, -2),
            ("answer", "accept", 6, 15),
            ("user", "follow", 7, 0),
            ("tag", "follow", 8, 0),
            ("question", "ask", 9, 0),
            ("answer", "answer", 10, 0),
            ("comment", "comment", 11, 0),
            ("collection", "collect", 12, 0),
        ];

        let entries = defaults
            .into_iter()
            .map(|(object_type, action, code, extra)| {
                (
                    ActivityKey::new(object_type, action),
                    ActivityTypeEntry { code: ActivityTypeCode::new(code), extra },
                )
            })
            .collect();

        Self { entries: Arc::new(entries) }
    }

    /// Build a registry from explicit entries, rejecting malformed keys and duplicate codes.
    pub fn from_entries<I>(entries: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (String, ActivityTypeEntry)>,
    {
        let mut map = HashMap::new();
        let mut codes: HashMap<ActivityTypeCode, ActivityKey> = HashMap::new();

        for (raw_key, entry) in entries {
            let key = ActivityKey::parse(&raw_key).map_err(|e| {
                AppError::ConfigurationError(format!("activity type {:?}: {}", raw_key, e))
            })?;
            if !entry.code.is_valid() {
                return Err(AppError::ConfigurationError(format!(
                    "activity type {} has non-positive code {}",
                    key, entry.code
                )));
            }
            if let Some(previous) = codes.insert(entry.code, key.clone()) {
                return Err(AppError::ConfigurationError(format!(
                    "activity types {} and {} share code {}",
                    previous, key, entry.code
                )));
            }
            map.insert(key, entry);
        }

        Ok(Self { entries: Arc::new(map) })
    }

    /// Load the registry from a JSON object of `{"question.follow": {"code": 1, "extra": 0}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigurationError(format!("failed to read activity types from {}: {}", path.display(), e))
        })?;
        let entries: HashMap<String, ActivityTypeEntry> = serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigurationError(format!("failed to parse activity types in {}: {}", path.display(), e))
        })?;

        let registry = Self::from_entries(entries)?;
        info!("Loaded {} activity types from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Look up the entry for an (object type, action) pair.
    pub fn resolve(&self, object_type: &str, action: &str) -> AppResult<ActivityTypeEntry> {
        let key = ActivityKey::new(object_type, action);
        match self.entries.get(&key) {
            Some(entry) => {
                debug!("Resolved activity type {} -> {}", key, entry.code);
                Ok(*entry)
            }
            None => Err(AppError::Lookup(format!("activity type {} is not registered", key))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ActivityTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivityTypeResolver for ActivityTypeRegistry {
    async fn get_activity_type_by_obj_key(&self, object_key: &str, action: &str) -> AppResult<ActivityTypeCode> {
        self.resolve(object_key, action).map(|entry| entry.code)
    }

    async fn get_activity_type_by_obj_id(&self, object_id: &str, action: &str) -> AppResult<ActivityTypeInfo> {
        let object_type = ObjectType::from_object_id(object_id)?;
        let entry = self.resolve(object_type.as_str(), action)?;
        Ok(ActivityTypeInfo {
            code: entry.code,
            object_type,
            extra: entry.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_follow_types_are_distinct_per_object_type() {
        let registry = ActivityTypeRegistry::new();
        let question = registry.get_activity_type_by_obj_key("question", "follow").await.unwrap();
        let user = registry.get_activity_type_by_obj_key("user", "follow").await.unwrap();
        let tag = registry.get_activity_type_by_obj_key("tag", "follow").await.unwrap();

        assert_ne!(question, user);
        assert_ne!(user, tag);
        assert_ne!(question, tag);
    }

    #[tokio::test]
    async fn test_missing_pair_is_a_lookup_error() {
        let registry = ActivityTypeRegistry::new();
        let err = registry.get_activity_type_by_obj_key("answer", "follow").await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(_)));

        let err = registry.get_activity_type_by_obj_key("question", "bookmark").await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(_)));
    }

    #[tokio::test]
    async fn test_resolve_by_object_id() {
        let registry = ActivityTypeRegistry::new();
        let info = registry
            .get_activity_type_by_obj_id("10040000000000009", "follow")
            .await
            .unwrap();
        assert_eq!(info.object_type, ObjectType::User);
        assert_eq!(info.code, registry.resolve("user", "follow").unwrap().code);

        let err = registry.get_activity_type_by_obj_id("not-an-id", "follow").await.unwrap_err();
        assert!(matches!(err, AppError::Classification(_)));

        // Classifies fine, but answers cannot be followed
        let err = registry.get_activity_type_by_obj_id("10020000000000009", "follow").await.unwrap_err();
        assert!(matches!(err, AppError::Lookup(_)));
    }

    #[test]
    fn test_from_entries_rejects_bad_configuration() {
        let entry = |code| ActivityTypeEntry { code: ActivityTypeCode::new(code), extra: 0 };

        let err = ActivityTypeRegistry::from_entries(vec![("questionfollow".to_string(), entry(1))]).unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));

        let err = ActivityTypeRegistry::from_entries(vec![("question.follow".to_string(), entry(0))]).unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));

        let err = ActivityTypeRegistry::from_entries(vec![
            ("question.follow".to_string(), entry(3)),
            ("tag.follow".to_string(), entry(3)),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"question.follow": {{"code": 41}}, "tag.follow": {{"code": 43, "extra": 1}}}}"#
        )
        .unwrap();

        let registry = ActivityTypeRegistry::from_json_file(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("question", "follow").unwrap().code, ActivityTypeCode::new(41));
        assert_eq!(registry.resolve("tag", "follow").unwrap().extra, 1);
        assert!(matches!(registry.resolve("user", "follow"), Err(AppError::Lookup(_))));
    }

    #[test]
    fn test_load_from_invalid_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ActivityTypeRegistry::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, AppError::ConfigurationError(_)));
    }
}
