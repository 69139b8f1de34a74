use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::core::object_type::FollowableKind;
use crate::core::strong_types::ActivityTypeCode;
use crate::error::{AppError, AppResult};
use crate::infrastructure::activity_ledger::{
    ActivityLedger, ActivityRecord, CancelState, FollowTransition, ACTIVITY_TABLE,
};
use crate::infrastructure::database::{quote_ident, DatabaseInterface};

/// SQLite implementation of database interface, used in-memory for tests and local runs
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Single connection pool over a private in-memory database, schema included
    pub async fn new_in_memory() -> AppResult<Self> {
        let db = Self::connect("sqlite::memory:", 1).await?;
        db.initialize().await?;
        Ok(db)
    }

    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        // Every connection to :memory: opens its own database, and closing it drops the data
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = options
            .connect(url)
            .await
            .map_err(|e| AppError::storage(format!("connect to SQLite at {}", url), e))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn scan_active_column(
        &self,
        select: &str,
        key_column: &str,
        key: &str,
        activity_type: ActivityTypeCode,
    ) -> AppResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? AND activity_type = ? AND cancelled = ?",
            select, ACTIVITY_TABLE, key_column,
        );
        sqlx::query_scalar::<_, String>(&sql)
            .bind(key)
            .bind(activity_type.value())
            .bind(CancelState::Active.flag())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::storage(
                    format!(
                        "select {}.{} where {} = {} and activity_type = {}",
                        ACTIVITY_TABLE, select, key_column, key, activity_type
                    ),
                    e,
                )
            })
    }
}

fn activity_from_sqlite_row(row: &SqliteRow) -> Result<ActivityRecord, sqlx::Error> {
    Ok(ActivityRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        object_id: row.try_get("object_id")?,
        activity_type: ActivityTypeCode::new(row.try_get("activity_type")?),
        cancelled: CancelState::from_flag(row.try_get("cancelled")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

#[async_trait]
impl ActivityLedger for SqliteDatabase {
    async fn find_user_ids(&self, object_id: &str, activity_type: ActivityTypeCode) -> AppResult<Vec<String>> {
        self.scan_active_column("user_id", "object_id", object_id, activity_type).await
    }

    async fn find_object_ids(&self, user_id: &str, activity_type: ActivityTypeCode) -> AppResult<Vec<String>> {
        self.scan_active_column("object_id", "user_id", user_id, activity_type).await
    }

    async fn find_one(
        &self,
        user_id: &str,
        object_id: &str,
        activity_type: ActivityTypeCode,
    ) -> AppResult<Option<ActivityRecord>> {
        let context = || {
            format!(
                "select activity for user_id = {}, object_id = {}, activity_type = {}",
                user_id, object_id, activity_type
            )
        };

        let row = sqlx::query(
            "SELECT id, user_id, object_id, activity_type, cancelled, created_at, updated_at, cancelled_at \
             FROM activity WHERE user_id = ? AND object_id = ? AND activity_type = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(object_id)
        .bind(activity_type.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage(context(), e))?;

        row.as_ref()
            .map(activity_from_sqlite_row)
            .transpose()
            .map_err(|e| AppError::storage(context(), e))
    }

    async fn count_active(&self, object_id: &str, activity_type: ActivityTypeCode) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity WHERE object_id = ? AND activity_type = ? AND cancelled = ?",
        )
        .bind(object_id)
        .bind(activity_type.value())
        .bind(CancelState::Active.flag())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::storage(
                format!("count active activity for object_id = {}, activity_type = {}", object_id, activity_type),
                e,
            )
        })
    }
}

#[async_trait]
impl DatabaseInterface for SqliteDatabase {
    /// Initialize activity and followable tables for SQLite
    async fn initialize(&self) -> AppResult<()> {
        let mut statements = vec![
            r#"
            CREATE TABLE IF NOT EXISTS activity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                object_id TEXT NOT NULL,
                activity_type INTEGER NOT NULL,
                cancelled INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                cancelled_at DATETIME
            )
            "#
            .to_string(),
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_activity_triple ON activity(user_id, object_id, activity_type)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_activity_object ON activity(object_id, activity_type, cancelled)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_activity_user ON activity(user_id, activity_type, cancelled)"
                .to_string(),
        ];

        for kind in FollowableKind::ALL {
            statements.push(format!(
                "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, {} INTEGER NOT NULL DEFAULT 0, created_at DATETIME NOT NULL)",
                quote_ident(kind.table_name()),
                kind.follow_count_column()
            ));
        }

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage("initialize SQLite schema", e))?;
        }

        info!("Follow schema initialized on SQLite");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage("database health check", e))?;
        Ok(())
    }

    async fn get_follow_count(&self, kind: FollowableKind, object_id: &str) -> AppResult<Option<i64>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            kind.follow_count_column(),
            quote_ident(kind.table_name())
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::storage(
                    format!("read {}.{} for id {}", kind.table_name(), kind.follow_count_column(), object_id),
                    e,
                )
            })
    }

    async fn set_follow_count(&self, kind: FollowableKind, object_id: &str, count: i64) -> AppResult<()> {
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE id = ?",
            quote_ident(kind.table_name()),
            kind.follow_count_column()
        );
        let result = sqlx::query(&sql)
            .bind(count)
            .bind(object_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::storage(
                    format!("write {}.{} for id {}", kind.table_name(), kind.follow_count_column(), object_id),
                    e,
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", kind, object_id)));
        }
        Ok(())
    }

    async fn create_followable(&self, kind: FollowableKind, object_id: &str) -> AppResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, {}, created_at) VALUES (?, 0, ?)",
            quote_ident(kind.table_name()),
            kind.follow_count_column()
        );
        sqlx::query(&sql)
            .bind(object_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage(format!("insert {} {}", kind, object_id), e))?;
        Ok(())
    }

    async fn activate_follow(
        &self,
        user_id: &str,
        object_id: &str,
        kind: FollowableKind,
        activity_type: ActivityTypeCode,
    ) -> AppResult<FollowTransition> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::storage("begin follow transaction", e))?;

        let existing = sqlx::query(
            "SELECT id, cancelled FROM activity WHERE user_id = ? AND object_id = ? AND activity_type = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(object_id)
        .bind(activity_type.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::storage(format!("select activity for {} -> {}", user_id, object_id), e))?;

        let now = Utc::now();
        let transition = match existing {
            Some(row) if CancelState::from_flag(row.get("cancelled")) == CancelState::Active => {
                debug!("{} already follows {}", user_id, object_id);
                return Ok(FollowTransition::Unchanged);
            }
            Some(row) => {
                let id: i64 = row.get("id");
                sqlx::query("UPDATE activity SET cancelled = ?, cancelled_at = NULL, updated_at = ? WHERE id = ?")
                    .bind(CancelState::Active.flag())
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| AppError::storage(format!("reactivate activity {}", id), e))?;
                FollowTransition::Reactivated
            }
            None => {
                sqlx::query(
                    "INSERT INTO activity (user_id, object_id, activity_type, cancelled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(user_id)
                .bind(object_id)
                .bind(activity_type.value())
                .bind(CancelState::Active.flag())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::storage(format!("insert activity {} -> {}", user_id, object_id), e))?;
                FollowTransition::Inserted
            }
        };

        let sql = format!(
            "UPDATE {table} SET {col} = {col} + ? WHERE id = ?",
            table = quote_ident(kind.table_name()),
            col = kind.follow_count_column()
        );
        let result = sqlx::query(&sql)
            .bind(transition.counter_delta())
            .bind(object_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::storage(format!("increment {}.follow_count for id {}", kind, object_id), e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", kind, object_id)));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::storage("commit follow transaction", e))?;
        Ok(transition)
    }

    async fn cancel_follow(
        &self,
        user_id: &str,
        object_id: &str,
        kind: FollowableKind,
        activity_type: ActivityTypeCode,
    ) -> AppResult<FollowTransition> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::storage("begin unfollow transaction", e))?;

        let existing = sqlx::query(
            "SELECT id FROM activity WHERE user_id = ? AND object_id = ? AND activity_type = ? AND cancelled = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(object_id)
        .bind(activity_type.value())
        .bind(CancelState::Active.flag())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::storage(format!("select activity for {} -> {}", user_id, object_id), e))?;

        let Some(row) = existing else {
            debug!("{} does not follow {}", user_id, object_id);
            return Ok(FollowTransition::Unchanged);
        };

        let id: i64 = row.get("id");
        let now = Utc::now();
        sqlx::query("UPDATE activity SET cancelled = ?, cancelled_at = ?, updated_at = ? WHERE id = ?")
            .bind(CancelState::Cancelled.flag())
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::storage(format!("cancel activity {}", id), e))?;

        let sql = format!(
            "UPDATE {table} SET {col} = {col} - 1 WHERE id = ? AND {col} > 0",
            table = quote_ident(kind.table_name()),
            col = kind.follow_count_column()
        );
        sqlx::query(&sql)
            .bind(object_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::storage(format!("decrement {}.follow_count for id {}", kind, object_id), e))?;

        tx.commit()
            .await
            .map_err(|e| AppError::storage("commit unfollow transaction", e))?;
        Ok(FollowTransition::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = "10010000000000042";

    #[tokio::test]
    async fn test_in_memory_pool_keeps_its_only_connection() {
        let db = SqliteDatabase::connect("sqlite::memory:", 8).await.unwrap();
        let options = db.pool().options();
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        db.initialize().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_follow_count_projection() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        assert_eq!(db.get_follow_count(FollowableKind::Question, QUESTION).await.unwrap(), None);

        db.create_followable(FollowableKind::Question, QUESTION).await.unwrap();
        assert_eq!(db.get_follow_count(FollowableKind::Question, QUESTION).await.unwrap(), Some(0));

        db.set_follow_count(FollowableKind::Question, QUESTION, 9).await.unwrap();
        assert_eq!(db.get_follow_count(FollowableKind::Question, QUESTION).await.unwrap(), Some(9));

        // Same id in another table is a different row
        assert_eq!(db.get_follow_count(FollowableKind::Tag, QUESTION).await.unwrap(), None);
        assert!(matches!(
            db.set_follow_count(FollowableKind::Tag, QUESTION, 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_table_name_is_quoted() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        db.create_followable(FollowableKind::User, "10040000000000001").await.unwrap();
        assert_eq!(
            db.get_follow_count(FollowableKind::User, "10040000000000001").await.unwrap(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_follow_toggle_reuses_row() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let code = ActivityTypeCode::new(1);
        db.create_followable(FollowableKind::Question, QUESTION).await.unwrap();

        let t = db.activate_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap();
        assert_eq!(t, FollowTransition::Inserted);
        let first = db.find_one("u1", QUESTION, code).await.unwrap().unwrap();
        assert!(first.is_active());
        assert!(first.cancelled_at.is_none());

        let t = db.cancel_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap();
        assert_eq!(t, FollowTransition::Cancelled);
        let cancelled = db.find_one("u1", QUESTION, code).await.unwrap().unwrap();
        assert_eq!(cancelled.id, first.id);
        assert_eq!(cancelled.cancelled, CancelState::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let t = db.activate_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap();
        assert_eq!(t, FollowTransition::Reactivated);
        let again = db.find_one("u1", QUESTION, code).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.created_at, first.created_at);
        assert!(again.is_active());

        assert_eq!(db.get_follow_count(FollowableKind::Question, QUESTION).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_repeated_writes_are_unchanged() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let code = ActivityTypeCode::new(1);
        db.create_followable(FollowableKind::Question, QUESTION).await.unwrap();

        assert_eq!(
            db.cancel_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap(),
            FollowTransition::Unchanged
        );
        db.activate_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap();
        assert_eq!(
            db.activate_follow("u1", QUESTION, FollowableKind::Question, code).await.unwrap(),
            FollowTransition::Unchanged
        );
        assert_eq!(db.get_follow_count(FollowableKind::Question, QUESTION).await.unwrap(), Some(1));
        assert_eq!(db.count_active(QUESTION, code).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_follow_on_missing_row_rolls_back() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        let code = ActivityTypeCode::new(1);

        let err = db
            .activate_follow("u1", QUESTION, FollowableKind::Question, code)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(db.find_one("u1", QUESTION, code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scans_filter_on_activity_type() {
        let db = SqliteDatabase::new_in_memory().await.unwrap();
        db.create_followable(FollowableKind::Question, QUESTION).await.unwrap();
        db.activate_follow("u1", QUESTION, FollowableKind::Question, ActivityTypeCode::new(1))
            .await
            .unwrap();

        assert_eq!(db.find_user_ids(QUESTION, ActivityTypeCode::new(1)).await.unwrap(), vec!["u1"]);
        assert!(db.find_user_ids(QUESTION, ActivityTypeCode::new(2)).await.unwrap().is_empty());
        assert_eq!(db.find_object_ids("u1", ActivityTypeCode::new(1)).await.unwrap(), vec![QUESTION]);
        assert!(db.find_object_ids("u2", ActivityTypeCode::new(1)).await.unwrap().is_empty());
    }
}
