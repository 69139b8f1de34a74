// Database Interface - relational store behind the follow repositories
// Owns the activity ledger table and the follow counters on followable tables

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::core::object_type::FollowableKind;
use crate::core::strong_types::ActivityTypeCode;
use crate::error::{AppError, AppResult};
use crate::infrastructure::activity_ledger::{
    ActivityLedger, ActivityRecord, CancelState, FollowTransition, ACTIVITY_TABLE,
};

/// Quote a table or column name. Names come from [`FollowableKind`] and
/// module constants, never from callers.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Store interface: the ledger read surface plus the entity counters and the
/// transactional follow/unfollow writes.
#[async_trait]
pub trait DatabaseInterface: ActivityLedger {
    /// Create tables and indexes if they do not exist yet
    async fn initialize(&self) -> AppResult<()>;

    /// Verify the store answers queries
    async fn health_check(&self) -> AppResult<()>;

    /// Read the follow counter of one row. `None` when the row does not exist.
    async fn get_follow_count(&self, kind: FollowableKind, object_id: &str) -> AppResult<Option<i64>>;

    /// Overwrite the follow counter of one row
    async fn set_follow_count(&self, kind: FollowableKind, object_id: &str, count: i64) -> AppResult<()>;

    /// Insert a followable row with a zero counter
    async fn create_followable(&self, kind: FollowableKind, object_id: &str) -> AppResult<()>;

    /// Make the relation active and bump the counter, in one transaction
    async fn activate_follow(
        &self,
        user_id: &str,
        object_id: &str,
        kind: FollowableKind,
        activity_type: ActivityTypeCode,
    ) -> AppResult<FollowTransition>;

    /// Cancel the relation and drop the counter, in one transaction
    async fn cancel_follow(
        &self,
        user_id: &str,
        object_id: &str,
        kind: FollowableKind,
        activity_type: ActivityTypeCode,
    ) -> AppResult<FollowTransition>;
}

/// PostgreSQL implementation of database interface
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| AppError::storage("connect to PostgreSQL", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get connection pool statistics
    pub fn pool_stats(&self) -> (u32, u32) {
        (self.pool.num_idle() as u32, self.pool.size())
    }

    async fn scan_active_column(
        &self,
        select: &str,
        key_column: &str,
        key: &str,
        activity_type: ActivityTypeCode,
    ) -> AppResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 AND activity_type = $2 AND cancelled = $3",
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

fn activity_from_pg_row(row: &PgRow) -> Result<ActivityRecord, sqlx::Error> {
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

const PG_SELECT_ACTIVITY: &str = "SELECT id, user_id, object_id, activity_type, cancelled, created_at, updated_at, cancelled_at \
     FROM activity WHERE user_id = $1 AND object_id = $2 AND activity_type = $3 ORDER BY id DESC LIMIT 1";

#[async_trait]
impl ActivityLedger for PostgresDatabase {
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

        let row = sqlx::query(PG_SELECT_ACTIVITY)
            .bind(user_id)
            .bind(object_id)
            .bind(activity_type.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage(context(), e))?;

        row.as_ref()
            .map(activity_from_pg_row)
            .transpose()
            .map_err(|e| AppError::storage(context(), e))
    }

    async fn count_active(&self, object_id: &str, activity_type: ActivityTypeCode) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity WHERE object_id = $1 AND activity_type = $2 AND cancelled = $3",
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
impl DatabaseInterface for PostgresDatabase {
    async fn initialize(&self) -> AppResult<()> {
        let mut statements = vec![
            r#"
            CREATE TABLE IF NOT EXISTS activity (
                id BIGSERIAL PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                object_id VARCHAR(64) NOT NULL,
                activity_type BIGINT NOT NULL,
                cancelled INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                cancelled_at TIMESTAMPTZ
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
                "CREATE TABLE IF NOT EXISTS {} (id VARCHAR(64) PRIMARY KEY, {} BIGINT NOT NULL DEFAULT 0, created_at TIMESTAMPTZ NOT NULL)",
                quote_ident(kind.table_name()),
                kind.follow_count_column()
            ));
        }

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage("initialize PostgreSQL schema", e))?;
        }

        info!("Follow schema initialized on PostgreSQL");
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
            "SELECT {} FROM {} WHERE id = $1",
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
            "UPDATE {} SET {} = $1 WHERE id = $2",
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
            "INSERT INTO {} (id, {}, created_at) VALUES ($1, 0, $2)",
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
            "SELECT id, cancelled FROM activity WHERE user_id = $1 AND object_id = $2 AND activity_type = $3 ORDER BY id DESC LIMIT 1 FOR UPDATE",
        )
        .bind(user_id)
        .bind(object_id)
        .bind(activity_type.value())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::storage(format!("lock activity for {} -> {}", user_id, object_id), e))?;

        let now = Utc::now();
        let transition = match existing {
            Some(row) if CancelState::from_flag(row.get("cancelled")) == CancelState::Active => {
                debug!("{} already follows {}", user_id, object_id);
                return Ok(FollowTransition::Unchanged);
            }
            Some(row) => {
                let id: i64 = row.get("id");
                sqlx::query("UPDATE activity SET cancelled = $1, cancelled_at = NULL, updated_at = $2 WHERE id = $3")
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
                    "INSERT INTO activity (user_id, object_id, activity_type, cancelled, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $5)",
                )
                .bind(user_id)
                .bind(object_id)
                .bind(activity_type.value())
                .bind(CancelState::Active.flag())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::storage(format!("insert activity {} -> {}", user_id, object_id), e))?;
                FollowTransition::Inserted
            }
        };

        let sql = format!(
            "UPDATE {table} SET {col} = {col} + $1 WHERE id = $2",
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
            "SELECT id FROM activity WHERE user_id = $1 AND object_id = $2 AND activity_type = $3 AND cancelled = $4 ORDER BY id DESC LIMIT 1 FOR UPDATE",
        )
        .bind(user_id)
        .bind(object_id)
        .bind(activity_type.value())
        .bind(CancelState::Active.flag())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::storage(format!("lock activity for {} -> {}", user_id, object_id), e))?;

        let Some(row) = existing else {
            debug!("{} does not follow {}", user_id, object_id);
            return Ok(FollowTransition::Unchanged);
        };

        let id: i64 = row.get("id");
        let now = Utc::now();
        sqlx::query("UPDATE activity SET cancelled = $1, cancelled_at = $2, updated_at = $2 WHERE id = $3")
            .bind(CancelState::Cancelled.flag())
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::storage(format!("cancel activity {}", id), e))?;

        let sql = format!(
            "UPDATE {table} SET {col} = {col} - 1 WHERE id = $1 AND {col} > 0",
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
