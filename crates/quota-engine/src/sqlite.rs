//! SQLite storage backend
//!
//! Holds the `user_storage`, `products`, `prices` and `subscriptions` tables
//! and implements the upload decision and accounting procedures as SQL.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::backend::{StorageBackend, StorageRecord, SubscriptionStatus};
use crate::error::BackendError;
use crate::tiers::{get_subscription_tier_info, BASIC};

#[derive(Debug, FromRow)]
struct DbStorageRecord {
    id: String,
    max_file_size_limit: i64,
    total_storage_limit: i64,
    total_storage_used: i64,
}

impl From<DbStorageRecord> for StorageRecord {
    fn from(row: DbStorageRecord) -> Self {
        Self {
            user_id: row.id,
            max_file_size_limit: row.max_file_size_limit,
            total_storage_limit: row.total_storage_limit,
            total_storage_used: row.total_storage_used,
        }
    }
}

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Connect to a database URL such as `sqlite:revise.db?mode=rwc` and run migrations
    pub async fn connect(url: &str) -> Result<Self, BackendError> {
        tracing::info!("Connecting to database: {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database; it lives as long as the backend
    pub async fn in_memory() -> Result<Self, BackendError> {
        // Every SQLite memory connection is its own database, so pin the pool to one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, BackendError> {
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), BackendError> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_storage (
                id TEXT PRIMARY KEY,
                max_file_size_limit INTEGER NOT NULL,
                total_storage_limit INTEGER NOT NULL,
                total_storage_used INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prices (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL REFERENCES products(id),
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                price_id TEXT NOT NULL REFERENCES prices(id),
                status TEXT NOT NULL,
                created TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user_status
            ON subscriptions(user_id, status)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Insert or replace a user's storage row
    pub async fn upsert_storage_record(&self, record: &StorageRecord) -> Result<(), BackendError> {
        sqlx::query(
            r#"
            INSERT INTO user_storage (id, max_file_size_limit, total_storage_limit, total_storage_used)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                max_file_size_limit = excluded.max_file_size_limit,
                total_storage_limit = excluded.total_storage_limit,
                total_storage_used = excluded.total_storage_used,
                updated_at = datetime('now')
            "#,
        )
        .bind(&record.user_id)
        .bind(record.max_file_size_limit)
        .bind(record.total_storage_limit)
        .bind(record.total_storage_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store a subscription for `user_id` to the named product, creating the
    /// product and a price for it as needed. Returns the subscription id.
    pub async fn record_subscription(
        &self,
        user_id: &str,
        product_name: &str,
        status: SubscriptionStatus,
    ) -> Result<String, BackendError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO products (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(Uuid::new_v4().to_string())
            .bind(product_name)
            .execute(&mut *tx)
            .await?;

        let product_id: String = sqlx::query_scalar("SELECT id FROM products WHERE name = ?")
            .bind(product_name)
            .fetch_one(&mut *tx)
            .await?;

        let price_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO prices (id, product_id) VALUES (?, ?)")
            .bind(&price_id)
            .bind(&product_id)
            .execute(&mut *tx)
            .await?;

        let subscription_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO subscriptions (id, user_id, price_id, status) VALUES (?, ?, ?, ?)")
            .bind(&subscription_id)
            .bind(user_id)
            .bind(&price_id)
            .bind(status.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Recorded {} subscription {} for user {}",
            status,
            subscription_id,
            user_id
        );
        Ok(subscription_id)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn storage_record(&self, user_id: &str) -> Result<Option<StorageRecord>, BackendError> {
        let row: Option<DbStorageRecord> = sqlx::query_as(
            r#"
            SELECT id, max_file_size_limit, total_storage_limit, total_storage_used
            FROM user_storage
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StorageRecord::from))
    }

    async fn active_product_name(&self, user_id: &str) -> Result<Option<String>, BackendError> {
        let name: Option<String> = sqlx::query_scalar(
            r#"
            SELECT products.name
            FROM subscriptions
            JOIN prices ON prices.id = subscriptions.price_id
            JOIN products ON products.id = prices.product_id
            WHERE subscriptions.user_id = ? AND subscriptions.status = 'active'
            ORDER BY subscriptions.created DESC, subscriptions.rowid DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(name)
    }

    async fn can_user_upload_file(
        &self,
        user_id: &str,
        file_size: i64,
    ) -> Result<bool, BackendError> {
        let record = self
            .storage_record(user_id)
            .await?
            .unwrap_or_else(|| StorageRecord::basic(user_id));

        Ok(record.admits(file_size))
    }

    async fn update_storage_usage(&self, user_id: &str, file_size: i64) -> Result<(), BackendError> {
        // Single statement so concurrent increments cannot be lost
        sqlx::query(
            r#"
            INSERT INTO user_storage (id, max_file_size_limit, total_storage_limit, total_storage_used)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                total_storage_used = total_storage_used + excluded.total_storage_used,
                updated_at = datetime('now')
            "#,
        )
        .bind(user_id)
        .bind(BASIC.max_file_size)
        .bind(BASIC.total_storage)
        .bind(file_size)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_storage_limits_for_subscription(
        &self,
        user_id: &str,
        product_name: &str,
    ) -> Result<(), BackendError> {
        let tier = get_subscription_tier_info(product_name);

        sqlx::query(
            r#"
            INSERT INTO user_storage (id, max_file_size_limit, total_storage_limit, total_storage_used)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(id) DO UPDATE SET
                max_file_size_limit = excluded.max_file_size_limit,
                total_storage_limit = excluded.total_storage_limit,
                updated_at = datetime('now')
            "#,
        )
        .bind(user_id)
        .bind(tier.max_file_size)
        .bind(tier.total_storage)
        .execute(&self.pool)
        .await?;

        tracing::info!("Applied {} limits for user {}", tier.name, user_id);
        Ok(())
    }
}
