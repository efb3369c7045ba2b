use crate::config::DatabaseConfig;
use crate::submission::InviteRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Append-only tabular store of invite records.
///
/// `row_count` followed by `append` is NOT atomic: two concurrent
/// submissions can read the same count and derive the same invite ID. The
/// service preserves this behavior deliberately; replacing the count read
/// with a store-side sequence would change the historical ID scheme.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current number of invite records
    async fn row_count(&self) -> Result<u64>;

    /// Append one record; records are never mutated or deleted
    async fn append(&self, record: InviteRecord) -> Result<()>;
}

/// PostgreSQL-backed record store
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Connect with a pooled connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn row_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invites")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count invite records")?;

        Ok(count as u64)
    }

    #[instrument(skip(self, record), fields(invite_id = %record.invite_id, name = %record.name))]
    async fn append(&self, record: InviteRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO invites (
                submitted_at, name, visit_date, mobile,
                invite_id, year, section, photo_url
            ) VALUES (
                $1, $2, $3, $4,
                $5, $6, $7, $8
            )
            "#,
        )
        .bind(record.submitted_at)
        .bind(&record.name)
        .bind(&record.date)
        .bind(&record.mobile)
        .bind(&record.invite_id)
        .bind(&record.year)
        .bind(&record.section)
        .bind(&record.photo_url)
        .execute(&self.pool)
        .await
        .context("Failed to append invite record")?;

        info!(invite_id = %record.invite_id, "Invite record appended");
        Ok(())
    }
}
