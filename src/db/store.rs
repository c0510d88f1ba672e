use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{NewReading, Reading, SiteSummary};
use crate::error::StoreError;

/// Durable, append-only persistence for readings.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist `reading` and return it with its store-assigned identity.
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StoreError>;

    /// Most recent reading for `device_id` by `ts`, if any.
    async fn latest_for_device(&self, device_id: &str) -> Result<Option<Reading>, StoreError>;

    /// Aggregate readings for `site_id` with `from <= ts <= to`.
    async fn site_summary(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SiteSummary, StoreError>;
}

/// Postgres-backed `ReadingStore`.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StoreError> {
        let row = sqlx::query_as::<_, Reading>(
            r#"
            INSERT INTO readings (device_id, site_id, ts, temperature, humidity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, device_id, site_id, ts, temperature, humidity, created_at
            "#,
        )
        .bind(&reading.device_id)
        .bind(&reading.site_id)
        .bind(reading.ts)
        .bind(reading.metrics.temperature)
        .bind(reading.metrics.humidity)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn latest_for_device(&self, device_id: &str) -> Result<Option<Reading>, StoreError> {
        let row = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, device_id, site_id, ts, temperature, humidity, created_at
            FROM readings
            WHERE device_id = $1
            ORDER BY ts DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn site_summary(
        &self,
        site_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SiteSummary, StoreError> {
        // Aggregates over an empty set come back as NULL, COUNT as 0.
        let summary = sqlx::query_as::<_, SiteSummary>(
            r#"
            SELECT COUNT(*)                  AS count,
                   AVG(temperature)          AS avg_temperature,
                   MAX(temperature)          AS max_temperature,
                   AVG(humidity)             AS avg_humidity,
                   MAX(humidity)             AS max_humidity,
                   COUNT(DISTINCT device_id) AS unique_devices
            FROM readings
            WHERE site_id = $1
              AND ts >= $2
              AND ts <= $3
            "#,
        )
        .bind(site_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }
}
