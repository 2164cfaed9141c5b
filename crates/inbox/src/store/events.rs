use sqlx::SqlitePool;

use crate::error::Result;

/// Write-only audit trail of raw deliveries. Nothing in the ingestion path
/// reads it back.
#[derive(Clone)]
pub struct SqliteWebhookEventLog {
    pool: SqlitePool,
}

impl SqliteWebhookEventLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, payload: &str, received_at: i64) -> Result<i64> {
        let result = sqlx::query("INSERT INTO webhook_events (payload, received_at) VALUES (?, ?)")
            .bind(payload)
            .bind(received_at)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}
