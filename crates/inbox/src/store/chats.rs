//! Chat aggregate persistence.
//!
//! Every mutation is a single SQL statement, so concurrent writers for the
//! same phone never interleave a read and a write.

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::Result,
    model::{ChatSummary, ChatUpdate},
};

const UPSERT_SQL: &str = "INSERT INTO chats (phone, name, last_timestamp, last_preview)
     VALUES (?, ?, ?, ?)
     ON CONFLICT(phone) DO UPDATE SET
         name = COALESCE(excluded.name, chats.name),
         last_preview = CASE
             WHEN chats.last_timestamp IS NULL
                  OR excluded.last_timestamp >= chats.last_timestamp
             THEN excluded.last_preview
             ELSE chats.last_preview
         END,
         last_timestamp = MAX(
             COALESCE(chats.last_timestamp, excluded.last_timestamp),
             excluded.last_timestamp
         )";

const SUMMARY_SELECT: &str = "SELECT c.phone, c.name, c.last_timestamp, c.last_preview, c.pinned,
            EXISTS (
                SELECT 1 FROM messages m
                WHERE m.phone = c.phone AND m.direction = 'inbound' AND m.is_read = 0
            ) AS has_unread
     FROM chats c";

/// SQLite-backed chat aggregate store.
#[derive(Clone)]
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    /// Wrap an existing pool. Migrations must already have run.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Merge one message's worth of information into the chat, creating it
    /// on first contact.
    pub async fn upsert(&self, update: &ChatUpdate) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_in(&mut conn, update).await
    }

    /// Flip every unread inbound message of `phone` to read.
    ///
    /// Returns how many rows changed; a second call returns 0.
    pub async fn mark_read(&self, phone: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1
             WHERE phone = ? AND direction = 'inbound' AND is_read = 0",
        )
        .bind(phone)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set the operator pin. Returns `false` when the chat does not exist.
    pub async fn set_pinned(&self, phone: &str, pinned: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE chats SET pinned = ? WHERE phone = ?")
            .bind(pinned)
            .bind(phone)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All chats: pinned first, then most recent activity, chats that never
    /// saw a message last.
    pub async fn list(&self) -> Result<Vec<ChatSummary>> {
        let sql = format!(
            "{SUMMARY_SELECT}
             ORDER BY c.pinned DESC, c.last_timestamp IS NULL, c.last_timestamp DESC, c.phone"
        );
        let rows = sqlx::query_as::<_, ChatSummary>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, phone: &str) -> Result<Option<ChatSummary>> {
        let sql = format!("{SUMMARY_SELECT} WHERE c.phone = ?");
        let row = sqlx::query_as::<_, ChatSummary>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

/// Upsert on a caller-provided connection, typically an open transaction.
pub(crate) async fn upsert_in(conn: &mut SqliteConnection, update: &ChatUpdate) -> Result<()> {
    let name = update
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    sqlx::query(UPSERT_SQL)
        .bind(&update.phone)
        .bind(name)
        .bind(update.timestamp)
        .bind(&update.preview)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
