//! Append-only message log.

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::Result,
    model::{Message, NewMessage},
};

/// SQLite-backed message log. Rows are never updated except for the read
/// flag, which [`SqliteChatStore::mark_read`](super::SqliteChatStore::mark_read)
/// owns.
#[derive(Clone)]
pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one message and return its id. The owning chat must exist.
    pub async fn append(&self, message: &NewMessage) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_in(&mut conn, message).await
    }

    /// Messages of one chat in conversation order.
    pub async fn list_by_chat(&self, phone: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            "SELECT id, phone, direction, type, text, template_name, media_ref,
                    timestamp, is_read, external_id
             FROM messages
             WHERE phone = ?
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

pub(crate) async fn insert_in(conn: &mut SqliteConnection, message: &NewMessage) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO messages
             (phone, direction, type, text, template_name, media_ref, timestamp, is_read, external_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.phone)
    .bind(message.direction)
    .bind(message.message_type)
    .bind(&message.text)
    .bind(&message.template_name)
    .bind(&message.media_ref)
    .bind(message.timestamp)
    .bind(message.is_read)
    .bind(&message.external_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}
