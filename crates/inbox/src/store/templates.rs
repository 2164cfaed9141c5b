use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{error::Result, model::TemplateCacheEntry};

/// Rows per multi-value INSERT, well below SQLite's bound-parameter limit.
const INSERT_CHUNK: usize = 200;

/// Disposable template metadata table, fully replaced on every refresh.
#[derive(Clone)]
pub struct SqliteTemplateStore {
    pool: SqlitePool,
}

impl SqliteTemplateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete every row and insert `entries` in one transaction, so readers
    /// see either the old set or the new one.
    pub async fn replace_all(&self, entries: &[TemplateCacheEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM message_templates")
            .execute(&mut *tx)
            .await?;

        for chunk in entries.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO message_templates (name, language, status, category, last_synced_at) ",
            );
            qb.push_values(chunk, |mut row, entry| {
                row.push_bind(&entry.name)
                    .push_bind(&entry.language)
                    .push_bind(&entry.status)
                    .push_bind(&entry.category)
                    .push_bind(entry.last_synced_at);
            });
            qb.push(
                " ON CONFLICT(name, language) DO UPDATE SET
                     status = excluded.status,
                     category = excluded.category,
                     last_synced_at = excluded.last_synced_at",
            );
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(entries.len())
    }

    /// Language of the best cached variant of `name`, preferring approved
    /// templates.
    pub async fn lookup_language(&self, name: &str) -> Result<Option<String>> {
        let language = sqlx::query_scalar::<_, String>(
            "SELECT language FROM message_templates
             WHERE name = ?
             ORDER BY (status = 'APPROVED') DESC, language
             LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(language)
    }

    pub async fn list(&self) -> Result<Vec<TemplateCacheEntry>> {
        let rows = sqlx::query_as::<_, TemplateCacheEntry>(
            "SELECT name, language, status, category, last_synced_at
             FROM message_templates
             ORDER BY name, language",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
