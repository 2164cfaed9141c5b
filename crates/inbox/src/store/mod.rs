//! SQLite persistence for chats, messages, templates and raw deliveries.

pub mod chats;
pub mod events;
pub mod messages;
pub mod templates;

pub use {
    chats::SqliteChatStore,
    events::SqliteWebhookEventLog,
    messages::SqliteMessageLog,
    templates::SqliteTemplateStore,
};

/// Fresh in-memory database with migrations applied.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    crate::run_migrations(&pool).await.expect("migrations");
    pool
}
