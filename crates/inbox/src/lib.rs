//! Message ingestion and chat-state reconciliation.
//!
//! Inbound webhook deliveries are normalized into canonical messages and
//! merged into per-phone chat aggregates; outbound sends go through the
//! gateway first and are recorded only once it accepted them.

pub mod error;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod outbound;
pub mod pipeline;
pub mod service;
pub mod sink;
pub mod store;
pub mod templates;
pub mod webhook;

use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use chatdesk_config::DatabaseConfig;

pub use {
    error::{Error, Result},
    gateway::{
        GatewayClient, MediaSource, MediaStream, SendReceipt, TemplateInfo, TemplateSend,
        TemplateSource,
    },
    model::{ChatSummary, Direction, Message, MessageType, TemplateCacheEntry},
    outbound::{OutboundPayload, SendResult},
    pipeline::{EventFailure, IngestReport},
    service::{Inbox, InboxOptions},
    sink::{InboxEvent, NoopSink, NotificationSink},
    webhook::WebhookPayload,
};

/// Run database migrations for the inbox tables.
///
/// Creates the `chats`, `messages`, `message_templates` and `webhook_events`
/// tables. Call once at startup before building an [`Inbox`].
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

/// Open the shared connection pool described by `config`.
///
/// In-memory databases are pinned to a single long-lived connection, since
/// each SQLite connection would otherwise see its own empty database.
pub async fn open_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let in_memory = config.url.contains(":memory:");
    let mut connect = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        connect = connect.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool = SqlitePoolOptions::new().acquire_timeout(config.acquire_timeout());
    pool = if in_memory {
        pool.max_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        pool.max_connections(config.max_connections)
    };

    Ok(pool.connect_with(connect).await?)
}
