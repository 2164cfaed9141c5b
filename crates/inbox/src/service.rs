//! The inbox facade the HTTP layer talks to. Route handlers never touch a
//! store directly; every mutation goes through here.

use std::{sync::Arc, time::Duration};

use {
    sqlx::SqlitePool,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use {
    chatdesk_common::{phone::normalize_phone, time::unix_now},
    chatdesk_config::ChatdeskConfig,
};

use crate::{
    error::Result,
    gateway::{GatewayClient, MediaSource, MediaStream, TemplateSource},
    model::{ChatSummary, Message, TemplateCacheEntry},
    outbound::{OutboundCoordinator, OutboundPayload, SendResult},
    pipeline::{IngestPipeline, IngestReport},
    sink::{InboxEvent, NotificationSink},
    store::{SqliteChatStore, SqliteMessageLog, SqliteTemplateStore, SqliteWebhookEventLog},
    templates::TemplateCache,
    webhook::WebhookPayload,
};

/// Deployment knobs the inbox needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxOptions {
    /// Only ingest changes addressed to this business number, when set.
    pub phone_number_id: Option<String>,
    pub default_language: String,
}

impl Default for InboxOptions {
    fn default() -> Self {
        Self {
            phone_number_id: None,
            default_language: "es".into(),
        }
    }
}

impl InboxOptions {
    pub fn from_config(config: &ChatdeskConfig) -> Self {
        let phone_number_id = Some(config.whatsapp.phone_number_id.trim().to_string())
            .filter(|id| !id.is_empty());
        Self {
            phone_number_id,
            default_language: config.templates.default_language.clone(),
        }
    }
}

pub struct Inbox {
    chats: SqliteChatStore,
    messages: SqliteMessageLog,
    events: SqliteWebhookEventLog,
    pipeline: IngestPipeline,
    outbound: OutboundCoordinator,
    templates: Arc<TemplateCache>,
    media: Arc<dyn MediaSource>,
    sink: Arc<dyn NotificationSink>,
}

impl Inbox {
    /// Wire the inbox over one pool and one gateway implementation.
    pub fn new<G>(
        pool: SqlitePool,
        gateway: Arc<G>,
        sink: Arc<dyn NotificationSink>,
        options: InboxOptions,
    ) -> Self
    where
        G: GatewayClient + TemplateSource + MediaSource + 'static,
    {
        let client: Arc<dyn GatewayClient> = gateway.clone();
        let source: Arc<dyn TemplateSource> = gateway.clone();
        let media: Arc<dyn MediaSource> = gateway;

        Self {
            chats: SqliteChatStore::new(pool.clone()),
            messages: SqliteMessageLog::new(pool.clone()),
            events: SqliteWebhookEventLog::new(pool.clone()),
            pipeline: IngestPipeline::new(pool.clone(), sink.clone(), options.phone_number_id),
            outbound: OutboundCoordinator::new(
                pool.clone(),
                client,
                sink.clone(),
                options.default_language,
            ),
            templates: Arc::new(TemplateCache::new(
                SqliteTemplateStore::new(pool),
                source,
                sink.clone(),
            )),
            media,
            sink,
        }
    }

    /// Normalize and persist one webhook delivery.
    pub async fn ingest(&self, payload: &WebhookPayload) -> Result<IngestReport> {
        self.pipeline.process(payload).await
    }

    /// Keep the raw delivery body for later inspection.
    pub async fn record_delivery(&self, raw: &str) -> Result<i64> {
        self.events.record(raw, unix_now()).await
    }

    pub async fn send(&self, to: &str, payload: OutboundPayload) -> Result<SendResult> {
        self.outbound.send(to, payload).await
    }

    /// Mark every inbound message of the chat as read.
    pub async fn mark_read(&self, phone: &str) -> Result<u64> {
        let phone = normalize_phone(phone)?;
        let updated = self.chats.mark_read(&phone).await?;
        debug!(phone = %phone, updated, "chat marked read");
        if updated > 0 {
            self.sink
                .notify(InboxEvent::ChatRead { phone, updated })
                .await;
        }
        Ok(updated)
    }

    /// Returns `false` when no chat exists for `phone`.
    pub async fn set_pinned(&self, phone: &str, pinned: bool) -> Result<bool> {
        let phone = normalize_phone(phone)?;
        let found = self.chats.set_pinned(&phone, pinned).await?;
        if found {
            info!(phone = %phone, pinned, "chat pin changed");
            self.sink
                .notify(InboxEvent::ChatPinned { phone, pinned })
                .await;
        }
        Ok(found)
    }

    pub async fn chats(&self) -> Result<Vec<ChatSummary>> {
        self.chats.list().await
    }

    pub async fn chat(&self, phone: &str) -> Result<Option<ChatSummary>> {
        let phone = normalize_phone(phone)?;
        self.chats.get(&phone).await
    }

    pub async fn messages(&self, phone: &str) -> Result<Vec<Message>> {
        let phone = normalize_phone(phone)?;
        self.messages.list_by_chat(&phone).await
    }

    pub async fn templates(&self) -> Result<Vec<TemplateCacheEntry>> {
        self.templates.list().await
    }

    pub async fn refresh_templates(&self) -> Result<usize> {
        self.templates.refresh().await
    }

    /// Language a send of template `name` would use right now.
    pub async fn template_language(&self, name: &str, requested: Option<&str>) -> String {
        self.outbound.resolve_language(name, requested).await
    }

    pub async fn media(&self, media_id: &str) -> Result<MediaStream> {
        self.media.fetch_media(media_id).await
    }

    /// Start the periodic template refresh. A zero interval disables it.
    pub fn spawn_template_refresh(
        &self,
        every: Duration,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if every.is_zero() {
            info!("template refresh disabled");
            return None;
        }
        Some(Arc::clone(&self.templates).spawn_refresh_loop(every, cancel))
    }
}
