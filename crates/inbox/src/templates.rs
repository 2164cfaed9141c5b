//! Read-through cache of the gateway's message template catalogue.

use std::{sync::Arc, time::Duration};

use {
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use chatdesk_common::time::unix_now;

use crate::{
    error::Result,
    gateway::TemplateSource,
    model::TemplateCacheEntry,
    sink::{InboxEvent, NotificationSink},
    store::SqliteTemplateStore,
};

/// Template names are matched case-insensitively and without padding.
pub fn normalize_template_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// `en-us` / `EN_us` → `en_US`; a bare language code is just lowercased.
pub fn normalize_language_code(code: &str) -> String {
    let code = code.trim();
    match code.split_once(['-', '_']) {
        Some((lang, region)) if !region.is_empty() => {
            format!("{}_{}", lang.to_lowercase(), region.to_uppercase())
        },
        Some((lang, _)) => lang.to_lowercase(),
        None => code.to_lowercase(),
    }
}

pub struct TemplateCache {
    store: SqliteTemplateStore,
    source: Arc<dyn TemplateSource>,
    sink: Arc<dyn NotificationSink>,
}

impl TemplateCache {
    pub fn new(
        store: SqliteTemplateStore,
        source: Arc<dyn TemplateSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            source,
            sink,
        }
    }

    /// Fetch the full catalogue and replace the cache with it.
    ///
    /// On a gateway failure the existing rows are left untouched.
    pub async fn refresh(&self) -> Result<usize> {
        let templates = self.source.list_templates().await?;
        let synced_at = unix_now();
        let entries: Vec<TemplateCacheEntry> = templates
            .into_iter()
            .filter(|t| !t.name.trim().is_empty() && !t.language.trim().is_empty())
            .map(|t| TemplateCacheEntry {
                name: normalize_template_name(&t.name),
                language: normalize_language_code(&t.language),
                status: t.status.trim().to_uppercase(),
                category: t.category,
                last_synced_at: synced_at,
            })
            .collect();

        let count = self.store.replace_all(&entries).await?;
        info!(count, "template cache refreshed");
        self.sink.notify(InboxEvent::TemplatesRefreshed { count }).await;
        Ok(count)
    }

    /// Cached language for `name`, preferring approved variants.
    pub async fn lookup(&self, name: &str) -> Result<Option<String>> {
        self.store
            .lookup_language(&normalize_template_name(name))
            .await
    }

    pub async fn list(&self) -> Result<Vec<TemplateCacheEntry>> {
        self.store.list().await
    }

    /// Refresh now and then every `every` until `cancel` fires. Failures are
    /// logged and retried on the next tick.
    pub fn spawn_refresh_loop(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("template refresh loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.refresh().await {
                            warn!(error = %e, "template refresh failed");
                        }
                    }
                }
            }
        })
    }
}
