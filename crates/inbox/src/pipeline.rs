//! Webhook ingestion: normalize each inbound event, persist it, merge it
//! into its chat and tell the panel what changed.

use std::sync::Arc;

use {
    serde::Serialize,
    sqlx::SqlitePool,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    normalize::{NormalizedMessage, normalize_value},
    sink::{InboxEvent, NotificationSink},
    store::{chats, messages},
    webhook::WebhookPayload,
};

/// An event the normalizer rejected. The rest of the batch still ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFailure {
    pub entry_id: Option<String>,
    pub message_id: Option<String>,
    pub reason: String,
}

/// Outcome of one webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Messages appended and merged.
    pub stored: usize,
    /// Delivery status entries seen (logged, not persisted).
    pub statuses: usize,
    /// Changes skipped for their field or phone number id.
    pub ignored_changes: usize,
    pub failures: Vec<EventFailure>,
    /// Phones whose chat changed, in first-seen order.
    pub phones: Vec<String>,
}

pub struct IngestPipeline {
    pool: SqlitePool,
    sink: Arc<dyn NotificationSink>,
    phone_number_id: Option<String>,
}

impl IngestPipeline {
    /// `phone_number_id`, when set, restricts ingestion to changes addressed
    /// to that business number.
    pub fn new(
        pool: SqlitePool,
        sink: Arc<dyn NotificationSink>,
        phone_number_id: Option<String>,
    ) -> Self {
        Self {
            pool,
            sink,
            phone_number_id: phone_number_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Process one delivery.
    ///
    /// Malformed events are recorded in the report and skipped. A store
    /// failure stops the batch and is returned; events committed before it
    /// stay committed and their chats are still notified.
    pub async fn process(&self, payload: &WebhookPayload) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let outcome = self.process_into(payload, &mut report).await;

        for phone in &report.phones {
            self.sink
                .notify(InboxEvent::ChatUpdated {
                    phone: phone.clone(),
                })
                .await;
        }

        match outcome {
            Ok(()) => {
                if report.stored > 0 || !report.failures.is_empty() {
                    info!(
                        stored = report.stored,
                        failed = report.failures.len(),
                        chats = report.phones.len(),
                        "webhook batch ingested"
                    );
                }
                Ok(report)
            },
            Err(e) => {
                warn!(
                    stored = report.stored,
                    error = %e,
                    "webhook batch aborted"
                );
                Err(e)
            },
        }
    }

    async fn process_into(&self, payload: &WebhookPayload, report: &mut IngestReport) -> Result<()> {
        for entry in &payload.entry {
            for change in &entry.changes {
                if change.field != "messages" {
                    debug!(field = %change.field, "ignoring webhook change");
                    report.ignored_changes += 1;
                    continue;
                }

                let value = &change.value;
                if let (Some(expected), Some(actual)) = (
                    self.phone_number_id.as_deref(),
                    value
                        .metadata
                        .as_ref()
                        .and_then(|m| m.phone_number_id.as_deref()),
                ) && expected != actual
                {
                    warn!(expected, actual, "webhook change for another phone number id");
                    report.ignored_changes += 1;
                    continue;
                }

                if !value.statuses.is_empty() {
                    debug!(count = value.statuses.len(), "delivery statuses received");
                    report.statuses += value.statuses.len();
                }

                for raw in &value.messages {
                    let sender_name = raw
                        .get("from")
                        .and_then(serde_json::Value::as_str)
                        .and_then(|from| value.contact_name(from));

                    match normalize_value(raw, sender_name) {
                        Ok(normalized) => {
                            self.persist(&normalized).await?;
                            report.stored += 1;
                            let phone = &normalized.message.phone;
                            if !report.phones.contains(phone) {
                                report.phones.push(phone.clone());
                            }
                        },
                        Err(Error::MalformedEvent { reason }) => {
                            let message_id = raw
                                .get("id")
                                .and_then(serde_json::Value::as_str)
                                .map(str::to_string);
                            warn!(?message_id, %reason, "skipping malformed webhook event");
                            report.failures.push(EventFailure {
                                entry_id: entry.id.clone(),
                                message_id,
                                reason,
                            });
                        },
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(())
    }

    /// Append the message and merge the chat atomically.
    async fn persist(&self, normalized: &NormalizedMessage) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = messages::insert_in(&mut tx, &normalized.message).await?;
        chats::upsert_in(&mut tx, &normalized.chat_update()).await?;
        tx.commit().await?;
        debug!(phone = %normalized.message.phone, id, "inbound message stored");
        Ok(id)
    }
}
