//! Outbound sends: call the gateway first, then record what left.
//!
//! Nothing is written unless the gateway accepted the message. If the local
//! write fails afterwards the caller gets [`Error::SentButNotRecorded`] so it
//! can tell the operator instead of retrying a message that already went out.

use std::{sync::Arc, time::Duration};

use {
    serde::Serialize,
    sqlx::SqlitePool,
    tracing::{debug, error, info, warn},
};

use chatdesk_common::{phone::normalize_phone, time::unix_now};

use crate::{
    error::{Error, Result},
    gateway::{GatewayClient, SendReceipt, TemplateSend},
    model::{ChatUpdate, Message, MessageType, NewMessage, preview_of},
    sink::{InboxEvent, NotificationSink},
    store::{SqliteTemplateStore, chats, messages},
    templates::{normalize_language_code, normalize_template_name},
};

/// Upper bound on the template language lookup before falling back.
const LANGUAGE_LOOKUP_TIMEOUT: Duration = Duration::from_millis(250);

/// What the operator asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    Text {
        body: String,
    },
    Template {
        name: String,
        /// Used when the cache has no entry for `name`.
        language: Option<String>,
        components: Option<serde_json::Value>,
    },
}

impl OutboundPayload {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn template(name: impl Into<String>) -> Self {
        Self::Template {
            name: name.into(),
            language: None,
            components: None,
        }
    }
}

/// A send that reached the gateway and was recorded locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub message: Message,
    pub external_id: Option<String>,
}

/// Validated send, ready for the gateway.
enum Prepared {
    Text { body: String },
    Template(TemplateSend),
}

pub struct OutboundCoordinator {
    pool: SqlitePool,
    gateway: Arc<dyn GatewayClient>,
    templates: SqliteTemplateStore,
    sink: Arc<dyn NotificationSink>,
    default_language: String,
}

impl OutboundCoordinator {
    pub fn new(
        pool: SqlitePool,
        gateway: Arc<dyn GatewayClient>,
        sink: Arc<dyn NotificationSink>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            templates: SqliteTemplateStore::new(pool.clone()),
            pool,
            gateway,
            sink,
            default_language: default_language.into(),
        }
    }

    pub async fn send(&self, to: &str, payload: OutboundPayload) -> Result<SendResult> {
        if to.trim().is_empty() {
            return Err(Error::invalid_input("recipient is required"));
        }
        let phone = normalize_phone(to)?;
        let prepared = self.prepare(payload).await?;

        let receipt = match &prepared {
            Prepared::Text { body } => self.gateway.send_text(&phone, body).await,
            Prepared::Template(template) => self.gateway.send_template(&phone, template).await,
        }
        .inspect_err(|e| warn!(phone = %phone, error = %e, "gateway rejected outbound message"))?;

        let message = self.record(&phone, prepared, &receipt).await.map_err(|e| {
            error!(
                phone = %phone,
                external_id = ?receipt.external_id,
                error = %e,
                "message sent but not recorded"
            );
            Error::SentButNotRecorded {
                external_id: receipt.external_id.clone(),
                source: Box::new(e),
            }
        })?;

        info!(phone = %phone, id = message.id, kind = ?message.message_type, "outbound message sent");
        self.sink
            .notify(InboxEvent::MessageSent {
                phone: phone.clone(),
                message_id: message.id,
            })
            .await;

        Ok(SendResult {
            message,
            external_id: receipt.external_id,
        })
    }

    async fn prepare(&self, payload: OutboundPayload) -> Result<Prepared> {
        match payload {
            OutboundPayload::Text { body } => {
                if body.trim().is_empty() {
                    return Err(Error::invalid_input("message text is required"));
                }
                Ok(Prepared::Text { body })
            },
            OutboundPayload::Template {
                name,
                language,
                components,
            } => {
                let name = normalize_template_name(&name);
                if name.is_empty() {
                    return Err(Error::invalid_input("template name is required"));
                }
                let language = self.resolve_language(&name, language.as_deref()).await;
                Ok(Prepared::Template(TemplateSend {
                    name,
                    language,
                    components,
                }))
            },
        }
    }

    /// Cached language, then the caller's, then the configured default.
    /// A slow or failing cache never blocks the send.
    pub async fn resolve_language(&self, name: &str, requested: Option<&str>) -> String {
        let cached =
            match tokio::time::timeout(LANGUAGE_LOOKUP_TIMEOUT, self.templates.lookup_language(name))
                .await
            {
                Ok(Ok(language)) => language,
                Ok(Err(e)) => {
                    warn!(template = name, error = %e, "template cache lookup failed");
                    None
                },
                Err(_) => {
                    warn!(template = name, "template cache lookup timed out");
                    None
                },
            };

        let language = cached
            .or_else(|| requested.map(str::to_string))
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.default_language.clone());
        debug!(template = name, %language, "template language resolved");
        normalize_language_code(&language)
    }

    async fn record(&self, phone: &str, prepared: Prepared, receipt: &SendReceipt) -> Result<Message> {
        let now = unix_now();
        let (new, preview) = match prepared {
            Prepared::Text { body } => {
                let preview = preview_of(&body);
                (
                    NewMessage::outbound(phone, MessageType::Text, now).with_text(Some(body)),
                    preview,
                )
            },
            Prepared::Template(template) => {
                let preview = format!("[TEMPLATE] {}", template.name);
                (
                    NewMessage::outbound(phone, MessageType::Template, now)
                        .with_template_name(template.name),
                    preview,
                )
            },
        };
        let new = new.with_external_id(receipt.external_id.clone());

        let mut tx = self.pool.begin().await?;
        let id = messages::insert_in(&mut tx, &new).await?;
        chats::upsert_in(&mut tx, &ChatUpdate {
            phone: phone.to_string(),
            timestamp: now,
            preview,
            name: None,
        })
        .await?;
        tx.commit().await?;
        Ok(new.into_message(id))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use {super::*, async_trait::async_trait, std::sync::Mutex};

    /// Gateway double that records calls and can be told to fail.
    #[derive(Default)]
    pub struct FakeGateway {
        pub texts: Mutex<Vec<(String, String)>>,
        pub templates: Mutex<Vec<(String, TemplateSend)>>,
        pub fail_with: Mutex<Option<u16>>,
    }

    impl FakeGateway {
        pub fn failing(status: u16) -> Self {
            Self {
                fail_with: Mutex::new(Some(status)),
                ..Self::default()
            }
        }

        fn check(&self) -> Result<()> {
            match self.fail_with.lock().ok().and_then(|s| *s) {
                Some(status) => Err(Error::gateway("upstream said no", Some(status))),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl GatewayClient for FakeGateway {
        async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt> {
            self.check()?;
            if let Ok(mut texts) = self.texts.lock() {
                texts.push((to.to_string(), body.to_string()));
            }
            Ok(SendReceipt {
                external_id: Some("wamid.OUT".into()),
            })
        }

        async fn send_template(&self, to: &str, template: &TemplateSend) -> Result<SendReceipt> {
            self.check()?;
            if let Ok(mut templates) = self.templates.lock() {
                templates.push((to.to_string(), template.clone()));
            }
            Ok(SendReceipt {
                external_id: Some("wamid.TPL".into()),
            })
        }
    }
}
