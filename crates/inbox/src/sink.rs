use {async_trait::async_trait, serde::Serialize};

/// Change notifications pushed to live chat panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboxEvent {
    /// New inbound message(s) merged into the chat.
    ChatUpdated { phone: String },
    MessageSent { phone: String, message_id: i64 },
    ChatRead { phone: String, updated: u64 },
    ChatPinned { phone: String, pinned: bool },
    TemplatesRefreshed { count: usize },
}

impl InboxEvent {
    pub fn phone(&self) -> Option<&str> {
        match self {
            Self::ChatUpdated { phone }
            | Self::MessageSent { phone, .. }
            | Self::ChatRead { phone, .. }
            | Self::ChatPinned { phone, .. } => Some(phone),
            Self::TemplatesRefreshed { .. } => None,
        }
    }
}

/// Receives inbox change notifications. Implementations must not block;
/// delivery is best effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: InboxEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn notify(&self, _event: InboxEvent) {}
}
