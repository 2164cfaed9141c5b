//! Canonical chat and message model shared by every ingestion and send path.

use serde::{Deserialize, Serialize};

/// Which side of the conversation produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Canonical message kind, independent of the gateway's own type markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Document,
    Video,
    Audio,
    Interactive,
    Template,
    Other,
}

impl MessageType {
    /// Kinds whose `media_ref` may point at downloadable bytes.
    pub fn is_media(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Document | Self::Video | Self::Audio
        )
    }
}

/// A persisted message. Immutable apart from `is_read` on inbound rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub phone: String,
    pub direction: Direction,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub message_type: MessageType,
    pub text: Option<String>,
    pub template_name: Option<String>,
    pub media_ref: Option<String>,
    pub timestamp: i64,
    pub is_read: bool,
    /// Provider message id (`wamid.…`), kept for forensics only.
    pub external_id: Option<String>,
}

/// A message that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub phone: String,
    pub direction: Direction,
    pub message_type: MessageType,
    pub text: Option<String>,
    pub template_name: Option<String>,
    pub media_ref: Option<String>,
    pub timestamp: i64,
    pub is_read: bool,
    pub external_id: Option<String>,
}

impl NewMessage {
    /// An inbound message starts unread.
    pub fn inbound(phone: impl Into<String>, message_type: MessageType, timestamp: i64) -> Self {
        Self {
            phone: phone.into(),
            direction: Direction::Inbound,
            message_type,
            text: None,
            template_name: None,
            media_ref: None,
            timestamp,
            is_read: false,
            external_id: None,
        }
    }

    /// Outbound messages have nothing to read, so they start read.
    pub fn outbound(phone: impl Into<String>, message_type: MessageType, timestamp: i64) -> Self {
        Self {
            direction: Direction::Outbound,
            is_read: true,
            ..Self::inbound(phone, message_type, timestamp)
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    #[must_use]
    pub fn with_media_ref(mut self, media_ref: Option<String>) -> Self {
        self.media_ref = media_ref;
        self
    }

    #[must_use]
    pub fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }

    /// Attach the id assigned by the message log.
    pub fn into_message(self, id: i64) -> Message {
        Message {
            id,
            phone: self.phone,
            direction: self.direction,
            message_type: self.message_type,
            text: self.text,
            template_name: self.template_name,
            media_ref: self.media_ref,
            timestamp: self.timestamp,
            is_read: self.is_read,
            external_id: self.external_id,
        }
    }
}

/// One merge into the chat aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUpdate {
    pub phone: String,
    pub timestamp: i64,
    pub preview: String,
    /// Only ever set from inbound profile data.
    pub name: Option<String>,
}

/// Chat row as shown in the panel, with the derived unread flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ChatSummary {
    pub phone: String,
    pub name: Option<String>,
    pub last_timestamp: Option<i64>,
    pub last_preview: Option<String>,
    pub pinned: bool,
    pub has_unread: bool,
}

/// Cached template metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TemplateCacheEntry {
    pub name: String,
    pub language: String,
    pub status: String,
    pub category: Option<String>,
    pub last_synced_at: i64,
}

/// Maximum preview length, in characters.
pub const PREVIEW_CHARS: usize = 60;

/// First [`PREVIEW_CHARS`] characters of `text`.
pub fn preview_of(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
