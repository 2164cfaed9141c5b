//! Maps gateway-native message events onto the canonical [`Message`] model.
//!
//! Decoding happens in two steps. Serde turns the raw JSON into a loosely
//! typed [`WebhookMessage`]; [`classify`] then resolves it into the closed
//! [`InboundContent`] union using the priority order below, and
//! [`normalize`] matches exhaustively on that union.
//!
//! | marker                        | type        | preview                       |
//! |-------------------------------|-------------|-------------------------------|
//! | `text`                        | text        | first 60 chars of the body    |
//! | `audio` / `voice`             | audio       | `[AUDIO]`                     |
//! | `image`                       | image       | `[IMAGE]`                     |
//! | `document`                    | document    | filename or `[DOCUMENT]`      |
//! | `video`                       | video       | `[VIDEO]`                     |
//! | `interactive` / `button`      | interactive | reply text                    |
//! | anything else                 | other       | `[<TYPE>]`                    |
//!
//! [`Message`]: crate::model::Message

use chatdesk_common::phone::normalize_phone;

use crate::{
    error::{Error, Result},
    model::{ChatUpdate, MessageType, NewMessage, preview_of},
    webhook::{MediaBody, WebhookMessage},
};

const INTERACTIVE_FALLBACK: &str = "interactive response";

/// Closed set of inbound shapes the inbox understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text { body: String },
    Audio { media_id: Option<String> },
    Image {
        media_id: Option<String>,
        caption: Option<String>,
    },
    Document {
        media_id: Option<String>,
        filename: Option<String>,
    },
    Video {
        media_id: Option<String>,
        caption: Option<String>,
    },
    Interactive { reply: String },
    Other { kind: String },
}

/// Normalizer output: the message to append plus what the chat upsert needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMessage {
    pub message: NewMessage,
    pub preview: String,
    pub sender_name: Option<String>,
}

impl NormalizedMessage {
    pub fn chat_update(&self) -> ChatUpdate {
        ChatUpdate {
            phone: self.message.phone.clone(),
            timestamp: self.message.timestamp,
            preview: self.preview.clone(),
            name: self.sender_name.clone(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn media_id(body: Option<&MediaBody>) -> Option<String> {
    non_empty(body.and_then(|b| b.id.as_deref()))
}

/// Resolve the gateway's type marker and payload objects into a closed shape.
pub fn classify(msg: &WebhookMessage) -> InboundContent {
    let kind = msg
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or("unknown")
        .to_ascii_lowercase();

    if kind == "text" {
        let body = msg
            .text
            .as_ref()
            .and_then(|t| t.body.clone())
            .unwrap_or_default();
        return InboundContent::Text { body };
    }

    if matches!(kind.as_str(), "audio" | "voice") || msg.audio.is_some() || msg.voice.is_some() {
        let media_id = media_id(msg.audio.as_ref()).or_else(|| media_id(msg.voice.as_ref()));
        return InboundContent::Audio { media_id };
    }

    match kind.as_str() {
        "image" => {
            let image = msg.image.as_ref();
            InboundContent::Image {
                media_id: media_id(image),
                caption: non_empty(image.and_then(|b| b.caption.as_deref())),
            }
        },
        "document" => {
            let document = msg.document.as_ref();
            InboundContent::Document {
                media_id: media_id(document),
                filename: non_empty(document.and_then(|b| b.filename.as_deref())),
            }
        },
        "video" => {
            let video = msg.video.as_ref();
            InboundContent::Video {
                media_id: media_id(video),
                caption: non_empty(video.and_then(|b| b.caption.as_deref())),
            }
        },
        "interactive" | "button" => InboundContent::Interactive {
            reply: interactive_reply(msg),
        },
        _ => InboundContent::Other { kind },
    }
}

fn interactive_reply(msg: &WebhookMessage) -> String {
    let from_interactive = msg.interactive.as_ref().and_then(|i| {
        [i.button_reply.as_ref(), i.list_reply.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|reply| {
                non_empty(reply.title.as_deref()).or_else(|| non_empty(reply.id.as_deref()))
            })
    });
    let from_button = || {
        msg.button.as_ref().and_then(|b| {
            non_empty(b.text.as_deref()).or_else(|| non_empty(b.payload.as_deref()))
        })
    };
    from_interactive
        .or_else(from_button)
        .unwrap_or_else(|| INTERACTIVE_FALLBACK.to_string())
}

/// Normalize one inbound message event.
///
/// `sender_name` is the profile name reported alongside the event, if any.
/// Missing sender or an unusable timestamp yields [`Error::MalformedEvent`].
pub fn normalize(msg: &WebhookMessage, sender_name: Option<&str>) -> Result<NormalizedMessage> {
    let from = msg
        .from
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| Error::malformed("message has no sender"))?;
    let phone =
        normalize_phone(from).map_err(|e| Error::malformed(format!("bad sender: {e}")))?;

    let raw_ts = msg
        .timestamp
        .as_ref()
        .ok_or_else(|| Error::malformed("message has no timestamp"))?;
    let timestamp = raw_ts
        .as_epoch_seconds()
        .filter(|ts| *ts >= 0)
        .ok_or_else(|| Error::malformed(format!("bad timestamp {raw_ts:?}")))?;

    let (message_type, text, media_ref, preview) = match classify(msg) {
        InboundContent::Text { body } => {
            let preview = preview_of(&body);
            (MessageType::Text, Some(body), None, preview)
        },
        InboundContent::Audio { media_id } => {
            (MessageType::Audio, None, media_id, "[AUDIO]".to_string())
        },
        InboundContent::Image { media_id, caption } => {
            (MessageType::Image, caption, media_id, "[IMAGE]".to_string())
        },
        InboundContent::Document { media_id, filename } => {
            let preview = filename
                .clone()
                .unwrap_or_else(|| "[DOCUMENT]".to_string());
            (MessageType::Document, filename, media_id, preview)
        },
        InboundContent::Video { media_id, caption } => {
            (MessageType::Video, caption, media_id, "[VIDEO]".to_string())
        },
        InboundContent::Interactive { reply } => {
            let preview = preview_of(&reply);
            (MessageType::Interactive, Some(reply), None, preview)
        },
        InboundContent::Other { kind } => (
            MessageType::Other,
            None,
            None,
            format!("[{}]", kind.to_uppercase()),
        ),
    };

    let message = NewMessage::inbound(phone, message_type, timestamp)
        .with_text(text)
        .with_media_ref(media_ref)
        .with_external_id(non_empty(msg.id.as_deref()));

    Ok(NormalizedMessage {
        message,
        preview,
        sender_name: non_empty(sender_name),
    })
}

/// Decode and normalize a raw JSON message event.
pub fn normalize_value(raw: &serde_json::Value, sender_name: Option<&str>) -> Result<NormalizedMessage> {
    let msg: WebhookMessage = serde_json::from_value(raw.clone())
        .map_err(|e| Error::malformed(format!("undecodable message: {e}")))?;
    normalize(&msg, sender_name)
}
