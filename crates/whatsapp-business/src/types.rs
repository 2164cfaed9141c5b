//! Graph API request and response bodies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: &'a str,
    #[serde(flatten)]
    pub content: MessageContent<'a>,
}

impl<'a> SendMessageRequest<'a> {
    pub fn new(to: &'a str, content: MessageContent<'a>) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent<'a> {
    Text { text: TextContent<'a> },
    Template { template: TemplateContent<'a> },
}

#[derive(Debug, Serialize)]
pub struct TextContent<'a> {
    pub preview_url: bool,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct TemplateContent<'a> {
    pub name: &'a str,
    pub language: LanguageContent<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct LanguageContent<'a> {
    pub code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct TemplatePage {
    #[serde(default)]
    pub data: Vec<GraphTemplate>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub struct GraphTemplate {
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /{media-id}` metadata; `url` is short-lived and needs the bearer token.
#[derive(Debug, Deserialize)]
pub struct MediaMetadata {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
