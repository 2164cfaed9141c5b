//! Seams to the messaging gateway. The Graph API client implements these;
//! tests substitute in-memory fakes.

use {
    async_trait::async_trait,
    bytes::Bytes,
    futures::stream::BoxStream,
    serde::{Deserialize, Serialize},
};

use crate::error::Result;

/// What the gateway returns for an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Provider message id, when the response carried one.
    pub external_id: Option<String>,
}

/// A template send after name normalization and language resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSend {
    pub name: String,
    pub language: String,
    pub components: Option<serde_json::Value>,
}

/// One template as listed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub name: String,
    pub language: String,
    pub status: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Streamed media bytes plus the upstream content metadata.
pub struct MediaStream {
    pub mime_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Outbound message delivery.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt>;

    async fn send_template(&self, to: &str, template: &TemplateSend) -> Result<SendReceipt>;
}

/// Template catalogue, fetched in full (all pages).
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn list_templates(&self) -> Result<Vec<TemplateInfo>>;
}

/// Media download by opaque media id.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_media(&self, media_id: &str) -> Result<MediaStream>;
}
