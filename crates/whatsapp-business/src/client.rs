//! Graph API client for the WhatsApp Business Cloud API.

use std::time::Duration;

use {
    async_trait::async_trait,
    futures::{StreamExt, TryStreamExt},
    reqwest::{Client, RequestBuilder, Response, header::CONTENT_TYPE},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::{debug, warn},
};

use {
    chatdesk_config::WhatsAppConfig,
    chatdesk_inbox::{
        Error, GatewayClient, MediaSource, MediaStream, Result, SendReceipt, TemplateInfo,
        TemplateSend, TemplateSource,
    },
};

use crate::types::{
    GraphErrorEnvelope, LanguageContent, MediaMetadata, MessageContent, SendMessageRequest,
    SendMessageResponse, TemplateContent, TemplatePage, TextContent,
};

/// Templates requested per page.
const TEMPLATE_PAGE_SIZE: u32 = 100;

/// Give up on `paging.next` after this many pages. A partial catalogue is
/// never returned.
const MAX_TEMPLATE_PAGES: usize = 50;

/// Media downloads may run this many times longer than API calls.
const MEDIA_TIMEOUT_FACTOR: u32 = 8;

/// Longest upstream error body echoed into an error message.
const ERROR_DETAIL_CHARS: usize = 300;

#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    access_token: Option<Secret<String>>,
    phone_number_id: String,
    waba_id: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("phone_number_id", &self.phone_number_id)
            .field("waba_id", &self.waba_id)
            .finish()
    }
}

impl GraphClient {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/{}",
                config.graph_url.trim_end_matches('/'),
                config.api_version.trim_matches('/')
            ),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.trim().to_string(),
            waba_id: config
                .waba_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            timeout,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .access_token
            .as_ref()
            .filter(|t| !t.expose_secret().is_empty())
            .ok_or_else(|| Error::gateway("access token not configured", None))?;
        Ok(request.bearer_auth(token.expose_secret()))
    }

    async fn post_message(&self, payload: &SendMessageRequest<'_>) -> Result<SendReceipt> {
        if self.phone_number_id.is_empty() {
            return Err(Error::gateway("phone number id not configured", None));
        }
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let request = self.authorized(self.client.post(&url).json(payload))?;
        let response: SendMessageResponse = read_json(send(request).await?).await?;

        let external_id = response.messages.into_iter().next().map(|m| m.id);
        if external_id.is_none() {
            warn!(to = payload.to, "gateway accepted message without returning an id");
        }
        debug!(to = payload.to, ?external_id, "message accepted by gateway");
        Ok(SendReceipt { external_id })
    }
}

#[async_trait]
impl GatewayClient for GraphClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt> {
        let payload = SendMessageRequest::new(to, MessageContent::Text {
            text: TextContent {
                preview_url: false,
                body,
            },
        });
        self.post_message(&payload).await
    }

    async fn send_template(&self, to: &str, template: &TemplateSend) -> Result<SendReceipt> {
        let name = template.name.trim().to_lowercase();
        let language = template.language.trim().replace('-', "_");
        let payload = SendMessageRequest::new(to, MessageContent::Template {
            template: TemplateContent {
                name: &name,
                language: LanguageContent { code: &language },
                components: template.components.as_ref(),
            },
        });
        self.post_message(&payload).await
    }
}

#[async_trait]
impl TemplateSource for GraphClient {
    async fn list_templates(&self) -> Result<Vec<TemplateInfo>> {
        let waba_id = self
            .waba_id
            .as_deref()
            .ok_or_else(|| Error::gateway("business account id not configured", None))?;

        let first = format!("{}/{waba_id}/message_templates", self.base_url);
        let limit = TEMPLATE_PAGE_SIZE.to_string();
        let mut request = self
            .client
            .get(&first)
            .query(&[("fields", "name,language,status,category"), ("limit", limit.as_str())]);

        let mut templates = Vec::new();
        for page_no in 1..=MAX_TEMPLATE_PAGES {
            let page: TemplatePage = read_json(send(self.authorized(request)?).await?).await?;
            debug!(page = page_no, count = page.data.len(), "fetched template page");
            templates.extend(page.data.into_iter().map(|t| TemplateInfo {
                name: t.name,
                language: t.language,
                status: t.status.unwrap_or_else(|| "UNKNOWN".into()),
                category: t.category,
            }));

            match page.paging.and_then(|p| p.next).filter(|n| !n.is_empty()) {
                Some(next) => request = self.client.get(next),
                None => return Ok(templates),
            }
        }

        warn!(
            pages = MAX_TEMPLATE_PAGES,
            count = templates.len(),
            "template listing did not terminate, discarding partial result"
        );
        Err(Error::gateway(
            format!("template listing exceeded {MAX_TEMPLATE_PAGES} pages"),
            None,
        ))
    }
}

#[async_trait]
impl MediaSource for GraphClient {
    async fn fetch_media(&self, media_id: &str) -> Result<MediaStream> {
        if media_id.is_empty()
            || !media_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(Error::invalid_input(format!("invalid media id {media_id:?}")));
        }

        let url = format!("{}/{media_id}", self.base_url);
        let metadata: MediaMetadata =
            read_json(send(self.authorized(self.client.get(&url))?).await?).await?;

        let download = self
            .client
            .get(&metadata.url)
            .timeout(self.timeout * MEDIA_TIMEOUT_FACTOR);
        let response = check_status(send(self.authorized(download)?).await?).await?;

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or(metadata.mime_type);
        let content_length = response.content_length().or(metadata.file_size);
        debug!(media_id, ?mime_type, ?content_length, "streaming media");

        Ok(MediaStream {
            mime_type,
            content_length,
            body: response.bytes_stream().map_err(transport_error).boxed(),
        })
    }
}

async fn send(request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(transport_error)
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::gateway("gateway request timed out", None)
    } else {
        Error::gateway(
            format!("gateway request failed: {e}"),
            e.status().map(|s| s.as_u16()),
        )
    }
}

/// Turn a non-2xx response into a gateway error with the upstream detail.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<GraphErrorEnvelope>(&body)
        .ok()
        .and_then(|env| {
            env.error.message.map(|m| match env.error.code {
                Some(code) => format!("{m} (code {code})"),
                None => m,
            })
        })
        .unwrap_or_else(|| body.chars().take(ERROR_DETAIL_CHARS).collect());
    warn!(status = status.as_u16(), %detail, "gateway returned an error");
    Err(Error::gateway(
        format!("gateway returned {status}: {detail}"),
        Some(status.as_u16()),
    ))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| Error::gateway(format!("unexpected gateway response: {e}"), Some(status)))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        mockito::{Matcher, Server},
        serde_json::json,
    };

    fn config(server: &Server) -> WhatsAppConfig {
        WhatsAppConfig {
            access_token: Some(Secret::new("EAAG-test".into())),
            phone_number_id: "1099".into(),
            waba_id: Some("2020".into()),
            graph_url: server.url(),
            api_version: "v21.0".into(),
            request_timeout_secs: 5,
            ..WhatsAppConfig::default()
        }
    }

    #[tokio::test]
    async fn send_text_posts_message_and_returns_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/1099/messages")
            .match_header("authorization", "Bearer EAAG-test")
            .match_body(Matcher::PartialJson(json!({
                "messaging_product": "whatsapp",
                "to": "51999",
                "type": "text",
                "text": {"body": "Hola"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "messaging_product": "whatsapp",
                    "contacts": [{"input": "51999", "wa_id": "51999"}],
                    "messages": [{"id": "wamid.ABC"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        let receipt = client.send_text("51999", "Hola").await.unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("wamid.ABC"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_template_normalizes_name_and_language() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/1099/messages")
            .match_body(Matcher::PartialJson(json!({
                "type": "template",
                "template": {"name": "order_update", "language": {"code": "en_US"}}
            })))
            .with_status(200)
            .with_body(json!({"messages": [{"id": "wamid.T"}]}).to_string())
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        let receipt = client
            .send_template("51999", &TemplateSend {
                name: " Order_Update".into(),
                language: "en-US".into(),
                components: None,
            })
            .await
            .unwrap();
        assert_eq!(receipt.external_id.as_deref(), Some("wamid.T"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn graph_error_becomes_gateway_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v21.0/1099/messages")
            .with_status(400)
            .with_body(
                json!({"error": {"message": "Recipient phone number not in allowed list", "code": 131030}})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        match client.send_text("51999", "Hola").await.unwrap_err() {
            Error::Gateway { message, status } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("not in allowed list"), "{message}");
                assert!(message.contains("131030"), "{message}");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let server = Server::new_async().await;
        let mut cfg = config(&server);
        cfg.access_token = None;
        let client = GraphClient::new(&cfg).unwrap();
        assert!(matches!(
            client.send_text("51999", "Hola").await.unwrap_err(),
            Error::Gateway { status: None, .. }
        ));
    }

    #[tokio::test]
    async fn list_templates_follows_paging() {
        let mut server = Server::new_async().await;
        let next = format!("{}/v21.0/2020/message_templates?after=CURSOR", server.url());
        let page1 = server
            .mock("GET", "/v21.0/2020/message_templates")
            .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
            .with_status(200)
            .with_body(
                json!({
                    "data": [
                        {"name": "welcome", "language": "es", "status": "APPROVED", "category": "UTILITY"},
                        {"name": "promo", "language": "en_US", "status": "PENDING"}
                    ],
                    "paging": {"cursors": {"after": "CURSOR"}, "next": next}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/v21.0/2020/message_templates")
            .match_query(Matcher::UrlEncoded("after".into(), "CURSOR".into()))
            .with_status(200)
            .with_body(
                json!({"data": [{"name": "bye", "language": "es"}], "paging": {"cursors": {}}})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        let templates = client.list_templates().await.unwrap();
        let names: Vec<_> = templates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["welcome", "promo", "bye"]);
        assert_eq!(templates[2].status, "UNKNOWN");
        assert_eq!(templates[0].category.as_deref(), Some("UTILITY"));
        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn list_templates_fails_when_paging_never_ends() {
        let mut server = Server::new_async().await;
        let next = format!("{}/v21.0/2020/message_templates?after=LOOP", server.url());
        let looping = server
            .mock("GET", "/v21.0/2020/message_templates")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "data": [{"name": "welcome", "language": "es", "status": "APPROVED"}],
                    "paging": {"next": next}
                })
                .to_string(),
            )
            .expect(MAX_TEMPLATE_PAGES)
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        match client.list_templates().await.unwrap_err() {
            Error::Gateway { message, .. } => assert!(message.contains("pages"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
        looping.assert_async().await;
    }

    #[tokio::test]
    async fn list_templates_requires_waba_id() {
        let server = Server::new_async().await;
        let mut cfg = config(&server);
        cfg.waba_id = None;
        let client = GraphClient::new(&cfg).unwrap();
        assert!(client.list_templates().await.is_err());
    }

    #[tokio::test]
    async fn fetch_media_streams_download() {
        let mut server = Server::new_async().await;
        let download_url = format!("{}/download/M1", server.url());
        let meta = server
            .mock("GET", "/v21.0/M1")
            .with_status(200)
            .with_body(
                json!({"url": download_url, "mime_type": "image/jpeg", "file_size": 5, "id": "M1"})
                    .to_string(),
            )
            .create_async()
            .await;
        let download = server
            .mock("GET", "/download/M1")
            .match_header("authorization", "Bearer EAAG-test")
            .with_status(200)
            .with_header("content-type", "image/jpeg")
            .with_body("JPEG!")
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        let media = client.fetch_media("M1").await.unwrap();
        assert_eq!(media.mime_type.as_deref(), Some("image/jpeg"));
        let bytes: Vec<u8> = media
            .body
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .concat();
        assert_eq!(bytes, b"JPEG!");
        meta.assert_async().await;
        download.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_media_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v21.0/M404")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = GraphClient::new(&config(&server)).unwrap();
        assert!(matches!(
            client.fetch_media("M404").await.unwrap_err(),
            Error::Gateway {
                status: Some(404),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fetch_media_rejects_path_tricks() {
        let server = Server::new_async().await;
        let client = GraphClient::new(&config(&server)).unwrap();
        assert!(matches!(
            client.fetch_media("../me").await.unwrap_err(),
            Error::InvalidInput { .. }
        ));
    }
}
