#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use {
    async_trait::async_trait,
    axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    },
    bytes::Bytes,
    futures::{StreamExt, stream},
    hmac::{Hmac, Mac},
    secrecy::Secret,
    sha2::Sha256,
    tower::ServiceExt,
};

use {
    chatdesk_config::{ChatdeskConfig, DatabaseConfig},
    chatdesk_gateway::{GatewayState, broadcast::Broadcaster, build_gateway_app},
    chatdesk_inbox::{
        Error, GatewayClient, Inbox, InboxOptions, MediaSource, MediaStream, Result, SendReceipt,
        TemplateInfo, TemplateSend, TemplateSource, open_pool, run_migrations,
    },
};

const APP_SECRET: &str = "app-secret";
const API_KEY: &str = "panel-key";

#[derive(Default)]
struct FakeGraph {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl GatewayClient for FakeGraph {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt> {
        self.sent.lock().unwrap().push((to.into(), body.into()));
        Ok(SendReceipt {
            external_id: Some("wamid.OUT1".into()),
        })
    }

    async fn send_template(&self, to: &str, template: &TemplateSend) -> Result<SendReceipt> {
        self.sent
            .lock()
            .unwrap()
            .push((to.into(), format!("{}:{}", template.name, template.language)));
        Ok(SendReceipt {
            external_id: Some("wamid.TPL1".into()),
        })
    }
}

#[async_trait]
impl TemplateSource for FakeGraph {
    async fn list_templates(&self) -> Result<Vec<TemplateInfo>> {
        Ok(vec![TemplateInfo {
            name: "Welcome".into(),
            language: "en-us".into(),
            status: "approved".into(),
            category: Some("UTILITY".into()),
        }])
    }
}

#[async_trait]
impl MediaSource for FakeGraph {
    async fn fetch_media(&self, media_id: &str) -> Result<MediaStream> {
        if media_id != "MEDIA1" {
            return Err(Error::gateway("media not found", Some(404)));
        }
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"\x89PNG")),
            Ok(Bytes::from_static(b"rest")),
        ];
        Ok(MediaStream {
            mime_type: Some("image/png".into()),
            content_length: Some(8),
            body: stream::iter(chunks).boxed(),
        })
    }
}

struct Harness {
    app: Router,
    graph: Arc<FakeGraph>,
    broadcaster: Arc<Broadcaster>,
}

async fn harness(configure: impl FnOnce(&mut ChatdeskConfig)) -> Harness {
    let mut config = ChatdeskConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
            ..DatabaseConfig::default()
        },
        ..ChatdeskConfig::default()
    };
    config.whatsapp.verify_token = "verify-me".into();
    configure(&mut config);

    let pool = open_pool(&config.database).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let graph = Arc::new(FakeGraph::default());
    let broadcaster = Arc::new(Broadcaster::default());
    let inbox = Arc::new(Inbox::new(
        pool,
        graph.clone(),
        broadcaster.clone(),
        InboxOptions::from_config(&config),
    ));
    let state = GatewayState::new(inbox, broadcaster.clone(), &config);
    Harness {
        app: build_gateway_app(state, &[]),
        graph,
        broadcaster,
    }
}

async fn open_harness() -> Harness {
    harness(|_| {}).await
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(APP_SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn inbound_payload() -> String {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"phone_number_id": "PN1"},
                    "contacts": [{"wa_id": "5215550001", "profile": {"name": "Ana"}}],
                    "messages": [{
                        "from": "5215550001",
                        "id": "wamid.IN1",
                        "timestamp": "1700000000",
                        "type": "text",
                        "text": {"body": "hola, necesito ayuda"}
                    }]
                }
            }]
        }]
    })
    .to_string()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let h = open_harness().await;
    let response = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn webhook_handshake_echoes_challenge() {
    let h = open_harness().await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::get(
                "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=12345",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"12345");

    let rejected = h
        .app
        .oneshot(
            Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn inbound_webhook_creates_chat() {
    let h = open_harness().await;
    let response = h
        .app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(inbound_payload()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);

    let chats = h
        .app
        .clone()
        .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let chats = json_body(chats).await;
    assert_eq!(chats.as_array().unwrap().len(), 1);
    assert_eq!(chats[0]["phone"], "5215550001");
    assert_eq!(chats[0]["name"], "Ana");
    assert_eq!(chats[0]["has_unread"], true);

    let messages = h
        .app
        .oneshot(
            Request::get("/api/chats/5215550001/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let messages = json_body(messages).await;
    assert_eq!(messages[0]["text"], "hola, necesito ayuda");
    assert_eq!(messages[0]["direction"], "inbound");
}

#[tokio::test]
async fn garbage_webhook_body_is_still_acknowledged() {
    let h = open_harness().await;
    let response = h
        .app
        .oneshot(
            Request::post("/webhook")
                .body(Body::from("not json at all"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_signature_is_enforced_when_secret_set() {
    let h = harness(|c| c.whatsapp.app_secret = Some(Secret::new(APP_SECRET.into()))).await;
    let body = inbound_payload();

    let unsigned = h
        .app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(unsigned).await["error"],
        "not authorized: invalid signature"
    );

    let signed = h
        .app
        .oneshot(
            Request::post("/webhook")
                .header("x-hub-signature-256", sign(body.as_bytes()))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(signed.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_requires_key_when_configured() {
    let h = harness(|c| c.auth.api_key = Some(Secret::new(API_KEY.into()))).await;

    let anonymous = h
        .app
        .clone()
        .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(anonymous).await["error"],
        "not authorized: missing or invalid api key"
    );

    let bearer = h
        .app
        .clone()
        .oneshot(
            Request::get("/api/chats")
                .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bearer.status(), StatusCode::OK);

    let query = h
        .app
        .clone()
        .oneshot(
            Request::get(format!("/api/chats?token={API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(query.status(), StatusCode::OK);

    // Health and the webhook stay public.
    let health = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn send_message_records_outbound() {
    let h = open_harness().await;
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/send-message",
            serde_json::json!({"to": "+52 1 555 000 1", "text": "te ayudamos"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["external_id"], "wamid.OUT1");
    assert_eq!(body["message"]["direction"], "outbound");

    assert_eq!(h.graph.sent.lock().unwrap()[0], (
        "5215550001".to_string(),
        "te ayudamos".to_string()
    ));

    let chats = h
        .app
        .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let chats = json_body(chats).await;
    assert_eq!(chats[0]["phone"], "5215550001");
    assert_eq!(chats[0]["last_preview"], "te ayudamos");
}

#[tokio::test]
async fn send_message_validation_is_bad_request() {
    let h = open_harness().await;
    let response = h
        .app
        .oneshot(post_json(
            "/api/send-message",
            serde_json::json!({"to": "5215550001", "text": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
    assert!(h.graph.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn send_template_uses_cached_language() {
    let h = open_harness().await;
    let refreshed = h
        .app
        .clone()
        .oneshot(
            Request::post("/api/templates/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(refreshed).await["count"], 1);

    let response = h
        .app
        .oneshot(post_json(
            "/api/send-template",
            serde_json::json!({"to": "5215550001", "template_name": " WELCOME "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.graph.sent.lock().unwrap()[0].1, "welcome:en_US");
}

#[tokio::test]
async fn pin_unknown_chat_is_not_found() {
    let h = open_harness().await;
    let request = Request::put("/api/chats/5215559999/pin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"pinned":true}"#))
        .unwrap();
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mark_read_clears_unread() {
    let h = open_harness().await;
    h.app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .body(Body::from(inbound_payload()))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = h
        .app
        .clone()
        .oneshot(
            Request::post("/api/chats/5215550001/read")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(response).await["updated"], 1);

    let chats = h
        .app
        .oneshot(Request::get("/api/chats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(chats).await[0]["has_unread"], false);
}

#[tokio::test]
async fn media_proxy_streams_bytes() {
    let h = open_harness().await;
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/api/media/MEDIA1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNGrest");

    let missing = h
        .app
        .oneshot(Request::get("/api/media/OTHER").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn websocket_receives_chat_updates() {
    let h = open_harness().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = h.app.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    let hello = socket.next().await.unwrap().unwrap();
    let hello: serde_json::Value = serde_json::from_str(hello.to_text().unwrap()).unwrap();
    assert_eq!(hello["type"], "hello");

    while h.broadcaster.client_count() == 0 {
        tokio::task::yield_now().await;
    }

    h.app
        .oneshot(
            Request::post("/webhook")
                .body(Body::from(inbound_payload()))
                .unwrap(),
        )
        .await
        .unwrap();

    let frame = socket.next().await.unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(frame["type"], "event");
    assert_eq!(frame["event"]["kind"], "chat_updated");
    assert_eq!(frame["event"]["phone"], "5215550001");

    socket.close(None).await.unwrap();
}
