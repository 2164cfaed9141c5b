//! Inbound webhook endpoints: subscription handshake and event delivery.

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
    },
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{info, warn},
};

use {
    chatdesk_inbox::{Error, WebhookPayload},
    chatdesk_whatsapp_business::{SIGNATURE_HEADER, verify_signature, verify_webhook_subscription},
};

use crate::{error::ApiError, server::AppState};

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// `GET /webhook`: echo the challenge when the verify token matches.
pub async fn webhook_verify(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> impl IntoResponse {
    match verify_webhook_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
        &state.gateway.verify_token,
    ) {
        Some(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        },
        None => {
            warn!(mode = ?query.mode, "webhook subscription rejected");
            StatusCode::FORBIDDEN.into_response()
        },
    }
}

/// `POST /webhook`: authenticate, archive and ingest one delivery.
///
/// Once the signature passes the response is always 200, whatever happens
/// during ingestion, so the gateway does not redeliver in a loop.
pub async fn webhook_receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(ref secret) = state.gateway.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(&body, signature, secret.expose_secret()) {
            warn!("webhook delivery with invalid signature");
            return ApiError(Error::authorization("invalid signature")).into_response();
        }
    }

    let inbox = &state.gateway.inbox;
    let raw = String::from_utf8_lossy(&body);
    if let Err(e) = inbox.record_delivery(&raw).await {
        warn!(error = %e, "failed to archive webhook delivery");
    }

    match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) => match inbox.ingest(&payload).await {
            Ok(report) => {
                if !report.failures.is_empty() {
                    warn!(failures = report.failures.len(), "webhook delivery had malformed events");
                }
            },
            Err(e) => warn!(error = %e, "webhook ingestion failed"),
        },
        Err(e) => warn!(error = %e, "webhook body is not a valid delivery"),
    }

    (StatusCode::OK, Json(serde_json::json!({"received": true}))).into_response()
}
