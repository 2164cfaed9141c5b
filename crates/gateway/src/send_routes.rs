use {
    axum::{Json, extract::State, response::IntoResponse},
    serde::Deserialize,
};

use chatdesk_inbox::{OutboundPayload, SendResult};

use crate::{error::ApiResult, server::AppState};

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    #[serde(default)]
    to: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct SendTemplateBody {
    #[serde(default)]
    to: String,
    #[serde(default)]
    template_name: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    components: Option<serde_json::Value>,
}

fn sent(result: SendResult) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "external_id": result.external_id,
        "message": result.message,
    }))
}

/// `POST /api/send-message`
pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageBody>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .gateway
        .inbox
        .send(&body.to, OutboundPayload::Text { body: body.text })
        .await?;
    Ok(sent(result))
}

/// `POST /api/send-template`
pub async fn send_template(
    State(state): State<AppState>,
    Json(body): Json<SendTemplateBody>,
) -> ApiResult<impl IntoResponse> {
    let result = state
        .gateway
        .inbox
        .send(&body.to, OutboundPayload::Template {
            name: body.template_name,
            language: body.language,
            components: body.components,
        })
        .await?;
    Ok(sent(result))
}
