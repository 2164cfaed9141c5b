use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
};

use crate::{error::ApiResult, server::AppState};

/// `GET /api/chats`
pub async fn list_chats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let chats = state.gateway.inbox.chats().await?;
    Ok(Json(chats))
}

/// `GET /api/chats/{phone}/messages`
pub async fn list_messages(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let messages = state.gateway.inbox.messages(&phone).await?;
    Ok(Json(messages))
}

/// `POST /api/chats/{phone}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.gateway.inbox.mark_read(&phone).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

#[derive(Debug, Deserialize)]
pub struct PinBody {
    pinned: bool,
}

/// `PUT /api/chats/{phone}/pin`
pub async fn set_pinned(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Json(body): Json<PinBody>,
) -> ApiResult<Response> {
    if !state.gateway.inbox.set_pinned(&phone, body.pinned).await? {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "chat not found" })),
        )
            .into_response());
    }
    Ok(Json(serde_json::json!({ "phone": phone, "pinned": body.pinned })).into_response())
}
