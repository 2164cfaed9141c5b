use axum::{Json, extract::State, response::IntoResponse};

use crate::{error::ApiResult, server::AppState};

/// `GET /api/templates`: the cached catalogue.
pub async fn list_templates(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let templates = state.gateway.inbox.templates().await?;
    Ok(Json(templates))
}

/// `POST /api/templates/refresh`: re-fetch the catalogue now.
pub async fn refresh_templates(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let count = state.gateway.inbox.refresh_templates().await?;
    Ok(Json(serde_json::json!({ "count": count })))
}
