use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};

use crate::{error::ApiResult, server::AppState};

/// `GET /api/media/{media_id}`: stream the media bytes through, keeping the
/// upstream content type.
pub async fn media_proxy(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> ApiResult<Response> {
    let media = state.gateway.inbox.media(&media_id).await?;

    let mut response = Body::from_stream(media.body).into_response();
    let headers = response.headers_mut();
    let content_type = media
        .mime_type
        .as_deref()
        .and_then(|m| HeaderValue::from_str(m).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(CONTENT_TYPE, content_type);
    if let Some(len) = media.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("private, max-age=3600"));
    Ok(response)
}
