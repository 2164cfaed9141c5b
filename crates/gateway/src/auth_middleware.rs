use {
    axum::{
        body::Body,
        extract::{Query, State},
        http::{Request, header::AUTHORIZATION},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::debug,
};

use {chatdesk_inbox::Error, chatdesk_whatsapp_business::constant_time_eq};

use crate::{error::ApiError, server::AppState};

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Middleware guarding the chat panel API and the WebSocket.
///
/// With no api key configured every request passes. Otherwise the key must
/// arrive as `Authorization: Bearer <key>` or, for browsers opening a
/// WebSocket, as a `?token=<key>` query parameter.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ref api_key) = state.gateway.api_key else {
        return next.run(request).await;
    };
    let expected = api_key.expose_secret();

    if let Some(key) = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        && constant_time_eq(key.trim(), expected)
    {
        return next.run(request).await;
    }

    if let Ok(Query(TokenQuery { token: Some(token) })) =
        Query::<TokenQuery>::try_from_uri(request.uri())
        && constant_time_eq(&token, expected)
    {
        return next.run(request).await;
    }

    debug!(path = %request.uri().path(), "rejected unauthenticated request");
    ApiError(Error::authorization("missing or invalid api key")).into_response()
}
