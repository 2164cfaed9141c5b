use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use chatdesk_inbox::Error;

/// Inbox error rendered as `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput { .. } | Error::MalformedEvent { .. } => StatusCode::BAD_REQUEST,
            Error::Authorization { .. } => StatusCode::UNAUTHORIZED,
            Error::Gateway { .. } => StatusCode::BAD_GATEWAY,
            Error::Persistence(_)
            | Error::Migrate(_)
            | Error::SentButNotRecorded { .. }
            | Error::External { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        let body = match &self.0 {
            Error::SentButNotRecorded { external_id, .. } => serde_json::json!({
                "error": self.0.to_string(),
                "sent": true,
                "external_id": external_id,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
