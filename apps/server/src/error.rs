use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gm_runtime::RuntimeError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug)]
pub struct HttpApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl HttpApiError {
    fn new(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                detail,
            },
        }
    }

    pub fn unauthorized(detail: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "missing or malformed credential", Some(detail.to_string()))
    }

    pub fn not_found(game_id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "session not found", Some(format!("gameId={game_id}")))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, None)
    }

    pub fn unavailable(message: impl Into<String>, detail: String) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, Some(detail))
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RuntimeError> for HttpApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(game_id) => Self::not_found(&game_id),
            RuntimeError::Store(e) => {
                error!(error = %e, "store failure");
                Self::unavailable("storage unavailable", e.to_string())
            }
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error", Some(other.to_string()))
            }
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
