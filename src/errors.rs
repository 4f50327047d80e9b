use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("calendar error: {0}")]
    Calendar(String),

    #[error("voice platform error: {0}")]
    VoicePlatform(String),

    #[error("telephony error: {0}")]
    Telephony(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn calendar(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain on one line
        AppError::Calendar(format!("{err:#}"))
    }

    pub fn voice(err: anyhow::Error) -> Self {
        AppError::VoicePlatform(format!("{err:#}"))
    }

    pub fn telephony(err: anyhow::Error) -> Self {
        AppError::Telephony(format!("{err:#}"))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid JSON payload: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Calendar(_) => StatusCode::BAD_GATEWAY,
            AppError::VoicePlatform(_) => StatusCode::BAD_GATEWAY,
            AppError::Telephony(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
