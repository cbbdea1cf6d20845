use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// Error responses in the shape the real backend uses: field maps for
/// validation, `{"detail": ...}` for everything else.
#[derive(Debug)]
pub enum ApiError {
    Validation(Value),
    Unauthorized(&'static str, String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        ApiError::Validation(json!({ field: [message] }))
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field("non_field_errors", message)
    }

    pub fn not_authenticated() -> Self {
        ApiError::Unauthorized(
            "not_authenticated",
            "Authentication credentials were not provided.".into(),
        )
    }

    pub fn token_not_valid() -> Self {
        ApiError::Unauthorized(
            "token_not_valid",
            "Given token not valid for any token type".into(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(body) => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
            ApiError::Unauthorized(code, detail) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": detail, "code": code })),
            )
                .into_response(),
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
