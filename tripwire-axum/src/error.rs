use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tripwire_core::Error as CoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Too many failed sign-in attempts")]
    Locked { retry_after_seconds: i64 },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => AuthError::BadRequest(e.to_string()),
            CoreError::Storage(e) => {
                tracing::error!(error = %e, "Storage error while handling sign-in");
                AuthError::InternalError(e.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::Locked {
                retry_after_seconds,
            } => return locked_response(retry_after_seconds),
            AuthError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            // Storage details stay in the logs.
            AuthError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

fn locked_response(retry_after_seconds: i64) -> Response {
    let status = StatusCode::TOO_MANY_REQUESTS;
    let body = Json(json!({
        "error": format!(
            "Too many failed sign-in attempts. Try again in {} minute(s).",
            (retry_after_seconds + 59) / 60
        ),
        "code": status.as_u16(),
        "retry_after": retry_after_seconds
    }));

    let mut response = (status, body).into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

pub type Result<T> = std::result::Result<T, AuthError>;
