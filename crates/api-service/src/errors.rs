//! API service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Token
//! rejections carry the stable reason code from [`AuthError::reason`] so
//! clients and tests can tell them apart. Server-side faults return generic
//! messages; details are logged.

use crate::auth::AuthError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

const WWW_AUTHENTICATE_MISSING: &str = "Bearer realm=\"api\"";
const WWW_AUTHENTICATE_INVALID: &str = "Bearer realm=\"api\", error=\"invalid_token\"";

/// API service error type.
///
/// - Unauthenticated: 401 (no usable bearer credentials)
/// - Auth: 401, 503 or 500 depending on the [`AuthError`]
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthenticated(_) => 401,
            ApiError::Auth(err) => err.status_code(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, reason, challenge) = match &self {
            ApiError::Unauthenticated(message) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                message.clone(),
                None,
                Some(WWW_AUTHENTICATE_MISSING),
            ),
            ApiError::Auth(AuthError::KeySourceUnavailable) => {
                tracing::warn!(target: "api.availability", "Signing key source unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                    Some(AuthError::KeySourceUnavailable.reason()),
                    None,
                )
            }
            ApiError::Auth(AuthError::Misconfigured(detail)) => {
                tracing::error!(target: "api.auth", detail = %detail, "Token verification misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
            ApiError::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                err.to_string(),
                Some(err.reason()),
                Some(WWW_AUTHENTICATE_INVALID),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code,
                message,
                reason,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if let Some(challenge) = challenge {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(challenge),
            );
        }

        response
    }
}
