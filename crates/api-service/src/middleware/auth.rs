//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it with
//! the configured [`TokenVerifier`], and injects the resulting [`Identity`]
//! into request extensions.

use crate::auth::{Identity, TokenVerifier};
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "api.middleware.auth", "Missing Authorization header");
            ApiError::Unauthenticated("Missing Bearer token".to_string())
        })?;

    let (scheme, token) = value.trim().split_once(' ').ok_or_else(|| {
        tracing::debug!(target: "api.middleware.auth", "Invalid Authorization header format");
        ApiError::Unauthenticated("Missing Bearer token".to_string())
    })?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        tracing::debug!(target: "api.middleware.auth", "Authorization scheme is not Bearer");
        return Err(ApiError::Unauthenticated("Missing Bearer token".to_string()));
    }

    Ok(token)
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the header is missing, not Bearer, or the
///   token is rejected
/// - 503 if the signing key source is unavailable
/// - Otherwise continues with the [`Identity`] in extensions
#[instrument(skip(state, req, next), name = "api.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(req.headers())?;

    let identity: Identity = state.verifier.verify(token).await?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        for value in ["Bearer abc", "bearer abc", "BEARER abc", "  Bearer   abc  "] {
            assert_eq!(bearer_token(&headers(value)).unwrap(), "abc", "{value}");
        }
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_non_bearer_schemes_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "abc", "Token abc"] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(ApiError::Unauthenticated(_))),
                "{value}"
            );
        }
    }
}
