//! Development token endpoint.
//!
//! Only routed in Local mode when `ENABLE_DEV_TOKEN_ENDPOINT` is set.

use crate::auth::issue_local_dev_token;
use crate::errors::ApiError;
use crate::routes::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Subject of the fixed development user.
pub const DEV_SUBJECT: &str = "user-1";

/// Email of the fixed development user.
pub const DEV_EMAIL: &str = "user1@example.com";

#[derive(Debug, Serialize)]
pub struct DevTokenResponse {
    pub token: String,
}

/// Handler for GET /dev/token
#[instrument(skip_all, name = "api.handlers.dev_token")]
pub async fn issue_dev_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DevTokenResponse>, ApiError> {
    let token = issue_local_dev_token(
        state.verifier.policy(),
        &state.config.local_jwt_secret,
        DEV_SUBJECT,
        Some(DEV_EMAIL),
        state.clock.now_unix(),
    )?;

    tracing::info!(target: "api.handlers.dev_token", "Issued development token");
    Ok(Json(DevTokenResponse { token }))
}
