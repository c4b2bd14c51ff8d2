//! Public client configuration.
//!
//! Lets a browser client discover which Cognito user pool and app client to
//! sign in against. Never includes the local signing secret.

use crate::routes::AppState;
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct PublicConfig {
    pub cognito_user_pool_id: Option<String>,
    pub cognito_user_pool_client_id: Option<String>,
}

/// Handler for GET /public-config
///
/// Sent with `Cache-Control: no-store` so configuration changes take effect
/// on the next page load.
pub async fn get_public_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = PublicConfig {
        cognito_user_pool_id: state.config.cognito_user_pool_id.clone(),
        cognito_user_pool_client_id: state.config.cognito_app_client_id.clone(),
    };

    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(body),
    )
}
