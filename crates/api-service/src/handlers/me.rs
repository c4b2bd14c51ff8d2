//! Current user handler.

use crate::auth::Identity;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Returns the verified identity placed in extensions by the auth middleware.
///
/// ```json
/// { "sub": "user-1", "email": "user1@example.com" }
/// ```
#[instrument(skip_all, name = "api.handlers.me")]
pub async fn get_me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    tracing::debug!(target: "api.handlers.me", "Returning caller identity");
    Json(identity)
}
