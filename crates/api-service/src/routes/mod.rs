//! HTTP routes for the API service.
//!
//! Defines the Axum router and application state.

use crate::auth::{
    AuthError, Clock, JwksClient, LocalSecret, SigningKeySource, TokenMode, TokenVerifier,
};
use crate::config::Config;
use crate::handlers;
use crate::middleware::auth::{require_auth, AuthState};
use crate::middleware::http_metrics::http_metrics_middleware;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Verifier for the configured token mode.
    pub verifier: Arc<TokenVerifier>,

    /// Time source for verification and development tokens.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build the verifier for `config` and wrap it in application state.
    ///
    /// # Errors
    ///
    /// `Misconfigured` if the configured policy cannot verify tokens.
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        let keys: Arc<dyn SigningKeySource> = match config.auth_mode {
            TokenMode::Local => Arc::new(LocalSecret::new(config.local_jwt_secret.clone())),
            TokenMode::RemoteId | TokenMode::RemoteAccess => {
                let jwks_url = config.jwks_url.clone().ok_or_else(|| {
                    AuthError::Misconfigured("remote mode without a JWKS URL".to_string())
                })?;
                Arc::new(JwksClient::with_options(jwks_url, config.jwks_options()))
            }
        };

        let verifier = TokenVerifier::new(config.verification_policy(), keys, Arc::clone(&clock))?;

        Ok(Self {
            config,
            verifier: Arc::new(verifier),
            clock,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/healthz` - Liveness probe - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/public-config` - Client sign-in configuration - public
/// - `/dev/token` - Development token - public, Local mode only when enabled
/// - `/api/v1/me` - Current user endpoint - requires authentication
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        verifier: Arc::clone(&state.verifier),
    });

    // Public routes (no authentication required)
    let mut public_routes = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/public-config", get(handlers::get_public_config));

    if state.config.dev_token_enabled() {
        tracing::warn!(target: "api.routes", "Development token endpoint is enabled");
        public_routes = public_routes.route("/dev/token", get(handlers::issue_dev_token));
    }

    let public_routes = public_routes.with_state(Arc::clone(&state));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
