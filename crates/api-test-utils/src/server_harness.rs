//! Test server harness for E2E testing
//!
//! Provides `TestApiServer` for spawning real API server instances in tests.

use api_service::auth::SystemClock;
use api_service::config::Config;
use api_service::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Local-mode secret used by [`TestApiServer::spawn_local`].
pub const TEST_LOCAL_SECRET: &str = "dev-secret";

/// Test harness for spawning the API server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestApiServer::spawn_local().await?;
///     let response = reqwest::get(format!("{}/healthz", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestApiServer {
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl TestApiServer {
    /// Spawn a Local-mode server signing with [`TEST_LOCAL_SECRET`].
    pub async fn spawn_local() -> Result<Self, anyhow::Error> {
        Self::spawn(HashMap::from([
            ("AUTH_MODE".to_string(), "local".to_string()),
            ("LOCAL_JWT_SECRET".to_string(), TEST_LOCAL_SECRET.to_string()),
        ]))
        .await
    }

    /// Spawn a server configured from `vars`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = AppState::new(config, Arc::new(SystemClock))
            .map_err(|e| anyhow::anyhow!("Failed to create app state: {}", e))?;

        // Standalone recorder; the global one can only be installed once per process.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(Arc::new(state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for TestApiServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestApiServer::spawn_local().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());

        let response = reqwest::get(format!("{}/healthz", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["ok"], true);

        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_rejects_bad_config() {
        let vars = HashMap::from([("AUTH_MODE".to_string(), "saml".to_string())]);
        assert!(TestApiServer::spawn(vars).await.is_err());
    }
}
