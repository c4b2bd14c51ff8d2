//! Signing key resolution.
//!
//! [`SigningKeySource`] turns a token's `kid` into a verification key. Two
//! sources exist:
//!
//! - [`LocalSecret`] - the static HMAC secret used in Local mode
//! - [`JwksClient`] - RSA public keys fetched from the identity provider's
//!   `/.well-known/jwks.json` and cached with a TTL
//!
//! # Security
//!
//! - The key-set URL is fixed at construction from configuration. It is
//!   never derived from a token's `iss` claim.
//! - Refreshes are single-flight: concurrent misses wait on one fetch and
//!   share its outcome, including failure.
//! - An unknown `kid` in a fresh set triggers a refetch at most once per
//!   `min_refresh_interval`, so random `kid` values cannot hammer the provider.
//! - The cached set is swapped as a whole behind an `Arc`; readers never see
//!   a partially built map.

use crate::auth::error::AuthError;
use crate::observability::metrics::record_jwks_fetch;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default hard deadline for one key-set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default minimum age of a cached set before an unknown `kid` may refetch.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Resolves a key identifier to a verification key.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Look up the key for `kid`.
    ///
    /// # Errors
    ///
    /// - `UnknownSigningKey` - no such key in a fresh key set
    /// - `KeySourceUnavailable` - the key set cannot be fetched
    /// - `Misconfigured` - the source has no usable key material
    async fn get_signing_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError>;
}

// =============================================================================
// Local secret
// =============================================================================

/// Static shared secret for HS256 tokens. There is no remote fetch.
#[derive(Debug, Clone)]
pub struct LocalSecret {
    secret: SecretString,
}

impl LocalSecret {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl SigningKeySource for LocalSecret {
    async fn get_signing_key(&self, _kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(AuthError::Misconfigured(
                "local signing secret is empty".to_string(),
            ));
        }
        Ok(DecodingKey::from_secret(secret.as_bytes()))
    }
}

// =============================================================================
// Remote key set
// =============================================================================

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for Cognito).
    pub kty: String,

    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Intended algorithm.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// Key-set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Build an RS256 decoding key from a JWK, or `None` if the entry is not a
/// usable RSA signing key.
fn rsa_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        return None;
    }
    if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
        return None;
    }
    if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
        return None;
    }
    let (n, e) = (jwk.n.as_deref()?, jwk.e.as_deref()?);

    match DecodingKey::from_rsa_components(n, e) {
        Ok(key) => Some(key),
        Err(err) => {
            tracing::warn!(target: "api.auth.jwks", kid = ?jwk.kid, error = %err, "Skipping JWK with invalid RSA components");
            None
        }
    }
}

/// A fetched key set and when it was fetched.
struct CachedKeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Result of consulting the cache for one `kid`.
enum Lookup {
    Hit(DecodingKey),
    /// The set is fresh and recent enough that a miss is final.
    Unknown,
    Refresh,
}

/// Outcome of the most recent fetch, guarded by the refresh lock.
#[derive(Default)]
struct RefreshState {
    last_fetch_failed: bool,
}

/// Tunables for [`JwksClient`].
#[derive(Debug, Clone, Copy)]
pub struct JwksOptions {
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub min_refresh_interval: Duration,
}

impl Default for JwksOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }
}

/// Fetches and caches the identity provider's public keys.
pub struct JwksClient {
    /// Fixed key-set URL from configuration.
    jwks_url: String,

    http_client: reqwest::Client,

    /// Current key set. Replaced wholesale on refresh.
    cache: RwLock<Option<Arc<CachedKeySet>>>,

    /// Held for the duration of a fetch so only one runs at a time.
    refresh_lock: Mutex<RefreshState>,

    /// Bumped after every completed fetch, successful or not.
    fetch_generation: AtomicU64,

    options: JwksOptions,
}

impl JwksClient {
    /// Create a client with default TTL and timeouts.
    pub fn new(jwks_url: String) -> Self {
        Self::with_options(jwks_url, JwksOptions::default())
    }

    /// Create a client with explicit cache and fetch settings.
    pub fn with_options(jwks_url: String, options: JwksOptions) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(options.fetch_timeout)
            .connect_timeout(options.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "api.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(RefreshState::default()),
            fetch_generation: AtomicU64::new(0),
            options,
        }
    }

    /// The configured key-set URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Number of keys in the current cached set (0 if empty).
    pub async fn cached_key_count(&self) -> usize {
        self.cache
            .read()
            .await
            .as_ref()
            .map_or(0, |cached| cached.keys.len())
    }

    /// Fetch the key set now, regardless of cache state.
    ///
    /// # Errors
    ///
    /// `KeySourceUnavailable` if the fetch fails; the old set is kept.
    pub async fn force_refresh(&self) -> Result<(), AuthError> {
        let mut state = self.refresh_lock.lock().await;
        self.refresh(&mut state).await.map(|_| ())
    }

    /// Fetch, publish the new set, and record the outcome. Caller holds the
    /// refresh lock.
    async fn refresh(&self, state: &mut RefreshState) -> Result<Arc<CachedKeySet>, AuthError> {
        let result = self.fetch_key_set().await.map(Arc::new);
        if let Ok(fresh) = &result {
            *self.cache.write().await = Some(Arc::clone(fresh));
        }
        state.last_fetch_failed = result.is_err();
        self.fetch_generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Error for a `kid` that no fetch could supply. A set still inside its
    /// TTL stays authoritative; the kid is just not in it.
    fn unresolved(&self, current: Option<&CachedKeySet>, err: AuthError) -> AuthError {
        match current {
            Some(cached) if cached.fetched_at.elapsed() < self.options.cache_ttl => {
                AuthError::UnknownSigningKey
            }
            _ => err,
        }
    }

    async fn current(&self) -> Option<Arc<CachedKeySet>> {
        self.cache.read().await.clone()
    }

    fn lookup(&self, cached: Option<&CachedKeySet>, kid: &str) -> Lookup {
        let Some(cached) = cached else {
            return Lookup::Refresh;
        };
        let age = cached.fetched_at.elapsed();
        if age >= self.options.cache_ttl {
            return Lookup::Refresh;
        }
        if let Some(key) = cached.keys.get(kid) {
            return Lookup::Hit(key.clone());
        }
        if age < self.options.min_refresh_interval {
            Lookup::Unknown
        } else {
            Lookup::Refresh
        }
    }

    /// Fetch and parse the key set under the configured deadline.
    #[instrument(skip(self), fields(url = %self.jwks_url))]
    async fn fetch_key_set(&self) -> Result<CachedKeySet, AuthError> {
        tracing::debug!(target: "api.auth.jwks", "Fetching JWKS");
        let started = Instant::now();

        let outcome = tokio::time::timeout(self.options.fetch_timeout, self.request_key_set()).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    target: "api.auth.jwks",
                    timeout_ms = u64::try_from(self.options.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
                    "JWKS fetch timed out"
                );
                Err("timeout")
            }
        };

        match result {
            Ok(keys) => {
                record_jwks_fetch("success", started.elapsed());
                tracing::info!(target: "api.auth.jwks", key_count = keys.len(), "JWKS cache refreshed");
                Ok(CachedKeySet {
                    keys,
                    fetched_at: Instant::now(),
                })
            }
            Err(status) => {
                record_jwks_fetch(status, started.elapsed());
                Err(AuthError::KeySourceUnavailable)
            }
        }
    }

    /// One HTTP round trip. The error is a bounded metric label.
    async fn request_key_set(&self) -> Result<HashMap<String, DecodingKey>, &'static str> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "api.auth.jwks", error = %e, "Failed to fetch JWKS");
                if e.is_timeout() {
                    "timeout"
                } else {
                    "transport"
                }
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "api.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err("http_status");
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "api.auth.jwks", error = %e, "Failed to parse JWKS response");
            "invalid_document"
        })?;

        let keys: HashMap<String, DecodingKey> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let kid = jwk.kid.clone().filter(|k| !k.is_empty())?;
                rsa_decoding_key(jwk).map(|key| (kid, key))
            })
            .collect();

        if keys.is_empty() {
            tracing::error!(target: "api.auth.jwks", "JWKS contained no usable RSA signing keys");
            return Err("empty_key_set");
        }

        Ok(keys)
    }
}

#[async_trait]
impl SigningKeySource for JwksClient {
    #[instrument(skip(self), fields(kid = ?kid))]
    async fn get_signing_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        let kid = kid.ok_or(AuthError::UnknownSigningKey)?;
        let seen_generation = self.fetch_generation.load(Ordering::Acquire);

        // Fast path: readers of a valid cached key never wait on a refresh.
        match self.lookup(self.current().await.as_deref(), kid) {
            Lookup::Hit(key) => {
                tracing::debug!(target: "api.auth.jwks", "JWKS cache hit");
                return Ok(key);
            }
            Lookup::Unknown => {
                tracing::warn!(target: "api.auth.jwks", "Key not found in recently fetched JWKS");
                return Err(AuthError::UnknownSigningKey);
            }
            Lookup::Refresh => {}
        }

        let mut state = self.refresh_lock.lock().await;
        let current = self.current().await;

        // Another caller may have refreshed while we waited for the lock.
        match self.lookup(current.as_deref(), kid) {
            Lookup::Hit(key) => return Ok(key),
            Lookup::Unknown => return Err(AuthError::UnknownSigningKey),
            Lookup::Refresh => {}
        }

        // A fetch completed while we queued. Share its outcome instead of
        // fetching again; the next request gets a fresh attempt.
        if self.fetch_generation.load(Ordering::Acquire) != seen_generation {
            if state.last_fetch_failed {
                tracing::debug!(target: "api.auth.jwks", "Sharing failed JWKS fetch with queued caller");
                return Err(self.unresolved(current.as_deref(), AuthError::KeySourceUnavailable));
            }
            tracing::warn!(target: "api.auth.jwks", "Key not found in JWKS fetched while waiting");
            return Err(AuthError::UnknownSigningKey);
        }

        let fresh = match self.refresh(&mut state).await {
            Ok(fresh) => fresh,
            Err(err) => return Err(self.unresolved(current.as_deref(), err)),
        };

        fresh.keys.get(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "api.auth.jwks", "Key not found in JWKS after refresh");
            AuthError::UnknownSigningKey
        })
    }
}
