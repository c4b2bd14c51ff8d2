//! API service configuration.
//!
//! Configuration is loaded from environment variables. The local signing
//! secret is held as a `SecretString` and redacted in Debug output.

use crate::auth::jwks::JwksOptions;
use crate::auth::policy::{cognito_issuer, TokenMode, VerificationPolicy};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default local HS256 secret. Only suitable for development.
pub const DEFAULT_LOCAL_JWT_SECRET: &str = "dev-secret-change-me";

/// Default local issuer and audience.
pub const DEFAULT_LOCAL_ISSUER: &str = "local-dev";

/// Default AWS region for the Cognito issuer URL.
pub const DEFAULT_AWS_REGION: &str = "ap-northeast-1";

/// Default JWKS cache TTL in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default JWKS fetch deadline in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Upper bound for the JWKS fetch deadline.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 60;

/// Default minimum key-set age before an unknown `kid` may refetch.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 30;

/// API service configuration.
#[derive(Clone)]
pub struct Config {
    /// Which tokens are accepted.
    pub auth_mode: TokenMode,

    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// HS256 secret for Local mode.
    pub local_jwt_secret: SecretString,

    /// Expected `iss` in Local mode.
    pub local_jwt_issuer: String,

    /// Expected `aud` in Local mode.
    pub local_jwt_audience: String,

    /// Region of the Cognito user pool.
    pub aws_region: String,

    /// Cognito user pool ID. Required in remote modes.
    pub cognito_user_pool_id: Option<String>,

    /// Cognito app client ID. Required in remote modes.
    pub cognito_app_client_id: Option<String>,

    /// Key-set URL. Set in remote modes, derived from the pool unless overridden.
    pub jwks_url: Option<String>,

    pub jwks_cache_ttl_seconds: u64,

    pub jwks_fetch_timeout_seconds: u64,

    /// Minimum age of the cached key set before an unknown `kid` may refetch.
    pub jwks_min_refresh_seconds: u64,

    /// Leeway for `exp`/`nbf`/`iat` in seconds.
    pub jwt_clock_skew_seconds: u64,

    /// Serve `GET /dev/token`. Ignored outside Local mode.
    pub enable_dev_token_endpoint: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_mode", &self.auth_mode)
            .field("bind_address", &self.bind_address)
            .field("local_jwt_secret", &"[REDACTED]")
            .field("local_jwt_issuer", &self.local_jwt_issuer)
            .field("local_jwt_audience", &self.local_jwt_audience)
            .field("aws_region", &self.aws_region)
            .field("cognito_user_pool_id", &self.cognito_user_pool_id)
            .field("cognito_app_client_id", &self.cognito_app_client_id)
            .field("jwks_url", &self.jwks_url)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("jwks_fetch_timeout_seconds", &self.jwks_fetch_timeout_seconds)
            .field("jwks_min_refresh_seconds", &self.jwks_min_refresh_seconds)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("enable_dev_token_endpoint", &self.enable_dev_token_endpoint)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported AUTH_MODE: '{0}'")]
    InvalidAuthMode(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid boolean for {0}")]
    InvalidBool(String),
}

/// Parse `AUTH_MODE`.
fn parse_auth_mode(value: &str) -> Result<TokenMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(TokenMode::Local),
        "cognito_id" | "remote_id" => Ok(TokenMode::RemoteId),
        "cognito_access" | "remote_access" | "cognito" => Ok(TokenMode::RemoteAccess),
        _ => Err(ConfigError::InvalidAuthMode(value.to_string())),
    }
}

fn parse_bool(vars: &HashMap<String, String>, name: &str, default: bool) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool(name.to_string())),
        },
    }
}

/// Parse a seconds value within `min..=max`.
fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidJwks(format!(
            "{} must be a valid non-negative integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value < min || value > max {
        return Err(ConfigError::InvalidJwks(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }

    Ok(value)
}

/// A required variable that must be non-empty.
fn required(
    vars: &HashMap<String, String>,
    names: &[&str],
) -> Result<String, ConfigError> {
    names
        .iter()
        .find_map(|name| vars.get(*name).filter(|v| !v.trim().is_empty()).cloned())
        .ok_or_else(|| ConfigError::MissingEnvVar(names.join(" or ")))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_mode = match vars.get("AUTH_MODE") {
            Some(value) => parse_auth_mode(value)?,
            None => TokenMode::Local,
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let local_jwt_secret = SecretString::from(
            vars.get("LOCAL_JWT_SECRET")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOCAL_JWT_SECRET.to_string()),
        );

        let local_jwt_issuer = vars
            .get("LOCAL_JWT_ISSUER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOCAL_ISSUER.to_string());

        let local_jwt_audience = vars
            .get("LOCAL_JWT_AUDIENCE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOCAL_ISSUER.to_string());

        let aws_region = vars
            .get("AWS_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        let mut cognito_user_pool_id = vars.get("COGNITO_USER_POOL_ID").cloned();
        let mut cognito_app_client_id = vars
            .get("COGNITO_APP_CLIENT_ID")
            .or_else(|| vars.get("COGNITO_USER_POOL_CLIENT_ID"))
            .cloned();

        let jwks_url = if auth_mode.is_remote() {
            let pool_id = required(vars, &["COGNITO_USER_POOL_ID"])?;
            let client_id = required(vars, &["COGNITO_APP_CLIENT_ID", "COGNITO_USER_POOL_CLIENT_ID"])?;
            let url = vars
                .get("AUTH_JWKS_URL")
                .cloned()
                .unwrap_or_else(|| {
                    format!("{}/.well-known/jwks.json", cognito_issuer(&aws_region, &pool_id))
                });
            cognito_user_pool_id = Some(pool_id);
            cognito_app_client_id = Some(client_id);
            Some(url)
        } else {
            None
        };

        let jwks_cache_ttl_seconds = parse_seconds(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            1,
            u64::from(u32::MAX),
        )?;

        let jwks_fetch_timeout_seconds = parse_seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            1,
            MAX_JWKS_FETCH_TIMEOUT_SECONDS,
        )?;

        let jwks_min_refresh_seconds = parse_seconds(
            vars,
            "JWKS_MIN_REFRESH_SECONDS",
            DEFAULT_JWKS_MIN_REFRESH_SECONDS,
            0,
            u64::from(u32::MAX),
        )?;

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let enable_dev_token_endpoint = parse_bool(vars, "ENABLE_DEV_TOKEN_ENDPOINT", true)?;

        Ok(Config {
            auth_mode,
            bind_address,
            local_jwt_secret,
            local_jwt_issuer,
            local_jwt_audience,
            aws_region,
            cognito_user_pool_id,
            cognito_app_client_id,
            jwks_url,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwks_min_refresh_seconds,
            jwt_clock_skew_seconds,
            enable_dev_token_endpoint,
        })
    }

    /// Expected Cognito issuer, when a user pool is configured.
    pub fn cognito_issuer(&self) -> Option<String> {
        self.cognito_user_pool_id
            .as_deref()
            .map(|pool| cognito_issuer(&self.aws_region, pool))
    }

    /// Build the verification policy for the configured mode.
    ///
    /// Remote values are guaranteed present by [`Config::from_vars`]; empty
    /// strings fall through to [`VerificationPolicy::validate`].
    pub fn verification_policy(&self) -> VerificationPolicy {
        let leeway = Duration::from_secs(self.jwt_clock_skew_seconds);
        match self.auth_mode {
            TokenMode::Local => VerificationPolicy::local(
                self.local_jwt_issuer.clone(),
                self.local_jwt_audience.clone(),
                leeway,
            ),
            mode => VerificationPolicy::remote(
                mode,
                self.cognito_issuer().unwrap_or_default(),
                self.cognito_app_client_id.clone().unwrap_or_default(),
                leeway,
            ),
        }
    }

    /// Cache and fetch settings for the key-set client.
    pub fn jwks_options(&self) -> JwksOptions {
        JwksOptions {
            cache_ttl: Duration::from_secs(self.jwks_cache_ttl_seconds),
            fetch_timeout: Duration::from_secs(self.jwks_fetch_timeout_seconds),
            min_refresh_interval: Duration::from_secs(self.jwks_min_refresh_seconds),
        }
    }

    /// Whether `GET /dev/token` is routed.
    pub fn dev_token_enabled(&self) -> bool {
        self.auth_mode == TokenMode::Local && self.enable_dev_token_endpoint
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn remote_vars(mode: &str) -> HashMap<String, String> {
        vars(&[
            ("AUTH_MODE", mode),
            ("COGNITO_USER_POOL_ID", "ap-northeast-1_TEST"),
            ("COGNITO_APP_CLIENT_ID", "client-abc"),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.auth_mode, TokenMode::Local);
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.local_jwt_secret.expose_secret(), "dev-secret-change-me");
        assert_eq!(config.local_jwt_issuer, "local-dev");
        assert_eq!(config.local_jwt_audience, "local-dev");
        assert_eq!(config.aws_region, "ap-northeast-1");
        assert!(config.jwks_url.is_none());
        assert_eq!(config.jwks_cache_ttl_seconds, 300);
        assert_eq!(config.jwks_fetch_timeout_seconds, 5);
        assert_eq!(config.jwks_min_refresh_seconds, 30);
        assert_eq!(config.jwt_clock_skew_seconds, 60);
        assert!(config.dev_token_enabled());
    }

    #[test]
    fn test_auth_mode_aliases() {
        for (value, mode) in [
            ("local", TokenMode::Local),
            ("LOCAL", TokenMode::Local),
            ("cognito_id", TokenMode::RemoteId),
            ("remote_id", TokenMode::RemoteId),
            ("cognito_access", TokenMode::RemoteAccess),
            ("remote_access", TokenMode::RemoteAccess),
            ("cognito", TokenMode::RemoteAccess),
        ] {
            assert_eq!(parse_auth_mode(value).unwrap(), mode, "{value}");
        }
    }

    #[test]
    fn test_unknown_auth_mode_is_fatal() {
        let result = Config::from_vars(&vars(&[("AUTH_MODE", "saml")]));
        assert!(matches!(result, Err(ConfigError::InvalidAuthMode(m)) if m == "saml"));
    }

    #[test]
    fn test_remote_mode_derives_issuer_and_jwks_url() {
        let config = Config::from_vars(&remote_vars("cognito_access")).unwrap();

        assert_eq!(
            config.cognito_issuer().as_deref(),
            Some("https://cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_TEST")
        );
        assert_eq!(
            config.jwks_url.as_deref(),
            Some("https://cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_TEST/.well-known/jwks.json")
        );
        assert!(!config.dev_token_enabled());

        let policy = config.verification_policy();
        assert_eq!(policy.mode(), TokenMode::RemoteAccess);
        assert_eq!(policy.audience(), "client-abc");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_jwks_url_override() {
        let mut vars = remote_vars("cognito_id");
        vars.insert(
            "AUTH_JWKS_URL".to_string(),
            "http://127.0.0.1:9999/jwks.json".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.jwks_url.as_deref(), Some("http://127.0.0.1:9999/jwks.json"));
        // The issuer still comes from the pool.
        assert!(config
            .cognito_issuer()
            .unwrap()
            .ends_with("/ap-northeast-1_TEST"));
    }

    #[test]
    fn test_client_id_alias() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_MODE", "cognito_id"),
            ("COGNITO_USER_POOL_ID", "pool"),
            ("COGNITO_USER_POOL_CLIENT_ID", "legacy-client"),
        ]))
        .unwrap();
        assert_eq!(config.cognito_app_client_id.as_deref(), Some("legacy-client"));
    }

    #[test]
    fn test_remote_mode_requires_pool_and_client() {
        let result = Config::from_vars(&vars(&[("AUTH_MODE", "cognito_id")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COGNITO_USER_POOL_ID"));

        let result = Config::from_vars(&vars(&[
            ("AUTH_MODE", "cognito_id"),
            ("COGNITO_USER_POOL_ID", "pool"),
            ("COGNITO_APP_CLIENT_ID", "  "),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_clock_skew_bounds() {
        let config = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "0")])).unwrap();
        assert_eq!(config.jwt_clock_skew_seconds, 0);

        let config = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", "600")])).unwrap();
        assert_eq!(config.jwt_clock_skew_seconds, 600);

        for bad in ["601", "-1", "abc"] {
            let result = Config::from_vars(&vars(&[("JWT_CLOCK_SKEW_SECONDS", bad)]));
            assert!(matches!(result, Err(ConfigError::InvalidJwtClockSkew(_))), "{bad}");
        }
    }

    #[test]
    fn test_jwks_settings_bounds() {
        let config = Config::from_vars(&vars(&[
            ("JWKS_CACHE_TTL_SECONDS", "60"),
            ("JWKS_FETCH_TIMEOUT_SECONDS", "2"),
            ("JWKS_MIN_REFRESH_SECONDS", "0"),
        ]))
        .unwrap();
        let options = config.jwks_options();
        assert_eq!(options.cache_ttl, Duration::from_secs(60));
        assert_eq!(options.fetch_timeout, Duration::from_secs(2));
        assert_eq!(options.min_refresh_interval, Duration::ZERO);

        for (name, bad) in [
            ("JWKS_CACHE_TTL_SECONDS", "0"),
            ("JWKS_FETCH_TIMEOUT_SECONDS", "0"),
            ("JWKS_FETCH_TIMEOUT_SECONDS", "61"),
            ("JWKS_MIN_REFRESH_SECONDS", "soon"),
        ] {
            let result = Config::from_vars(&vars(&[(name, bad)]));
            assert!(matches!(result, Err(ConfigError::InvalidJwks(_))), "{name}={bad}");
        }
    }

    #[test]
    fn test_dev_token_flag() {
        let config =
            Config::from_vars(&vars(&[("ENABLE_DEV_TOKEN_ENDPOINT", "false")])).unwrap();
        assert!(!config.dev_token_enabled());

        let result = Config::from_vars(&vars(&[("ENABLE_DEV_TOKEN_ENDPOINT", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidBool(_))));
    }

    #[test]
    fn test_local_policy_from_config() {
        let config = Config::from_vars(&vars(&[
            ("LOCAL_JWT_ISSUER", "my-issuer"),
            ("LOCAL_JWT_AUDIENCE", "my-aud"),
            ("JWT_CLOCK_SKEW_SECONDS", "10"),
        ]))
        .unwrap();
        let policy = config.verification_policy();

        assert_eq!(policy.mode(), TokenMode::Local);
        assert_eq!(policy.issuer(), "my-issuer");
        assert_eq!(policy.audience(), "my-aud");
        assert_eq!(policy.leeway(), Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config =
            Config::from_vars(&vars(&[("LOCAL_JWT_SECRET", "super-secret-value")])).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
