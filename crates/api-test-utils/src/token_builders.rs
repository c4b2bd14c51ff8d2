//! Builder patterns for test data construction
//!
//! Provides a fluent API for JWT claim sets in each token mode.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

/// Local-mode issuer and audience used across tests.
pub const LOCAL_ISSUER: &str = "local-dev";

/// Cognito pool used across tests.
pub const TEST_REGION: &str = "ap-northeast-1";
pub const TEST_USER_POOL_ID: &str = "ap-northeast-1_TESTPOOL";
pub const TEST_CLIENT_ID: &str = "test-app-client";

/// Issuer URL for [`TEST_USER_POOL_ID`].
pub fn test_cognito_issuer() -> String {
    format!("https://cognito-idp.{TEST_REGION}.amazonaws.com/{TEST_USER_POOL_ID}")
}

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::cognito_access()
///     .for_user("user-9")
///     .without_email()
///     .expires_in(3600)
///     .build();
/// let token = TestRsaKey::primary().sign(&claims)?;
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Local-mode claims: `iss`/`aud` = `local-dev`, `sub` = `user-1`.
    pub fn local() -> Self {
        Self::base()
            .with_issuer(LOCAL_ISSUER)
            .with_audience(LOCAL_ISSUER)
    }

    /// Cognito ID-token claims for the test pool.
    pub fn cognito_id() -> Self {
        Self::base()
            .with_issuer(&test_cognito_issuer())
            .with_audience(TEST_CLIENT_ID)
            .with_token_use("id")
    }

    /// Cognito access-token claims for the test pool.
    pub fn cognito_access() -> Self {
        Self::base()
            .with_issuer(&test_cognito_issuer())
            .with_client_id(TEST_CLIENT_ID)
            .with_token_use("access")
    }

    fn base() -> Self {
        let now = Utc::now();
        Self {
            claims: Map::new(),
        }
        .for_user("user-1")
        .with_email("a@example.com")
        .issued_at(now.timestamp())
        .expires_at((now + Duration::seconds(3600)).timestamp())
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.with_claim("sub", Value::from(subject))
    }

    /// Remove the subject
    pub fn without_sub(self) -> Self {
        self.without_claim("sub")
    }

    pub fn with_email(self, email: &str) -> Self {
        self.with_claim("email", Value::from(email))
    }

    pub fn without_email(self) -> Self {
        self.without_claim("email")
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", Value::from(issuer))
    }

    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", Value::from(audience))
    }

    pub fn with_token_use(self, token_use: &str) -> Self {
        self.with_claim("token_use", Value::from(token_use))
    }

    pub fn with_client_id(self, client_id: &str) -> Self {
        self.with_claim("client_id", Value::from(client_id))
    }

    /// Set expiration in seconds from now
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at((Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    /// Set expiration as an absolute timestamp
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", Value::from(timestamp))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", Value::from(timestamp))
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
