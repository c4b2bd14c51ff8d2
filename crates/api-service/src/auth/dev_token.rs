//! Local development token minting.
//!
//! Produces HS256 tokens that the Local-mode verifier accepts. Never wired up
//! in remote modes.

use crate::auth::error::AuthError;
use crate::auth::policy::{TokenMode, VerificationPolicy};
use common::secret::{ExposeSecret, SecretString};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

/// Lifetime of a development token (1 hour).
pub const DEV_TOKEN_LIFETIME_SECONDS: i64 = 3600;

#[derive(Serialize)]
struct DevTokenClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    sub: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

/// Mint an HS256 token for `sub` with the policy's local issuer and audience.
///
/// # Errors
///
/// `Misconfigured` if the policy is not a Local policy, the secret is empty,
/// or signing fails.
pub fn issue_local_dev_token(
    policy: &VerificationPolicy,
    secret: &SecretString,
    sub: &str,
    email: Option<&str>,
    now: i64,
) -> Result<String, AuthError> {
    if policy.mode() != TokenMode::Local {
        return Err(AuthError::Misconfigured(
            "development tokens are only issued in local mode".to_string(),
        ));
    }
    let secret = secret.expose_secret();
    if secret.is_empty() {
        return Err(AuthError::Misconfigured(
            "local signing secret is empty".to_string(),
        ));
    }

    let claims = DevTokenClaims {
        iss: policy.issuer(),
        aud: policy.audience(),
        iat: now,
        exp: now.saturating_add(DEV_TOKEN_LIFETIME_SECONDS),
        sub,
        email,
    };

    encode(
        &Header::new(policy.algorithm()),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(target: "api.auth.dev_token", error = %e, "Failed to sign development token");
        AuthError::Misconfigured("development token signing failed".to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::jwt::{parse_claims_unverified, parse_header_unverified};
    use std::time::Duration;

    fn policy() -> VerificationPolicy {
        VerificationPolicy::local("local-dev", "local-dev", Duration::from_secs(60))
    }

    #[test]
    fn test_token_carries_local_claims() {
        let secret = SecretString::from("dev-secret");
        let token =
            issue_local_dev_token(&policy(), &secret, "user-1", Some("user1@example.com"), 1000)
                .unwrap();

        let header = parse_header_unverified(&token).unwrap();
        assert_eq!(header.alg, "HS256");

        let claims = parse_claims_unverified(&token).unwrap();
        assert_eq!(claims.get_str("iss"), Some("local-dev"));
        assert_eq!(claims.audiences(), vec!["local-dev"]);
        assert_eq!(claims.get_str("sub"), Some("user-1"));
        assert_eq!(claims.get_str("email"), Some("user1@example.com"));
        assert_eq!(claims.get_i64("iat"), Some(1000));
        assert_eq!(claims.get_i64("exp"), Some(4600));
    }

    #[test]
    fn test_absent_email_is_omitted() {
        let secret = SecretString::from("dev-secret");
        let token = issue_local_dev_token(&policy(), &secret, "user-1", None, 1000).unwrap();

        let claims = parse_claims_unverified(&token).unwrap();
        assert!(!claims.contains("email"));
    }

    #[test]
    fn test_remote_policy_refused() {
        let remote = VerificationPolicy::remote(
            TokenMode::RemoteAccess,
            "https://issuer.example",
            "client",
            Duration::ZERO,
        );
        let result =
            issue_local_dev_token(&remote, &SecretString::from("s"), "user-1", None, 0);
        assert!(matches!(result, Err(AuthError::Misconfigured(_))));
    }

    #[test]
    fn test_empty_secret_refused() {
        let result = issue_local_dev_token(&policy(), &SecretString::from(""), "user-1", None, 0);
        assert!(matches!(result, Err(AuthError::Misconfigured(_))));
    }
}
