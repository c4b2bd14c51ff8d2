//! Claim policy per token mode.
//!
//! A [`VerificationPolicy`] is built once from configuration and decides
//! which claims must equal which fixed values. The same rule set runs twice
//! per request: against unverified claims as a cheap early reject, and again
//! against verified claims as the actual trust decision.
//!
//! Rule order (first failure wins):
//!
//! 1. `iss` equals the configured issuer (exact string match)
//! 2. Remote modes: `token_use` equals `"id"` / `"access"`
//! 3. Local and RemoteId: `aud` contains the configured audience / client id.
//!    RemoteAccess: `client_id` equals the configured client id
//! 4. `sub` is a non-empty string

use crate::auth::claims::VerifiedClaims;
use crate::auth::error::AuthError;
use crate::auth::identity::Identity;
use common::jwt::UnverifiedClaims;
use jsonwebtoken::Algorithm;
use std::fmt;
use std::time::Duration;

/// Which kind of token the deployment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMode {
    /// HS256 tokens signed with a shared local secret.
    Local,
    /// RS256 ID tokens from the identity provider.
    RemoteId,
    /// RS256 access tokens from the identity provider.
    RemoteAccess,
}

impl TokenMode {
    /// The only signing algorithm accepted in this mode.
    pub fn algorithm(self) -> Algorithm {
        match self {
            TokenMode::Local => Algorithm::HS256,
            TokenMode::RemoteId | TokenMode::RemoteAccess => Algorithm::RS256,
        }
    }

    /// Required `token_use` claim value, if the mode has one.
    pub fn required_token_use(self) -> Option<&'static str> {
        match self {
            TokenMode::Local => None,
            TokenMode::RemoteId => Some("id"),
            TokenMode::RemoteAccess => Some("access"),
        }
    }

    /// Whether keys come from a remote key set.
    pub fn is_remote(self) -> bool {
        !matches!(self, TokenMode::Local)
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenMode::Local => "local",
            TokenMode::RemoteId => "remote_id",
            TokenMode::RemoteAccess => "remote_access",
        }
    }
}

impl fmt::Display for TokenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the Cognito user pool issuer URL.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// Static verification rules for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    mode: TokenMode,
    issuer: String,
    audience: String,
    algorithm: Algorithm,
    leeway: Duration,
}

impl VerificationPolicy {
    /// Policy for locally minted HS256 tokens.
    pub fn local(issuer: impl Into<String>, audience: impl Into<String>, leeway: Duration) -> Self {
        Self {
            mode: TokenMode::Local,
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm: Algorithm::HS256,
            leeway,
        }
    }

    /// Policy for provider-issued tokens.
    ///
    /// `client_id` is matched against `aud` for ID tokens and against the
    /// `client_id` claim for access tokens. A `Local` mode here yields a
    /// policy that fails [`VerificationPolicy::validate`].
    pub fn remote(
        mode: TokenMode,
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        leeway: Duration,
    ) -> Self {
        Self {
            mode,
            issuer: issuer.into(),
            audience: client_id.into(),
            algorithm: Algorithm::RS256,
            leeway,
        }
    }

    /// Token mode this policy enforces.
    pub fn mode(&self) -> TokenMode {
        self.mode
    }

    /// Expected `iss` value.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected audience (Local, RemoteId) or client id (RemoteAccess).
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Accepted signing algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Leeway for time-bound claims.
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Check the policy is usable before serving any request.
    ///
    /// # Errors
    ///
    /// `Misconfigured` if the issuer or audience is empty, or the algorithm
    /// is not the one mandated for the mode.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::Misconfigured("issuer is empty".to_string()));
        }
        if self.audience.trim().is_empty() {
            return Err(AuthError::Misconfigured(
                "audience/client id is empty".to_string(),
            ));
        }
        if self.algorithm != self.mode.algorithm() {
            return Err(AuthError::Misconfigured(format!(
                "algorithm {:?} is not valid for mode {}",
                self.algorithm, self.mode
            )));
        }
        Ok(())
    }
}

/// Read access to a claim set, trusted or not.
pub trait ClaimSource {
    /// Claim value by name when it is a string.
    fn claim_str(&self, name: &str) -> Option<&str>;

    /// `aud` values (string or array form).
    fn audiences(&self) -> Vec<&str>;
}

impl ClaimSource for UnverifiedClaims {
    fn claim_str(&self, name: &str) -> Option<&str> {
        self.get_str(name)
    }

    fn audiences(&self) -> Vec<&str> {
        UnverifiedClaims::audiences(self)
    }
}

impl ClaimSource for VerifiedClaims {
    fn claim_str(&self, name: &str) -> Option<&str> {
        self.get_str(name)
    }

    fn audiences(&self) -> Vec<&str> {
        VerifiedClaims::audiences(self)
    }
}

/// Apply the rule set and return the subject on success.
fn evaluate<'a, C: ClaimSource>(
    claims: &'a C,
    policy: &VerificationPolicy,
) -> Result<&'a str, AuthError> {
    if claims.claim_str("iss") != Some(policy.issuer()) {
        return Err(AuthError::ClaimMismatch("issuer"));
    }

    if let Some(required) = policy.mode().required_token_use() {
        if claims.claim_str("token_use") != Some(required) {
            return Err(AuthError::ClaimMismatch("token_use"));
        }
    }

    match policy.mode() {
        TokenMode::Local | TokenMode::RemoteId => {
            if !claims.audiences().contains(&policy.audience()) {
                return Err(AuthError::ClaimMismatch("audience"));
            }
        }
        TokenMode::RemoteAccess => {
            if claims.claim_str("client_id") != Some(policy.audience()) {
                return Err(AuthError::ClaimMismatch("client_id"));
            }
        }
    }

    match claims.claim_str("sub") {
        Some(sub) if !sub.is_empty() => Ok(sub),
        _ => Err(AuthError::ClaimMismatch("sub")),
    }
}

/// Early-reject pass over claims that have NOT been verified.
///
/// Passing this check establishes nothing about the caller.
///
/// # Errors
///
/// `ClaimMismatch(field)` naming the first failing rule.
pub fn check_unverified(
    claims: &UnverifiedClaims,
    policy: &VerificationPolicy,
) -> Result<(), AuthError> {
    evaluate(claims, policy).map(|_| ())
}

/// Trust decision over verified claims.
///
/// # Errors
///
/// `ClaimMismatch(field)` naming the first failing rule.
pub fn check_verified(
    claims: &VerifiedClaims,
    policy: &VerificationPolicy,
) -> Result<Identity, AuthError> {
    let subject = evaluate(claims, policy)?;
    let email = claims.get_str("email").map(ToString::to_string);
    Identity::new(subject.to_string(), email).ok_or(AuthError::ClaimMismatch("sub"))
}
