//! Bearer token verification.
//!
//! [`TokenVerifier`] runs one token through a fixed sequence and stops at the
//! first failure:
//!
//! 1. Parse the header (unverified) and require the mode's algorithm
//! 2. Parse the claims (unverified) and apply the policy as an early reject
//! 3. Resolve the signing key
//! 4. Verify the signature, then `exp`/`nbf`/`iat` against the clock
//! 5. Apply the policy again to the verified claims and build an [`Identity`]
//!
//! Step 2 exists only to avoid key fetches and crypto for tokens that would
//! be rejected anyway. Step 5 is the trust decision and always runs.
//!
//! # Security
//!
//! - Tokens are size-checked before any decoding
//! - The accepted algorithm comes from configuration, never from the token
//! - Issuer validation inside `jsonwebtoken` uses the configured issuer
//! - Error values carry a reason code but never the token or key material

use crate::auth::claims::VerifiedClaims;
use crate::auth::clock::Clock;
use crate::auth::error::AuthError;
use crate::auth::identity::Identity;
use crate::auth::jwks::SigningKeySource;
use crate::auth::policy::{check_unverified, check_verified, VerificationPolicy};
use crate::observability::metrics::record_token_validation;
use common::jwt::{
    parse_claims_unverified, parse_header_unverified, validate_iat, validate_nbf,
    JwtValidationError,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Verifies bearer tokens against one [`VerificationPolicy`].
pub struct TokenVerifier {
    policy: VerificationPolicy,
    keys: Arc<dyn SigningKeySource>,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Errors
    ///
    /// `Misconfigured` if the policy fails [`VerificationPolicy::validate`].
    pub fn new(
        policy: VerificationPolicy,
        keys: Arc<dyn SigningKeySource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        policy.validate()?;
        Ok(Self {
            policy,
            keys,
            clock,
        })
    }

    /// The policy this verifier enforces.
    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Verify a bearer token and return the caller's identity.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`]; see the module docs for which step yields which.
    #[instrument(skip_all, fields(mode = %self.policy.mode()))]
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let started = Instant::now();
        let result = self.run(token).await;

        match &result {
            Ok(_) => {
                record_token_validation("success", None, started.elapsed());
                tracing::debug!(target: "api.auth.verifier", "Token verified");
            }
            Err(e) => {
                record_token_validation("error", Some(e.reason()), started.elapsed());
                tracing::debug!(
                    target: "api.auth.verifier",
                    reason = e.reason(),
                    claim = e.claim(),
                    "Token rejected"
                );
            }
        }

        result
    }

    async fn run(&self, token: &str) -> Result<Identity, AuthError> {
        // Received -> HeaderParsed
        let header = parse_header_unverified(token).map_err(malformed)?;
        let alg = Algorithm::from_str(&header.alg).map_err(|_| AuthError::AlgorithmMismatch)?;
        if alg != self.policy.algorithm() {
            tracing::warn!(
                target: "api.auth.verifier",
                alg = %header.alg,
                expected = ?self.policy.algorithm(),
                "Token algorithm not accepted"
            );
            return Err(AuthError::AlgorithmMismatch);
        }

        // HeaderParsed -> EarlyChecked
        let unverified = parse_claims_unverified(token).map_err(malformed)?;
        check_unverified(&unverified, &self.policy)?;

        // EarlyChecked -> KeyResolved
        if self.policy.mode().is_remote() && header.kid.is_none() {
            return Err(AuthError::MalformedToken);
        }
        let key = self.keys.get_signing_key(header.kid.as_deref()).await?;

        // KeyResolved -> SignatureVerified
        let claims = self.verify_signature(token, &key)?;
        self.check_time_bounds(&claims)?;

        // SignatureVerified -> ClaimsReverified -> Accepted
        check_verified(&claims, &self.policy)
    }

    fn verify_signature(&self, token: &str, key: &DecodingKey) -> Result<VerifiedClaims, AuthError> {
        let mut validation = Validation::new(self.policy.algorithm());
        // Time-bound claims are checked against the injected clock instead.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.set_issuer(&[self.policy.issuer()]);

        decode::<VerifiedClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "api.auth.verifier", error = %e, "Token verification failed");
                map_decode_error(e.kind())
            })
    }

    fn check_time_bounds(&self, claims: &VerifiedClaims) -> Result<(), AuthError> {
        let now = self.clock.now_unix();
        let leeway = self.policy.leeway();
        let leeway_secs = i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX);

        let exp = claims.exp().ok_or(AuthError::ClaimMismatch("exp"))?;
        if exp.saturating_add(leeway_secs) < now {
            return Err(AuthError::TokenExpired);
        }

        if let Some(nbf) = claims.nbf() {
            validate_nbf(nbf, leeway, now).map_err(|_| AuthError::ClaimMismatch("nbf"))?;
        }
        if let Some(iat) = claims.iat() {
            validate_iat(iat, leeway, now).map_err(|_| AuthError::ClaimMismatch("iat"))?;
        }

        Ok(())
    }
}

fn malformed(e: JwtValidationError) -> AuthError {
    tracing::debug!(target: "api.auth.verifier", error = ?e, "Token could not be parsed");
    AuthError::MalformedToken
}

/// Header and payload were already decoded successfully, so decoding failures
/// at this point concern the signature.
fn map_decode_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidAlgorithm => AuthError::AlgorithmMismatch,
        ErrorKind::InvalidIssuer => AuthError::ClaimMismatch("issuer"),
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidToken | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken
        }
        ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) => {
            AuthError::Misconfigured("signing key cannot verify this algorithm".to_string())
        }
        _ => AuthError::SignatureInvalid,
    }
}
