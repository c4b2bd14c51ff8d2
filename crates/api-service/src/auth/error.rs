//! Token verification failures.
//!
//! Every variant carries a stable machine-readable [`AuthError::reason`] so
//! tests and metrics can tell rejections apart. `Display` strings never
//! include the raw token, the shared secret, or key material.

use thiserror::Error;

/// Why a bearer token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token could not be split and decoded into header, payload and signature.
    #[error("Token is malformed")]
    MalformedToken,

    /// Header `alg` is not the algorithm mandated for the configured mode.
    #[error("Token signing algorithm is not accepted")]
    AlgorithmMismatch,

    /// A claim failed the policy check. Carries the claim name.
    #[error("Token claim '{0}' does not match policy")]
    ClaimMismatch(&'static str),

    /// No key with the token's `kid` exists in a freshly fetched key set.
    #[error("Token signing key is unknown")]
    UnknownSigningKey,

    /// Key set could not be fetched and no usable cached copy exists.
    #[error("Signing key source is unavailable")]
    KeySourceUnavailable,

    /// Signature did not verify against the resolved key.
    #[error("Token signature is invalid")]
    SignatureInvalid,

    /// `exp` is in the past beyond the configured leeway.
    #[error("Token has expired")]
    TokenExpired,

    /// Server-side configuration cannot verify tokens at all.
    #[error("Token verification is misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Stable reason code for responses, logs and metric labels.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::AlgorithmMismatch => "algorithm_mismatch",
            AuthError::ClaimMismatch(_) => "claim_mismatch",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::KeySourceUnavailable => "key_source_unavailable",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::Misconfigured(_) => "misconfigured",
        }
    }

    /// Name of the mismatched claim, for `ClaimMismatch` only.
    pub fn claim(&self) -> Option<&'static str> {
        match self {
            AuthError::ClaimMismatch(field) => Some(field),
            _ => None,
        }
    }

    /// HTTP status this failure maps to.
    ///
    /// Client-caused failures are 401. A missing key source is 503 because
    /// the same token may verify once the source recovers. Misconfiguration
    /// is a server fault.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::KeySourceUnavailable => 503,
            AuthError::Misconfigured(_) => 500,
            _ => 401,
        }
    }
}
