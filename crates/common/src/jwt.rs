//! Unverified JWT inspection shared by the API services.
//!
//! This module reads token metadata WITHOUT checking the signature:
//! - Size limit enforced before any decoding
//! - Header parsing (`alg`, `kid`)
//! - Claims parsing into an [`UnverifiedClaims`] map
//! - Clock skew constants and `iat`/`nbf` bound checks
//!
//! # Security
//!
//! Nothing returned from here is trusted. The header and claims are only
//! used to reject tokens cheaply before network or cryptographic work, and to
//! pick a signing key out of a key set the caller already trusts. Identity
//! must only ever be built from claims that passed signature verification.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_claims_unverified, parse_header_unverified};
//!
//! let header = parse_header_unverified(token)?;
//! let claims = parse_claims_unverified(token)?;
//! if claims.get_str("iss") != Some(expected_issuer) {
//!     // reject without touching the key set
//! }
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before base64 decoding. Cognito ID
/// tokens carrying group claims sit around 1-2KB, so this leaves headroom.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default leeway applied to time-bound claims (`exp`, `nbf`, `iat`).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Upper bound for configurable leeway (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while inspecting a token without verifying it.
///
/// Display strings are generic on purpose; details go to debug logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is malformed")]
    TokenTooLarge,

    /// Token is not `header.payload.signature` with JSON header and payload.
    #[error("The access token is malformed")]
    MalformedToken,

    /// Token `iat` claim is further in the future than the allowed skew.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,

    /// Token `nbf` claim is further in the future than the allowed skew.
    #[error("The access token is not yet valid")]
    NotYetValid,
}

// =============================================================================
// Header and Claims
// =============================================================================

/// The parts of a JOSE header needed to route a token to a key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm as written in the token (e.g. `"RS256"`).
    pub alg: String,

    /// Key identifier, if the issuer sets one.
    #[serde(default)]
    pub kid: Option<String>,

    /// Token type, usually `"JWT"`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Claims read from a token payload without cryptographic trust.
///
/// A thin wrapper over the JSON object so policy code can read any claim by
/// name. `Debug` only prints claim names, never values.
#[derive(Clone, Default, PartialEq)]
pub struct UnverifiedClaims {
    claims: Map<String, Value>,
}

impl UnverifiedClaims {
    /// Wrap an already-decoded claims object.
    #[must_use]
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Raw claim value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Claim value by name when it is a JSON string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Claim value by name when it is an integer.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.claims.get(name).and_then(Value::as_i64)
    }

    /// The `aud` claim as a list, whether it was sent as a string or array.
    ///
    /// Non-string array members are ignored.
    #[must_use]
    pub fn audiences(&self) -> Vec<&str> {
        match self.claims.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the claim is present at all (any JSON type).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }
}

impl fmt::Debug for UnverifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnverifiedClaims")
            .field("names", &self.claims.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWT into its three segments after the size check.
fn split_segments(token: &str) -> Result<(&str, &str, &str), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Decode one base64url segment into a JSON object.
fn decode_segment(segment: &str, what: &'static str) -> Result<Map<String, Value>, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = what, error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::debug!(target: "common.jwt", segment = what, "JWT segment is not a JSON object");
            Err(JwtValidationError::MalformedToken)
        }
        Err(e) => {
            tracing::debug!(target: "common.jwt", segment = what, error = %e, "Failed to parse JWT segment JSON");
            Err(JwtValidationError::MalformedToken)
        }
    }
}

/// Read the JOSE header of a token without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - wrong segment count, bad base64, non-object JSON, or
///   a header without a string `alg`
///
/// An empty `kid` is normalized to `None`.
pub fn parse_header_unverified(token: &str) -> Result<TokenHeader, JwtValidationError> {
    let (header_part, _, _) = split_segments(token)?;
    let header_map = decode_segment(header_part, "header")?;

    let mut header: TokenHeader =
        serde_json::from_value(Value::Object(header_map)).map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "JWT header missing required fields");
            JwtValidationError::MalformedToken
        })?;

    if header.kid.as_deref() == Some("") {
        header.kid = None;
    }

    Ok(header)
}

/// Read the claims of a token without verifying the signature.
///
/// # Errors
///
/// Same conditions as [`parse_header_unverified`]; the header segment must
/// also be decodable so both calls agree on what "well-formed" means.
pub fn parse_claims_unverified(token: &str) -> Result<UnverifiedClaims, JwtValidationError> {
    let (header_part, payload_part, _) = split_segments(token)?;
    decode_segment(header_part, "header")?;
    let claims = decode_segment(payload_part, "payload")?;
    Ok(UnverifiedClaims::from_map(claims))
}

/// Validate the `iat` (issued-at) claim against `now` with skew tolerance.
///
/// # Errors
///
/// Returns `IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    let max_iat = now.saturating_add(skew_secs(clock_skew));

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Validate the `nbf` (not-before) claim against `now` with skew tolerance.
///
/// # Errors
///
/// Returns `NotYetValid` if `nbf > now + clock_skew`.
pub fn validate_nbf(nbf: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    if nbf > now.saturating_add(skew_secs(clock_skew)) {
        tracing::debug!(target: "common.jwt", nbf = nbf, now = now, "Token rejected: not yet valid");
        return Err(JwtValidationError::NotYetValid);
    }
    Ok(())
}

fn skew_secs(clock_skew: Duration) -> i64 {
    i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX)
}
