//! Claims from a token whose signature has been verified.
//!
//! Kept as a raw JSON object so policy code can read provider-specific
//! claims (`token_use`, `client_id`, `cognito:username`) without a fixed
//! schema. Debug output lists claim names only.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Verified JWT payload.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct VerifiedClaims {
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Wrap a decoded claims object.
    pub fn from_map(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Claim value by name when it is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Claim value by name when it is an integer.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.claims.get(name).and_then(Value::as_i64)
    }

    /// `aud` values, accepting both the string and array forms.
    pub fn audiences(&self) -> Vec<&str> {
        match self.claims.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Expiration (`exp`) as Unix seconds.
    pub fn exp(&self) -> Option<i64> {
        self.get_i64("exp")
    }

    /// Issued-at (`iat`) as Unix seconds.
    pub fn iat(&self) -> Option<i64> {
        self.get_i64("iat")
    }

    /// Not-before (`nbf`) as Unix seconds.
    pub fn nbf(&self) -> Option<i64> {
        self.get_i64("nbf")
    }
}

impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedClaims")
            .field("names", &self.claims.keys().collect::<Vec<_>>())
            .field("exp", &self.exp())
            .finish()
    }
}
