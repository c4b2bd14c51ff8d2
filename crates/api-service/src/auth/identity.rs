//! Verified caller identity.
//!
//! Only the verifier constructs an [`Identity`], and only from claims whose
//! signature has been checked. `subject` and `email` are redacted in Debug
//! output since they identify end users.

use serde::Serialize;
use std::fmt;

/// The authenticated principal for one request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// The token's `sub` claim. Never empty.
    #[serde(rename = "sub")]
    subject: String,

    /// The token's `email` claim, if present.
    email: Option<String>,
}

impl Identity {
    /// Build an identity. Returns `None` for an empty subject.
    pub(crate) fn new(subject: String, email: Option<String>) -> Option<Self> {
        if subject.is_empty() {
            return None;
        }
        Some(Self { subject, email })
    }

    /// Subject identifier (`sub`), stable per user within one issuer.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Email address, when the token carried one.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &"[REDACTED]")
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
