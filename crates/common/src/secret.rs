//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] types. The local HMAC signing secret and any bearer
//! token held in a struct should be wrapped so that `Debug` output (and
//! therefore `tracing` fields) shows `[REDACTED]` instead of the value.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LocalSigning {
//!     issuer: String,
//!     secret: SecretString,
//! }
//!
//! let signing = LocalSigning {
//!     issuer: "local-dev".to_string(),
//!     secret: SecretString::from("dev-secret"),
//! };
//!
//! assert!(!format!("{signing:?}").contains("dev-secret"));
//! assert_eq!(signing.secret.expose_secret(), "dev-secret");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
