//! Authentication for the API service.
//!
//! Bearer tokens are verified by [`TokenVerifier`] against a
//! [`VerificationPolicy`] chosen at startup:
//!
//! - `Local` - HS256 tokens signed with a shared development secret
//! - `RemoteId` - RS256 ID tokens from the Cognito user pool
//! - `RemoteAccess` - RS256 access tokens from the Cognito user pool
//!
//! Remote modes resolve keys through [`JwksClient`], which caches the user
//! pool's key set with a TTL.

pub mod claims;
pub mod clock;
pub mod dev_token;
pub mod error;
pub mod identity;
pub mod jwks;
pub mod policy;
pub mod verifier;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dev_token::issue_local_dev_token;
pub use error::AuthError;
pub use identity::Identity;
pub use jwks::{JwksClient, JwksOptions, LocalSecret, SigningKeySource};
pub use policy::{TokenMode, VerificationPolicy};
pub use verifier::TokenVerifier;
