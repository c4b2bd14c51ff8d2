//! API Service Library
//!
//! HTTP API authenticated by bearer tokens. Three token modes are supported,
//! chosen per deployment:
//!
//! - Local HS256 tokens signed with a shared development secret
//! - Cognito ID tokens (RS256)
//! - Cognito access tokens (RS256)
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth::TokenVerifier -> handlers/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification, claim policy and signing key cache
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
