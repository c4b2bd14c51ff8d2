//! Shared utilities for the serverless API crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for unverified JWT inspection (size limit, header/claims parsing, skew)
pub mod jwt;
