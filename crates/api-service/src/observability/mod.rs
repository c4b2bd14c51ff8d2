//! Observability for the API service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
