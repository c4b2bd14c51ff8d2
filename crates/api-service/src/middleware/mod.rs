//! Middleware for the API service.

pub mod auth;
pub mod http_metrics;
