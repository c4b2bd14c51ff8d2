//! HTTP request handlers for the API service.

pub mod dev_token;
pub mod health;
pub mod me;
pub mod metrics;
pub mod public_config;

pub use dev_token::issue_dev_token;
pub use health::health_check;
pub use me::get_me;
pub use metrics::metrics_handler;
pub use public_config::get_public_config;
