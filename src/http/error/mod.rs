//! Error types for authentication and configuration failures.

pub use auth_error::AuthError;
pub use config_error::ConfigError;

mod auth_error;
mod config_error;
