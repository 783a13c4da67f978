//! HTTP-layer security: request-time authentication and authorization.

pub mod error;
pub mod security;
