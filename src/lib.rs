//! # Actix Gatekeeper
//!
//! Constraint-driven authentication and authorization middleware for
//! Actix Web.
//!
//! A [`SecurityHandler`](http::security::SecurityHandler) wraps an
//! application and, for every request, resolves the declared
//! [`Constraint`](http::security::Constraint) for the path, validates
//! credentials through a pluggable
//! [`Authenticator`](http::security::Authenticator), authorizes the result
//! against the constraint's roles, and scopes the authenticated identity to
//! the request through an
//! [`IdentityService`](http::security::IdentityService).
//!
//! Paths without a mandatory constraint still get *deferred* authentication:
//! handlers may probe for credentials or trigger a login on demand via
//! [`DeferredAuthentication`](http::security::DeferredAuthentication),
//! without challenging clients that never asked to log in.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use actix_web::{get, App, HttpServer, Responder};
//! use actix_gatekeeper::http::security::{
//!     Auth, Constraint, MemoryLoginService, SecurityHandler,
//! };
//!
//! #[get("/admin/panel")]
//! async fn panel(auth: Auth) -> impl Responder {
//!     format!("welcome {}", auth.identity().map(|i| i.username()).unwrap_or("?"))
//! }
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let handler = SecurityHandler::builder()
//!         .constraint("/admin/*", Constraint::new().roles(&["admin"]))
//!         .constraint("/public/*", Constraint::new())
//!         .login_service(Arc::new(
//!             MemoryLoginService::new()
//!                 .realm_name("Example")
//!                 .with_user("admin", "secret", &["admin"]),
//!         ))
//!         .build()
//!         .expect("security configuration");
//!
//!     HttpServer::new(move || App::new().wrap(handler.clone()).service(panel))
//!         .bind(("127.0.0.1", 8080))?
//!         .run()
//!         .await
//! }
//! ```

pub mod http;

pub use http::error::{AuthError, ConfigError};
pub use http::security::{
    Auth, AuthenticatedUser, Authentication, Constraint, DeferredAuthentication,
    MappedConstraints, SecurityContext, SecurityHandler, UserIdentity,
};
