//! Security module providing authentication and authorization.
//!
//! # Module Structure
//!
//! - `constraint` - Authorization constraints and their combination rule
//! - `path_spec` - Servlet-style URL pattern matching
//! - `resolver` - Path-to-constraint mapping (MappedConstraints)
//! - `identity` - User identity, identity services, and the security context
//! - `login` - Login services (MemoryLoginService)
//! - `authenticator` - Authenticator traits, factories, and built-ins
//! - `deferred` - Lazy authentication for unprotected paths
//! - `extractor` - Actix Web extractors (Auth, AuthenticatedUser)
//! - `handler` - The SecurityHandler middleware and its builder

// Re-exports for convenience
pub use authenticator::{
    AuthConfig, Authentication, Authenticator, AuthenticatorFactory, AuthenticatorRegistry,
    BasicAuthenticator, DefaultAuthenticatorFactory, LoginAuthenticator, NullAuthenticator,
    UserAuthentication, Validation, ValidationMode, API_AUTH, BASIC_AUTH, NULL_AUTH,
};
pub use constraint::{Constraint, Requirement};
pub use deferred::DeferredAuthentication;
pub use extractor::{Auth, AuthenticatedUser};
pub use handler::{SecurityHandler, SecurityHandlerBuilder};
pub use identity::{
    Association, DefaultIdentityService, IdentityService, SecurityContext, UserIdentity,
};
pub use login::{LoginService, MemoryLoginService};
pub use path_spec::PathSpec;
pub use resolver::MappedConstraints;

pub mod authenticator;
pub mod constraint;
pub mod deferred;
pub mod extractor;
pub mod handler;
pub mod identity;
pub mod login;
pub mod path_spec;
pub mod resolver;
