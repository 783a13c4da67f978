//! The authenticator capability and its startup-time selection.
//!
//! An [`Authenticator`] implements one concrete credential-validation scheme.
//! The security handler never verifies credentials itself; it picks an
//! authenticator once at startup and drives it through this interface on
//! every request.
//!
//! Selection order at startup:
//! 1. an explicitly configured instance,
//! 2. an explicitly configured [`AuthenticatorFactory`], called once,
//! 3. the [`AuthenticatorRegistry`] (externally registered factories first,
//!    then the built-in [`DefaultAuthenticatorFactory`]),
//! 4. the no-op [`NullAuthenticator`].
//!
//! Validation outcomes are ordinary values ([`Validation`]), not exceptions:
//! a scheme that wrote its own response (for example a `401` challenge)
//! returns [`Validation::Challenge`]; only genuine scheme breakdowns surface
//! as [`AuthError`].

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::dev::ServiceRequest;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use base64::prelude::*;

use crate::http::error::{AuthError, ConfigError};
use crate::http::security::constraint::Requirement;
use crate::http::security::deferred::DeferredAuthentication;
use crate::http::security::identity::{IdentityService, UserIdentity};
use crate::http::security::login::LoginService;

/// Method name of the built-in Basic scheme.
pub const BASIC_AUTH: &str = "BASIC";
/// Method name of the no-op authenticator.
pub const NULL_AUTH: &str = "NULL";
/// Method tag for identities established by programmatic login.
pub const API_AUTH: &str = "API";

/// Whether a validation call may interact with the client.
///
/// A deferred probe must never produce an observable challenge; passing the
/// mode explicitly lets a scheme suppress interactive behavior instead of
/// sniffing for a sentinel response object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// A real request/response pair; challenges are allowed.
    Interactive,
    /// A speculative probe; the scheme must stay silent.
    Probe,
}

impl ValidationMode {
    pub fn is_probe(&self) -> bool {
        matches!(self, ValidationMode::Probe)
    }
}

/// A concrete identity produced by validation, tagged with the method that
/// established it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthentication {
    method: String,
    identity: UserIdentity,
}

impl UserAuthentication {
    pub fn new(method: impl Into<String>, identity: UserIdentity) -> Self {
        UserAuthentication {
            method: method.into(),
            identity,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }
}

/// Outcome of a single validation attempt.
#[derive(Debug)]
pub enum Validation {
    /// Credentials checked out.
    Authenticated(UserAuthentication),
    /// The scheme produced the response itself (e.g. a challenge); request
    /// processing stops and the response is sent as-is.
    Challenge(HttpResponse),
    /// No/invalid credentials, and the scheme has nothing to send.
    Unauthenticated,
}

/// The authentication state bound to a request for the duration of its
/// processing. Exactly one variant is active per request.
#[derive(Debug, Clone)]
pub enum Authentication {
    /// A concrete validated identity.
    User(UserAuthentication),
    /// Nothing validated yet, but on-demand login is available downstream.
    Deferred(DeferredAuthentication),
    /// Nothing validated and no login capability.
    Unauthenticated,
}

impl Authentication {
    pub fn user(&self) -> Option<&UserAuthentication> {
        match self {
            Authentication::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.user().map(UserAuthentication::identity)
    }

    pub fn deferred(&self) -> Option<&DeferredAuthentication> {
        match self {
            Authentication::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::User(_))
    }
}

/// Read-only configuration surface handed to authenticators at startup.
#[derive(Clone)]
pub struct AuthConfig {
    realm_name: Option<String>,
    auth_method: Option<String>,
    parameters: HashMap<String, String>,
    session_renewed_on_authentication: bool,
    login_service: Option<Arc<dyn LoginService>>,
    identity_service: Arc<dyn IdentityService>,
}

impl AuthConfig {
    pub fn new(identity_service: Arc<dyn IdentityService>) -> Self {
        AuthConfig {
            realm_name: None,
            auth_method: None,
            parameters: HashMap::new(),
            session_renewed_on_authentication: true,
            login_service: None,
            identity_service,
        }
    }

    pub fn with_realm_name(mut self, realm_name: &str) -> Self {
        self.realm_name = Some(realm_name.to_string());
        self
    }

    pub fn with_auth_method(mut self, auth_method: &str) -> Self {
        self.auth_method = Some(auth_method.to_string());
        self
    }

    pub fn with_parameter(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_session_renewal(mut self, renew: bool) -> Self {
        self.session_renewed_on_authentication = renew;
        self
    }

    pub fn with_login_service(mut self, login_service: Arc<dyn LoginService>) -> Self {
        self.login_service = Some(login_service);
        self
    }

    pub fn realm_name(&self) -> Option<&str> {
        self.realm_name.as_deref()
    }

    pub fn auth_method(&self) -> Option<&str> {
        self.auth_method.as_deref()
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn is_session_renewed_on_authentication(&self) -> bool {
        self.session_renewed_on_authentication
    }

    pub fn login_service(&self) -> Option<Arc<dyn LoginService>> {
        self.login_service.clone()
    }

    pub fn identity_service(&self) -> Arc<dyn IdentityService> {
        Arc::clone(&self.identity_service)
    }
}

/// A pluggable credential-validation scheme.
pub trait Authenticator: Send + Sync {
    /// The scheme name, e.g. `"BASIC"`.
    fn auth_method(&self) -> &str;

    /// Receives the handler configuration once at startup.
    fn set_configuration(&mut self, _config: &AuthConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Refines the constraint's abstract requirement into a concrete
    /// "must validate now?" decision for this request. Returning
    /// [`Requirement::None`] skips validation entirely (e.g. when session
    /// state already satisfies the requirement).
    fn constraint_requirement(
        &self,
        _path: &str,
        requirement: Requirement,
        _req: &HttpRequest,
    ) -> Requirement {
        requirement
    }

    /// Performs one validation attempt. Never retried by the handler.
    fn validate_request(
        &self,
        req: &HttpRequest,
        mode: ValidationMode,
    ) -> Result<Validation, AuthError>;

    /// Lets the scheme rewrite the request before it is delegated
    /// downstream. The default is a pass-through.
    fn prepare_request(&self, req: ServiceRequest, _auth: &Authentication) -> ServiceRequest {
        req
    }

    /// Downcast hook for login-capable schemes. The handler wraps such
    /// schemes in a [`DeferredAuthentication`] for lazy on-demand login.
    fn as_login(&self) -> Option<&dyn LoginAuthenticator> {
        None
    }
}

/// A scheme that can establish an identity from explicit credentials, not
/// just from what the request carries.
pub trait LoginAuthenticator: Authenticator {
    /// Programmatic login, bypassing request-derived credentials.
    fn login(
        &self,
        username: &str,
        credential: &str,
        req: &HttpRequest,
    ) -> Option<UserIdentity>;

    /// The credential store backing this scheme.
    fn login_service(&self) -> Option<Arc<dyn LoginService>>;
}

/// Produces an authenticator for a given configuration, or declines.
pub trait AuthenticatorFactory: Send + Sync {
    fn authenticator(&self, config: &AuthConfig) -> Option<Box<dyn Authenticator>>;
}

/// Explicit, assembled-at-startup list of known authenticator factories.
///
/// Replaces runtime service discovery: factories are registered while the
/// process is being wired up, the registry is then shared read-only by every
/// handler. Externally registered factories are consulted in registration
/// order; the built-in [`DefaultAuthenticatorFactory`] is always the final
/// fallback.
#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    factories: Vec<Arc<dyn AuthenticatorFactory>>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        AuthenticatorRegistry::default()
    }

    pub fn register(&mut self, factory: impl AuthenticatorFactory + 'static) {
        self.factories.push(Arc::new(factory));
    }

    /// Returns the first authenticator any factory is willing to produce.
    pub fn resolve(&self, config: &AuthConfig) -> Option<Box<dyn Authenticator>> {
        for factory in &self.factories {
            if let Some(authenticator) = factory.authenticator(config) {
                return Some(authenticator);
            }
        }
        DefaultAuthenticatorFactory.authenticator(config)
    }
}

/// Built-in factory: produces a [`BasicAuthenticator`] when the configured
/// method is `"BASIC"` (or unset) and a login service is available.
pub struct DefaultAuthenticatorFactory;

impl AuthenticatorFactory for DefaultAuthenticatorFactory {
    fn authenticator(&self, config: &AuthConfig) -> Option<Box<dyn Authenticator>> {
        let method = config.auth_method().unwrap_or(BASIC_AUTH);
        if method == BASIC_AUTH && config.login_service().is_some() {
            return Some(Box::new(BasicAuthenticator::new()));
        }
        None
    }
}

/// No-op authenticator installed when nothing else is produced. Never
/// requires credentials and never authenticates anyone.
#[derive(Debug, Default)]
pub struct NullAuthenticator;

impl Authenticator for NullAuthenticator {
    fn auth_method(&self) -> &str {
        NULL_AUTH
    }

    fn constraint_requirement(
        &self,
        _path: &str,
        _requirement: Requirement,
        _req: &HttpRequest,
    ) -> Requirement {
        Requirement::None
    }

    fn validate_request(
        &self,
        _req: &HttpRequest,
        _mode: ValidationMode,
    ) -> Result<Validation, AuthError> {
        Ok(Validation::Unauthenticated)
    }
}

/// HTTP Basic authentication against the configured login service.
///
/// Parses `Authorization: Basic <base64(username:password)>`; missing or
/// invalid credentials produce a `401` challenge with a `WWW-Authenticate`
/// header in interactive mode, and plain [`Validation::Unauthenticated`]
/// when probed.
pub struct BasicAuthenticator {
    realm: String,
    login_service: Option<Arc<dyn LoginService>>,
}

impl BasicAuthenticator {
    pub fn new() -> Self {
        BasicAuthenticator {
            realm: "Restricted".to_string(),
            login_service: None,
        }
    }

    fn challenge(&self) -> HttpResponse {
        HttpResponse::Unauthorized()
            .insert_header((
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{}\"", self.realm),
            ))
            .finish()
    }

    /// Decodes the Authorization header into (username, password).
    fn credentials(req: &HttpRequest) -> Option<(String, String)> {
        let auth_header = req.headers().get(header::AUTHORIZATION)?;
        let auth_str = auth_header.to_str().ok()?;
        let encoded = auth_str.strip_prefix("Basic ")?;

        let decoded = BASE64_STANDARD.decode(encoded).ok()?;
        let decoded_str = String::from_utf8(decoded).ok()?;

        let (username, password) = decoded_str.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }
}

impl Default for BasicAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for BasicAuthenticator {
    fn auth_method(&self) -> &str {
        BASIC_AUTH
    }

    fn set_configuration(&mut self, config: &AuthConfig) -> Result<(), ConfigError> {
        if let Some(realm) = config.realm_name() {
            self.realm = realm.to_string();
        }
        self.login_service = Some(config.login_service().ok_or_else(|| {
            ConfigError::MissingLoginService {
                method: BASIC_AUTH.to_string(),
            }
        })?);
        Ok(())
    }

    fn validate_request(
        &self,
        req: &HttpRequest,
        mode: ValidationMode,
    ) -> Result<Validation, AuthError> {
        let login_service = self
            .login_service
            .as_ref()
            .ok_or_else(|| AuthError::protocol("BASIC authenticator not configured"))?;

        if let Some((username, password)) = Self::credentials(req) {
            if let Some(identity) = login_service.login(&username, &password) {
                return Ok(Validation::Authenticated(UserAuthentication::new(
                    BASIC_AUTH, identity,
                )));
            }
        }

        if mode.is_probe() {
            Ok(Validation::Unauthenticated)
        } else {
            Ok(Validation::Challenge(self.challenge()))
        }
    }

    fn as_login(&self) -> Option<&dyn LoginAuthenticator> {
        Some(self)
    }
}

impl LoginAuthenticator for BasicAuthenticator {
    fn login(&self, username: &str, credential: &str, _req: &HttpRequest) -> Option<UserIdentity> {
        self.login_service.as_ref()?.login(username, credential)
    }

    fn login_service(&self) -> Option<Arc<dyn LoginService>> {
        self.login_service.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::security::identity::DefaultIdentityService;
    use crate::http::security::login::MemoryLoginService;
    use actix_web::test::TestRequest;

    fn basic_header(username: &str, password: &str) -> String {
        format!(
            "Basic {}",
            BASE64_STANDARD.encode(format!("{}:{}", username, password))
        )
    }

    fn test_config() -> AuthConfig {
        let login_service = MemoryLoginService::new().with_user("admin", "secret", &["admin"]);
        AuthConfig::new(Arc::new(DefaultIdentityService::new()))
            .with_login_service(Arc::new(login_service))
    }

    fn configured_basic() -> BasicAuthenticator {
        let mut authenticator = BasicAuthenticator::new();
        authenticator.set_configuration(&test_config()).unwrap();
        authenticator
    }

    #[test]
    fn test_basic_valid_credentials() {
        let authenticator = configured_basic();
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, basic_header("admin", "secret")))
            .to_http_request();

        match authenticator
            .validate_request(&req, ValidationMode::Interactive)
            .unwrap()
        {
            Validation::Authenticated(user) => {
                assert_eq!(user.method(), BASIC_AUTH);
                assert_eq!(user.identity().username(), "admin");
            }
            other => panic!("expected Authenticated, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_wrong_password_challenges() {
        let authenticator = configured_basic();
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, basic_header("admin", "wrong")))
            .to_http_request();

        match authenticator
            .validate_request(&req, ValidationMode::Interactive)
            .unwrap()
        {
            Validation::Challenge(resp) => {
                let www = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
                assert!(www.to_str().unwrap().starts_with("Basic realm="));
            }
            other => panic!("expected Challenge, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_missing_header_challenges() {
        let authenticator = configured_basic();
        let req = TestRequest::default().to_http_request();

        assert!(matches!(
            authenticator
                .validate_request(&req, ValidationMode::Interactive)
                .unwrap(),
            Validation::Challenge(_)
        ));
    }

    #[test]
    fn test_basic_malformed_header_challenges() {
        let authenticator = configured_basic();
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic not-base64!!"))
            .to_http_request();

        assert!(matches!(
            authenticator
                .validate_request(&req, ValidationMode::Interactive)
                .unwrap(),
            Validation::Challenge(_)
        ));
    }

    #[test]
    fn test_basic_probe_never_challenges() {
        let authenticator = configured_basic();
        let req = TestRequest::default().to_http_request();

        assert!(matches!(
            authenticator
                .validate_request(&req, ValidationMode::Probe)
                .unwrap(),
            Validation::Unauthenticated
        ));
    }

    #[test]
    fn test_basic_uses_configured_realm() {
        let mut authenticator = BasicAuthenticator::new();
        authenticator
            .set_configuration(&test_config().with_realm_name("Test Realm"))
            .unwrap();
        let req = TestRequest::default().to_http_request();

        match authenticator
            .validate_request(&req, ValidationMode::Interactive)
            .unwrap()
        {
            Validation::Challenge(resp) => {
                let www = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
                assert_eq!(www.to_str().unwrap(), "Basic realm=\"Test Realm\"");
            }
            other => panic!("expected Challenge, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_requires_login_service() {
        let mut authenticator = BasicAuthenticator::new();
        let config = AuthConfig::new(Arc::new(DefaultIdentityService::new()));
        assert!(matches!(
            authenticator.set_configuration(&config),
            Err(ConfigError::MissingLoginService { .. })
        ));
    }

    #[test]
    fn test_null_authenticator_never_requires_credentials() {
        let authenticator = NullAuthenticator;
        let req = TestRequest::default().to_http_request();

        assert_eq!(
            authenticator.constraint_requirement("/x", Requirement::AnyRole, &req),
            Requirement::None
        );
        assert!(matches!(
            authenticator
                .validate_request(&req, ValidationMode::Interactive)
                .unwrap(),
            Validation::Unauthenticated
        ));
        assert!(authenticator.as_login().is_none());
    }

    #[test]
    fn test_default_factory_needs_login_service() {
        let config = AuthConfig::new(Arc::new(DefaultIdentityService::new()));
        assert!(DefaultAuthenticatorFactory.authenticator(&config).is_none());
        assert!(DefaultAuthenticatorFactory
            .authenticator(&test_config())
            .is_some());
    }

    #[test]
    fn test_default_factory_respects_auth_method() {
        let config = test_config().with_auth_method("DIGEST");
        assert!(DefaultAuthenticatorFactory.authenticator(&config).is_none());

        let config = test_config().with_auth_method(BASIC_AUTH);
        assert!(DefaultAuthenticatorFactory.authenticator(&config).is_some());
    }

    #[test]
    fn test_registry_prefers_registered_factories() {
        struct FixedFactory;
        impl AuthenticatorFactory for FixedFactory {
            fn authenticator(&self, _config: &AuthConfig) -> Option<Box<dyn Authenticator>> {
                Some(Box::new(NullAuthenticator))
            }
        }

        let mut registry = AuthenticatorRegistry::new();
        registry.register(FixedFactory);

        let resolved = registry.resolve(&test_config()).unwrap();
        assert_eq!(resolved.auth_method(), NULL_AUTH);
    }

    #[test]
    fn test_registry_falls_back_to_default_factory() {
        let registry = AuthenticatorRegistry::new();
        let resolved = registry.resolve(&test_config()).unwrap();
        assert_eq!(resolved.auth_method(), BASIC_AUTH);
    }

    #[test]
    fn test_registry_declines_when_nothing_fits() {
        let registry = AuthenticatorRegistry::new();
        let config = AuthConfig::new(Arc::new(DefaultIdentityService::new()));
        assert!(registry.resolve(&config).is_none());
    }

    #[test]
    fn test_config_parameters() {
        let config = test_config()
            .with_parameter("login-page", "/login")
            .with_session_renewal(false);
        assert_eq!(config.parameter("login-page"), Some("/login"));
        assert_eq!(config.parameter("missing"), None);
        assert!(!config.is_session_renewed_on_authentication());
    }
}
