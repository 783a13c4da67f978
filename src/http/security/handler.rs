//! The security handler: per-request orchestration middleware.
//!
//! For every request the handler resolves the effective [`Constraint`] for
//! the path, short-circuits forbidden paths and insecure transport, asks the
//! authenticator whether validation is needed now, validates, authorizes,
//! associates the resulting identity, delegates to the next service in the
//! chain, and releases the association on every exit path.
//!
//! Configuration happens through [`SecurityHandlerBuilder`]; its
//! [`build`](SecurityHandlerBuilder::build) performs the startup resolution
//! of authenticator, login service and identity service, and refuses to
//! activate on misconfiguration.
//!
//! # Example
//! ```ignore
//! let handler = SecurityHandler::builder()
//!     .constraint("/admin/*", Constraint::new().roles(&["admin"]))
//!     .constraint("/public/*", Constraint::new())
//!     .login_service(Arc::new(
//!         MemoryLoginService::new().with_user("admin", "secret", &["admin"]),
//!     ))
//!     .build()?;
//!
//! App::new().wrap(handler).service(...)
//! ```

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponse};
use futures_util::future::{ok, LocalBoxFuture, Ready};

use crate::http::error::ConfigError;
use crate::http::security::authenticator::{
    AuthConfig, Authentication, Authenticator, AuthenticatorFactory, AuthenticatorRegistry,
    NullAuthenticator, UserAuthentication, Validation, ValidationMode,
};
use crate::http::security::constraint::{Constraint, Requirement};
use crate::http::security::deferred::DeferredAuthentication;
use crate::http::security::identity::{DefaultIdentityService, IdentityService, SecurityContext};
use crate::http::security::login::LoginService;
use crate::http::security::resolver::MappedConstraints;

/// Where to send a request that needs secure transport.
#[derive(Debug, Clone)]
struct SecureRedirect {
    scheme: String,
    port: u16,
}

struct Inner {
    constraints: MappedConstraints,
    authenticator: Arc<dyn Authenticator>,
    login_service: Option<Arc<dyn LoginService>>,
    identity_service: Arc<dyn IdentityService>,
    secure_redirect: Option<SecureRedirect>,
}

/// Security middleware factory.
///
/// Built once at startup via [`SecurityHandler::builder`], then shared by
/// every worker; all request-time state is read-only.
#[derive(Clone)]
pub struct SecurityHandler {
    inner: Arc<Inner>,
}

impl SecurityHandler {
    pub fn builder() -> SecurityHandlerBuilder {
        SecurityHandlerBuilder::new()
    }

    /// The union of roles referenced by the registered constraints.
    pub fn known_roles(&self) -> Arc<std::collections::HashSet<String>> {
        self.inner.constraints.known_roles()
    }

    pub fn authenticator(&self) -> Arc<dyn Authenticator> {
        Arc::clone(&self.inner.authenticator)
    }

    pub fn login_service(&self) -> Option<Arc<dyn LoginService>> {
        self.inner.login_service.clone()
    }

    pub fn identity_service(&self) -> Arc<dyn IdentityService> {
        Arc::clone(&self.inner.identity_service)
    }

    /// Logs the user out of both the login service and the identity service.
    pub fn logout(&self, user: &UserAuthentication) {
        log::debug!("logout {}", user.identity().username());
        if let Some(login_service) = &self.inner.login_service {
            login_service.logout(user.identity());
        }
        self.inner.identity_service.logout(user.identity());
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHandler
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SecurityHandlerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SecurityHandlerMiddleware {
            service: Rc::new(service),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Security middleware service; one per worker, shared request state lives
/// in [`Inner`].
pub struct SecurityHandlerMiddleware<S> {
    service: Rc<S>,
    inner: Arc<Inner>,
}

impl<S, B> Service<ServiceRequest> for SecurityHandlerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        let service = Rc::clone(&self.service);
        Box::pin(handle(inner, service, req))
    }
}

/// The per-request state machine.
async fn handle<S, B>(
    inner: Arc<Inner>,
    service: Rc<S>,
    req: ServiceRequest,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    let path = req.path().to_string();

    // 1. Resolve the constraint; an unmapped path is unconstrained.
    let constraint = inner.constraints.resolve(&path).unwrap_or_default();

    // 2. Forbidden wins over everything, credentials included.
    if constraint.is_forbidden() {
        log::debug!("forbidden {}", path);
        return Ok(req.into_response(HttpResponse::Forbidden().finish().map_into_right_body()));
    }

    // 3. Transport check.
    if constraint.is_secure() && req.connection_info().scheme() != "https" {
        return Ok(redirect_to_secure(&inner, req));
    }

    // 4. Let the authenticator refine the abstract requirement into a
    //    concrete "must validate now?" decision.
    let requirement =
        inner
            .authenticator
            .constraint_requirement(&path, constraint.requirement(), req.request());

    // 5. Validate, if required. A single attempt; scheme errors are 500s.
    let validation = if requirement != Requirement::None {
        match inner
            .authenticator
            .validate_request(req.request(), ValidationMode::Interactive)
        {
            Ok(validation) => Some(validation),
            Err(e) => {
                log::warn!("authentication error on {}: {}", path, e);
                return Ok(req.into_response(
                    HttpResponse::InternalServerError()
                        .body(e.to_string())
                        .map_into_right_body(),
                ));
            }
        }
    } else {
        None
    };

    let authentication = match validation {
        // The scheme wrote the response itself (e.g. a challenge); the
        // downstream service is not invoked.
        Some(Validation::Challenge(resp)) => {
            return Ok(req.into_response(resp.map_into_right_body()));
        }
        Some(Validation::Authenticated(user)) => Some(Authentication::User(user)),
        Some(Validation::Unauthenticated) => Some(Authentication::Unauthenticated),
        None => None,
    };

    // 6. Authorize against the refined requirement.
    if is_not_authorized(&inner, requirement, &constraint, authentication.as_ref()) {
        return Ok(req.into_response(
            HttpResponse::Forbidden()
                .body("!authorized")
                .map_into_right_body(),
        ));
    }

    // 7. With nothing validated up front, bind the deferred wrapper so
    //    downstream code can still opt into login.
    let authentication = authentication.unwrap_or_else(|| {
        DeferredAuthentication::wrap(Arc::clone(&inner.authenticator))
            .map(Authentication::Deferred)
            .unwrap_or(Authentication::Unauthenticated)
    });

    SecurityContext::scope(async move {
        // 8. Associate a concrete identity with this unit of execution.
        let association = authentication
            .user()
            .map(|user| inner.identity_service.associate(user.identity()));
        let deferred = authentication.deferred().cloned();

        req.extensions_mut().insert(authentication.clone());
        let req = inner.authenticator.prepare_request(req, &authentication);

        // 9. Delegate.
        let result = service.call(req).await;

        // 10. Release. A deferred login during downstream processing left
        //     its association on the handle; whatever association exists is
        //     closed exactly once, on success and error alike. (A cancelled
        //     request releases through Association's Drop.)
        let association =
            association.or_else(|| deferred.and_then(|d| d.take_association()));
        if let Some(association) = association {
            association.close();
        }

        result.map(|res| res.map_into_left_body())
    })
    .await
}

fn redirect_to_secure<B: 'static>(
    inner: &Inner,
    req: ServiceRequest,
) -> ServiceResponse<EitherBody<B>> {
    let Some(redirect) = &inner.secure_redirect else {
        return req.into_response(HttpResponse::Forbidden().body("!Secure").map_into_right_body());
    };

    let host = {
        let conn = req.connection_info();
        let raw = conn.host();
        // An IPv6 literal keeps its brackets; only the port suffix is
        // stripped.
        if raw.starts_with('[') {
            match raw.find(']') {
                Some(end) => raw[..=end].to_string(),
                None => raw.to_string(),
            }
        } else {
            raw.split(':').next().unwrap_or("localhost").to_string()
        }
    };
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    // Standard ports stay implicit.
    let port = match (redirect.scheme.as_str(), redirect.port) {
        ("https", 443) | ("http", 80) => String::new(),
        (_, port) => format!(":{}", port),
    };
    let url = format!("{}://{}{}{}", redirect.scheme, host, port, path_and_query);

    log::debug!("redirecting to secure {}", url);
    req.into_response(
        HttpResponse::Found()
            .insert_header((header::LOCATION, url))
            .insert_header((header::CONTENT_LENGTH, 0))
            .finish()
            .map_into_right_body(),
    )
}

fn is_not_authorized(
    inner: &Inner,
    requirement: Requirement,
    constraint: &Constraint,
    authentication: Option<&Authentication>,
) -> bool {
    let identity = authentication.and_then(|auth| auth.identity());

    match requirement {
        Requirement::None => false,
        Requirement::AnyRole => identity.is_none(),
        Requirement::KnownRole => match identity {
            Some(identity) => !inner
                .constraints
                .known_roles()
                .iter()
                .any(|role| identity.is_user_in_role(role)),
            None => true,
        },
        Requirement::SpecificRole => match identity {
            Some(identity) => !constraint
                .role_set()
                .iter()
                .any(|role| identity.is_user_in_role(role)),
            None => true,
        },
    }
}

/// Configures and activates a [`SecurityHandler`].
pub struct SecurityHandlerBuilder {
    constraints: MappedConstraints,
    authenticator: Option<Box<dyn Authenticator>>,
    authenticator_factory: Option<Arc<dyn AuthenticatorFactory>>,
    registry: AuthenticatorRegistry,
    realm_name: Option<String>,
    auth_method: Option<String>,
    parameters: Vec<(String, String)>,
    renew_session: bool,
    login_service: Option<Arc<dyn LoginService>>,
    identity_service: Option<Arc<dyn IdentityService>>,
    discovered_login_services: Vec<Arc<dyn LoginService>>,
    discovered_identity_services: Vec<Arc<dyn IdentityService>>,
    secure_redirect: Option<SecureRedirect>,
}

impl SecurityHandlerBuilder {
    pub fn new() -> Self {
        SecurityHandlerBuilder {
            constraints: MappedConstraints::new(),
            authenticator: None,
            authenticator_factory: None,
            registry: AuthenticatorRegistry::new(),
            realm_name: None,
            auth_method: None,
            parameters: Vec::new(),
            renew_session: true,
            login_service: None,
            identity_service: None,
            discovered_login_services: Vec::new(),
            discovered_identity_services: Vec::new(),
            secure_redirect: None,
        }
    }

    /// Registers a constraint for a path pattern.
    pub fn constraint(mut self, pattern: &str, constraint: Constraint) -> Self {
        self.constraints.put(pattern, constraint);
        self
    }

    /// Replaces the whole constraint mapping.
    pub fn constraints(mut self, constraints: MappedConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Sets an explicit authenticator instance; skips factory resolution.
    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Box::new(authenticator));
        self
    }

    /// Sets an explicit authenticator factory, consulted before the registry.
    pub fn authenticator_factory(mut self, factory: impl AuthenticatorFactory + 'static) -> Self {
        self.authenticator_factory = Some(Arc::new(factory));
        self
    }

    /// Uses the given factory registry instead of an empty one. The registry
    /// is assembled once at process startup and shared across handlers.
    pub fn registry(mut self, registry: AuthenticatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn realm_name(mut self, realm_name: &str) -> Self {
        self.realm_name = Some(realm_name.to_string());
        self
    }

    pub fn auth_method(mut self, auth_method: &str) -> Self {
        self.auth_method = Some(auth_method.to_string());
        self
    }

    /// Sets a free-form authentication parameter, retrievable by the
    /// authenticator through [`AuthConfig::parameter`].
    pub fn parameter(mut self, key: &str, value: &str) -> Self {
        self.parameters.push((key.to_string(), value.to_string()));
        self
    }

    pub fn session_renewed_on_authentication(mut self, renew: bool) -> Self {
        self.renew_session = renew;
        self
    }

    /// Binds an explicit login service.
    pub fn login_service(mut self, login_service: Arc<dyn LoginService>) -> Self {
        self.login_service = Some(login_service);
        self
    }

    /// Binds an explicit identity service.
    pub fn identity_service(mut self, identity_service: Arc<dyn IdentityService>) -> Self {
        self.identity_service = Some(identity_service);
        self
    }

    /// Adds a login service candidate the handler may discover: used when no
    /// explicit service is bound, matched by realm name if one is
    /// configured, otherwise only if it is the sole candidate.
    pub fn discover_login_service(mut self, login_service: Arc<dyn LoginService>) -> Self {
        self.discovered_login_services.push(login_service);
        self
    }

    /// Adds an identity service candidate, used only if it is the sole one.
    pub fn discover_identity_service(mut self, identity_service: Arc<dyn IdentityService>) -> Self {
        self.discovered_identity_services.push(identity_service);
        self
    }

    /// Enables redirection of insecure requests on secure-required paths to
    /// the given scheme and port. Without this, such requests get a 403.
    pub fn redirect_to_secure(mut self, scheme: &str, port: u16) -> Self {
        self.secure_redirect = Some(SecureRedirect {
            scheme: scheme.to_string(),
            port,
        });
        self
    }

    /// Resolves services and the authenticator, wires them together, and
    /// activates the handler. Misconfiguration fails here, never at request
    /// time.
    pub fn build(self) -> Result<SecurityHandler, ConfigError> {
        let SecurityHandlerBuilder {
            constraints,
            authenticator,
            authenticator_factory,
            registry,
            realm_name,
            auth_method,
            parameters,
            renew_session,
            login_service,
            identity_service,
            discovered_login_services,
            discovered_identity_services,
            secure_redirect,
        } = self;

        // Login service: explicit, else discovered by realm name, else the
        // single unambiguous candidate.
        let login_service = login_service.or_else(|| match &realm_name {
            Some(realm) => discovered_login_services
                .iter()
                .find(|s| s.name() == Some(realm.as_str()))
                .cloned(),
            None if discovered_login_services.len() == 1 => {
                Some(discovered_login_services[0].clone())
            }
            None => None,
        });

        // Identity service: explicit, else the login service's own, else the
        // single discovered candidate, else one we create and own.
        let identity_service = identity_service
            .or_else(|| {
                login_service
                    .as_ref()
                    .and_then(|login| login.identity_service())
            })
            .or_else(|| {
                if discovered_identity_services.len() == 1 {
                    Some(discovered_identity_services[0].clone())
                } else {
                    None
                }
            })
            .unwrap_or_else(|| Arc::new(DefaultIdentityService::new()));

        if let Some(login_service) = &login_service {
            match login_service.identity_service() {
                None => login_service.set_identity_service(Arc::clone(&identity_service)),
                Some(bound) if !Arc::ptr_eq(&bound, &identity_service) => {
                    return Err(ConfigError::MismatchedIdentityService);
                }
                Some(_) => {}
            }
        }

        // Realm: explicit configuration wins, otherwise the bound login
        // service names it.
        let effective_realm = realm_name.clone().or_else(|| {
            login_service
                .as_ref()
                .and_then(|service| service.name().map(str::to_string))
        });

        let mut config = AuthConfig::new(Arc::clone(&identity_service))
            .with_session_renewal(renew_session);
        if let Some(realm) = &effective_realm {
            config = config.with_realm_name(realm);
        }
        if let Some(method) = &auth_method {
            config = config.with_auth_method(method);
        }
        for (key, value) in &parameters {
            config = config.with_parameter(key, value);
        }
        if let Some(login_service) = &login_service {
            config = config.with_login_service(Arc::clone(login_service));
        }

        // Authenticator: explicit instance, else explicit factory, else the
        // registry (registered factories, then the built-in default).
        let resolved = match (authenticator, authenticator_factory) {
            (Some(authenticator), _) => Some(authenticator),
            (None, Some(factory)) => {
                let authenticator = factory.authenticator(&config);
                if let Some(authenticator) = &authenticator {
                    log::debug!(
                        "created authenticator {} with explicit factory",
                        authenticator.auth_method()
                    );
                }
                authenticator
            }
            (None, None) => registry.resolve(&config),
        };

        let mut resolved = match resolved {
            Some(authenticator) => authenticator,
            None => {
                // A stated realm without an authenticator able to use it is
                // unrecoverable misconfiguration.
                if let Some(realm) = realm_name {
                    log::warn!("no authenticator for realm {:?}", realm);
                    return Err(ConfigError::NoAuthenticator { realm });
                }
                Box::new(NullAuthenticator)
            }
        };

        resolved.set_configuration(&config)?;
        let authenticator: Arc<dyn Authenticator> = Arc::from(resolved);
        log::debug!("activated with authenticator {}", authenticator.auth_method());

        Ok(SecurityHandler {
            inner: Arc::new(Inner {
                constraints,
                authenticator,
                login_service,
                identity_service,
                secure_redirect,
            }),
        })
    }
}

impl Default for SecurityHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
