//! Common test utilities and configuration.
//!
//! Shared infrastructure for the security handler tests: a constraint map,
//! a counting identity service, test handlers, and an app builder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::body::{BoxBody, EitherBody};
use actix_web::{get, test, App, HttpRequest, HttpResponse, Responder};
use base64::prelude::*;

use actix_gatekeeper::http::security::{
    Association, Auth, AuthenticatedUser, Constraint, IdentityService, MemoryLoginService,
    SecurityHandler, SecurityHandlerBuilder, UserIdentity,
};

// =============================================================================
// Test Configuration
// =============================================================================

/// Login service with predefined users:
/// - admin/secret: admin role
/// - root/secret: root role
/// - joe/secret: staff role (referenced by no constraint, so not "known")
pub fn test_login_service() -> Arc<MemoryLoginService> {
    Arc::new(
        MemoryLoginService::new()
            .realm_name("Test Realm")
            .with_user("admin", "secret", &["admin"])
            .with_user("root", "secret", &["root"])
            .with_user("joe", "secret", &["staff"]),
    )
}

/// The constraint map used by most tests:
/// - /admin/* requires the admin role
/// - /public/* is mapped but unconstrained
/// - /api/* requires some known role; /api/admin/* escalates to root
/// - /any/* requires any authenticated user
/// - /forbidden/* is inaccessible
/// - /secure/* requires https
/// - /open/* is unmapped (deferred authentication applies)
pub fn test_builder() -> SecurityHandlerBuilder {
    SecurityHandler::builder()
        .constraint("/admin/*", Constraint::new().roles(&["admin"]))
        .constraint("/public/*", Constraint::new())
        .constraint("/api/*", Constraint::new().known_role())
        .constraint("/api/admin/*", Constraint::new().roles(&["root"]))
        .constraint("/any/*", Constraint::new().any_role())
        .constraint("/forbidden/*", Constraint::new().forbidden())
        .constraint("/secure/*", Constraint::new().secure())
}

/// Helper function to create a Basic Auth header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!("Basic {}", BASE64_STANDARD.encode(credentials))
}

// =============================================================================
// Counting Identity Service
// =============================================================================

#[derive(Default)]
pub struct Counters {
    pub associated: AtomicUsize,
    pub released: AtomicUsize,
}

impl Counters {
    pub fn associated(&self) -> usize {
        self.associated.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Identity service that counts associations and releases.
pub struct CountingIdentityService {
    pub counters: Arc<Counters>,
}

impl CountingIdentityService {
    pub fn new() -> (Arc<dyn IdentityService>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let service = CountingIdentityService {
            counters: Arc::clone(&counters),
        };
        (Arc::new(service), counters)
    }
}

impl IdentityService for CountingIdentityService {
    fn associate(&self, _identity: &UserIdentity) -> Association {
        self.counters.associated.fetch_add(1, Ordering::SeqCst);
        let counters = Arc::clone(&self.counters);
        Association::new(move || {
            counters.released.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn logout(&self, _identity: &UserIdentity) {}
}

// =============================================================================
// Test Handlers
// =============================================================================

#[get("/admin/dashboard")]
pub async fn admin_dashboard(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!("Admin: {}", user.identity().username()))
}

#[get("/admin/boom")]
pub async fn admin_boom(_user: AuthenticatedUser) -> actix_web::Result<HttpResponse> {
    Err(actix_web::error::ErrorInternalServerError("boom"))
}

#[get("/public/info")]
pub async fn public_info() -> impl Responder {
    HttpResponse::Ok().body("Public information")
}

#[get("/api/data")]
pub async fn api_data(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!("API: {}", user.identity().username()))
}

#[get("/api/admin/settings")]
pub async fn api_admin_settings(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!("Settings: {}", user.identity().username()))
}

#[get("/any/profile")]
pub async fn any_profile(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().body(format!("Profile: {}", user.identity().username()))
}

#[get("/forbidden/door")]
pub async fn forbidden_door() -> impl Responder {
    HttpResponse::Ok().body("never reached")
}

#[get("/secure/area")]
pub async fn secure_area() -> impl Responder {
    HttpResponse::Ok().body("secure area")
}

/// Probes for credentials without ever challenging the client.
#[get("/open/probe")]
pub async fn open_probe(req: HttpRequest, auth: Auth) -> impl Responder {
    match auth.deferred() {
        Some(deferred) => match deferred.authenticate(&req) {
            Some(user) => HttpResponse::Ok().body(format!("hello {}", user.identity().username())),
            None => HttpResponse::Ok().body("anonymous"),
        },
        None => HttpResponse::Ok().body("no deferral"),
    }
}

/// Triggers a programmatic login from inside the handler.
#[get("/open/login")]
pub async fn open_login(req: HttpRequest, auth: Auth) -> impl Responder {
    match auth.deferred().and_then(|d| d.login("admin", "secret", &req)) {
        Some(user) => {
            HttpResponse::Ok().body(format!("logged in {}", user.identity().username()))
        }
        None => HttpResponse::Unauthorized().body("login failed"),
    }
}

// =============================================================================
// Test App Builder
// =============================================================================

/// Initializes a test application wrapping all test handlers with the given
/// security handler.
pub async fn init_app(
    handler: SecurityHandler,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse<EitherBody<BoxBody>>,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .wrap(handler)
            .service(admin_dashboard)
            .service(admin_boom)
            .service(public_info)
            .service(api_data)
            .service(api_admin_settings)
            .service(any_profile)
            .service(forbidden_door)
            .service(secure_area)
            .service(open_probe)
            .service(open_login),
    )
    .await
}
