//! Extractors for accessing the request's authentication state in handlers.

use std::future::{ready, Ready};
use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};

use crate::http::error::AuthError;
use crate::http::security::authenticator::{Authentication, UserAuthentication};

/// Extractor for the request's [`Authentication`] state.
///
/// Always succeeds: requests that never passed through the security handler
/// extract as [`Authentication::Unauthenticated`].
///
/// # Usage
/// ```ignore
/// use actix_gatekeeper::http::security::Auth;
///
/// async fn handler(auth: Auth) -> impl Responder {
///     match auth.identity() {
///         Some(identity) => format!("Hello, {}!", identity.username()),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Auth(Authentication);

impl Auth {
    pub fn into_inner(self) -> Authentication {
        self.0
    }
}

impl Deref for Auth {
    type Target = Authentication;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for Auth {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let authentication = req
            .extensions()
            .get::<Authentication>()
            .cloned()
            .unwrap_or(Authentication::Unauthenticated);
        ready(Ok(Auth(authentication)))
    }
}

/// Extractor for a concrete authenticated user.
///
/// # Errors
/// Returns `401 Unauthorized` when the request carries no validated identity.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(UserAuthentication);

impl AuthenticatedUser {
    pub fn into_inner(self) -> UserAuthentication {
        self.0
    }
}

impl Deref for AuthenticatedUser {
    type Target = UserAuthentication;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .extensions()
            .get::<Authentication>()
            .and_then(|auth| auth.user().cloned());
        match user {
            Some(user) => ready(Ok(AuthenticatedUser(user))),
            None => ready(Err(AuthError::Unauthorized)),
        }
    }
}
