//! Deferred (lazy) authentication.
//!
//! On a path that permits anonymous access, the security handler does not
//! force a login; instead it binds a [`DeferredAuthentication`] handle to the
//! request so downstream code can opt in:
//!
//! - [`authenticate`](DeferredAuthentication::authenticate) runs a silent
//!   probe against the request's credentials — a failed probe has no right to
//!   fail a request that never required authentication, so failures are
//!   logged and swallowed;
//! - [`authenticate_challenge`](DeferredAuthentication::authenticate_challenge)
//!   runs a real validation whose challenge the caller may send;
//! - [`login`](DeferredAuthentication::login) establishes an identity from
//!   explicit credentials, tagged with source `"API"`.
//!
//! Any association a deferred call creates is captured on the handle, and the
//! security handler releases it during its guaranteed cleanup step even
//! though it was not created up front.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::HttpRequest;

use crate::http::security::authenticator::{
    Authenticator, LoginAuthenticator, UserAuthentication, Validation, ValidationMode, API_AUTH,
};
use crate::http::security::identity::{Association, IdentityService, UserIdentity};

/// Per-request handle for on-demand login through a login-capable
/// authenticator.
#[derive(Clone)]
pub struct DeferredAuthentication {
    authenticator: Arc<dyn Authenticator>,
    association: Rc<RefCell<Option<Association>>>,
}

impl DeferredAuthentication {
    /// Wraps an authenticator, declining if it is not login-capable.
    pub(crate) fn wrap(authenticator: Arc<dyn Authenticator>) -> Option<Self> {
        authenticator.as_login()?;
        Some(DeferredAuthentication {
            authenticator,
            association: Rc::new(RefCell::new(None)),
        })
    }

    /// Attempts validation with whatever credentials the request carries.
    ///
    /// Runs in probe mode: the wrapped scheme may not interact with the
    /// client, and any challenge it produces anyway is discarded. Returns the
    /// identity on success, `None` otherwise.
    pub fn authenticate(&self, req: &HttpRequest) -> Option<UserAuthentication> {
        let login = self.authenticator.as_login()?;
        match login.validate_request(req, ValidationMode::Probe) {
            Ok(Validation::Authenticated(user)) => {
                self.associate(user.identity());
                Some(user)
            }
            Ok(Validation::Challenge(_)) => {
                // A probe has no client to challenge; drop it unsent.
                log::debug!("discarding challenge from deferred probe");
                None
            }
            Ok(Validation::Unauthenticated) => None,
            Err(e) => {
                log::debug!("unable to authenticate deferred request: {}", e);
                None
            }
        }
    }

    /// Attempts validation for a caller that wants to force an interactive
    /// exchange; the returned [`Validation::Challenge`] is the caller's to
    /// send. Scheme errors are logged and reported as `None`.
    pub fn authenticate_challenge(&self, req: &HttpRequest) -> Option<Validation> {
        let login = self.authenticator.as_login()?;
        match login.validate_request(req, ValidationMode::Interactive) {
            Ok(validation) => {
                if let Validation::Authenticated(user) = &validation {
                    self.associate(user.identity());
                }
                Some(validation)
            }
            Err(e) => {
                log::debug!("unable to authenticate deferred request: {}", e);
                None
            }
        }
    }

    /// Programmatic login with explicit credentials.
    pub fn login(
        &self,
        username: &str,
        credential: &str,
        req: &HttpRequest,
    ) -> Option<UserAuthentication> {
        let login = self.authenticator.as_login()?;
        let identity = login.login(username, credential, req)?;
        self.associate(&identity);
        Some(UserAuthentication::new(API_AUTH, identity))
    }

    /// Hands any association created by a deferred call to the security
    /// handler's cleanup step.
    pub(crate) fn take_association(&self) -> Option<Association> {
        self.association.borrow_mut().take()
    }

    fn associate(&self, identity: &UserIdentity) {
        if let Some(identity_service) = self.identity_service() {
            let association = identity_service.associate(identity);
            // A repeated deferred login replaces the previous binding; the
            // old association releases on drop.
            self.association.borrow_mut().replace(association);
        }
    }

    fn identity_service(&self) -> Option<Arc<dyn IdentityService>> {
        self.authenticator
            .as_login()?
            .login_service()?
            .identity_service()
    }
}

impl fmt::Debug for DeferredAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAuthentication")
            .field("method", &self.authenticator.auth_method())
            .field("associated", &self.association.borrow().is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
