//! Identity association for in-flight requests.
//!
//! A validated [`UserIdentity`] is bound to the current unit of execution via
//! an [`IdentityService`], which returns a scoped [`Association`]. The
//! association must be released exactly once on every exit path of request
//! processing; `Association` backs its explicit [`close`](Association::close)
//! with a `Drop` impl so that a cancelled or panicked request still releases.
//!
//! [`DefaultIdentityService`] binds the identity into a task-local
//! [`SecurityContext`], letting downstream code ask "who is the caller"
//! without parameter threading. Each async task has its own context, so one
//! request's identity never leaks into another concurrently running request.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

/// A validated identity with its role memberships.
///
/// # Example
/// ```
/// use actix_gatekeeper::http::security::identity::UserIdentity;
///
/// let identity = UserIdentity::new("alice").roles(&["admin", "user"]);
/// assert!(identity.is_user_in_role("admin"));
/// assert!(!identity.is_user_in_role("auditor"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    username: String,
    roles: Vec<String>,
}

impl UserIdentity {
    pub fn new(username: impl Into<String>) -> Self {
        UserIdentity {
            username: username.into(),
            roles: Vec::new(),
        }
    }

    /// Adds roles (builder pattern).
    pub fn roles(mut self, roles: &[&str]) -> Self {
        for role in roles {
            let role = (*role).to_string();
            if !self.roles.contains(&role) {
                self.roles.push(role);
            }
        }
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role_names(&self) -> &[String] {
        &self.roles
    }

    pub fn is_user_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UserIdentity {{ username: {}, roles: {:?} }}",
            self.username, self.roles
        )
    }
}

/// Scoped binding of an identity to the current request.
///
/// Created by [`IdentityService::associate`]; released on [`close`](Self::close)
/// or on drop, whichever comes first, and never twice.
pub struct Association {
    release: Option<Box<dyn FnOnce()>>,
}

impl Association {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Association {
            release: Some(Box::new(release)),
        }
    }

    /// Releases the association now.
    pub fn close(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Associates validated identities with the current unit of execution.
///
/// Implementations are shared across all concurrently processed requests and
/// must keep each request's binding isolated.
pub trait IdentityService: Send + Sync {
    /// Binds the identity to the current request, returning the scoped
    /// handle that undoes the binding.
    fn associate(&self, identity: &UserIdentity) -> Association;

    /// Discards any state retained for the identity on logout.
    fn logout(&self, identity: &UserIdentity);
}

tokio::task_local! {
    static SECURITY_CONTEXT: RefCell<Option<UserIdentity>>;
}

/// Task-local holder for the identity of the request being processed.
///
/// The security handler opens a context scope around each request; inside
/// that scope, [`DefaultIdentityService`] bindings are visible to any
/// downstream code. Outside a scope every accessor returns `None`.
pub struct SecurityContext;

impl SecurityContext {
    /// The identity currently associated with this task, if any.
    pub fn current() -> Option<UserIdentity> {
        SECURITY_CONTEXT
            .try_with(|ctx| ctx.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn username() -> Option<String> {
        Self::current().map(|identity| identity.username().to_string())
    }

    pub fn is_user_in_role(role: &str) -> bool {
        Self::current()
            .map(|identity| identity.is_user_in_role(role))
            .unwrap_or(false)
    }

    /// Runs a future inside a fresh, empty security context scope.
    pub async fn scope<F>(f: F) -> F::Output
    where
        F: Future,
    {
        SECURITY_CONTEXT.scope(RefCell::new(None), f).await
    }

    /// Swaps the identity bound in the current scope, returning the previous
    /// binding. A no-op returning `None` outside a scope.
    fn replace(identity: Option<UserIdentity>) -> Option<UserIdentity> {
        SECURITY_CONTEXT
            .try_with(|ctx| ctx.replace(identity))
            .ok()
            .flatten()
    }
}

/// Identity service backed by the task-local [`SecurityContext`].
///
/// Created and owned by the security handler when nothing else is configured
/// or discoverable.
#[derive(Debug, Default)]
pub struct DefaultIdentityService;

impl DefaultIdentityService {
    pub fn new() -> Self {
        DefaultIdentityService
    }
}

impl IdentityService for DefaultIdentityService {
    fn associate(&self, identity: &UserIdentity) -> Association {
        let previous = SecurityContext::replace(Some(identity.clone()));
        Association::new(move || {
            SecurityContext::replace(previous);
        })
    }

    fn logout(&self, _identity: &UserIdentity) {
        SecurityContext::replace(None);
    }
}

// ============================================================================
// Tests
// ============================================================================
