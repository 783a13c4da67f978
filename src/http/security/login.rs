//! Login services: resolving credentials to identities.
//!
//! A [`LoginService`] is the credential store an [`Authenticator`] delegates
//! to. The security handler binds at most one login service, located at
//! startup by explicit configuration or single-candidate discovery, and
//! checks that its identity-service binding agrees with the handler's own.
//!
//! [`Authenticator`]: crate::http::security::authenticator::Authenticator

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::http::security::identity::{IdentityService, UserIdentity};

/// Resolves usernames and credentials to identities and their roles.
pub trait LoginService: Send + Sync {
    /// The realm name of this service, used to disambiguate discovery when
    /// the handler has a realm configured.
    fn name(&self) -> Option<&str>;

    /// Validates the credential and returns the identity on success.
    fn login(&self, username: &str, credential: &str) -> Option<UserIdentity>;

    /// Checks that a previously issued identity is still valid.
    fn validate(&self, identity: &UserIdentity) -> bool;

    /// Discards any login state for the identity.
    fn logout(&self, identity: &UserIdentity);

    /// The identity service this login service is bound to, if any.
    fn identity_service(&self) -> Option<Arc<dyn IdentityService>>;

    /// Binds the identity service. Called once during handler startup.
    fn set_identity_service(&self, service: Arc<dyn IdentityService>);
}

struct StoredUser {
    credential: String,
    roles: Vec<String>,
}

/// In-memory login service.
///
/// Credentials are compared verbatim; hashing schemes belong to real
/// credential stores, which replace this implementation behind the same
/// trait.
///
/// # Example
/// ```
/// use actix_gatekeeper::http::security::login::{LoginService, MemoryLoginService};
///
/// let service = MemoryLoginService::new()
///     .realm_name("Test Realm")
///     .with_user("admin", "secret", &["admin"]);
///
/// let identity = service.login("admin", "secret").unwrap();
/// assert!(identity.is_user_in_role("admin"));
/// assert!(service.login("admin", "wrong").is_none());
/// ```
pub struct MemoryLoginService {
    name: Option<String>,
    users: HashMap<String, StoredUser>,
    identity_service: RwLock<Option<Arc<dyn IdentityService>>>,
}

impl MemoryLoginService {
    pub fn new() -> Self {
        MemoryLoginService {
            name: None,
            users: HashMap::new(),
            identity_service: RwLock::new(None),
        }
    }

    /// Sets the realm name (builder pattern).
    pub fn realm_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Adds a user to the store (builder pattern).
    pub fn with_user(mut self, username: &str, credential: &str, roles: &[&str]) -> Self {
        self.users.insert(
            username.to_string(),
            StoredUser {
                credential: credential.to_string(),
                roles: roles.iter().map(|r| (*r).to_string()).collect(),
            },
        );
        self
    }
}

impl Default for MemoryLoginService {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginService for MemoryLoginService {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn login(&self, username: &str, credential: &str) -> Option<UserIdentity> {
        let stored = self.users.get(username)?;
        if stored.credential != credential {
            return None;
        }
        let roles: Vec<&str> = stored.roles.iter().map(String::as_str).collect();
        Some(UserIdentity::new(username).roles(&roles))
    }

    fn validate(&self, identity: &UserIdentity) -> bool {
        self.users.contains_key(identity.username())
    }

    fn logout(&self, identity: &UserIdentity) {
        log::debug!("logout {}", identity.username());
    }

    fn identity_service(&self) -> Option<Arc<dyn IdentityService>> {
        self.identity_service.read().expect("lock poisoned").clone()
    }

    fn set_identity_service(&self, service: Arc<dyn IdentityService>) {
        *self.identity_service.write().expect("lock poisoned") = Some(service);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::security::identity::DefaultIdentityService;

    fn test_service() -> MemoryLoginService {
        MemoryLoginService::new()
            .realm_name("Test Realm")
            .with_user("admin", "admin-pw", &["admin", "user"])
            .with_user("user", "user-pw", &["user"])
    }

    #[test]
    fn test_login_success() {
        let service = test_service();
        let identity = service.login("admin", "admin-pw").unwrap();
        assert_eq!(identity.username(), "admin");
        assert!(identity.is_user_in_role("admin"));
        assert!(identity.is_user_in_role("user"));
    }

    #[test]
    fn test_login_wrong_credential() {
        let service = test_service();
        assert!(service.login("admin", "nope").is_none());
    }

    #[test]
    fn test_login_unknown_user() {
        let service = test_service();
        assert!(service.login("ghost", "whatever").is_none());
    }

    #[test]
    fn test_validate() {
        let service = test_service();
        assert!(service.validate(&UserIdentity::new("admin")));
        assert!(!service.validate(&UserIdentity::new("ghost")));
    }

    #[test]
    fn test_realm_name() {
        assert_eq!(test_service().name(), Some("Test Realm"));
        assert!(MemoryLoginService::new().name().is_none());
    }

    #[test]
    fn test_identity_service_binding() {
        let service = test_service();
        assert!(service.identity_service().is_none());

        let identity_service: Arc<dyn IdentityService> = Arc::new(DefaultIdentityService::new());
        service.set_identity_service(Arc::clone(&identity_service));

        let bound = service.identity_service().unwrap();
        assert!(Arc::ptr_eq(&bound, &identity_service));
    }
}
