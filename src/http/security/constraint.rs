//! Security constraints attached to path patterns.
//!
//! A [`Constraint`] is an immutable declaration of what a path requires:
//! an authentication [`Requirement`], a set of acceptable roles, a
//! secure-transport flag, and a forbidden flag. Constraints are created from
//! configuration before the handler starts and never mutated afterwards; many
//! path patterns may share one constraint.

use std::collections::HashSet;

/// How much authentication a constraint demands.
///
/// Variants are ordered by restrictiveness so that combining overlapping
/// constraints can simply take the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Requirement {
    /// No authentication required.
    #[default]
    None,
    /// A user principal must be present; role membership is irrelevant.
    AnyRole,
    /// A user principal must hold at least one role known to the resolver.
    KnownRole,
    /// A user principal must hold at least one of the constraint's own roles.
    SpecificRole,
}

/// An immutable security requirement for a path.
///
/// # Example
/// ```
/// use actix_gatekeeper::http::security::constraint::{Constraint, Requirement};
///
/// let admin = Constraint::new().roles(&["admin"]).secure();
/// assert_eq!(admin.requirement(), Requirement::SpecificRole);
/// assert!(admin.is_secure());
/// assert!(!admin.is_forbidden());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Constraint {
    requirement: Requirement,
    roles: HashSet<String>,
    secure: bool,
    forbidden: bool,
}

impl Constraint {
    /// Creates an empty constraint: no authentication, any transport.
    ///
    /// This is also what the handler substitutes when no pattern matches a
    /// request path.
    pub fn new() -> Self {
        Constraint::default()
    }

    /// Marks the path as unconditionally denied. Forbidden wins over every
    /// other field; no authentication is attempted for a forbidden path.
    pub fn forbidden(mut self) -> Self {
        self.forbidden = true;
        self
    }

    /// Requires secure transport.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Requires an authenticated principal, regardless of roles.
    pub fn any_role(mut self) -> Self {
        self.requirement = self.requirement.max(Requirement::AnyRole);
        self
    }

    /// Requires an authenticated principal holding at least one role known to
    /// the constraint resolver.
    pub fn known_role(mut self) -> Self {
        self.requirement = self.requirement.max(Requirement::KnownRole);
        self
    }

    /// Requires an authenticated principal holding at least one of the given
    /// roles.
    pub fn roles(mut self, roles: &[&str]) -> Self {
        self.requirement = Requirement::SpecificRole;
        for role in roles {
            self.roles.insert((*role).to_string());
        }
        self
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// The acceptable roles. Only meaningful for
    /// [`Requirement::SpecificRole`].
    pub fn role_set(&self) -> &HashSet<String> {
        &self.roles
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_forbidden(&self) -> bool {
        self.forbidden
    }

    /// Combines two constraints matching the same path into their most
    /// restrictive union:
    ///
    /// - forbidden absorbs everything,
    /// - secure transport is OR'd,
    /// - the requirement escalates to the maximum of the two,
    /// - role sets are unioned when both sides carry specific roles.
    ///
    /// The operation is commutative and associative, so the registration
    /// order of overlapping patterns never changes the resolved constraint.
    pub fn combine(a: &Constraint, b: &Constraint) -> Constraint {
        let requirement = a.requirement.max(b.requirement);
        let mut roles = HashSet::new();
        if requirement == Requirement::SpecificRole {
            if a.requirement == Requirement::SpecificRole {
                roles.extend(a.roles.iter().cloned());
            }
            if b.requirement == Requirement::SpecificRole {
                roles.extend(b.roles.iter().cloned());
            }
        }
        Constraint {
            requirement,
            roles,
            secure: a.secure || b.secure,
            forbidden: a.forbidden || b.forbidden,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
