//! Path-to-constraint mapping and resolution.
//!
//! [`MappedConstraints`] holds an ordered collection of
//! ([`PathSpec`], [`Constraint`]) pairs. Resolution finds *all* matching
//! patterns for a path and folds them with [`Constraint::combine`], so
//! overlapping patterns always yield the most restrictive union regardless of
//! registration order.
//!
//! The mapping also maintains `known_roles`, the union of every role named by
//! a registered constraint. The cache grows incrementally on `put` and is
//! rebuilt from scratch on `remove` or replacement, then published as a fresh
//! `Arc` in a single assignment so concurrent readers of an earlier handle
//! never observe a partially rebuilt set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::http::security::constraint::Constraint;
use crate::http::security::path_spec::PathSpec;

/// Ordered mapping of path patterns to security constraints.
///
/// Mutation happens through `&mut self` while the handler is being
/// configured; once built, the handler shares the mapping immutably and all
/// request-time access is read-only.
///
/// # Example
/// ```
/// use actix_gatekeeper::http::security::constraint::Constraint;
/// use actix_gatekeeper::http::security::resolver::MappedConstraints;
///
/// let mut constraints = MappedConstraints::new();
/// constraints.put("/admin/*", Constraint::new().roles(&["admin"]));
/// constraints.put("/public/*", Constraint::new());
///
/// assert!(constraints.resolve("/admin/x").is_some());
/// assert!(constraints.resolve("/elsewhere").is_none());
/// assert!(constraints.known_roles().contains("admin"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MappedConstraints {
    mappings: Vec<(PathSpec, Constraint)>,
    known_roles: Arc<HashSet<String>>,
}

impl MappedConstraints {
    pub fn new() -> Self {
        MappedConstraints::default()
    }

    /// Registers a constraint for a pattern, replacing any constraint
    /// previously registered for the same pattern. Returns the replaced
    /// constraint, if any.
    pub fn put(&mut self, pattern: &str, constraint: Constraint) -> Option<Constraint> {
        let spec = PathSpec::from(pattern);
        let replaced = match self.mappings.iter_mut().find(|(s, _)| *s == spec) {
            Some((_, existing)) => Some(std::mem::replace(existing, constraint)),
            None => {
                self.mappings.push((spec, constraint));
                None
            }
        };
        if replaced.is_some() {
            // The old entry may have been the only holder of some role.
            self.rebuild_known_roles();
        } else {
            self.grow_known_roles();
        }
        replaced
    }

    /// Removes the constraint registered for a pattern, if any.
    pub fn remove(&mut self, pattern: &str) -> Option<Constraint> {
        let spec = PathSpec::from(pattern);
        let position = self.mappings.iter().position(|(s, _)| *s == spec)?;
        let (_, removed) = self.mappings.remove(position);
        self.rebuild_known_roles();
        Some(removed)
    }

    /// Resolves the effective constraint for a request path.
    ///
    /// Every matching pattern contributes; multiple matches are folded with
    /// [`Constraint::combine`]. Returns `None` when no pattern matches, which
    /// callers treat as an unconstrained path.
    pub fn resolve(&self, path: &str) -> Option<Constraint> {
        let mut resolved: Option<Constraint> = None;
        for (spec, constraint) in &self.mappings {
            if spec.matches(path) {
                resolved = Some(match resolved {
                    Some(existing) => Constraint::combine(&existing, constraint),
                    None => constraint.clone(),
                });
            }
        }
        resolved
    }

    /// The union of all roles referenced by currently registered constraints.
    ///
    /// Used by [`Requirement::KnownRole`](crate::http::security::constraint::Requirement)
    /// authorization checks.
    pub fn known_roles(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.known_roles)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn grow_known_roles(&mut self) {
        let (_, constraint) = self.mappings.last().expect("grow after push");
        if constraint.role_set().is_subset(&self.known_roles) {
            return;
        }
        let mut roles = (*self.known_roles).clone();
        roles.extend(constraint.role_set().iter().cloned());
        self.known_roles = Arc::new(roles);
    }

    fn rebuild_known_roles(&mut self) {
        let mut roles = HashSet::new();
        for (_, constraint) in &self.mappings {
            roles.extend(constraint.role_set().iter().cloned());
        }
        // Build first, publish second: readers holding the old Arc keep a
        // complete set, never an in-progress one.
        self.known_roles = Arc::new(roles);
    }
}

// ============================================================================
// Tests
// ============================================================================
