//! Servlet-style path patterns.
//!
//! Constraints are keyed by path specs rather than regexps:
//!
//! - `/foo/bar` matches exactly that path
//! - `/foo/*` matches `/foo`, `/foo/bar` and anything deeper
//! - `*.ext` matches any path ending in `.ext`
//! - `/` matches every path (the default spec)
//! - `""` matches only the root path `/`
//!
//! # Example
//! ```
//! use actix_gatekeeper::http::security::path_spec::PathSpec;
//!
//! let spec = PathSpec::from("/api/*");
//! assert!(spec.matches("/api/users"));
//! assert!(spec.matches("/api/admin/x"));
//! assert!(!spec.matches("/public/index.html"));
//! ```

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSpec {
    pattern: String,
    kind: SpecKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SpecKind {
    /// `""` — the root path only.
    Root,
    /// `/` — everything.
    Default,
    /// A literal path.
    Exact(String),
    /// `/prefix/*` — the prefix itself and anything below it.
    Prefix(String),
    /// `*.ext` — any path with the given suffix.
    Suffix(String),
}

impl PathSpec {
    /// Parses a pattern string into a spec.
    pub fn from(pattern: &str) -> Self {
        let kind = if pattern.is_empty() {
            SpecKind::Root
        } else if pattern == "/" {
            SpecKind::Default
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            SpecKind::Prefix(prefix.to_string())
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            SpecKind::Suffix(suffix.to_string())
        } else {
            SpecKind::Exact(pattern.to_string())
        };
        PathSpec {
            pattern: pattern.to_string(),
            kind,
        }
    }

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Checks whether the given request path matches this spec.
    pub fn matches(&self, path: &str) -> bool {
        match &self.kind {
            SpecKind::Root => path == "/" || path.is_empty(),
            SpecKind::Default => true,
            SpecKind::Exact(exact) => path == exact,
            SpecKind::Prefix(prefix) => {
                path == prefix
                    || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
            }
            SpecKind::Suffix(suffix) => path.ends_with(suffix),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
