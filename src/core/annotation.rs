//! Security annotations recognized on operations and groups
//!
//! The set is closed: anything that is not one of these markers is invisible to
//! resolution. Adding a kind means extending [`SecurityAnnotationKind`] and the
//! mapping in the resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ordered set of role names (sorted, duplicates removed)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Create an empty role set
    pub fn new() -> Self {
        RoleSet(BTreeSet::new())
    }

    /// Whether `role` is a member (case-sensitive exact match)
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        RoleSet(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, role) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", role)?;
        }
        write!(f, "]")
    }
}

/// A security marker declared directly on an operation or group
///
/// In catalog documents unit kinds are plain strings and `roles_allowed` is a
/// table:
///
/// ```toml
/// annotations = ["authenticated"]
/// annotations = [{ roles_allowed = ["admin", "auditor"] }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAnnotationKind {
    /// Nobody may invoke the target
    DenyAll,
    /// Everybody may invoke the target, authenticated or not
    PermitAll,
    /// Authenticated callers holding at least one of the roles
    RolesAllowed(RoleSet),
    /// Any authenticated caller (role wildcard)
    Authenticated,
}

impl SecurityAnnotationKind {
    /// Convenience constructor for `RolesAllowed`
    pub fn roles_allowed<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SecurityAnnotationKind::RolesAllowed(roles.into_iter().collect())
    }
}

impl fmt::Display for SecurityAnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityAnnotationKind::DenyAll => write!(f, "DenyAll"),
            SecurityAnnotationKind::PermitAll => write!(f, "PermitAll"),
            SecurityAnnotationKind::RolesAllowed(roles) => write!(f, "RolesAllowed({})", roles),
            SecurityAnnotationKind::Authenticated => write!(f, "Authenticated"),
        }
    }
}
