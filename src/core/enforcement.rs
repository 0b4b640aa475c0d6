//! Per-request enforcement of a resolved policy
//!
//! A filter is bound to one [`ResolvedPolicy`] at registration time and then
//! only reads it. `Deny` and `AllowAll` never touch the identity; identity
//! collaborator failures are treated as "not authenticated".

use crate::annotation::RoleSet;
use crate::error::IdentityError;
use crate::resolver::ResolvedPolicy;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::{trace, warn};

/// Outcome of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Caller identity as seen by the identity collaborator
pub trait SecurityIdentity {
    /// Whether the caller is a verified, non-anonymous principal
    fn is_authenticated(&self) -> Result<bool, IdentityError>;

    /// Whether the caller holds `role` (case-sensitive)
    fn has_role(&self, role: &str) -> Result<bool, IdentityError>;
}

impl<T: SecurityIdentity + ?Sized> SecurityIdentity for &T {
    fn is_authenticated(&self) -> Result<bool, IdentityError> {
        (**self).is_authenticated()
    }

    fn has_role(&self, role: &str) -> Result<bool, IdentityError> {
        (**self).has_role(role)
    }
}

/// Simple in-memory identity: anonymous, or a principal with roles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    principal: Option<String>,
    roles: BTreeSet<String>,
}

impl RequestIdentity {
    pub fn anonymous() -> Self {
        RequestIdentity::default()
    }

    pub fn authenticated(principal: impl Into<String>) -> Self {
        RequestIdentity {
            principal: Some(principal.into()),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }
}

impl SecurityIdentity for RequestIdentity {
    fn is_authenticated(&self) -> Result<bool, IdentityError> {
        Ok(self.principal.is_some())
    }

    fn has_role(&self, role: &str) -> Result<bool, IdentityError> {
        // Roles on an anonymous identity do not count
        Ok(self.principal.is_some() && self.roles.contains(role))
    }
}

/// Runtime gate bound to a single resolved policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementFilter {
    policy: ResolvedPolicy,
}

impl EnforcementFilter {
    pub fn new(policy: ResolvedPolicy) -> Self {
        EnforcementFilter { policy }
    }

    /// The shared deny filter; every deny-bound operation uses this instance
    pub fn deny_all() -> Arc<EnforcementFilter> {
        static DENY_ALL: OnceLock<Arc<EnforcementFilter>> = OnceLock::new();
        Arc::clone(DENY_ALL.get_or_init(|| Arc::new(EnforcementFilter::new(ResolvedPolicy::Deny))))
    }

    /// Shared filter for `policy`, reusing the deny instance
    pub fn shared(policy: ResolvedPolicy) -> Arc<EnforcementFilter> {
        match policy {
            ResolvedPolicy::Deny => Self::deny_all(),
            other => Arc::new(EnforcementFilter::new(other)),
        }
    }

    pub fn policy(&self) -> &ResolvedPolicy {
        &self.policy
    }

    /// Decide whether the request may proceed
    pub fn check<I: SecurityIdentity + ?Sized>(&self, identity: &I) -> Decision {
        let decision = match &self.policy {
            ResolvedPolicy::Deny => Decision::Deny,
            ResolvedPolicy::AllowAll => Decision::Allow,
            ResolvedPolicy::RequireAuthenticated => {
                if authenticated(identity) {
                    Decision::Allow
                } else {
                    Decision::Deny
                }
            }
            ResolvedPolicy::RequireRoles(roles) => check_roles(roles, identity),
        };

        trace!("Policy {} -> {:?}", self.policy, decision);
        decision
    }
}

fn authenticated<I: SecurityIdentity + ?Sized>(identity: &I) -> bool {
    match identity.is_authenticated() {
        Ok(flag) => flag,
        Err(e) => {
            warn!("Treating caller as unauthenticated: {}", e);
            false
        }
    }
}

fn check_roles<I: SecurityIdentity + ?Sized>(roles: &RoleSet, identity: &I) -> Decision {
    if roles.is_empty() || !authenticated(identity) {
        return Decision::Deny;
    }

    for role in roles.iter() {
        match identity.has_role(role) {
            Ok(true) => return Decision::Allow,
            Ok(false) => {}
            // A failed lookup never grants, but another role may still match
            Err(e) => warn!("Role lookup failed, skipping '{}': {}", role, e),
        }
    }

    Decision::Deny
}
