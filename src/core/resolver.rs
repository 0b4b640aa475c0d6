//! Policy resolution with method-over-group precedence
//!
//! Determines the single policy that guards an operation:
//! - An annotation on the operation wins outright
//! - Otherwise the annotation on its declaring group applies
//! - Otherwise, if anything in the group opted into RBAC and default-deny is
//!   enabled, the operation is denied
//! - Otherwise the operation is unconstrained
//!
//! More than one annotation on the same target is a configuration error and
//! is never resolved by priority.

use crate::annotation::{RoleSet, SecurityAnnotationKind};
use crate::config::GlobalConfig;
use crate::descriptor::{GroupDescriptor, OperationDescriptor};
use crate::error::{RbacError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy bound to an operation after resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedPolicy {
    /// Reject every request
    Deny,
    /// Accept every request without an identity lookup
    AllowAll,
    /// Authenticated callers holding one of the roles
    RequireRoles(RoleSet),
    /// Any authenticated caller
    RequireAuthenticated,
}

impl From<&SecurityAnnotationKind> for ResolvedPolicy {
    fn from(annotation: &SecurityAnnotationKind) -> Self {
        match annotation {
            SecurityAnnotationKind::DenyAll => ResolvedPolicy::Deny,
            SecurityAnnotationKind::RolesAllowed(roles) => ResolvedPolicy::RequireRoles(roles.clone()),
            SecurityAnnotationKind::Authenticated => ResolvedPolicy::RequireAuthenticated,
            SecurityAnnotationKind::PermitAll => ResolvedPolicy::AllowAll,
        }
    }
}

impl fmt::Display for ResolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedPolicy::Deny => write!(f, "deny"),
            ResolvedPolicy::AllowAll => write!(f, "allow-all"),
            ResolvedPolicy::RequireRoles(roles) => write!(f, "require-roles {}", roles),
            ResolvedPolicy::RequireAuthenticated => write!(f, "require-authenticated"),
        }
    }
}

/// Where a resolved policy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySource {
    Operation,
    Group,
    DefaultDeny,
    Unconstrained,
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicySource::Operation => "operation",
            PolicySource::Group => "group",
            PolicySource::DefaultDeny => "default-deny",
            PolicySource::Unconstrained => "unconstrained",
        };
        f.write_str(s)
    }
}

/// Resolved policy together with its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// `None` means no enforcement is installed
    pub policy: Option<ResolvedPolicy>,
    pub source: PolicySource,
}

/// Stateless resolver over an injected [`GlobalConfig`]
///
/// Holds no mutable state, so one instance can resolve operations from any
/// number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver {
    config: GlobalConfig,
}

impl PolicyResolver {
    pub fn new(config: GlobalConfig) -> Self {
        PolicyResolver { config }
    }

    pub fn config(&self) -> GlobalConfig {
        self.config
    }

    /// Resolve the policy for `operation`
    ///
    /// `group` is the operation's declaring group and `group_operations` the
    /// invocable operations of the group it is exposed on (the operation itself
    /// may be among them).
    ///
    /// # Errors
    ///
    /// `AmbiguousAnnotation` when the operation, or (without an operation
    /// annotation) the group, declares more than one security annotation.
    ///
    /// # Examples
    ///
    /// ```
    /// use endpoint_rbac::{
    ///     GlobalConfig, GroupDescriptor, HttpMethod, OperationDescriptor, PolicyResolver,
    ///     ResolvedPolicy, SecurityAnnotationKind,
    /// };
    ///
    /// let group = GroupDescriptor::new("Orders");
    /// let list = OperationDescriptor::new("Orders", "list")
    ///     .with_method(HttpMethod::Get)
    ///     .with_annotation(SecurityAnnotationKind::roles_allowed(["admin"]));
    /// let create = OperationDescriptor::new("Orders", "create").with_method(HttpMethod::Post);
    /// let siblings = vec![list.clone(), create.clone()];
    ///
    /// let resolver = PolicyResolver::new(GlobalConfig::new(true));
    /// assert_eq!(
    ///     resolver.resolve(&list, &group, &siblings).unwrap(),
    ///     Some(ResolvedPolicy::RequireRoles(["admin"].into_iter().collect()))
    /// );
    /// assert_eq!(
    ///     resolver.resolve(&create, &group, &siblings).unwrap(),
    ///     Some(ResolvedPolicy::Deny)
    /// );
    /// ```
    pub fn resolve(
        &self,
        operation: &OperationDescriptor,
        group: &GroupDescriptor,
        group_operations: &[OperationDescriptor],
    ) -> Result<Option<ResolvedPolicy>> {
        self.explain(operation, group, group_operations)
            .map(|resolution| resolution.policy)
    }

    /// Like [`resolve`](Self::resolve) but also reports where the policy came from
    pub fn explain(
        &self,
        operation: &OperationDescriptor,
        group: &GroupDescriptor,
        group_operations: &[OperationDescriptor],
    ) -> Result<Resolution> {
        let op_annotation = single_annotation(&operation.annotations, || {
            operation.id().to_string()
        })?;
        if let Some(annotation) = op_annotation {
            return Ok(Resolution {
                policy: Some(annotation.into()),
                source: PolicySource::Operation,
            });
        }

        // Reported against the exposing group, even when the annotations sit on a parent
        let group_annotation =
            single_annotation(&group.annotations, || operation.group.clone())?;
        if let Some(annotation) = group_annotation {
            return Ok(Resolution {
                policy: Some(annotation.into()),
                source: PolicySource::Group,
            });
        }

        // Inclusive scan: "does anything in this group opt into RBAC"
        let group_opted_in = group_operations
            .iter()
            .any(OperationDescriptor::has_security_annotations);

        if group_opted_in && self.config.deny_non_annotated_by_default {
            return Ok(Resolution {
                policy: Some(ResolvedPolicy::Deny),
                source: PolicySource::DefaultDeny,
            });
        }

        Ok(Resolution {
            policy: None,
            source: PolicySource::Unconstrained,
        })
    }
}

/// Free-function form of [`PolicyResolver::resolve`]
pub fn resolve(
    operation: &OperationDescriptor,
    group: &GroupDescriptor,
    group_operations: &[OperationDescriptor],
    config: &GlobalConfig,
) -> Result<Option<ResolvedPolicy>> {
    PolicyResolver::new(*config).resolve(operation, group, group_operations)
}

/// The single annotation on a target, or none
///
/// Exact duplicates collapse (annotations have set semantics); distinct kinds
/// are an error naming the target.
fn single_annotation<F>(
    annotations: &[SecurityAnnotationKind],
    placement: F,
) -> Result<Option<&SecurityAnnotationKind>>
where
    F: FnOnce() -> String,
{
    let mut distinct: Vec<&SecurityAnnotationKind> = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        if !distinct.contains(&annotation) {
            distinct.push(annotation);
        }
    }

    match distinct.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(RbacError::AmbiguousAnnotation {
            placement: placement(),
            found: many.iter().map(|a| a.to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HttpMethod;

    fn op(name: &str) -> OperationDescriptor {
        OperationDescriptor::new("Orders", name).with_method(HttpMethod::Get)
    }

    #[test]
    fn test_annotation_mapping() {
        let group = GroupDescriptor::new("Orders");
        let resolver = PolicyResolver::default();
        let cases = vec![
            (SecurityAnnotationKind::DenyAll, ResolvedPolicy::Deny),
            (SecurityAnnotationKind::PermitAll, ResolvedPolicy::AllowAll),
            (
                SecurityAnnotationKind::Authenticated,
                ResolvedPolicy::RequireAuthenticated,
            ),
            (
                SecurityAnnotationKind::roles_allowed(["admin"]),
                ResolvedPolicy::RequireRoles(["admin"].into_iter().collect()),
            ),
        ];

        for (annotation, expected) in cases {
            let target = op("list").with_annotation(annotation);
            let resolved = resolver.resolve(&target, &group, &[target.clone()]).unwrap();
            assert_eq!(resolved, Some(expected));
        }
    }

    #[test]
    fn test_operation_overrides_group() {
        let group = GroupDescriptor::new("Orders").with_annotation(SecurityAnnotationKind::DenyAll);
        let target = op("list").with_annotation(SecurityAnnotationKind::PermitAll);

        let resolution = PolicyResolver::default()
            .explain(&target, &group, &[])
            .unwrap();
        assert_eq!(resolution.policy, Some(ResolvedPolicy::AllowAll));
        assert_eq!(resolution.source, PolicySource::Operation);
    }

    #[test]
    fn test_group_fallback() {
        let group = GroupDescriptor::new("Orders")
            .with_annotation(SecurityAnnotationKind::Authenticated);
        let target = op("list");

        let resolution = PolicyResolver::new(GlobalConfig::new(true))
            .explain(&target, &group, &[target.clone()])
            .unwrap();
        assert_eq!(resolution.policy, Some(ResolvedPolicy::RequireAuthenticated));
        assert_eq!(resolution.source, PolicySource::Group);
    }

    #[test]
    fn test_ambiguous_operation() {
        let group = GroupDescriptor::new("Orders");
        let target = op("list")
            .with_annotation(SecurityAnnotationKind::DenyAll)
            .with_annotation(SecurityAnnotationKind::roles_allowed(["x"]));

        let err = PolicyResolver::default()
            .resolve(&target, &group, &[])
            .unwrap_err();
        match err {
            RbacError::AmbiguousAnnotation { placement, found } => {
                assert_eq!(placement, "Orders:list");
                assert_eq!(found, vec!["DenyAll", "RolesAllowed([\"x\"])"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ambiguous_group_names_group_only() {
        let group = GroupDescriptor::new("Orders")
            .with_annotation(SecurityAnnotationKind::PermitAll)
            .with_annotation(SecurityAnnotationKind::Authenticated);

        let err = PolicyResolver::default()
            .resolve(&op("list"), &group, &[])
            .unwrap_err();
        assert!(
            matches!(err, RbacError::AmbiguousAnnotation { ref placement, .. } if placement == "Orders")
        );
    }

    #[test]
    fn test_ambiguous_parent_group_names_exposing_group() {
        let base = GroupDescriptor::new("BaseResource")
            .with_annotation(SecurityAnnotationKind::PermitAll)
            .with_annotation(SecurityAnnotationKind::DenyAll);
        let health = OperationDescriptor::new("BaseResource", "health")
            .with_method(HttpMethod::Get)
            .inherited_by("Orders");

        let err = PolicyResolver::default()
            .resolve(&health, &base, &[health.clone()])
            .unwrap_err();
        assert!(
            matches!(err, RbacError::AmbiguousAnnotation { ref placement, .. } if placement == "Orders")
        );
    }

    #[test]
    fn test_ambiguous_group_ignored_when_operation_annotated() {
        let group = GroupDescriptor::new("Orders")
            .with_annotation(SecurityAnnotationKind::PermitAll)
            .with_annotation(SecurityAnnotationKind::DenyAll);
        let target = op("list").with_annotation(SecurityAnnotationKind::Authenticated);

        let resolved = PolicyResolver::default().resolve(&target, &group, &[]).unwrap();
        assert_eq!(resolved, Some(ResolvedPolicy::RequireAuthenticated));
    }

    #[test]
    fn test_identical_duplicates_collapse() {
        let group = GroupDescriptor::new("Orders");
        let target = op("list")
            .with_annotation(SecurityAnnotationKind::roles_allowed(["a", "b"]))
            .with_annotation(SecurityAnnotationKind::roles_allowed(["b", "a"]));

        let resolved = PolicyResolver::default().resolve(&target, &group, &[]).unwrap();
        assert_eq!(
            resolved,
            Some(ResolvedPolicy::RequireRoles(["a", "b"].into_iter().collect()))
        );
    }

    #[test]
    fn test_roles_allowed_with_different_sets_is_ambiguous() {
        let group = GroupDescriptor::new("Orders");
        let target = op("list")
            .with_annotation(SecurityAnnotationKind::roles_allowed(["a"]))
            .with_annotation(SecurityAnnotationKind::roles_allowed(["b"]));

        assert!(PolicyResolver::default().resolve(&target, &group, &[]).is_err());
    }

    #[test]
    fn test_sibling_scan_does_not_validate_siblings() {
        let group = GroupDescriptor::new("Orders");
        let target = op("create");
        let broken_sibling = op("list")
            .with_annotation(SecurityAnnotationKind::DenyAll)
            .with_annotation(SecurityAnnotationKind::PermitAll);
        let siblings = vec![target.clone(), broken_sibling];

        let resolved = PolicyResolver::new(GlobalConfig::new(true))
            .resolve(&target, &group, &siblings)
            .unwrap();
        assert_eq!(resolved, Some(ResolvedPolicy::Deny));
    }

    #[test]
    fn test_default_deny_requires_flag_and_annotated_sibling() {
        let group = GroupDescriptor::new("Orders");
        let target = op("create");
        let annotated = op("list").with_annotation(SecurityAnnotationKind::PermitAll);

        let with_sibling = vec![target.clone(), annotated];
        let without_sibling = vec![target.clone(), op("update")];

        for flag in [true, false] {
            let resolver = PolicyResolver::new(GlobalConfig::new(flag));
            let expected = flag.then_some(ResolvedPolicy::Deny);
            assert_eq!(resolver.resolve(&target, &group, &with_sibling).unwrap(), expected);
            assert_eq!(resolver.resolve(&target, &group, &without_sibling).unwrap(), None);
        }
    }

    #[test]
    fn test_free_function_matches_resolver() {
        let group = GroupDescriptor::new("Orders");
        let target = op("create");
        let siblings = vec![
            target.clone(),
            op("list").with_annotation(SecurityAnnotationKind::DenyAll),
        ];
        let config = GlobalConfig::new(true);

        assert_eq!(
            resolve(&target, &group, &siblings, &config).unwrap(),
            PolicyResolver::new(config).resolve(&target, &group, &siblings).unwrap()
        );
    }
}
