//! Typed descriptors for groups and their operations
//!
//! Descriptors are produced by a [`MetadataDiscovery`](crate::discovery::MetadataDiscovery)
//! implementation and carry only what resolution needs: identity, routability
//! and the security annotations declared directly on the target.

use crate::annotation::SecurityAnnotationKind;
use crate::error::{RbacError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Pattern for group and operation names
const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.\-]*$";

/// Maximum name length
const MAX_NAME_LENGTH: usize = 255;

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is a valid regex"))
}

/// Validate a group or operation name
///
/// # Errors
///
/// Returns `InvalidName` for empty, overlong or non-identifier names.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH || !name_regex().is_match(name) {
        return Err(RbacError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Request-routing designator of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        f.write_str(s)
    }
}

impl FromStr for HttpMethod {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(RbacError::Config(format!("Unknown HTTP method '{}'", other))),
        }
    }
}

/// Identity of an exposed operation: `group:operation`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId {
    pub group: String,
    pub operation: String,
}

impl OperationId {
    pub fn new(group: impl Into<String>, operation: impl Into<String>) -> Self {
        OperationId {
            group: group.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.operation)
    }
}

/// One invocable (or candidate) handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// Group the operation is exposed on
    pub group: String,
    /// Group that declares the operation (differs from `group` when inherited)
    pub declaring_group: String,
    /// Operation name
    pub name: String,
    /// Routing designator; operations without one are not request-routable
    pub http_method: Option<HttpMethod>,
    /// Visibility; non-public operations are internal helpers
    pub public: bool,
    /// Security annotations declared directly on the operation
    pub annotations: Vec<SecurityAnnotationKind>,
}

impl OperationDescriptor {
    /// Create a public, unrouted, unannotated operation declared on `group`
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        let group = group.into();
        OperationDescriptor {
            declaring_group: group.clone(),
            group,
            name: name.into(),
            http_method: None,
            public: true,
            annotations: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.http_method = Some(method);
        self
    }

    pub fn with_annotation(mut self, annotation: SecurityAnnotationKind) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    /// Re-home this operation onto `group`, keeping its declaring group
    pub fn inherited_by(&self, group: &str) -> Self {
        OperationDescriptor {
            group: group.to_string(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> OperationId {
        OperationId::new(&self.group, &self.name)
    }

    /// Public and carrying a routing designator
    pub fn is_invocable(&self) -> bool {
        self.public && self.http_method.is_some()
    }

    /// Any security annotation at all, without cardinality validation
    pub fn has_security_annotations(&self) -> bool {
        !self.annotations.is_empty()
    }
}

/// An enclosing group (controller / resource)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub name: String,
    /// Parent group whose public operations this group inherits
    pub extends: Option<String>,
    /// Security annotations declared directly on the group
    pub annotations: Vec<SecurityAnnotationKind>,
}

impl GroupDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        GroupDescriptor {
            name: name.into(),
            extends: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: SecurityAnnotationKind) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("Orders").is_ok());
        assert!(validate_name("order_items").is_ok());
        assert!(validate_name("com.acme.OrdersResource").is_ok());
        assert!(validate_name("_internal").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("1orders").is_err());
        assert!(validate_name("orders list").is_err());
        assert!(validate_name("orders:list").is_err());
        assert!(validate_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_invocable_requires_public_and_method() {
        let routed = OperationDescriptor::new("Orders", "list").with_method(HttpMethod::Get);
        assert!(routed.is_invocable());

        let helper = OperationDescriptor::new("Orders", "validate");
        assert!(!helper.is_invocable());

        let hidden = routed.clone().private();
        assert!(!hidden.is_invocable());
    }

    #[test]
    fn test_inherited_keeps_declaring_group() {
        let op = OperationDescriptor::new("BaseResource", "health").with_method(HttpMethod::Get);
        let inherited = op.inherited_by("Orders");
        assert_eq!(inherited.group, "Orders");
        assert_eq!(inherited.declaring_group, "BaseResource");
        assert_eq!(inherited.id().to_string(), "Orders:health");
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("OPTIONS".parse::<HttpMethod>().unwrap(), HttpMethod::Options);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }
}
