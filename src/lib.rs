//! # endpoint-rbac - Annotation-Driven Endpoint Access Control
//!
//! `endpoint-rbac` decides, once per endpoint at registration time, which
//! access policy guards it, based on security annotations declared on the
//! endpoint (operation) and its enclosing controller (group):
//!
//! - **Method precedence**: an annotation on the operation always wins over the group's
//! - **Strict metadata**: two different annotations on one target abort registration
//! - **Default-deny**: optionally deny unannotated operations once their group opts into RBAC
//! - **Cheap enforcement**: per-request checks are pure functions of the bound policy
//!
//! ## Quick Start
//!
//! ```rust
//! use endpoint_rbac::{
//!     Decision, GlobalConfig, OperationId, PolicyResolver, Registrar, RequestIdentity,
//!     StaticCatalog,
//! };
//!
//! # fn main() -> endpoint_rbac::Result<()> {
//! let catalog = StaticCatalog::from_toml_str(r#"
//!     [[group]]
//!     name = "Orders"
//!
//!     [[group.operation]]
//!     name = "list"
//!     method = "GET"
//!     annotations = [{ roles_allowed = ["admin"] }]
//!
//!     [[group.operation]]
//!     name = "create"
//!     method = "POST"
//! "#)?;
//!
//! let registrar = Registrar::new(PolicyResolver::new(GlobalConfig::new(true)));
//! let routes = registrar.register(&catalog)?;
//!
//! let admin = RequestIdentity::authenticated("alice").with_role("admin");
//! assert_eq!(routes.authorize(&OperationId::new("Orders", "list"), &admin), Decision::Allow);
//!
//! // Unannotated sibling is denied by default
//! assert_eq!(routes.authorize(&OperationId::new("Orders", "create"), &admin), Decision::Deny);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    annotation, catalog, config, descriptor, discovery, enforcement, error, registrar, resolver,
};

pub use crate::core::{
    annotation::{RoleSet, SecurityAnnotationKind},
    catalog::{CatalogDocument, StaticCatalog},
    config::{GlobalConfig, DENY_NON_ANNOTATED_MARKER},
    descriptor::{GroupDescriptor, HttpMethod, OperationDescriptor, OperationId},
    discovery::{CachedDiscovery, MetadataDiscovery},
    enforcement::{Decision, EnforcementFilter, RequestIdentity, SecurityIdentity},
    error::{IdentityError, RbacError, Result},
    registrar::{FailurePolicy, Registrar, RegistrarConfig, RejectedOperation, Route, RouteTable},
    resolver::{resolve, PolicyResolver, PolicySource, Resolution, ResolvedPolicy},
};
