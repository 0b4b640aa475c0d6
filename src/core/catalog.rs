//! Static metadata catalog
//!
//! A [`MetadataDiscovery`] backed by a declarative document instead of runtime
//! introspection. Groups list their operations; an operation is invocable when
//! it is public and has a routing method. Groups may `extends` another group and
//! then expose the parent's operations too, unless they redefine one by name.
//!
//! ```toml
//! [[group]]
//! name = "Orders"
//! annotations = ["authenticated"]
//!
//! [[group.operation]]
//! name = "list"
//! method = "GET"
//! annotations = [{ roles_allowed = ["admin"] }]
//! ```
//!
//! Markers that are not security annotations (for example `"produces_json"`)
//! are accepted and ignored. A marker named like a security annotation but
//! malformed (`"DenyAll"`, `{ roles_allowed = "admin" }`) fails the load.

use crate::annotation::SecurityAnnotationKind;
use crate::descriptor::{validate_name, GroupDescriptor, HttpMethod, OperationDescriptor};
use crate::discovery::MetadataDiscovery;
use crate::error::{RbacError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Top-level catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(rename = "group", default)]
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,

    #[serde(default)]
    pub annotations: Vec<DeclaredMarker>,

    #[serde(rename = "operation", default)]
    pub operations: Vec<OperationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,

    #[serde(default = "default_public")]
    pub public: bool,

    #[serde(default)]
    pub annotations: Vec<DeclaredMarker>,
}

fn default_public() -> bool {
    true
}

/// Any marker found in a document, kept raw until it is classified
///
/// A marker is a security annotation when its name (a string, or any key of
/// a map) matches a [`SecurityAnnotationKind`] ignoring case and `_` /
/// `-`. Such a marker must then parse exactly; everything else is foreign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredMarker(pub serde_json::Value);

const SECURITY_KINDS: [&str; 4] = ["deny_all", "permit_all", "roles_allowed", "authenticated"];

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_security_name(name: &str) -> bool {
    let name = normalize(name);
    SECURITY_KINDS.iter().any(|kind| normalize(kind) == name)
}

impl DeclaredMarker {
    /// Whether the marker claims to be a security annotation
    fn is_security(&self) -> bool {
        match &self.0 {
            serde_json::Value::String(name) => is_security_name(name),
            serde_json::Value::Object(map) => map.keys().any(|key| is_security_name(key)),
            _ => false,
        }
    }

    /// Classify the marker found on `placement`
    ///
    /// Returns `Ok(None)` for foreign markers and a `Config` error for a
    /// security marker that does not parse.
    pub fn classify(&self, placement: &str) -> Result<Option<SecurityAnnotationKind>> {
        if !self.is_security() {
            return Ok(None);
        }
        serde_json::from_value(self.0.clone()).map(Some).map_err(|e| {
            RbacError::Config(format!(
                "Malformed security annotation {} on {}: {}",
                self.0, placement, e
            ))
        })
    }
}

fn security_only(
    markers: &[DeclaredMarker],
    placement: &str,
) -> Result<Vec<SecurityAnnotationKind>> {
    let mut kinds = Vec::with_capacity(markers.len());
    for marker in markers {
        if let Some(kind) = marker.classify(placement)? {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// In-memory discovery over a validated set of groups
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    groups: Vec<GroupDescriptor>,
    index: HashMap<String, usize>,
    /// Operations declared directly on each group, in declaration order
    declared: HashMap<String, Vec<OperationDescriptor>>,
}

impl StaticCatalog {
    /// Build a catalog from groups and the operations each one declares
    ///
    /// Every operation is re-homed onto its group. Fails on invalid names,
    /// duplicate groups or operations, unknown parents and inheritance cycles.
    pub fn from_groups<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (GroupDescriptor, Vec<OperationDescriptor>)>,
    {
        let mut catalog = StaticCatalog::default();

        for (group, operations) in entries {
            validate_name(&group.name)?;
            if catalog.index.contains_key(&group.name) {
                return Err(RbacError::Config(format!("Duplicate group: {}", group.name)));
            }

            let mut seen = HashSet::new();
            let mut declared = Vec::with_capacity(operations.len());
            for mut op in operations {
                validate_name(&op.name)?;
                if !seen.insert(op.name.clone()) {
                    return Err(RbacError::DuplicateOperation(format!(
                        "{}:{}",
                        group.name, op.name
                    )));
                }
                op.group = group.name.clone();
                op.declaring_group = group.name.clone();
                declared.push(op);
            }

            catalog.index.insert(group.name.clone(), catalog.groups.len());
            catalog.declared.insert(group.name.clone(), declared);
            catalog.groups.push(group);
        }

        catalog.check_inheritance()?;
        debug!("Loaded catalog with {} groups", catalog.groups.len());
        Ok(catalog)
    }

    /// Build a catalog from a parsed document
    pub fn from_document(document: CatalogDocument) -> Result<Self> {
        let mut entries = Vec::with_capacity(document.groups.len());
        for entry in document.groups {
            let group = GroupDescriptor {
                annotations: security_only(&entry.annotations, &entry.name)?,
                name: entry.name.clone(),
                extends: entry.extends,
            };

            let mut operations = Vec::with_capacity(entry.operations.len());
            for op in entry.operations {
                let placement = format!("{}:{}", entry.name, op.name);
                operations.push(OperationDescriptor {
                    group: entry.name.clone(),
                    declaring_group: entry.name.clone(),
                    annotations: security_only(&op.annotations, &placement)?,
                    name: op.name,
                    http_method: op.method,
                    public: op.public,
                });
            }
            entries.push((group, operations));
        }
        Self::from_groups(entries)
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let document: CatalogDocument = toml::from_str(toml_str)?;
        Self::from_document(document)
    }

    /// Parse a catalog from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Load a catalog file; `.json` files are JSON, anything else is TOML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading catalog from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupDescriptor> {
        self.index.get(name).map(|&i| &self.groups[i])
    }

    /// Operations declared directly on `group`, routable or not
    pub fn declared_operations(&self, group: &str) -> &[OperationDescriptor] {
        self.declared.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn check_inheritance(&self) -> Result<()> {
        for group in &self.groups {
            let mut visited = HashSet::new();
            visited.insert(group.name.as_str());
            let mut current = group;
            while let Some(parent) = current.extends.as_deref() {
                let next = self
                    .group(parent)
                    .ok_or_else(|| RbacError::UnknownGroup(parent.to_string()))?;
                if !visited.insert(next.name.as_str()) {
                    return Err(RbacError::InheritanceCycle(group.name.clone()));
                }
                current = next;
            }
        }
        Ok(())
    }
}

impl MetadataDiscovery for StaticCatalog {
    fn groups(&self) -> Vec<GroupDescriptor> {
        self.groups.clone()
    }

    fn declaring_group(&self, operation: &OperationDescriptor) -> Option<GroupDescriptor> {
        self.group(&operation.declaring_group).cloned()
    }

    fn invocable_operations_of(&self, group: &GroupDescriptor) -> Vec<OperationDescriptor> {
        let mut seen = HashSet::new();
        let mut operations = Vec::new();

        // Walk from the group up its chain; the nearest declaration of a name wins.
        // check_inheritance guarantees termination for catalog groups; the bound
        // covers descriptors that did not come from this catalog.
        let mut current = self.group(&group.name);
        let mut hops = 0;
        while let Some(g) = current {
            for op in self.declared_operations(&g.name) {
                if seen.insert(op.name.as_str()) && op.is_invocable() {
                    operations.push(op.inherited_by(&group.name));
                }
            }
            hops += 1;
            if hops > self.groups.len() {
                break;
            }
            current = g.extends.as_deref().and_then(|parent| self.group(parent));
        }

        operations
    }
}
