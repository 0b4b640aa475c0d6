//! Process-wide RBAC configuration
//!
//! A single flag decides whether unannotated operations are denied once any
//! operation in their group opts into RBAC. It is read once at startup and
//! injected into the resolver; nothing in the resolver reads the environment.
//!
//! Sources, in order of precedence:
//! 1. `deny_non_annotated_by_default` set explicitly in a TOML document
//! 2. presence of the [`DENY_NON_ANNOTATED_MARKER`] resource under any search path
//! 3. `false`

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Relative path of the marker resource that enables default-deny
pub const DENY_NON_ANNOTATED_MARKER: &str = "META-INF/MP-JWT-DENY-NONANNOTATED-METHODS";

/// Read-only global configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Deny operations without annotations when a sibling carries one
    pub deny_non_annotated_by_default: bool,
}

impl GlobalConfig {
    pub fn new(deny_non_annotated_by_default: bool) -> Self {
        GlobalConfig {
            deny_non_annotated_by_default,
        }
    }

    /// Flag is true iff the marker exists under one of `search_paths`
    pub fn from_marker<P: AsRef<Path>>(search_paths: &[P]) -> Self {
        let found = search_paths.iter().find_map(|root| {
            let candidate = root.as_ref().join(DENY_NON_ANNOTATED_MARKER);
            candidate.exists().then_some(candidate)
        });

        match &found {
            Some(path) => info!("Default-deny marker found at {:?}", path),
            None => debug!(
                "No default-deny marker under {} search path(s)",
                search_paths.len()
            ),
        }

        GlobalConfig::new(found.is_some())
    }

    /// Parse the `[rbac]` section of a TOML document
    ///
    /// ```
    /// use endpoint_rbac::GlobalConfig;
    ///
    /// let config = GlobalConfig::from_toml_str(
    ///     "[rbac]\ndeny_non_annotated_by_default = true\n",
    /// ).unwrap();
    /// assert!(config.deny_non_annotated_by_default);
    /// ```
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        Ok(file.rbac.resolve())
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading RBAC configuration from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// On-disk configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub rbac: RbacSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacSection {
    /// Explicit flag; wins over marker probing when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_non_annotated_by_default: Option<bool>,

    /// Directories searched for the marker resource
    #[serde(default)]
    pub marker_search_paths: Vec<PathBuf>,
}

impl RbacSection {
    pub fn resolve(&self) -> GlobalConfig {
        match self.deny_non_annotated_by_default {
            Some(flag) => GlobalConfig::new(flag),
            None => GlobalConfig::from_marker(&self.marker_search_paths),
        }
    }
}
