use thiserror::Error;

#[derive(Error, Debug)]
pub enum RbacError {
    #[error(
        "Duplicate security annotations found on {placement}. Expected at most 1 annotation, found: [{}]",
        .found.join(", ")
    )]
    AmbiguousAnnotation {
        placement: String,
        found: Vec<String>,
    },

    #[error("Invalid name: {0} (must start with a letter or underscore, then letters, digits, '_', '-' or '.')")]
    InvalidName(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Duplicate operation: {0}")]
    DuplicateOperation(String),

    #[error("Inheritance cycle detected at group: {0}")]
    InheritanceCycle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registration aborted: {} operation(s) failed to resolve", .rejected.len())]
    RegistrationAborted { rejected: Vec<RbacError> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RbacError>;

/// Failure reported by an identity collaborator while answering a check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity could not be established: {0}")]
    Unavailable(String),

    #[error("Role lookup failed for '{role}': {reason}")]
    RoleLookup { role: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_annotations() {
        let err = RbacError::AmbiguousAnnotation {
            placement: "Orders:list".to_string(),
            found: vec!["DenyAll".to_string(), "RolesAllowed([\"x\"])".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Orders:list"));
        assert!(msg.contains("DenyAll, RolesAllowed"));
    }

    #[test]
    fn test_registration_aborted_counts_failures() {
        let err = RbacError::RegistrationAborted {
            rejected: vec![RbacError::UnknownGroup("A".into()), RbacError::UnknownGroup("B".into())],
        };
        assert_eq!(err.to_string(), "Registration aborted: 2 operation(s) failed to resolve");
    }
}
