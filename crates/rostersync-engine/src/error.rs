//! Run-level error types.
//!
//! Only errors that abort the whole run live here. Row-level problems
//! (validation, data filters, remote step failures) are recorded to the audit
//! sink and never escape the runner.

use thiserror::Error;

use crate::audit::AuditError;
use crate::roster::RosterError;
use crate::services::ServiceError;

/// Result alias for run-level operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Fatal configuration problems detected before any row is processed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The target project is not among the projects owned by the organization.
    #[error("project {project_id} is not owned by this organization; users can only be provisioned to the origin project")]
    ProjectNotOwned { project_id: String },

    /// The authenticating identity is not a member of the project.
    #[error("user {login} is not in the project")]
    AdministratorNotInProject { login: String },

    /// The authenticating identity does not hold the admin role.
    #[error("user {login} does not have admin privileges")]
    NotAdministrator { login: String },

    /// The authenticating identity carries data filters of its own.
    #[error("admin account {login} cannot have any data permissions assigned; use a different user or remove them")]
    AdministratorHasFilters { login: String },
}

/// Error that aborts a run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The membership matrix met a combination it does not cover.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// A remote call needed to build run state failed.
    #[error("could not {operation}: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("audit sink error: {0}")]
    Audit(#[from] AuditError),
}

impl SyncError {
    /// Wrap a service error raised while loading run state.
    pub fn remote(operation: &'static str, source: ServiceError) -> Self {
        SyncError::Remote { operation, source }
    }

    /// Whether this error signals a logic defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, SyncError::InternalInconsistency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = SyncError::from(ConfigurationError::NotAdministrator {
            login: "ops@example.com".into(),
        });
        assert_eq!(
            err.to_string(),
            "configuration error: user ops@example.com does not have admin privileges"
        );
        assert!(!err.is_internal());
    }

    #[test]
    fn test_remote_error_keeps_message() {
        let err = SyncError::remote("list project users", ServiceError::new("boom"));
        assert_eq!(err.to_string(), "could not list project users: boom");
    }

    #[test]
    fn test_internal_flag() {
        assert!(SyncError::InternalInconsistency("x".into()).is_internal());
    }
}
