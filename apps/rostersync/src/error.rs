//! CLI error types and exit codes

use rostersync_client::ClientError;
use rostersync_engine::audit::AuditError;
use rostersync_engine::error::SyncError;
use rostersync_engine::roster::RosterError;
use thiserror::Error;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Configuration, roster, authentication or I/O error
/// - 2: Internal inconsistency in the Directory data
/// - 3: Rows failed and fail-on-error is set
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Roster error: {0}")]
    Roster(#[from] RosterError),

    #[error("Service client error: {0}")]
    Client(#[from] ClientError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{failed} of {processed} rows failed")]
    RowFailures { failed: usize, processed: usize },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Sync(e) if e.is_internal() => 2,
            CliError::RowFailures { .. } => 3,
            CliError::Config(_)
            | CliError::Roster(_)
            | CliError::Client(_)
            | CliError::Audit(_)
            | CliError::Sync(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}
