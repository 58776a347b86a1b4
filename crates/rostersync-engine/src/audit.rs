//! Append-only audit trail of every executed step.
//!
//! The CSV sink produces the status table consumed downstream; the in-memory
//! sink backs tests.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Login recorded for run-level bootstrap steps.
pub const BOOTSTRAP_LOGIN: &str = "admin";

/// Destination table announced in the manifest.
pub const MANIFEST_DESTINATION: &str = "out.c-rostersync.status";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

const HEADER: [&str; 8] = [
    "user",
    "action",
    "status",
    "timestamp",
    "role",
    "details",
    "muf",
    "run_id",
];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error on audit file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error on audit file: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not serialize manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Name of an audited step, written to the `action` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditStep {
    GetAttributes,
    GetDirectoryUsers,
    GetOrgUsers,
    GetInvitations,
    MapRoles,
    RoleError,
    ActionError,
    NoAction,
    Disable,
    Remove,
    CreateMufExpr,
    CreateMuf,
    AssignMuf,
    Enable,
    UserCreate,
    Invite,
}

impl AuditStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStep::GetAttributes => "GET_ATTRIBUTES",
            AuditStep::GetDirectoryUsers => "GET_DIRECTORY_USERS",
            AuditStep::GetOrgUsers => "GET_ORG_USERS",
            AuditStep::GetInvitations => "GET_INVITATIONS",
            AuditStep::MapRoles => "MAP_ROLES",
            AuditStep::RoleError => "ROLE_ERROR",
            AuditStep::ActionError => "ACTION_ERROR",
            AuditStep::NoAction => "NO_ACTION",
            AuditStep::Disable => "DISABLE",
            AuditStep::Remove => "REMOVE",
            AuditStep::CreateMufExpr => "CREATE_MUF_EXPR",
            AuditStep::CreateMuf => "CREATE_MUF",
            AuditStep::AssignMuf => "ASSIGN_MUF",
            AuditStep::Enable => "ENABLE",
            AuditStep::UserCreate => "USER_CREATE",
            AuditStep::Invite => "INVITE",
        }
    }
}

impl std::fmt::Display for AuditStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub login: String,
    pub step: AuditStep,
    pub success: bool,
    pub role: String,
    pub details: String,
    pub muf: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        login: impl Into<String>,
        step: AuditStep,
        success: bool,
        role: impl Into<String>,
        details: impl Into<String>,
        muf: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            step,
            success,
            role: role.into(),
            details: details.into(),
            muf: muf.into(),
            run_id: run_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.success {
            "SUCCESS"
        } else {
            "ERROR"
        }
    }

    fn to_record(&self) -> [String; 8] {
        [
            self.login.clone(),
            self.step.as_str().to_string(),
            self.status().to_string(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.role.clone(),
            self.details.clone(),
            self.muf.clone(),
            self.run_id.clone(),
        ]
    }
}

/// Destination for audit entries. Entries are never read back.
pub trait AuditSink: Send {
    fn record(&mut self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// CSV status file with every field quoted. Each entry is flushed as soon as
/// it is written.
pub struct CsvAuditSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvAuditSink {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(file);
        writer.write_record(HEADER)?;
        writer.flush()?;

        debug!(path = %path.display(), "Audit file created");
        Ok(Self { path, writer })
    }

    /// Write `<file>.manifest` next to the status file.
    pub fn write_manifest(&self) -> Result<PathBuf, AuditError> {
        let mut manifest_path = self.path.clone().into_os_string();
        manifest_path.push(".manifest");
        let manifest_path = PathBuf::from(manifest_path);

        let body = serde_json::to_string(&Manifest {
            destination: MANIFEST_DESTINATION,
            incremental: true,
            delimiter: ",",
        })?;
        fs::write(&manifest_path, body)?;
        Ok(manifest_path)
    }
}

#[derive(Serialize)]
struct Manifest {
    destination: &'static str,
    incremental: bool,
    delimiter: &'static str,
}

impl AuditSink for CsvAuditSink {
    fn record(&mut self, entry: AuditEntry) -> Result<(), AuditError> {
        self.writer.write_record(entry.to_record())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    pub entries: Vec<AuditEntry>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded for one login, in order.
    pub fn for_login(&self, login: &str) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.login == login).collect()
    }

    /// Step names recorded for one login, in order.
    pub fn steps_for(&self, login: &str) -> Vec<AuditStep> {
        self.for_login(login).iter().map(|e| e.step).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.push(entry);
        Ok(())
    }
}
