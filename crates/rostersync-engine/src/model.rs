//! Roster rows, platform roles, requested actions and membership records.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Normalize a login for identity comparisons.
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

/// The closed set of platform role names a roster row may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformRole {
    Admin,
    DashboardOnly,
    Editor,
    EditorInvite,
    EditorUserAdmin,
    Explorer,
    ExplorerOnly,
    KeboolaEditorPlus,
    ReadOnlyUser,
    ReadOnlyNoExport,
}

impl PlatformRole {
    /// Every platform role, in roster documentation order.
    pub const ALL: [PlatformRole; 10] = [
        PlatformRole::Admin,
        PlatformRole::DashboardOnly,
        PlatformRole::Editor,
        PlatformRole::EditorInvite,
        PlatformRole::EditorUserAdmin,
        PlatformRole::Explorer,
        PlatformRole::ExplorerOnly,
        PlatformRole::KeboolaEditorPlus,
        PlatformRole::ReadOnlyUser,
        PlatformRole::ReadOnlyNoExport,
    ];

    /// Name used in rosters and by the Provisioning Service.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::Admin => "admin",
            PlatformRole::DashboardOnly => "dashboardOnly",
            PlatformRole::Editor => "editor",
            PlatformRole::EditorInvite => "editorInvite",
            PlatformRole::EditorUserAdmin => "editorUserAdmin",
            PlatformRole::Explorer => "explorer",
            PlatformRole::ExplorerOnly => "explorerOnly",
            PlatformRole::KeboolaEditorPlus => "keboolaEditorPlus",
            PlatformRole::ReadOnlyUser => "readOnlyUser",
            PlatformRole::ReadOnlyNoExport => "readOnlyNoExport",
        }
    }

    /// Machine identifier of the matching Directory Service role.
    pub fn directory_identifier(&self) -> String {
        format!("{}Role", self.as_str())
    }

    /// Comma separated list of valid names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(PlatformRole::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformRole {
    type Err = RowValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == trimmed)
            .ok_or_else(|| RowValidationError::InvalidRole {
                role: s.to_string(),
            })
    }
}

/// Action requested for a user by a roster row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestedAction {
    Enable,
    Disable,
    Invite,
    Remove,
}

impl RequestedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestedAction::Enable => "ENABLE",
            RequestedAction::Disable => "DISABLE",
            RequestedAction::Invite => "INVITE",
            RequestedAction::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for RequestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestedAction {
    type Err = RowValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ENABLE" => Ok(RequestedAction::Enable),
            "DISABLE" => Ok(RequestedAction::Disable),
            "INVITE" => Ok(RequestedAction::Invite),
            "REMOVE" => Ok(RequestedAction::Remove),
            _ => Err(RowValidationError::InvalidAction {
                action: s.to_string(),
            }),
        }
    }
}

/// Status of a project member as reported by the Directory Service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberStatus {
    Enabled,
    Disabled,
    /// A status value the membership matrix does not know.
    Unrecognized(String),
}

impl MemberStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ENABLED" => MemberStatus::Enabled,
            "DISABLED" => MemberStatus::Disabled,
            other => MemberStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MemberStatus::Enabled => "ENABLED",
            MemberStatus::Disabled => "DISABLED",
            MemberStatus::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-level validation failures. Recorded to the audit sink; never fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowValidationError {
    #[error("Role must be one of [{}], got '{role}'", PlatformRole::valid_names())]
    InvalidRole { role: String },

    #[error("User action must be one of ENABLE, DISABLE, INVITE, REMOVE, got '{action}'")]
    InvalidAction { action: String },
}

/// A roster record exactly as read from the input, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    /// 1-based line number in the source file (header = 1).
    pub line_number: u64,
    pub login: String,
    pub action: String,
    pub role: String,
    pub muf: String,
    pub first_name: String,
    pub last_name: String,
    pub sso_provider: Option<String>,
}

/// A validated row of desired state for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredUserRow {
    /// Lower-cased login, the identity key.
    pub login: String,
    pub role: PlatformRole,
    pub action: RequestedAction,
    /// Raw declarative filter text.
    pub muf: String,
    pub first_name: String,
    pub last_name: String,
    pub sso_provider: Option<String>,
}

impl DesiredUserRow {
    /// Validate a raw record. The role is checked before the action.
    pub fn from_record(record: &RosterRecord) -> Result<Self, RowValidationError> {
        let role: PlatformRole = record.role.parse()?;
        let action: RequestedAction = record.action.parse()?;

        Ok(Self {
            login: normalize_login(&record.login),
            role,
            action,
            muf: record.muf.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            sso_provider: record
                .sso_provider
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

/// A member of the Directory project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub login: String,
    /// Opaque account URI.
    pub reference: String,
    /// First role reference held in the project, if any.
    pub role_reference: Option<String>,
    pub status: MemberStatus,
}

/// An account known to the owning organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgUser {
    pub login: String,
    pub reference: String,
}
