//! Capability traits for the two remote systems.
//!
//! Implementations own their sessions and tokens. The engine only ever holds a
//! `&dyn DirectoryService` / `&dyn ProvisioningService` and awaits one call at
//! a time.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DirectoryUser, MemberStatus, OrgUser, PlatformRole};

/// Result alias for capability calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A non-success outcome of a remote call.
///
/// `Display` yields the remote message verbatim so it can be copied into audit
/// details.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An attribute published by the Directory project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    pub identifier: String,
    pub uri: String,
}

/// One literal value of an attribute and its provider-side URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub title: String,
    pub uri: String,
}

/// One page of attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeValuePage {
    pub values: Vec<AttributeValue>,
    /// Cursor for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Result of an invitation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationOutcome {
    pub logins_domain_mismatch: Vec<String>,
    pub logins_already_in_project: Vec<String>,
}

impl InvitationOutcome {
    pub fn is_clean(&self) -> bool {
        self.logins_domain_mismatch.is_empty() && self.logins_already_in_project.is_empty()
    }
}

/// Request to create an organization account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrgUser {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub sso_provider: Option<String>,
}

/// Result of an account creation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOrgUserOutcome {
    /// Account created; carries its stable Directory reference.
    Created { reference: String },
    /// The service refused the request (invalid data, policy).
    Rejected { message: String },
    /// The login already belongs to an account outside this organization.
    ExistsElsewhere { message: String },
}

/// Project-hosting service holding memberships, roles, attributes and data
/// filters.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// All project members, enabled and disabled.
    async fn list_project_users(&self) -> ServiceResult<Vec<DirectoryUser>>;

    /// References of every role defined in the project.
    async fn list_project_roles(&self) -> ServiceResult<Vec<String>>;

    /// Machine identifier of a role (e.g. `adminRole`).
    async fn role_identifier(&self, role_ref: &str) -> ServiceResult<String>;

    async fn list_attributes(&self) -> ServiceResult<Vec<AttributeEntry>>;

    /// One page of values for an attribute. `cursor` is `None` for the first
    /// page and the previous page's `next` afterwards.
    async fn list_attribute_values(
        &self,
        attribute_uri: &str,
        cursor: Option<&str>,
    ) -> ServiceResult<AttributeValuePage>;

    /// Create a filter object and return its URI.
    async fn create_filter(&self, expression: &str, title: &str) -> ServiceResult<String>;

    /// Replace the filters applied to a user.
    async fn attach_filters(&self, user_ref: &str, filter_uris: &[String]) -> ServiceResult<()>;

    /// Change a member's status, optionally assigning a role.
    async fn set_user_status(
        &self,
        user_ref: &str,
        status: MemberStatus,
        role_ref: Option<&str>,
    ) -> ServiceResult<()>;

    async fn remove_user(&self, user_ref: &str) -> ServiceResult<()>;

    async fn create_invitation(
        &self,
        email: &str,
        role_ref: &str,
        filter_uris: &[String],
    ) -> ServiceResult<InvitationOutcome>;

    /// Logins with an invitation that has not been accepted yet.
    async fn list_pending_invitations(&self) -> ServiceResult<Vec<String>>;

    /// URIs of the filters currently applied to a user.
    async fn applied_filters(&self, user_ref: &str) -> ServiceResult<Vec<String>>;
}

/// Organization-level service that owns user accounts.
#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Ids of the projects owned by the organization.
    async fn list_org_projects(&self) -> ServiceResult<Vec<String>>;

    async fn list_org_users(&self) -> ServiceResult<Vec<OrgUser>>;

    async fn create_org_user(&self, request: &NewOrgUser) -> ServiceResult<CreateOrgUserOutcome>;

    async fn add_user_to_project(&self, login: &str, role: PlatformRole) -> ServiceResult<()>;
}
