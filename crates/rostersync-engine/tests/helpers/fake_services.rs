//! In-memory fakes of the Directory and Provisioning services.
//!
//! Both record every call as a short string so tests can assert on the exact
//! sequence of remote operations. Any operation can be told to fail with a
//! given message.

#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use rostersync_engine::model::{DirectoryUser, MemberStatus, OrgUser, PlatformRole};
use rostersync_engine::services::{
    AttributeEntry, AttributeValue, AttributeValuePage, CreateOrgUserOutcome, DirectoryService,
    InvitationOutcome, NewOrgUser, ProvisioningService, ServiceError, ServiceResult,
};

pub const PROJECT_ID: &str = "p1";
pub const ADMIN_LOGIN: &str = "admin@example.com";
pub const REGION_ATTRIBUTE: &str = "attr.region.name";
pub const REGION_URI: &str = "/gdc/md/p1/obj/10";

pub fn role_ref(role: PlatformRole) -> String {
    format!("/gdc/projects/{PROJECT_ID}/roles/{}", role.directory_identifier())
}

pub fn user_ref(login: &str) -> String {
    format!("/gdc/account/profile/{login}")
}

pub fn region_value_uri(id: u32) -> String {
    format!("{REGION_URI}/elements?id={id}")
}

#[derive(Default)]
struct DirectoryState {
    users: Vec<DirectoryUser>,
    roles: Vec<(String, String)>,
    attributes: Vec<AttributeEntry>,
    values: HashMap<String, Vec<AttributeValue>>,
    page_size: usize,
    repeat_cursor: bool,
    invitations: Vec<String>,
    applied: HashMap<String, Vec<String>>,
    invitation_outcome: InvitationOutcome,
    failures: HashMap<&'static str, String>,
    calls: Vec<String>,
    filters_created: usize,
}

/// Fake Directory Service.
pub struct FakeDirectory {
    state: Mutex<DirectoryState>,
}

impl Default for FakeDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDirectory {
    /// Empty project with a page size of 2 for attribute values.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                page_size: 2,
                ..Default::default()
            }),
        }
    }

    /// Project with all ten roles, an enabled admin and a region attribute
    /// holding EMEA (1), APAC (2) and AMER (3).
    pub fn standard() -> Self {
        let mut directory = Self::new()
            .with_user(ADMIN_LOGIN, MemberStatus::Enabled, Some(PlatformRole::Admin))
            .with_attribute(REGION_ATTRIBUTE, REGION_URI)
            .with_values(REGION_URI, &[("EMEA", 1), ("APAC", 2), ("AMER", 3)]);
        for role in PlatformRole::ALL {
            directory = directory.with_role(&role.directory_identifier(), &role_ref(role));
        }
        directory
    }

    fn state_mut(&mut self) -> &mut DirectoryState {
        self.state.get_mut()
    }

    pub fn with_user(
        mut self,
        login: &str,
        status: MemberStatus,
        role: Option<PlatformRole>,
    ) -> Self {
        self.state_mut().users.push(DirectoryUser {
            login: login.to_string(),
            reference: user_ref(login),
            role_reference: role.map(role_ref),
            status,
        });
        self
    }

    /// Every value page points at the same next page.
    pub fn with_repeating_cursor(mut self) -> Self {
        self.state_mut().repeat_cursor = true;
        self
    }

    pub fn with_role(mut self, identifier: &str, reference: &str) -> Self {
        self.state_mut()
            .roles
            .push((reference.to_string(), identifier.to_string()));
        self
    }

    /// Drop a role from the project, keeping the others.
    pub fn without_role(mut self, role: PlatformRole) -> Self {
        let reference = role_ref(role);
        self.state_mut().roles.retain(|(r, _)| *r != reference);
        self
    }

    pub fn with_attribute(mut self, identifier: &str, uri: &str) -> Self {
        self.state_mut().attributes.push(AttributeEntry {
            identifier: identifier.to_string(),
            uri: uri.to_string(),
        });
        self
    }

    pub fn with_values(mut self, attribute_uri: &str, values: &[(&str, u32)]) -> Self {
        let values = values
            .iter()
            .map(|(title, id)| AttributeValue {
                title: title.to_string(),
                uri: format!("{attribute_uri}/elements?id={id}"),
            })
            .collect();
        self.state_mut()
            .values
            .insert(attribute_uri.to_string(), values);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.state_mut().page_size = page_size.max(1);
        self
    }

    pub fn with_invitation(mut self, login: &str) -> Self {
        self.state_mut().invitations.push(login.to_string());
        self
    }

    pub fn with_applied_filters(mut self, login: &str, filters: &[&str]) -> Self {
        self.state_mut().applied.insert(
            user_ref(login),
            filters.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn with_invitation_outcome(mut self, outcome: InvitationOutcome) -> Self {
        self.state_mut().invitation_outcome = outcome;
        self
    }

    /// Make `operation` fail with `message`.
    pub fn failing(mut self, operation: &'static str, message: &str) -> Self {
        self.state_mut()
            .failures
            .insert(operation, message.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    /// Calls that change remote state.
    pub async fn mutations(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| {
                ["set_user_status", "remove_user", "create_filter", "attach_filters", "create_invitation"]
                    .iter()
                    .any(|op| c.starts_with(op))
            })
            .collect()
    }

    async fn enter(&self, operation: &'static str, call: String) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        match state.failures.get(operation) {
            Some(message) => Err(ServiceError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn list_project_users(&self) -> ServiceResult<Vec<DirectoryUser>> {
        self.enter("list_project_users", "list_project_users".into())
            .await?;
        Ok(self.state.lock().await.users.clone())
    }

    async fn list_project_roles(&self) -> ServiceResult<Vec<String>> {
        self.enter("list_project_roles", "list_project_roles".into())
            .await?;
        Ok(self
            .state
            .lock()
            .await
            .roles
            .iter()
            .map(|(r, _)| r.clone())
            .collect())
    }

    async fn role_identifier(&self, role_ref: &str) -> ServiceResult<String> {
        self.enter("role_identifier", format!("role_identifier:{role_ref}"))
            .await?;
        self.state
            .lock()
            .await
            .roles
            .iter()
            .find(|(r, _)| r == role_ref)
            .map(|(_, id)| id.clone())
            .ok_or_else(|| ServiceError::new("role not found"))
    }

    async fn list_attributes(&self) -> ServiceResult<Vec<AttributeEntry>> {
        self.enter("list_attributes", "list_attributes".into()).await?;
        Ok(self.state.lock().await.attributes.clone())
    }

    async fn list_attribute_values(
        &self,
        attribute_uri: &str,
        cursor: Option<&str>,
    ) -> ServiceResult<AttributeValuePage> {
        self.enter(
            "list_attribute_values",
            format!("list_attribute_values:{attribute_uri}:{}", cursor.unwrap_or("")),
        )
        .await?;

        let state = self.state.lock().await;
        let all = state.values.get(attribute_uri).cloned().unwrap_or_default();
        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (offset + state.page_size).min(all.len());
        let next = if state.repeat_cursor {
            Some(state.page_size.to_string())
        } else {
            (end < all.len()).then(|| end.to_string())
        };

        Ok(AttributeValuePage {
            values: all[offset.min(all.len())..end].to_vec(),
            next,
        })
    }

    async fn create_filter(&self, expression: &str, title: &str) -> ServiceResult<String> {
        self.enter("create_filter", format!("create_filter:{expression}:{title}"))
            .await?;
        let mut state = self.state.lock().await;
        state.filters_created += 1;
        Ok(format!("/gdc/md/{PROJECT_ID}/obj/f{}", state.filters_created))
    }

    async fn attach_filters(&self, user_ref: &str, filter_uris: &[String]) -> ServiceResult<()> {
        self.enter(
            "attach_filters",
            format!("attach_filters:{user_ref}:{}", filter_uris.join(",")),
        )
        .await
    }

    async fn set_user_status(
        &self,
        user_ref: &str,
        status: MemberStatus,
        role_ref: Option<&str>,
    ) -> ServiceResult<()> {
        self.enter(
            "set_user_status",
            format!(
                "set_user_status:{user_ref}:{status}:{}",
                role_ref.unwrap_or("-")
            ),
        )
        .await
    }

    async fn remove_user(&self, user_ref: &str) -> ServiceResult<()> {
        self.enter("remove_user", format!("remove_user:{user_ref}"))
            .await
    }

    async fn create_invitation(
        &self,
        email: &str,
        role_ref: &str,
        filter_uris: &[String],
    ) -> ServiceResult<InvitationOutcome> {
        self.enter(
            "create_invitation",
            format!("create_invitation:{email}:{role_ref}:{}", filter_uris.join(",")),
        )
        .await?;
        Ok(self.state.lock().await.invitation_outcome.clone())
    }

    async fn list_pending_invitations(&self) -> ServiceResult<Vec<String>> {
        self.enter("list_pending_invitations", "list_pending_invitations".into())
            .await?;
        Ok(self.state.lock().await.invitations.clone())
    }

    async fn applied_filters(&self, user_ref: &str) -> ServiceResult<Vec<String>> {
        self.enter("applied_filters", format!("applied_filters:{user_ref}"))
            .await?;
        Ok(self
            .state
            .lock()
            .await
            .applied
            .get(user_ref)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct ProvisioningState {
    projects: Vec<String>,
    users: Vec<OrgUser>,
    create_outcome: Option<CreateOrgUserOutcome>,
    failures: HashMap<&'static str, String>,
    calls: Vec<String>,
}

/// Fake Provisioning Service.
pub struct FakeProvisioning {
    state: Mutex<ProvisioningState>,
}

impl FakeProvisioning {
    /// Organization owning [`PROJECT_ID`] with no accounts.
    pub fn standard() -> Self {
        Self {
            state: Mutex::new(ProvisioningState {
                projects: vec!["other".to_string(), PROJECT_ID.to_string()],
                ..Default::default()
            }),
        }
    }

    pub fn with_projects(mut self, projects: &[&str]) -> Self {
        self.state.get_mut().projects = projects.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_user(mut self, login: &str) -> Self {
        self.state.get_mut().users.push(OrgUser {
            login: login.to_string(),
            reference: user_ref(login),
        });
        self
    }

    /// Outcome of every account creation. Defaults to `Created` with
    /// [`user_ref`] of the login.
    pub fn with_create_outcome(mut self, outcome: CreateOrgUserOutcome) -> Self {
        self.state.get_mut().create_outcome = Some(outcome);
        self
    }

    pub fn failing(mut self, operation: &'static str, message: &str) -> Self {
        self.state
            .get_mut()
            .failures
            .insert(operation, message.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    async fn enter(&self, operation: &'static str, call: String) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        match state.failures.get(operation) {
            Some(message) => Err(ServiceError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProvisioningService for FakeProvisioning {
    async fn list_org_projects(&self) -> ServiceResult<Vec<String>> {
        self.enter("list_org_projects", "list_org_projects".into())
            .await?;
        Ok(self.state.lock().await.projects.clone())
    }

    async fn list_org_users(&self) -> ServiceResult<Vec<OrgUser>> {
        self.enter("list_org_users", "list_org_users".into()).await?;
        Ok(self.state.lock().await.users.clone())
    }

    async fn create_org_user(&self, request: &NewOrgUser) -> ServiceResult<CreateOrgUserOutcome> {
        self.enter(
            "create_org_user",
            format!(
                "create_org_user:{}:{}:{}:{}",
                request.login,
                request.first_name,
                request.last_name,
                request.sso_provider.as_deref().unwrap_or("-")
            ),
        )
        .await?;
        let state = self.state.lock().await;
        Ok(state
            .create_outcome
            .clone()
            .unwrap_or_else(|| CreateOrgUserOutcome::Created {
                reference: user_ref(&request.login),
            }))
    }

    async fn add_user_to_project(&self, login: &str, role: PlatformRole) -> ServiceResult<()> {
        self.enter(
            "add_user_to_project",
            format!("add_user_to_project:{login}:{role}"),
        )
        .await
    }
}
