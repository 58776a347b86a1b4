//! Start-of-run picture of Directory and Organization membership.
//!
//! Built once per run and never refreshed: an action taken on one row is not
//! visible when the next row is classified.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::model::{normalize_login, DirectoryUser, OrgUser};
use crate::services::{DirectoryService, ProvisioningService};

/// Read-only membership state keyed by normalized login.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    project_users: HashMap<String, DirectoryUser>,
    org_users: HashMap<String, OrgUser>,
    invited: HashSet<String>,
}

impl DirectorySnapshot {
    /// Build a snapshot from already fetched collections.
    pub fn from_parts(
        project_users: impl IntoIterator<Item = DirectoryUser>,
        org_users: impl IntoIterator<Item = OrgUser>,
        invited: impl IntoIterator<Item = String>,
    ) -> Self {
        let project_users = project_users
            .into_iter()
            .map(|u| (normalize_login(&u.login), u))
            .collect();
        let org_users = org_users
            .into_iter()
            .map(|u| (normalize_login(&u.login), u))
            .collect();
        let invited = invited.into_iter().map(|l| normalize_login(&l)).collect();

        Self {
            project_users,
            org_users,
            invited,
        }
    }

    /// Fetch project members, organization accounts and pending invitations.
    pub async fn load(
        directory: &dyn DirectoryService,
        provisioning: &dyn ProvisioningService,
    ) -> SyncResult<Self> {
        let project_users = directory
            .list_project_users()
            .await
            .map_err(|e| SyncError::remote("list project users", e))?;
        info!(count = project_users.len(), "Project users were extracted");

        let org_users = provisioning
            .list_org_users()
            .await
            .map_err(|e| SyncError::remote("list organization users", e))?;
        info!(count = org_users.len(), "Organization users were extracted");

        let invited = directory
            .list_pending_invitations()
            .await
            .map_err(|e| SyncError::remote("list pending invitations", e))?;
        debug!(count = invited.len(), "Pending invitations");

        Ok(Self::from_parts(project_users, org_users, invited))
    }

    pub fn project_user(&self, login: &str) -> Option<&DirectoryUser> {
        self.project_users.get(&normalize_login(login))
    }

    pub fn org_user(&self, login: &str) -> Option<&OrgUser> {
        self.org_users.get(&normalize_login(login))
    }

    pub fn is_invited(&self, login: &str) -> bool {
        self.invited.contains(&normalize_login(login))
    }

    pub fn project_user_count(&self) -> usize {
        self.project_users.len()
    }

    pub fn org_user_count(&self) -> usize {
        self.org_users.len()
    }

    pub fn invited_count(&self) -> usize {
        self.invited.len()
    }
}
