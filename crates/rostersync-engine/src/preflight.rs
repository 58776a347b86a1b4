//! Checks that must pass before any roster row is touched.

use tracing::{error, info};

use crate::error::{ConfigurationError, SyncError, SyncResult};
use crate::model::PlatformRole;
use crate::roles::RoleMapping;
use crate::services::{DirectoryService, ProvisioningService};
use crate::snapshot::DirectorySnapshot;

/// The target project must belong to the organization.
pub async fn check_project_ownership(
    provisioning: &dyn ProvisioningService,
    project_id: &str,
) -> SyncResult<()> {
    let projects = provisioning
        .list_org_projects()
        .await
        .map_err(|e| SyncError::remote("list organization projects", e))?;

    if !projects.iter().any(|p| p == project_id) {
        error!(project_id = %project_id, "Project is not owned by the organization");
        return Err(ConfigurationError::ProjectNotOwned {
            project_id: project_id.to_string(),
        }
        .into());
    }
    Ok(())
}

/// The authenticating identity must be a filter-free project administrator.
pub async fn check_administrator(
    directory: &dyn DirectoryService,
    snapshot: &DirectorySnapshot,
    roles: &RoleMapping,
    login: &str,
) -> SyncResult<()> {
    let Some(admin) = snapshot.project_user(login) else {
        error!(login = %login, "Authenticating user is not in the project");
        return Err(ConfigurationError::AdministratorNotInProject {
            login: login.to_string(),
        }
        .into());
    };

    let held_role = admin
        .role_reference
        .as_deref()
        .and_then(|r| roles.role_for_reference(r));
    if held_role != Some(PlatformRole::Admin) {
        error!(login = %login, "Authenticating user does not have admin privileges");
        return Err(ConfigurationError::NotAdministrator {
            login: login.to_string(),
        }
        .into());
    }

    let filters = directory
        .applied_filters(&admin.reference)
        .await
        .map_err(|e| SyncError::remote("fetch administrator filters", e))?;
    if !filters.is_empty() {
        error!(login = %login, count = filters.len(), "Administrator has data permissions assigned");
        return Err(ConfigurationError::AdministratorHasFilters {
            login: login.to_string(),
        }
        .into());
    }

    info!(login = %login, "Administrator checks passed");
    Ok(())
}
