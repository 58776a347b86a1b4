//! Mapping between platform role names and Directory role references.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::model::PlatformRole;
use crate::services::DirectoryService;

/// Bidirectional association `PlatformRole <-> directory role reference`.
///
/// Every platform role has an entry. A role whose identifier is absent from
/// the project maps to `None`; that surfaces later as a failed enable or
/// invite step, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMapping {
    references: BTreeMap<PlatformRole, Option<String>>,
}

impl RoleMapping {
    /// Build the mapping from `directory identifier -> role reference`.
    pub fn from_directory_roles(directory_roles: &HashMap<String, String>) -> Self {
        let references = PlatformRole::ALL
            .iter()
            .map(|role| {
                let reference = directory_roles.get(&role.directory_identifier()).cloned();
                (*role, reference)
            })
            .collect();
        Self { references }
    }

    /// Fetch every project role and its identifier, then build the mapping.
    pub async fn load(directory: &dyn DirectoryService) -> SyncResult<Self> {
        info!("Mapping platform roles to directory roles");
        let role_refs = directory
            .list_project_roles()
            .await
            .map_err(|e| SyncError::remote("list project roles", e))?;

        let mut directory_roles = HashMap::with_capacity(role_refs.len());
        for role_ref in role_refs {
            let identifier = directory
                .role_identifier(&role_ref)
                .await
                .map_err(|e| SyncError::remote("fetch role detail", e))?;
            debug!(identifier = %identifier, role_ref = %role_ref, "Directory role");
            directory_roles.insert(identifier, role_ref);
        }

        Ok(Self::from_directory_roles(&directory_roles))
    }

    /// Directory reference for a platform role, if the project defines it.
    pub fn reference(&self, role: PlatformRole) -> Option<&str> {
        self.references.get(&role).and_then(|r| r.as_deref())
    }

    /// Platform role holding the given directory reference.
    pub fn role_for_reference(&self, reference: &str) -> Option<PlatformRole> {
        self.references
            .iter()
            .find(|(_, r)| r.as_deref() == Some(reference))
            .map(|(role, _)| *role)
    }

    /// JSON rendering of the role matrix, recorded in the audit log.
    pub fn to_json(&self) -> serde_json::Value {
        let matrix: serde_json::Map<String, serde_json::Value> = self
            .references
            .iter()
            .map(|(role, reference)| {
                (
                    role.as_str().to_string(),
                    serde_json::json!({
                        "platform": role.as_str(),
                        "directory": role.directory_identifier(),
                        "directory_uri": reference,
                    }),
                )
            })
            .collect();
        serde_json::Value::Object(matrix)
    }
}
