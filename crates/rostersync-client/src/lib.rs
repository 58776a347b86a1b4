//! HTTP implementations of the roster sync capability traits.
//!
//! [`directory::DirectoryClient`] talks to the project-hosting Directory
//! Service, [`provisioning::ProvisioningClient`] to the organization's
//! Provisioning Service. Both map their failures into
//! [`rostersync_engine::services::ServiceError`] so the engine can copy the
//! remote message into the audit log.

pub mod auth;
pub mod directory;
pub mod error;
pub mod models;
pub mod provisioning;

pub use auth::{DirectoryAuth, DirectoryCredentials};
pub use directory::DirectoryClient;
pub use error::{ClientError, ClientResult};
pub use provisioning::ProvisioningClient;

pub(crate) const USER_AGENT: &str = concat!("rostersync/", env!("CARGO_PKG_VERSION"));

/// Directory host to use: a non-blank custom domain wins over the default.
#[must_use]
pub fn resolve_directory_url(default_url: &str, custom_domain: Option<&str>) -> String {
    match custom_domain.map(str::trim) {
        Some(domain) if !domain.is_empty() => domain.trim_end_matches('/').to_string(),
        _ => default_url.trim_end_matches('/').to_string(),
    }
}
