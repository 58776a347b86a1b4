//! Provisioning Service HTTP client.
//!
//! Authenticates with a static storage token. The user listing is paginated
//! through a `Link` header carrying `nextPageToken`.

use crate::error::{extract_detail, ClientError, ClientResult};
use crate::models::{
    CreateAccountRequest, CreatedAccount, OrgAccount, OrgProject, ProjectAssignmentRequest,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use reqwest::header::LINK;
use reqwest::{Client, RequestBuilder, StatusCode};
use rostersync_engine::model::{OrgUser, PlatformRole};
use rostersync_engine::services::{
    CreateOrgUserOutcome, NewOrgUser, ProvisioningService, ServiceResult,
};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TOKEN_HEADER: &str = "X-StorageApi-Token";

/// Prefix of the Directory reference derived from an account uid.
pub const PROFILE_PREFIX: &str = "/gdc/account/profile/";

/// Random bytes behind each generated password.
const PASSWORD_BYTES: usize = 16;

/// HTTP client for the organization's Provisioning endpoint, scoped to the
/// project being synchronized.
#[derive(Clone)]
pub struct ProvisioningClient {
    base_url: String,
    project_id: String,
    token: String,
    http_client: Client,
}

impl std::fmt::Debug for ProvisioningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningClient")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl ProvisioningClient {
    pub fn new(
        base_url: String,
        project_id: String,
        token: String,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(
            base_url,
            project_id,
            token,
            http_client,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: String,
        project_id: String,
        token: String,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            token,
            http_client,
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(TOKEN_HEADER, &self.token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        debug!("Provisioning GET {}", url);
        let response = self.authorized(self.http_client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json().await?)
    }

    // ── Projects ─────────────────────────────────────────────────────

    async fn fetch_projects(&self) -> ClientResult<Vec<String>> {
        let url = format!("{}/projects", self.base_url);
        let projects: Vec<OrgProject> = self.get_json(&url).await?;
        Ok(projects.into_iter().map(|p| p.pid).collect())
    }

    // ── Users ────────────────────────────────────────────────────────

    async fn fetch_users(&self) -> ClientResult<Vec<OrgUser>> {
        let url = format!("{}/users", self.base_url);
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!("Provisioning GET {} (page token {:?})", url, page_token);
            let mut request = self.authorized(self.http_client.get(&url));
            if let Some(token) = &page_token {
                request = request.query(&[("nextPageToken", token)]);
            }
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_token);
            let page: Vec<OrgAccount> = response.json().await?;
            users.extend(page.into_iter().map(|account| OrgUser {
                login: account.login,
                reference: format!("{PROFILE_PREFIX}{}", account.uid),
            }));

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Fetched {} organization users", users.len());
        Ok(users)
    }

    async fn post_user(&self, request: &NewOrgUser) -> ClientResult<CreateOrgUserOutcome> {
        let url = format!("{}/users", self.base_url);
        let password = generate_password();
        let body = CreateAccountRequest {
            login: &request.login,
            password: &password,
            first_name: &request.first_name,
            last_name: &request.last_name,
            sso_provider: request.sso_provider.as_deref(),
        };

        debug!("Provisioning POST {}", url);
        let response = self
            .authorized(self.http_client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::CREATED => {
                let created: CreatedAccount = serde_json::from_str(&text)?;
                info!("Created organization account for {}", request.login);
                Ok(CreateOrgUserOutcome::Created {
                    reference: format!("{PROFILE_PREFIX}{}", created.uid),
                })
            }
            StatusCode::UNPROCESSABLE_ENTITY => Ok(CreateOrgUserOutcome::Rejected {
                message: extract_detail(&text),
            }),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
                warn!(
                    "Account creation for {} returned {}, treating the login as taken elsewhere",
                    request.login, status
                );
                Ok(CreateOrgUserOutcome::ExistsElsewhere {
                    message: extract_detail(&text),
                })
            }
            _ => Err(error_from_status(status, &text)),
        }
    }

    async fn post_assignment(&self, login: &str, role: PlatformRole) -> ClientResult<()> {
        let url = format!(
            "{}/projects/{}/users/{}",
            self.base_url, self.project_id, login
        );
        debug!("Provisioning POST {}", url);
        let response = self
            .authorized(self.http_client.post(&url))
            .json(&ProjectAssignmentRequest {
                role: role.as_str(),
            })
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    error_from_status(status, &body)
}

fn error_from_status(status: StatusCode, body: &str) -> ClientError {
    let detail = extract_detail(body);
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        StatusCode::CONFLICT => ClientError::Conflict(detail),
        StatusCode::UNPROCESSABLE_ENTITY => ClientError::Unprocessable(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::AuthError(detail),
        _ => ClientError::Status {
            status: status.as_u16(),
            detail: if detail.is_empty() {
                format!("HTTP {status}")
            } else {
                detail
            },
        },
    }
}

/// Extract `nextPageToken` from a `Link` header value.
fn next_page_token(link: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"nextPageToken=([^;&>]*)").ok())
        .as_ref()?;
    pattern
        .captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|token| !token.is_empty())
}

/// Random hex password for newly created accounts.
fn generate_password() -> String {
    let mut bytes = [0u8; PASSWORD_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl ProvisioningService for ProvisioningClient {
    async fn list_org_projects(&self) -> ServiceResult<Vec<String>> {
        Ok(self.fetch_projects().await?)
    }

    async fn list_org_users(&self) -> ServiceResult<Vec<OrgUser>> {
        Ok(self.fetch_users().await?)
    }

    async fn create_org_user(&self, request: &NewOrgUser) -> ServiceResult<CreateOrgUserOutcome> {
        Ok(self.post_user(request).await?)
    }

    async fn add_user_to_project(&self, login: &str, role: PlatformRole) -> ServiceResult<()> {
        Ok(self.post_assignment(login, role).await?)
    }
}
