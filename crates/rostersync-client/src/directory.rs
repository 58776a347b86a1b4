//! Directory Service HTTP client.
//!
//! Every Directory URI handed out by the service (`/gdc/...`) is absolute
//! against the host, so references returned by one call are fetched by
//! appending them to the base URL.

use crate::auth::DirectoryAuth;
use crate::error::{extract_detail, ClientError, ClientResult};
use crate::models::{
    AttributeElementsResponse, AttributeObjectResponse, AttributeQueryResponse,
    CreatedInvitationsResponse, CreatedObject, FilterContent, FilterMeta, FilterObject,
    FilterObjectRequest, InvitationEnvelope, InvitationListResponse, InvitationsRequest,
    NewInvitation, NewInvitationContent, ProjectRoleResponse, ProjectRolesResponse,
    ProjectUsersResponse, ProjectUsersUpdateResponse, UserFilterItem, UserFilterItems,
    UserFiltersDocument, UserFiltersUpdateResponse, UserStatusBody, UserStatusContent,
    UserStatusLinks, UserStatusRequest,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rostersync_engine::model::{DirectoryUser, MemberStatus};
use rostersync_engine::services::{
    AttributeEntry, AttributeValue, AttributeValuePage, DirectoryService, InvitationOutcome,
    ServiceResult,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Page size requested for attribute values.
pub const VALUES_PAGE_LIMIT: u32 = 10_000;

const PENDING_INVITATION: &str = "WAITING";

/// HTTP client bound to one Directory project.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    base_url: String,
    project_id: String,
    auth: DirectoryAuth,
    http_client: Client,
}

impl DirectoryClient {
    pub fn new(
        base_url: String,
        project_id: String,
        auth: DirectoryAuth,
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
            auth,
            http_client,
        ))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: String,
        project_id: String,
        auth: DirectoryAuth,
        http_client: Client,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            auth,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn project_url(&self, suffix: &str) -> String {
        self.url(&format!("/gdc/projects/{}{}", self.project_id, suffix))
    }

    fn metadata_url(&self, suffix: &str) -> String {
        self.url(&format!("/gdc/md/{}{}", self.project_id, suffix))
    }

    // ── HTTP helpers ─────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        self.get_with_query(url, &[]).await
    }

    async fn get_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ClientResult<T> {
        debug!("Directory GET {} {:?}", url, query);
        let mut builder = self.http_client.get(url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        let request = self.auth.apply(builder).await?;
        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> ClientResult<T> {
        debug!("Directory POST {}", url);
        let request = self.auth.apply(self.http_client.post(url)).await?;
        let response = request.json(body).send().await?;
        self.handle_response(response).await
    }

    async fn delete(&self, url: &str) -> ClientResult<()> {
        debug!("Directory DELETE {}", url);
        let request = self.auth.apply(self.http_client.delete(url)).await?;
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(self.handle_error_response(response).await)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        if !response.status().is_success() {
            return Err(self.handle_error_response(response).await);
        }
        let text = response.text().await?;
        // Some mutations answer with an empty body.
        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text).map_err(|e| {
            ClientError::ParseError(format!("Failed to parse Directory response: {e}"))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let detail = extract_detail(&body);

        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(detail),
            StatusCode::CONFLICT => ClientError::Conflict(detail),
            StatusCode::UNPROCESSABLE_ENTITY => ClientError::Unprocessable(detail),
            StatusCode::UNAUTHORIZED => {
                warn!("Directory returned 401, dropping temporary token");
                self.auth.invalidate_cache().await;
                ClientError::AuthError(detail)
            }
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

    // ── Users and roles ──────────────────────────────────────────────

    async fn fetch_project_users(&self) -> ClientResult<Vec<DirectoryUser>> {
        let response: ProjectUsersResponse = self.get(&self.project_url("/users")).await?;
        Ok(response
            .users
            .into_iter()
            .map(|envelope| {
                let user = envelope.user;
                DirectoryUser {
                    login: user.content.email,
                    reference: user.links.self_ref,
                    role_reference: user.content.user_roles.into_iter().next(),
                    status: MemberStatus::from_wire(&user.content.status),
                }
            })
            .collect())
    }

    async fn fetch_project_roles(&self) -> ClientResult<Vec<String>> {
        let response: ProjectRolesResponse = self.get(&self.project_url("/roles")).await?;
        if response.project_roles.roles.is_empty() {
            return Err(ClientError::ParseError(format!(
                "Project {} has no roles defined",
                self.project_id
            )));
        }
        Ok(response.project_roles.roles)
    }

    async fn update_membership(
        &self,
        user_ref: &str,
        status: &MemberStatus,
        role_ref: Option<&str>,
    ) -> ClientResult<()> {
        let body = UserStatusRequest {
            user: UserStatusBody {
                content: UserStatusContent {
                    status: status.as_str(),
                    user_roles: match status {
                        MemberStatus::Disabled => None,
                        _ => role_ref.map(|r| vec![r]),
                    },
                },
                links: UserStatusLinks { self_ref: user_ref },
            },
        };
        let response: ProjectUsersUpdateResponse =
            self.post(&self.project_url("/users"), &body).await?;
        match response.project_users_update_result.failed.into_iter().next() {
            Some(failed) => Err(ClientError::Rejected(failed.message)),
            None => Ok(()),
        }
    }

    // ── Attributes ───────────────────────────────────────────────────

    async fn fetch_attributes(&self) -> ClientResult<Vec<AttributeEntry>> {
        let response: AttributeQueryResponse =
            self.get(&self.metadata_url("/query/attributes")).await?;
        Ok(response
            .query
            .entries
            .into_iter()
            .map(|entry| AttributeEntry {
                identifier: entry.identifier,
                uri: entry.link,
            })
            .collect())
    }

    async fn first_values_url(&self, attribute_uri: &str) -> ClientResult<String> {
        let attribute: AttributeObjectResponse = self.get(&self.url(attribute_uri)).await?;
        let elements = attribute
            .attribute
            .content
            .display_forms
            .into_iter()
            .next()
            .map(|form| form.links.elements)
            .ok_or_else(|| {
                ClientError::ParseError(format!(
                    "Attribute {attribute_uri} has no display form"
                ))
            })?;
        Ok(format!("{}?limit={VALUES_PAGE_LIMIT}", self.url(&elements)))
    }

    async fn fetch_value_page(
        &self,
        attribute_uri: &str,
        cursor: Option<&str>,
    ) -> ClientResult<AttributeValuePage> {
        let url = match cursor {
            Some(next) => self.url(next),
            None => self.first_values_url(attribute_uri).await?,
        };
        let response: AttributeElementsResponse = self.get(&url).await?;
        let elements = response.attribute_elements;
        Ok(AttributeValuePage {
            values: elements
                .elements
                .into_iter()
                .map(|e| AttributeValue {
                    title: e.title,
                    uri: e.uri,
                })
                .collect(),
            next: elements.paging.next.filter(|n| !n.is_empty()),
        })
    }

    // ── Data filters ─────────────────────────────────────────────────

    async fn post_filter(&self, expression: &str, title: &str) -> ClientResult<String> {
        let body = FilterObjectRequest {
            user_filter: FilterObject {
                content: FilterContent { expression },
                meta: FilterMeta {
                    category: "userFilter",
                    title,
                },
            },
        };
        let created: CreatedObject = self.post(&self.metadata_url("/obj"), &body).await?;
        Ok(created.uri)
    }

    async fn post_user_filters(&self, user_ref: &str, filter_uris: &[String]) -> ClientResult<()> {
        let body = UserFiltersDocument {
            user_filters: UserFilterItems {
                items: vec![UserFilterItem {
                    user: user_ref.to_string(),
                    user_filters: filter_uris.to_vec(),
                }],
            },
        };
        let response: UserFiltersUpdateResponse =
            self.post(&self.metadata_url("/userfilters"), &body).await?;
        match response.user_filters_update_result.failed.into_iter().next() {
            Some(failed) => Err(ClientError::Rejected(failed.message)),
            None => Ok(()),
        }
    }

    async fn fetch_applied_filters(&self, user_ref: &str) -> ClientResult<Vec<String>> {
        let url = self.metadata_url("/userfilters");
        let response: UserFiltersDocument =
            self.get_with_query(&url, &[("users", user_ref)]).await?;
        Ok(response
            .user_filters
            .items
            .into_iter()
            .flat_map(|item| item.user_filters)
            .collect())
    }

    // ── Invitations ──────────────────────────────────────────────────

    async fn post_invitation(
        &self,
        email: &str,
        role_ref: &str,
        filter_uris: &[String],
    ) -> ClientResult<InvitationOutcome> {
        let body = InvitationsRequest {
            invitations: vec![InvitationEnvelope {
                invitation: NewInvitation {
                    content: NewInvitationContent {
                        email,
                        user_filters: filter_uris,
                        role: role_ref,
                        firstname: "",
                        lastname: "",
                        action: serde_json::Map::new(),
                    },
                },
            }],
        };
        let response: CreatedInvitationsResponse =
            self.post(&self.project_url("/invitations"), &body).await?;
        let created = response.created_invitations;
        Ok(InvitationOutcome {
            logins_domain_mismatch: created.logins_domain_mismatch,
            logins_already_in_project: created.logins_already_in_project,
        })
    }

    async fn fetch_pending_invitations(&self) -> ClientResult<Vec<String>> {
        let response: InvitationListResponse = self.get(&self.project_url("/invitations")).await?;
        Ok(response
            .invitations
            .into_iter()
            .map(|entry| entry.invitation.content)
            .filter(|content| content.status == PENDING_INVITATION)
            .map(|content| content.email)
            .collect())
    }
}

/// Last path segment of a profile reference.
fn user_id(user_ref: &str) -> &str {
    user_ref
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(user_ref)
}

#[async_trait]
impl DirectoryService for DirectoryClient {
    async fn list_project_users(&self) -> ServiceResult<Vec<DirectoryUser>> {
        Ok(self.fetch_project_users().await?)
    }

    async fn list_project_roles(&self) -> ServiceResult<Vec<String>> {
        Ok(self.fetch_project_roles().await?)
    }

    async fn role_identifier(&self, role_ref: &str) -> ServiceResult<String> {
        let role: ProjectRoleResponse = self.get(&self.url(role_ref)).await?;
        Ok(role.project_role.meta.identifier)
    }

    async fn list_attributes(&self) -> ServiceResult<Vec<AttributeEntry>> {
        Ok(self.fetch_attributes().await?)
    }

    async fn list_attribute_values(
        &self,
        attribute_uri: &str,
        cursor: Option<&str>,
    ) -> ServiceResult<AttributeValuePage> {
        Ok(self.fetch_value_page(attribute_uri, cursor).await?)
    }

    async fn create_filter(&self, expression: &str, title: &str) -> ServiceResult<String> {
        Ok(self.post_filter(expression, title).await?)
    }

    async fn attach_filters(&self, user_ref: &str, filter_uris: &[String]) -> ServiceResult<()> {
        Ok(self.post_user_filters(user_ref, filter_uris).await?)
    }

    async fn set_user_status(
        &self,
        user_ref: &str,
        status: MemberStatus,
        role_ref: Option<&str>,
    ) -> ServiceResult<()> {
        Ok(self.update_membership(user_ref, &status, role_ref).await?)
    }

    async fn remove_user(&self, user_ref: &str) -> ServiceResult<()> {
        let url = self.project_url(&format!("/users/{}", user_id(user_ref)));
        Ok(self.delete(&url).await?)
    }

    async fn create_invitation(
        &self,
        email: &str,
        role_ref: &str,
        filter_uris: &[String],
    ) -> ServiceResult<InvitationOutcome> {
        Ok(self.post_invitation(email, role_ref, filter_uris).await?)
    }

    async fn list_pending_invitations(&self) -> ServiceResult<Vec<String>> {
        Ok(self.fetch_pending_invitations().await?)
    }

    async fn applied_filters(&self, user_ref: &str) -> ServiceResult<Vec<String>> {
        Ok(self.fetch_applied_filters(user_ref).await?)
    }
}
