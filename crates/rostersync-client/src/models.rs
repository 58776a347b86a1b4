//! Wire payloads for both services.
//!
//! Only the fields the clients read or write are modelled; unknown fields are
//! ignored on deserialization.

use serde::{Deserialize, Serialize};

// ── Directory: session ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub post_user_login: PostUserLogin<'a>,
}

#[derive(Debug, Serialize)]
pub struct PostUserLogin<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub remember: u8,
    pub verify_level: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_login: TokenHolder,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user_token: TokenHolder,
}

#[derive(Debug, Deserialize)]
pub struct TokenHolder {
    pub token: String,
}

// ── Directory: users and roles ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProjectUsersResponse {
    #[serde(default)]
    pub users: Vec<ProjectUserEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectUserEnvelope {
    pub user: ProjectUser,
}

#[derive(Debug, Deserialize)]
pub struct ProjectUser {
    pub content: ProjectUserContent,
    pub links: SelfLink,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUserContent {
    pub email: String,
    pub status: String,
    #[serde(default)]
    pub user_roles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelfLink {
    #[serde(rename = "self")]
    pub self_ref: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRolesResponse {
    pub project_roles: ProjectRoles,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRoles {
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRoleResponse {
    pub project_role: ProjectRole,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRole {
    pub meta: ObjectMeta,
}

#[derive(Debug, Deserialize)]
pub struct ObjectMeta {
    pub identifier: String,
}

#[derive(Debug, Serialize)]
pub struct UserStatusRequest<'a> {
    pub user: UserStatusBody<'a>,
}

#[derive(Debug, Serialize)]
pub struct UserStatusBody<'a> {
    pub content: UserStatusContent<'a>,
    pub links: UserStatusLinks<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusContent<'a> {
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_roles: Option<Vec<&'a str>>,
}

#[derive(Debug, Serialize)]
pub struct UserStatusLinks<'a> {
    #[serde(rename = "self")]
    pub self_ref: &'a str,
}

/// Shared by membership and filter-assignment updates.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateResult {
    #[serde(default)]
    pub successful: Vec<serde_json::Value>,
    #[serde(default)]
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Deserialize)]
pub struct FailedItem {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUsersUpdateResponse {
    #[serde(default)]
    pub project_users_update_result: UpdateResult,
}

// ── Directory: attributes ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AttributeQueryResponse {
    pub query: AttributeQuery,
}

#[derive(Debug, Deserialize)]
pub struct AttributeQuery {
    #[serde(default)]
    pub entries: Vec<AttributeQueryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeQueryEntry {
    pub identifier: String,
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct AttributeObjectResponse {
    pub attribute: AttributeObject,
}

#[derive(Debug, Deserialize)]
pub struct AttributeObject {
    pub content: AttributeContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeContent {
    #[serde(default)]
    pub display_forms: Vec<DisplayForm>,
}

#[derive(Debug, Deserialize)]
pub struct DisplayForm {
    pub links: DisplayFormLinks,
}

#[derive(Debug, Deserialize)]
pub struct DisplayFormLinks {
    pub elements: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeElementsResponse {
    pub attribute_elements: AttributeElements,
}

#[derive(Debug, Deserialize)]
pub struct AttributeElements {
    #[serde(default)]
    pub elements: Vec<AttributeElement>,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Deserialize)]
pub struct AttributeElement {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

// ── Directory: data filters ──────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterObjectRequest<'a> {
    pub user_filter: FilterObject<'a>,
}

#[derive(Debug, Serialize)]
pub struct FilterObject<'a> {
    pub content: FilterContent<'a>,
    pub meta: FilterMeta<'a>,
}

#[derive(Debug, Serialize)]
pub struct FilterContent<'a> {
    pub expression: &'a str,
}

#[derive(Debug, Serialize)]
pub struct FilterMeta<'a> {
    pub category: &'static str,
    pub title: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreatedObject {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFiltersDocument {
    pub user_filters: UserFilterItems,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserFilterItems {
    #[serde(default)]
    pub items: Vec<UserFilterItem>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilterItem {
    pub user: String,
    #[serde(default)]
    pub user_filters: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFiltersUpdateResponse {
    #[serde(default)]
    pub user_filters_update_result: UpdateResult,
}

// ── Directory: invitations ───────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct InvitationsRequest<'a> {
    pub invitations: Vec<InvitationEnvelope<'a>>,
}

#[derive(Debug, Serialize)]
pub struct InvitationEnvelope<'a> {
    pub invitation: NewInvitation<'a>,
}

#[derive(Debug, Serialize)]
pub struct NewInvitation<'a> {
    pub content: NewInvitationContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvitationContent<'a> {
    pub email: &'a str,
    pub user_filters: &'a [String],
    pub role: &'a str,
    pub firstname: &'a str,
    pub lastname: &'a str,
    pub action: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitationsResponse {
    pub created_invitations: CreatedInvitations,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitations {
    #[serde(default)]
    pub logins_domain_mismatch: Vec<String>,
    #[serde(default)]
    pub logins_already_in_project: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationListResponse {
    #[serde(default)]
    pub invitations: Vec<InvitationListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationListEntry {
    pub invitation: ExistingInvitation,
}

#[derive(Debug, Deserialize)]
pub struct ExistingInvitation {
    pub content: ExistingInvitationContent,
}

#[derive(Debug, Deserialize)]
pub struct ExistingInvitationContent {
    pub email: String,
    pub status: String,
}

// ── Provisioning ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OrgProject {
    pub pid: String,
}

#[derive(Debug, Deserialize)]
pub struct OrgAccount {
    pub login: String,
    pub uid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sso_provider: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedAccount {
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectAssignmentRequest<'a> {
    pub role: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disable_request_omits_roles() {
        let body = UserStatusRequest {
            user: UserStatusBody {
                content: UserStatusContent {
                    status: "DISABLED",
                    user_roles: None,
                },
                links: UserStatusLinks {
                    self_ref: "/gdc/account/profile/u1",
                },
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"user": {"content": {"status": "DISABLED"},
                            "links": {"self": "/gdc/account/profile/u1"}}})
        );
    }

    #[test]
    fn test_project_user_without_roles() {
        let parsed: ProjectUsersResponse = serde_json::from_value(json!({
            "users": [{"user": {
                "content": {"email": "a@example.com", "status": "DISABLED"},
                "links": {"self": "/gdc/account/profile/a"}
            }}]
        }))
        .unwrap();
        assert!(parsed.users[0].user.content.user_roles.is_empty());
    }
}
