//! Wiremock-backed Directory and Provisioning endpoints.

#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rostersync_client::{DirectoryAuth, DirectoryClient, DirectoryCredentials, ProvisioningClient};

pub const PROJECT_ID: &str = "p1";
pub const LOGIN: &str = "admin@example.com";
pub const SUPER_TOKEN: &str = "sst-123";
pub const TEMP_TOKEN: &str = "tt-456";
pub const STORAGE_TOKEN: &str = "storage-789";

/// Mock Directory host with the session endpoints mounted.
pub struct MockDirectory {
    pub server: MockServer,
}

impl MockDirectory {
    /// Start a server that accepts the login and issues [`TEMP_TOKEN`].
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/gdc/account/token"))
            .and(header("X-GDC-AuthSST", SUPER_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "userToken": {"token": TEMP_TOKEN}
            })))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Start a server with only the login mounted; the caller mounts the
    /// token endpoint with its own expectations.
    pub async fn start_without_token() -> Self {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn client(&self) -> DirectoryClient {
        let auth = DirectoryAuth::new(
            self.uri(),
            DirectoryCredentials {
                login: LOGIN.to_string(),
                password: "secret".to_string(),
            },
            reqwest::Client::new(),
        );
        DirectoryClient::with_http_client(
            self.uri(),
            PROJECT_ID.to_string(),
            auth,
            reqwest::Client::new(),
        )
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/gdc/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userLogin": {"profile": "/gdc/account/profile/admin", "token": SUPER_TOKEN}
        })))
        .mount(server)
        .await;
}

/// Provisioning client pointed at `server`.
pub fn provisioning_client(server: &MockServer) -> ProvisioningClient {
    ProvisioningClient::with_http_client(
        server.uri(),
        PROJECT_ID.to_string(),
        STORAGE_TOKEN.to_string(),
        reqwest::Client::new(),
    )
}
