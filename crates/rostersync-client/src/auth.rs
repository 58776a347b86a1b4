//! Directory authentication: super-secure token login and temporary tokens.
//!
//! A login yields a long-lived super-secure token (SST). Each request carries
//! a short-lived temporary token (TT) derived from it. The TT is cached and
//! dropped on a 401 so the next request derives a fresh one.

use crate::error::{extract_detail, ClientError, ClientResult};
use crate::models::{LoginRequest, LoginResponse, PostUserLogin, TokenResponse};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

pub const SST_HEADER: &str = "X-GDC-AuthSST";
pub const TT_HEADER: &str = "X-GDC-AuthTT";

/// Temporary tokens live ten minutes; refresh a minute early.
const TT_LIFETIME: Duration = Duration::from_secs(9 * 60);

/// Login and password of the authenticating Directory user.
///
/// The [`Debug`] impl redacts the password.
#[derive(Clone)]
pub struct DirectoryCredentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for DirectoryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCredentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Instant::now() >= exp,
            None => false,
        }
    }
}

/// Session handler shared by every Directory request.
#[derive(Clone)]
pub struct DirectoryAuth {
    base_url: String,
    credentials: DirectoryCredentials,
    http_client: reqwest::Client,
    super_token: Arc<RwLock<Option<String>>>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl std::fmt::Debug for DirectoryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAuth")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("super_token", &"[REDACTED]")
            .finish()
    }
}

impl DirectoryAuth {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        credentials: DirectoryCredentials,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            http_client,
            super_token: Arc::new(RwLock::new(None)),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Log in and keep the super-secure token.
    pub async fn login(&self) -> ClientResult<()> {
        let url = format!("{}/gdc/account/login", self.base_url);
        debug!("Directory login as {} via {}", self.credentials.login, url);

        let body = LoginRequest {
            post_user_login: PostUserLogin {
                login: &self.credentials.login,
                password: &self.credentials.password,
                remember: 1,
                verify_level: 2,
            },
        };
        let response = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::AuthError(format!("Login request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        if !status.is_success() {
            return Err(ClientError::AuthError(format!(
                "Could not log in as {}: {}",
                self.credentials.login,
                extract_detail(&text)
            )));
        }

        let parsed: LoginResponse = serde_json::from_str(&text)
            .map_err(|e| ClientError::AuthError(format!("Failed to parse login response: {e}")))?;

        *self.super_token.write().await = Some(parsed.user_login.token);
        self.invalidate_cache().await;
        Ok(())
    }

    /// Current temporary token, derived from the SST when missing or stale.
    pub async fn temporary_token(&self) -> ClientResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_expired() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let super_token = self.super_token().await?;
        let url = format!("{}/gdc/account/token", self.base_url);
        debug!("Fetching temporary token from {}", url);

        let response = self
            .http_client
            .get(&url)
            .header(SST_HEADER, super_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ClientError::AuthError(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            // A rejected SST has to be re-issued by a fresh login.
            *self.super_token.write().await = None;
            return Err(ClientError::AuthError(format!(
                "Token endpoint returned {status}: {}",
                extract_detail(&body)
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            ClientError::AuthError(format!("Failed to parse token response: {e}"))
        })?;
        let token = parsed.user_token.token;

        *self.cached_token.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at: Some(Instant::now() + TT_LIFETIME),
        });
        Ok(token)
    }

    async fn super_token(&self) -> ClientResult<String> {
        if let Some(token) = self.super_token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.super_token
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::AuthError("Login did not yield a token".to_string()))
    }

    /// Apply the temporary token and JSON headers to a request.
    pub async fn apply(&self, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        let token = self.temporary_token().await?;
        Ok(builder
            .header(TT_HEADER, token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json"))
    }

    /// Drop the cached temporary token (e.g., on 401 response).
    pub async fn invalidate_cache(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
