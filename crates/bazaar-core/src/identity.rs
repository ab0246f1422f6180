// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Identity provider clients
//
// The OAuth token exchange happens in the UI. These clients only turn an
// access token into a profile.

use crate::types::AppError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Profile as returned by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
}

/// One address from the provider's email listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Remote identity API
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Fetch the profile for `access_token`. Non-success statuses are errors.
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, AppError>;

    /// List the account's email addresses. Providers without such an
    /// endpoint return an empty list.
    async fn fetch_emails(&self, _access_token: &str) -> Result<Vec<ProviderEmail>, AppError> {
        Ok(Vec::new())
    }
}

fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

/// GitHub REST API client
#[derive(Clone)]
pub struct GitHubApi {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubApi {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client(user_agent, timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str, access_token: &str) -> Result<reqwest::Response, AppError> {
        let url = format!("{}{}", self.base_url, path);
        Ok(self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?)
    }
}

#[async_trait]
impl IdentityApi for GitHubApi {
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, AppError> {
        let response = self.get("/user", access_token).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IdentityApi {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<ProviderEmail>, AppError> {
        let response = self.get("/user/emails", access_token).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IdentityApi {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Google OpenID userinfo payload
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    picture: Option<String>,
}

impl From<GoogleUserInfo> for ExternalProfile {
    fn from(info: GoogleUserInfo) -> Self {
        let verified_email = info.email.filter(|_| info.email_verified);
        let login = verified_email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|handle| !handle.is_empty())
            .map(str::to_string)
            .unwrap_or(info.sub);
        Self {
            login,
            name: info.name,
            email: verified_email,
            avatar_url: info.picture.unwrap_or_default(),
        }
    }
}

/// Google userinfo endpoint client
#[derive(Clone)]
pub struct GoogleApi {
    client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleApi {
    pub fn new(
        userinfo_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client(user_agent, timeout)?,
            userinfo_url: userinfo_url.into(),
        })
    }
}

#[async_trait]
impl IdentityApi for GoogleApi {
    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, AppError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::IdentityApi {
                status: status.as_u16(),
            });
        }
        let info: GoogleUserInfo = response.json().await?;
        Ok(info.into())
    }
}
