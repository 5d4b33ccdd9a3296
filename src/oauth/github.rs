//! GitHub OAuth provider.
//!
//! GitHub answers token errors with `200 OK` and an `error` field, so the
//! body is inspected regardless of status.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::warn;
use url::Url;

use crate::models::ProviderType;
use crate::oauth::{OAuthError, OAuthProvider, OAuthRequest, TokenGrant, error_text};
use crate::providers::ProviderError;
use crate::providers::github::{DEFAULT_GITHUB_API_BASE, GITHUB_ACCEPT};
use crate::providers::http::read_json;

pub const DEFAULT_GITHUB_OAUTH_BASE: &str = "https://github.com/login/oauth";
const SCOPES: &str = "repo,user:email";

#[derive(Debug, Deserialize)]
struct GitHubToken {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

pub struct GitHubOAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    oauth_base: String,
    api_base: String,
    http: Client,
}

impl GitHubOAuth {
    pub fn new(client_id: Option<String>, client_secret: Option<String>, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            oauth_base: DEFAULT_GITHUB_OAUTH_BASE.to_string(),
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            http,
        }
    }

    pub fn with_base_urls(mut self, oauth_base: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.oauth_base = oauth_base.into();
        self.api_base = api_base.into();
        self
    }

    fn client_id(&self) -> Result<&str, OAuthError> {
        self.client_id.as_deref().ok_or_else(|| {
            OAuthError::not_configured(ProviderType::Github, "KB_GITHUB_CLIENT_ID is not set")
        })
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, OAuthError> {
        let response = self
            .http
            .get(format!("{}/user", self.api_base))
            .bearer_auth(access_token)
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Github, err))?;
        Ok(read_json(ProviderType::Github, response).await?)
    }
}

#[async_trait]
impl OAuthProvider for GitHubOAuth {
    fn provider(&self) -> ProviderType {
        ProviderType::Github
    }

    fn callback_path(&self) -> &'static str {
        "/github-oauth"
    }

    fn authorize_url(&self, request: &OAuthRequest) -> Result<Url, OAuthError> {
        let mut url = Url::parse(&format!("{}/authorize", self.oauth_base)).map_err(|err| {
            OAuthError::not_configured(ProviderType::Github, format!("invalid oauth base: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id()?)
            .append_pair("redirect_uri", &request.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", &request.integration_id.to_string());
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        request: &OAuthRequest,
    ) -> Result<TokenGrant, OAuthError> {
        let client_id = self.client_id()?;
        let client_secret = self.client_secret.as_deref().ok_or_else(|| {
            OAuthError::not_configured(ProviderType::Github, "KB_GITHUB_CLIENT_SECRET is not set")
        })?;

        let response = self
            .http
            .post(format!("{}/access_token", self.oauth_base))
            .header(ACCEPT, "application/json")
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "code": code,
                "redirect_uri": request.redirect_uri,
            }))
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Github, err))?;

        let status = response.status();
        let body: JsonValue = response
            .json()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Github, err))?;
        if body.get("error").is_some() || !status.is_success() {
            let message = error_text(&body).unwrap_or_else(|| status.to_string());
            return Err(OAuthError::rejected(ProviderType::Github, message));
        }

        let token: GitHubToken = serde_json::from_value(body)
            .map_err(|err| ProviderError::malformed(ProviderType::Github, err.to_string()))?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                OAuthError::rejected(ProviderType::Github, "No access token received from GitHub")
            })?;

        let mut config = json!({
            "access_token": access_token,
            "token_type": token.token_type.unwrap_or_else(|| "bearer".to_string()),
            "scope": token.scope,
        });
        let identity = match self.fetch_user(&access_token).await {
            Ok(user) => {
                config["user_info"] = json!({
                    "id": user.id,
                    "login": user.login,
                    "name": user.name,
                    "email": user.email,
                    "avatar_url": user.avatar_url,
                });
                Some(user.login)
            }
            Err(err) => {
                warn!(error = %err, "GitHub profile lookup failed, connecting without user info");
                None
            }
        };

        Ok(TokenGrant { config, identity })
    }
}
