//! Notion OAuth provider.
//!
//! The token endpoint takes HTTP Basic client credentials and a JSON body.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use url::Url;

use crate::models::ProviderType;
use crate::oauth::{OAuthError, OAuthProvider, OAuthRequest, TokenGrant, error_text};
use crate::providers::ProviderError;

pub const DEFAULT_NOTION_OAUTH_BASE: &str = "https://api.notion.com/v1/oauth";

#[derive(Debug, Deserialize)]
struct NotionToken {
    access_token: Option<String>,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    workspace_name: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

pub struct NotionOAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    base_url: String,
    http: Client,
}

impl NotionOAuth {
    pub fn new(client_id: Option<String>, client_secret: Option<String>, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            base_url: DEFAULT_NOTION_OAUTH_BASE.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn client_id(&self) -> Result<&str, OAuthError> {
        self.client_id.as_deref().ok_or_else(|| {
            OAuthError::not_configured(ProviderType::Notion, "KB_NOTION_CLIENT_ID is not set")
        })
    }
}

#[async_trait]
impl OAuthProvider for NotionOAuth {
    fn provider(&self) -> ProviderType {
        ProviderType::Notion
    }

    fn callback_path(&self) -> &'static str {
        "/notion-oauth"
    }

    fn authorize_url(&self, request: &OAuthRequest) -> Result<Url, OAuthError> {
        let mut url = Url::parse(&format!("{}/authorize", self.base_url)).map_err(|err| {
            OAuthError::not_configured(ProviderType::Notion, format!("invalid oauth base: {err}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id()?)
            .append_pair("response_type", "code")
            .append_pair("owner", "user")
            .append_pair("redirect_uri", &request.redirect_uri)
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
            OAuthError::not_configured(ProviderType::Notion, "KB_NOTION_CLIENT_SECRET is not set")
        })?;

        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .basic_auth(client_id, Some(client_secret))
            .json(&json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": request.redirect_uri,
            }))
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Notion, err))?;

        let status = response.status();
        let body: JsonValue = response
            .json()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Notion, err))?;
        if !status.is_success() {
            let message = error_text(&body).unwrap_or_else(|| status.to_string());
            return Err(OAuthError::rejected(ProviderType::Notion, message));
        }

        let token: NotionToken = serde_json::from_value(body)
            .map_err(|err| ProviderError::malformed(ProviderType::Notion, err.to_string()))?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OAuthError::rejected(ProviderType::Notion, "Failed to obtain access token"))?;

        Ok(TokenGrant {
            config: json!({
                "access_token": access_token,
                "workspace_id": token.workspace_id,
                "workspace_name": token.workspace_name,
                "bot_id": token.bot_id,
            }),
            identity: token.workspace_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn authorize_url_carries_owner_and_state() {
        let oauth = NotionOAuth::new(Some("notion-client".into()), None, Client::new());
        let id = Uuid::new_v4();
        let url = oauth
            .authorize_url(&OAuthRequest {
                integration_id: id,
                redirect_uri: "https://kb.example.com/notion-oauth".into(),
                variant: None,
            })
            .unwrap();

        assert_eq!(url.path(), "/v1/oauth/authorize");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["owner"], "user");
        assert_eq!(pairs["state"], id.to_string());
        assert_eq!(pairs["redirect_uri"], "https://kb.example.com/notion-oauth");
    }
}
