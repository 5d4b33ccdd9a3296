//! Google OAuth provider (Drive or Workspace read-only scopes).

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::models::ProviderType;
use crate::oauth::{OAuthError, OAuthProvider, OAuthRequest, TokenGrant};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Which Google product the integration reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoogleAccess {
    Drive,
    Workspace,
}

impl GoogleAccess {
    pub fn parse(value: Option<&str>) -> Result<Self, OAuthError> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None | Some("drive") => Ok(GoogleAccess::Drive),
            Some("workspace") => Ok(GoogleAccess::Workspace),
            Some(other) => Err(OAuthError::InvalidParameter {
                param: "type",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoogleAccess::Drive => "drive",
            GoogleAccess::Workspace => "workspace",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            GoogleAccess::Drive => &["https://www.googleapis.com/auth/drive.readonly"],
            GoogleAccess::Workspace => &[
                "https://www.googleapis.com/auth/documents.readonly",
                "https://www.googleapis.com/auth/spreadsheets.readonly",
            ],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            GoogleAccess::Drive => "Google Drive",
            GoogleAccess::Workspace => "Google Workspace",
        }
    }
}

pub struct GoogleOAuth {
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: String,
    token_url: String,
    http: Client,
}

impl GoogleOAuth {
    /// `http` must not follow redirects.
    pub fn new(client_id: Option<String>, client_secret: Option<String>, http: Client) -> Self {
        Self {
            client_id,
            client_secret,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http,
        }
    }

    pub fn with_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    fn client(&self, redirect_uri: &str, need_secret: bool) -> Result<GoogleClient, OAuthError> {
        let client_id = self
            .client_id
            .clone()
            .ok_or_else(|| OAuthError::not_configured(ProviderType::GoogleDrive, "KB_GOOGLE_CLIENT_ID is not set"))?;
        let invalid = |what: &str, err: oauth2::url::ParseError| {
            OAuthError::not_configured(ProviderType::GoogleDrive, format!("invalid {what}: {err}"))
        };

        let mut client = BasicClient::new(ClientId::new(client_id))
            .set_auth_uri(AuthUrl::new(self.auth_url.clone()).map_err(|e| invalid("auth url", e))?)
            .set_token_uri(TokenUrl::new(self.token_url.clone()).map_err(|e| invalid("token url", e))?)
            .set_redirect_uri(
                RedirectUrl::new(redirect_uri.to_string()).map_err(|e| invalid("redirect uri", e))?,
            );
        match self.client_secret.clone() {
            Some(secret) => client = client.set_client_secret(ClientSecret::new(secret)),
            None if need_secret => {
                return Err(OAuthError::not_configured(
                    ProviderType::GoogleDrive,
                    "KB_GOOGLE_CLIENT_SECRET is not set",
                ));
            }
            None => {}
        }
        Ok(client)
    }
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> OAuthError
where
    RE: std::error::Error + 'static,
{
    let provider = ProviderType::GoogleDrive;
    match err {
        RequestTokenError::ServerResponse(response) => OAuthError::rejected(
            provider,
            response
                .error_description()
                .cloned()
                .unwrap_or_else(|| response.error().to_string()),
        ),
        RequestTokenError::Request(err) => OAuthError::Upstream(
            crate::providers::ProviderError::Network {
                provider,
                details: err.to_string(),
            },
        ),
        RequestTokenError::Parse(err, _) => {
            OAuthError::rejected(provider, format!("unexpected token response: {err}"))
        }
        RequestTokenError::Other(message) => OAuthError::rejected(provider, message),
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn provider(&self) -> ProviderType {
        ProviderType::GoogleDrive
    }

    fn callback_path(&self) -> &'static str {
        "/google-oauth"
    }

    fn redirect_query(
        &self,
        integration_id: Uuid,
        variant: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let access = GoogleAccess::parse(variant).unwrap_or(GoogleAccess::Drive);
        vec![
            ("integration_id", integration_id.to_string()),
            ("type", access.as_str().to_string()),
        ]
    }

    fn authorize_url(&self, request: &OAuthRequest) -> Result<Url, OAuthError> {
        let access = GoogleAccess::parse(request.variant.as_deref())?;
        let client = self.client(&request.redirect_uri, false)?;
        let state = request.integration_id.to_string();

        let (url, _) = client
            .authorize_url(|| CsrfToken::new(state))
            .add_scopes(access.scopes().iter().map(|s| Scope::new(s.to_string())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        request: &OAuthRequest,
    ) -> Result<TokenGrant, OAuthError> {
        let access = GoogleAccess::parse(request.variant.as_deref())?;
        let client = self.client(&request.redirect_uri, true)?;

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;

        let scope = token.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        });

        Ok(TokenGrant {
            config: json!({
                "access_token": token.access_token().secret(),
                "refresh_token": token.refresh_token().map(|t| t.secret()),
                "scope": scope,
                "type": access.as_str(),
            }),
            identity: Some(access.label().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(variant: Option<&str>) -> OAuthRequest {
        OAuthRequest {
            integration_id: Uuid::nil(),
            redirect_uri: "https://kb.example.com/google-oauth?integration_id=x&type=drive".into(),
            variant: variant.map(str::to_string),
        }
    }

    #[test]
    fn authorize_url_requests_offline_consent() {
        let oauth = GoogleOAuth::new(Some("client-123".into()), None, Client::new());
        let url = oauth.authorize_url(&request(None)).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(DEFAULT_AUTH_URL));
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], Uuid::nil().to_string());
        assert_eq!(pairs["scope"], "https://www.googleapis.com/auth/drive.readonly");
    }

    #[test]
    fn workspace_type_requests_docs_and_sheets() {
        let oauth = GoogleOAuth::new(Some("c".into()), None, Client::new());
        let url = oauth.authorize_url(&request(Some("workspace"))).unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(scope.contains("documents.readonly"));
        assert!(scope.contains("spreadsheets.readonly"));

        assert!(matches!(
            oauth.authorize_url(&request(Some("calendar"))),
            Err(OAuthError::InvalidParameter { param: "type", .. })
        ));
    }

    #[test]
    fn missing_client_id_is_a_configuration_error() {
        let oauth = GoogleOAuth::new(None, None, Client::new());
        assert!(matches!(
            oauth.authorize_url(&request(None)),
            Err(OAuthError::NotConfigured { .. })
        ));
    }
}
