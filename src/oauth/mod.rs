//! OAuth connection flow
//!
//! One handler per OAuth provider drives an integration from `pending` to
//! `connected`:
//!
//! - a request without `code` redirects to the provider consent screen with
//!   the integration id carried in `state`
//! - the provider callback exchanges `code` for a token and activates the
//!   integration in a single store update
//!
//! A failed exchange never writes to the store, so a previously connected
//! config survives a rejected retry.

pub mod github;
pub mod google;
pub mod notion;
pub mod page;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::ProviderType;
use crate::models::integration::OAUTH_PENDING_KEY;
use crate::providers::ProviderError;
use crate::repositories::{Store, StoreError};

pub use github::GitHubOAuth;
pub use google::GoogleOAuth;
pub use notion::NotionOAuth;

/// Credential produced by a successful code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    /// Full integration config to persist
    pub config: JsonValue,
    /// Account or workspace shown on the terminal page
    pub identity: Option<String>,
}

/// Per-request inputs shared by both phases of the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthRequest {
    pub integration_id: Uuid,
    pub redirect_uri: String,
    /// Provider specific flavour, e.g. Google `drive` or `workspace`
    pub variant: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Missing integration_id parameter")]
    MissingIntegrationId,
    #[error("Invalid integration_id: {0}")]
    InvalidIntegrationId(String),
    #[error("Integration not found: {0}")]
    IntegrationNotFound(Uuid),
    #[error("Integration {integration_id} is a {actual} integration, not {expected}")]
    ProviderMismatch {
        integration_id: Uuid,
        expected: ProviderType,
        actual: String,
    },
    #[error("{} does not use OAuth", .0.display_name())]
    NotOAuthProvider(ProviderType),
    #[error("Invalid {param} parameter: {value}")]
    InvalidParameter { param: &'static str, value: String },
    #[error("{} OAuth is not configured on this server", .provider.display_name())]
    NotConfigured {
        provider: ProviderType,
        details: String,
    },
    #[error("{} OAuth error: {message}", .provider.display_name())]
    Rejected {
        provider: ProviderType,
        message: String,
    },
    #[error(transparent)]
    Upstream(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OAuthError {
    pub fn not_configured(provider: ProviderType, details: impl Into<String>) -> Self {
        OAuthError::NotConfigured {
            provider,
            details: details.into(),
        }
    }

    pub fn rejected(provider: ProviderType, message: impl Into<String>) -> Self {
        OAuthError::Rejected {
            provider,
            message: message.into(),
        }
    }
}

/// One OAuth authorization-code provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn provider(&self) -> ProviderType;

    /// Route serving both phases, e.g. `/github-oauth`.
    fn callback_path(&self) -> &'static str;

    /// Extra query pairs baked into the redirect URI. The same pairs must be
    /// rebuilt from the callback so the exchange sends an identical URI.
    fn redirect_query(
        &self,
        _integration_id: Uuid,
        _variant: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Consent screen URL. `state` carries the integration id.
    fn authorize_url(&self, request: &OAuthRequest) -> Result<Url, OAuthError>;

    async fn exchange_code(&self, code: &str, request: &OAuthRequest)
    -> Result<TokenGrant, OAuthError>;
}

/// Query string accepted by `GET /{provider}-oauth`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct OAuthQuery {
    pub integration_id: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declines consent
    pub error: Option<String>,
    pub error_description: Option<String>,
    #[serde(rename = "type")]
    pub variant: Option<String>,
}

/// Result of one request to an OAuth endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum OAuthOutcome {
    Redirect(Url),
    Connected {
        provider: ProviderType,
        integration_id: Uuid,
        identity: Option<String>,
    },
    Failed {
        provider: ProviderType,
        integration_id: Option<Uuid>,
        message: String,
    },
}

#[derive(Clone)]
pub struct OAuthFlow {
    store: Arc<dyn Store>,
    providers: HashMap<ProviderType, Arc<dyn OAuthProvider>>,
    public_base_url: String,
}

impl OAuthFlow {
    pub fn new(store: Arc<dyn Store>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            providers: HashMap::new(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Flow with the Google, Notion and GitHub providers from `config`.
    pub fn from_config(
        store: Arc<dyn Store>,
        config: &AppConfig,
        http: Client,
        token_http: Client,
    ) -> Self {
        let mut flow = Self::new(store, config.public_base_url.clone());
        flow.register(Arc::new(GoogleOAuth::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            token_http,
        )));
        flow.register(Arc::new(NotionOAuth::new(
            config.notion_client_id.clone(),
            config.notion_client_secret.clone(),
            http.clone(),
        )));
        flow.register(Arc::new(GitHubOAuth::new(
            config.github_client_id.clone(),
            config.github_client_secret.clone(),
            http,
        )));
        flow
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    /// Popup entry point that starts the flow for `integration_id`.
    pub fn connect_url(&self, provider: ProviderType, integration_id: Uuid) -> Option<Url> {
        let oauth = self.providers.get(&provider)?;
        let mut url =
            Url::parse(&format!("{}{}", self.public_base_url, oauth.callback_path())).ok()?;
        url.query_pairs_mut()
            .append_pair("integration_id", &integration_id.to_string());
        Some(url)
    }

    /// Run whichever phase the query selects.
    #[instrument(skip_all, fields(provider = %provider, has_code = query.code.is_some()))]
    pub async fn handle(
        &self,
        provider: ProviderType,
        query: OAuthQuery,
    ) -> Result<OAuthOutcome, OAuthError> {
        let oauth = self
            .providers
            .get(&provider)
            .cloned()
            .ok_or(OAuthError::NotOAuthProvider(provider))?;

        let raw_id = non_blank(&query.integration_id).or_else(|| non_blank(&query.state));

        if query.code.is_none() {
            if let Some(reason) = non_blank(&query.error) {
                let message = non_blank(&query.error_description).unwrap_or(reason);
                warn!(%message, "Provider denied authorization");
                record(provider, "denied");
                return Ok(OAuthOutcome::Failed {
                    provider,
                    integration_id: raw_id.and_then(|id| Uuid::parse_str(id).ok()),
                    message: message.to_string(),
                });
            }
        }

        let raw_id = raw_id.ok_or(OAuthError::MissingIntegrationId)?;
        let integration_id = Uuid::parse_str(raw_id)
            .map_err(|_| OAuthError::InvalidIntegrationId(raw_id.to_string()))?;

        let integration = self
            .store
            .get_integration(integration_id)
            .await?
            .ok_or(OAuthError::IntegrationNotFound(integration_id))?;
        if integration.provider_type().ok() != Some(provider) {
            return Err(OAuthError::ProviderMismatch {
                integration_id,
                expected: provider,
                actual: integration.integration_type,
            });
        }

        let request = self.request_for(oauth.as_ref(), integration_id, query.variant.clone())?;

        let Some(code) = non_blank(&query.code) else {
            let url = oauth.authorize_url(&request)?;
            info!(%integration_id, "Redirecting to consent screen");
            return Ok(OAuthOutcome::Redirect(url));
        };

        match oauth.exchange_code(code, &request).await {
            Ok(grant) => {
                let config = merge_grant(&integration.config, grant.config);
                self.store
                    .activate_integration(integration_id, Some(config))
                    .await?;
                record(provider, "connected");
                info!(%integration_id, "Integration connected");
                Ok(OAuthOutcome::Connected {
                    provider,
                    integration_id,
                    identity: grant.identity,
                })
            }
            Err(OAuthError::Store(err)) => Err(OAuthError::Store(err)),
            Err(err) => {
                record(provider, "failed");
                match &err {
                    OAuthError::NotConfigured { details, .. } => {
                        error!(%integration_id, %details, "OAuth client credentials missing")
                    }
                    _ => warn!(%integration_id, error = %err, "Token exchange failed"),
                }
                let message = err.to_string();
                Ok(OAuthOutcome::Failed {
                    provider,
                    integration_id: Some(integration_id),
                    message,
                })
            }
        }
    }

    fn request_for(
        &self,
        oauth: &dyn OAuthProvider,
        integration_id: Uuid,
        variant: Option<String>,
    ) -> Result<OAuthRequest, OAuthError> {
        let mut redirect = Url::parse(&format!("{}{}", self.public_base_url, oauth.callback_path()))
            .map_err(|err| OAuthError::not_configured(oauth.provider(), format!("bad public base url: {err}")))?;
        let extra = oauth.redirect_query(integration_id, variant.as_deref());
        if !extra.is_empty() {
            redirect.query_pairs_mut().extend_pairs(extra);
        }
        Ok(OAuthRequest {
            integration_id,
            redirect_uri: redirect.to_string(),
            variant,
        })
    }
}

/// Overlay the granted credentials on the stored config. Settings chosen
/// before the flow (such as a Drive `folder_id`) survive; the pending marker
/// does not.
fn merge_grant(existing: &JsonValue, grant: JsonValue) -> JsonValue {
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    merged.remove(OAUTH_PENDING_KEY);
    match grant {
        JsonValue::Object(fields) => merged.extend(fields),
        other => return other,
    }
    JsonValue::Object(merged)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn record(provider: ProviderType, outcome: &'static str) {
    counter!(
        "oauth_callbacks_total",
        "provider" => provider.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Message from a token endpoint error body, preferring the human readable field.
pub(crate) fn error_text(body: &JsonValue) -> Option<String> {
    ["error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(JsonValue::as_str))
        .map(str::to_string)
}
