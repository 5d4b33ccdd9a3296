//! Typed per-provider integration config.
//!
//! Storage keeps `integrations.config` as an open JSON map. Adapters narrow
//! their slice of it into these types before any business logic runs.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use crate::models::ProviderType;
use crate::providers::ProviderError;

/// Credentials written by an OAuth connection flow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OAuthTokenConfig {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoogleDriveConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Folder synced by default
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: Url,
    #[serde(default)]
    pub channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Url,
    #[serde(default)]
    pub avatar_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailConfig {
    /// Recipient address
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookConfig {
    pub url: Url,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Config keyed by provider type.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    GoogleDrive(GoogleDriveConfig),
    Notion(OAuthTokenConfig),
    Github(OAuthTokenConfig),
    Slack(SlackConfig),
    Discord(DiscordConfig),
    Email(EmailConfig),
    Webhook(WebhookConfig),
}

impl ProviderConfig {
    pub fn parse(provider: ProviderType, config: &JsonValue) -> Result<Self, ProviderError> {
        Ok(match provider {
            ProviderType::GoogleDrive => ProviderConfig::GoogleDrive(narrow(provider, config)?),
            ProviderType::Notion => ProviderConfig::Notion(narrow(provider, config)?),
            ProviderType::Github => ProviderConfig::Github(narrow(provider, config)?),
            ProviderType::Slack => ProviderConfig::Slack(narrow(provider, config)?),
            ProviderType::Discord => ProviderConfig::Discord(narrow(provider, config)?),
            ProviderType::Email => ProviderConfig::Email(narrow(provider, config)?),
            ProviderType::Webhook => ProviderConfig::Webhook(narrow(provider, config)?),
        })
    }
}

/// Deserialize one provider's config slice, ignoring unknown keys.
pub fn narrow<T: DeserializeOwned>(
    provider: ProviderType,
    config: &JsonValue,
) -> Result<T, ProviderError> {
    T::deserialize(config).map_err(|err| ProviderError::InvalidConfig {
        provider,
        details: err.to_string(),
    })
}
