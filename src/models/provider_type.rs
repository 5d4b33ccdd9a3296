//! Closed set of provider types an integration can connect to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Provider type of an integration, persisted as `integrations.integration_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    GoogleDrive,
    Notion,
    Github,
    Slack,
    Discord,
    Email,
    Webhook,
}

/// Returned when a stored or requested provider type is not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported integration type: {0}")]
pub struct UnknownProviderType(pub String);

impl ProviderType {
    pub const ALL: [ProviderType; 7] = [
        ProviderType::GoogleDrive,
        ProviderType::Notion,
        ProviderType::Github,
        ProviderType::Slack,
        ProviderType::Discord,
        ProviderType::Email,
        ProviderType::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::GoogleDrive => "google_drive",
            ProviderType::Notion => "notion",
            ProviderType::Github => "github",
            ProviderType::Slack => "slack",
            ProviderType::Discord => "discord",
            ProviderType::Email => "email",
            ProviderType::Webhook => "webhook",
        }
    }

    /// Human label used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderType::GoogleDrive => "Google Drive",
            ProviderType::Notion => "Notion",
            ProviderType::Github => "GitHub",
            ProviderType::Slack => "Slack",
            ProviderType::Discord => "Discord",
            ProviderType::Email => "Email",
            ProviderType::Webhook => "Webhook",
        }
    }

    /// Whether credentials for this provider come from an OAuth connection flow.
    pub fn uses_oauth(&self) -> bool {
        matches!(
            self,
            ProviderType::GoogleDrive | ProviderType::Notion | ProviderType::Github
        )
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = UnknownProviderType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderType::ALL
            .into_iter()
            .find(|provider| provider.as_str() == value)
            .ok_or_else(|| UnknownProviderType(value.to_string()))
    }
}
