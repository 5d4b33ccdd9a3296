//! Provider metadata types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ProviderType;
use crate::providers::Action;

/// How an integration proves its identity to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// OAuth 2.0 authorization code flow, bearer token at call time
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Server-held API key
    ApiKey,
    /// Secret incoming-webhook URL stored in the integration config
    WebhookUrl,
}

/// Description of a registered adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderMetadata {
    pub name: ProviderType,
    pub display_name: String,
    pub auth_type: AuthType,
    /// Action names this adapter handles
    pub actions: Vec<String>,
}

impl ProviderMetadata {
    pub fn new(name: ProviderType, auth_type: AuthType, actions: &[Action]) -> Self {
        Self {
            name,
            display_name: name.display_name().to_string(),
            auth_type,
            actions: actions.iter().map(|action| action.to_string()).collect(),
        }
    }

    pub fn supports(&self, action: &Action) -> bool {
        self.actions.iter().any(|name| name == action.as_str())
    }
}
