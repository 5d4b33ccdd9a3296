//! Provider registry
//!
//! Built once at startup from [`AppConfig`] and shared through application
//! state. Lookups are by [`ProviderType`].

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use crate::config::AppConfig;
use crate::models::ProviderType;
use crate::providers::discord::DiscordAdapter;
use crate::providers::email::{EmailAdapter, ResendMailer};
use crate::providers::github::GitHubAdapter;
use crate::providers::google_drive::GoogleDriveAdapter;
use crate::providers::notion::NotionAdapter;
use crate::providers::slack::SlackAdapter;
use crate::providers::webhook::WebhookAdapter;
use crate::providers::{ProviderAdapter, ProviderMetadata};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },
}

/// Adapters keyed by the provider type they serve.
#[derive(Clone, Default)]
pub struct Registry {
    adapters: HashMap<ProviderType, Arc<dyn ProviderAdapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in adapter, sharing one HTTP client.
    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        let mailer = Arc::new(ResendMailer::new(
            client.clone(),
            config.resend_api_key.clone(),
        ));

        let mut registry = Self::new();
        registry.register(Arc::new(GoogleDriveAdapter::new(
            client.clone(),
            config.google_api_key.clone(),
        )));
        registry.register(Arc::new(NotionAdapter::new(client.clone())));
        registry.register(Arc::new(GitHubAdapter::new(client.clone())));
        registry.register(Arc::new(SlackAdapter::new(client.clone())));
        registry.register(Arc::new(DiscordAdapter::new(client.clone())));
        registry.register(Arc::new(EmailAdapter::new(mailer, config.email_from.clone())));
        registry.register(Arc::new(WebhookAdapter::new(client)));
        registry
    }

    /// Register an adapter, replacing any previous one for the same provider.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let provider = adapter.metadata().name;
        self.adapters.insert(provider, adapter);
    }

    pub fn get(&self, provider: ProviderType) -> Result<Arc<dyn ProviderAdapter>, RegistryError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: provider.to_string(),
            })
    }

    /// Metadata for all registered adapters, ordered by provider name.
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        let mut metadata: Vec<_> = self
            .adapters
            .values()
            .map(|adapter| adapter.metadata())
            .collect();
        metadata.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Action;

    #[test]
    fn empty_registry_reports_missing_provider() {
        let registry = Registry::new();
        let err = registry.get(ProviderType::Slack).err().unwrap();
        assert_eq!(err.to_string(), "Provider 'slack' not found");
    }

    #[test]
    fn registered_adapter_is_found_and_listed() {
        let mut registry = Registry::new();
        registry.register(Arc::new(SlackAdapter::new(Client::new())));
        registry.register(Arc::new(NotionAdapter::new(Client::new())));

        let slack = registry.get(ProviderType::Slack).unwrap();
        assert!(slack.metadata().supports(&Action::SendMessage));

        let names: Vec<_> = registry
            .list_metadata()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec![ProviderType::Notion, ProviderType::Slack]);
    }
}
