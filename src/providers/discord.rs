//! Discord incoming-webhook adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::providers::config::{DiscordConfig, narrow};
use crate::providers::http::ensure_success;
use crate::providers::{
    Action, ActionData, AuthType, BOT_USERNAME, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput, required_str,
};

const TEST_MESSAGE: &str = "Test message from your knowledge base: the Discord integration is connected.";

#[derive(Debug, Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct DiscordAdapter {
    client: Client,
}

impl DiscordAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn post(&self, config: &DiscordConfig, content: &str) -> Result<u16, ProviderError> {
        let body = DiscordMessage {
            content,
            username: BOT_USERNAME,
            avatar_url: config.avatar_url.as_ref().map(|url| url.as_str()),
        };
        let response = self
            .client
            .post(config.webhook_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Discord, err))?;
        let response = ensure_success(ProviderType::Discord, response).await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ProviderAdapter for DiscordAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Discord,
            AuthType::WebhookUrl,
            &[Action::TestConnection, Action::SendMessage],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: DiscordConfig = narrow(ProviderType::Discord, &integration.config)?;

        match action {
            Action::TestConnection => {
                self.post(&config, TEST_MESSAGE).await?;
                Ok(ProviderOutput::new(
                    "Discord connection successful",
                    ActionData::Identity {
                        identity: BOT_USERNAME.to_string(),
                    },
                ))
            }
            Action::SendMessage => {
                let content = required_str(payload, "message", action)?;
                let status = self.post(&config, content).await?;
                Ok(ProviderOutput::new(
                    "Message sent to Discord",
                    ActionData::Delivered {
                        status,
                        response: None,
                    },
                ))
            }
            other => Err(ProviderError::unsupported_action(
                ProviderType::Discord,
                other,
            )),
        }
    }
}
