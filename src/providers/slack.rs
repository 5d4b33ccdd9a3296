//! Slack incoming-webhook adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::providers::config::{SlackConfig, narrow};
use crate::providers::http::ensure_success;
use crate::providers::{
    Action, ActionData, AuthType, BOT_USERNAME, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput, required_str,
};

const DEFAULT_CHANNEL: &str = "#general";
const TEST_MESSAGE: &str = "Test message from your knowledge base: the Slack integration is connected.";

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
    channel: &'a str,
    username: &'a str,
}

#[derive(Debug, Clone)]
pub struct SlackAdapter {
    client: Client,
}

impl SlackAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn post(&self, config: &SlackConfig, text: &str) -> Result<u16, ProviderError> {
        let body = SlackMessage {
            text,
            channel: config.channel.as_deref().unwrap_or(DEFAULT_CHANNEL),
            username: BOT_USERNAME,
        };
        let response = self
            .client
            .post(config.webhook_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Slack, err))?;
        let response = ensure_success(ProviderType::Slack, response).await?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ProviderAdapter for SlackAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Slack,
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
        let config: SlackConfig = narrow(ProviderType::Slack, &integration.config)?;

        match action {
            Action::TestConnection => {
                self.post(&config, TEST_MESSAGE).await?;
                let channel = config.channel.as_deref().unwrap_or(DEFAULT_CHANNEL);
                Ok(ProviderOutput::new(
                    "Slack connection successful",
                    ActionData::Identity {
                        identity: channel.to_string(),
                    },
                ))
            }
            Action::SendMessage => {
                let text = required_str(payload, "message", action)?;
                let status = self.post(&config, text).await?;
                Ok(ProviderOutput::new(
                    "Message sent to Slack",
                    ActionData::Delivered {
                        status,
                        response: None,
                    },
                ))
            }
            other => Err(ProviderError::unsupported_action(ProviderType::Slack, other)),
        }
    }
}
