//! Email adapter
//!
//! The adapter only assembles the message; delivery goes through a [`Mailer`]
//! (Resend in production).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::providers::config::{EmailConfig, narrow};
use crate::providers::http::read_json;
use crate::providers::{
    Action, ActionData, AuthType, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput, optional_str,
};

pub const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";
const DEFAULT_SUBJECT: &str = "Notification";
const DEFAULT_BODY: &str = "<p>You have a new notification from your knowledge base.</p>";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Transactional email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message, returning the provider's message id when it gives one.
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

/// [`Mailer`] backed by the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: DEFAULT_RESEND_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<Option<String>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::configuration(ProviderType::Email, "KB_RESEND_API_KEY is not set")
        })?;

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(message)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Email, err))?;
        let body: ResendResponse = read_json(ProviderType::Email, response).await?;
        Ok(body.id)
    }
}

#[derive(Clone)]
pub struct EmailAdapter {
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl EmailAdapter {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    /// Subject defaults to `Notification`; the body prefers `html`, then `message`.
    pub fn build_message(&self, to: &str, payload: &JsonValue) -> EmailMessage {
        let subject = optional_str(payload, "subject").unwrap_or(DEFAULT_SUBJECT);
        let html = optional_str(payload, "html")
            .or_else(|| optional_str(payload, "message"))
            .unwrap_or(DEFAULT_BODY);
        EmailMessage {
            from: self.from.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for EmailAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Email,
            AuthType::ApiKey,
            &[Action::TestConnection, Action::SendEmail],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: EmailConfig = narrow(ProviderType::Email, &integration.config)?;

        match action {
            Action::TestConnection => {
                let message = self.build_message(
                    &config.email,
                    &json!({
                        "subject": "Test email from your knowledge base",
                        "html": "<p>Your email integration is connected.</p>",
                    }),
                );
                self.mailer.send(&message).await?;
                Ok(ProviderOutput::new(
                    "Test email sent",
                    ActionData::Identity {
                        identity: config.email,
                    },
                ))
            }
            Action::SendEmail => {
                let message = self.build_message(&config.email, payload);
                let id = self.mailer.send(&message).await?;
                Ok(ProviderOutput::new(
                    format!("Email sent to {}", config.email),
                    ActionData::Delivered {
                        status: 200,
                        response: Some(json!({ "id": id })),
                    },
                ))
            }
            other => Err(ProviderError::unsupported_action(ProviderType::Email, other)),
        }
    }
}
