//! Generic outbound webhook adapter
//!
//! Posts the action payload as JSON to the configured URL. When a shared
//! secret is configured the request carries it verbatim in
//! `X-Webhook-Secret` and an HMAC-SHA256 of the body in
//! `X-Webhook-Signature`.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{Value as JsonValue, json};
use sha2::Sha256;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::providers::config::{WebhookConfig, narrow};
use crate::providers::http::ensure_success;
use crate::providers::{
    Action, ActionData, AuthType, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput,
};

type HmacSha256 = Hmac<Sha256>;

pub const SECRET_HEADER: &str = "x-webhook-secret";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Hex HMAC-SHA256 of `body`, formatted as `sha256=<hex>`.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String, ProviderError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|err| ProviderError::InvalidConfig {
            provider: ProviderType::Webhook,
            details: format!("secret cannot be used for signing: {err}"),
        })?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[derive(Debug, Clone)]
pub struct WebhookAdapter {
    client: Client,
}

impl WebhookAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn method(config: &WebhookConfig) -> Result<Method, ProviderError> {
        match config.method.as_deref().map(str::to_ascii_uppercase).as_deref() {
            None | Some("POST") => Ok(Method::POST),
            Some("PUT") => Ok(Method::PUT),
            Some("PATCH") => Ok(Method::PATCH),
            Some(other) => Err(ProviderError::InvalidConfig {
                provider: ProviderType::Webhook,
                details: format!("unsupported method {other}"),
            }),
        }
    }

    async fn deliver(
        &self,
        config: &WebhookConfig,
        body: &JsonValue,
    ) -> Result<(u16, JsonValue), ProviderError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|err| ProviderError::malformed(ProviderType::Webhook, err.to_string()))?;

        let mut request = self
            .client
            .request(Self::method(config)?, config.url.clone())
            .header(CONTENT_TYPE, "application/json");

        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ProviderError::InvalidConfig {
                    provider: ProviderType::Webhook,
                    details: format!("header {name}: {err}"),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ProviderError::InvalidConfig {
                    provider: ProviderType::Webhook,
                    details: format!("header {name}: {err}"),
                }
            })?;
            request = request.header(name, value);
        }

        if let Some(secret) = config.secret.as_deref().filter(|s| !s.is_empty()) {
            request = request
                .header(SECRET_HEADER, secret)
                .header(SIGNATURE_HEADER, sign_body(secret, &bytes)?);
        }

        let response = request
            .body(bytes)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Webhook, err))?;
        let response = ensure_success(ProviderType::Webhook, response).await?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Webhook, err))?;

        let parsed = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        Ok((status, parsed))
    }
}

#[async_trait]
impl ProviderAdapter for WebhookAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Webhook,
            AuthType::WebhookUrl,
            &[Action::TestConnection, Action::SendWebhook],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: WebhookConfig = narrow(ProviderType::Webhook, &integration.config)?;

        match action {
            Action::TestConnection => {
                let body = json!({
                    "test": true,
                    "message": "Test webhook from your knowledge base",
                    "timestamp": Utc::now().to_rfc3339(),
                });
                let (status, _) = self.deliver(&config, &body).await?;
                Ok(ProviderOutput::new(
                    format!("Webhook endpoint responded with {status}"),
                    ActionData::Identity {
                        identity: config.url.host_str().unwrap_or_default().to_string(),
                    },
                ))
            }
            Action::SendWebhook => {
                let (status, response) = self.deliver(&config, payload).await?;
                Ok(ProviderOutput::new(
                    "Webhook delivered",
                    ActionData::Delivered {
                        status,
                        response: Some(response),
                    },
                ))
            }
            other => Err(ProviderError::unsupported_action(
                ProviderType::Webhook,
                other,
            )),
        }
    }
}
