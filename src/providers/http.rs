//! Shared outbound HTTP plumbing for adapters and OAuth providers.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::models::ProviderType;
use crate::providers::ProviderError;

/// Client identifier sent on every outbound request.
pub const USER_AGENT: &str = concat!("KB-Integrations/", env!("CARGO_PKG_VERSION"));

const BODY_SNIPPET_CHARS: usize = 200;

/// Build the shared client. `timeout` bounds each request end to end.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
}

/// Client for OAuth token endpoints. Redirects are never followed.
pub fn build_oauth_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
}

/// Turn a non-2xx response into [`ProviderError::Upstream`].
pub async fn ensure_success(
    provider: ProviderType,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.ok().filter(|b| !b.trim().is_empty());
    Err(ProviderError::Upstream {
        provider,
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
        body: body.map(|b| truncate_chars(&b, BODY_SNIPPET_CHARS, "...")),
    })
}

/// Check the status, then decode the body as JSON.
pub async fn read_json<T: DeserializeOwned>(
    provider: ProviderType,
    response: Response,
) -> Result<T, ProviderError> {
    let response = ensure_success(provider, response).await?;
    let text = response
        .text()
        .await
        .map_err(|err| ProviderError::from_reqwest(provider, err))?;
    serde_json::from_str(&text).map_err(|err| ProviderError::malformed(provider, err.to_string()))
}

/// Cut `text` to at most `max` characters, appending `marker` when cut.
pub fn truncate_chars(text: &str, max: usize, marker: &str) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], marker),
        None => text.to_string(),
    }
}
