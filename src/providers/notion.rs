//! Notion adapter
//!
//! Uses the bearer token written by the Notion OAuth flow. Every request
//! carries the pinned `Notion-Version` header.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::normalization::normalize;
use crate::providers::config::{OAuthTokenConfig, narrow};
use crate::providers::http::read_json;
use crate::providers::{
    Action, ActionData, AuthType, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput,
};

pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
const SEARCH_PAGE_SIZE: u64 = 100;

#[derive(Debug, Deserialize)]
struct NotionUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct NotionAdapter {
    client: Client,
    base_url: String,
}

impl NotionAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_NOTION_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .header(ACCEPT, "application/json")
    }
}

#[async_trait]
impl ProviderAdapter for NotionAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Notion,
            AuthType::OAuth2,
            &[Action::TestConnection, Action::FetchDocuments],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        _payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: OAuthTokenConfig = narrow(ProviderType::Notion, &integration.config)?;

        match action {
            Action::TestConnection => {
                let response = self
                    .authorized(
                        self.client.get(format!("{}/users/me", self.base_url)),
                        &config.access_token,
                    )
                    .send()
                    .await
                    .map_err(|err| ProviderError::from_reqwest(ProviderType::Notion, err))?;
                let user: NotionUser = read_json(ProviderType::Notion, response).await?;
                let identity = user.name.filter(|name| !name.is_empty()).unwrap_or(user.id);
                Ok(ProviderOutput::new(
                    format!("Connected to Notion as {identity}"),
                    ActionData::Identity { identity },
                ))
            }
            Action::FetchDocuments => {
                let body = json!({
                    "filter": { "property": "object", "value": "page" },
                    "sort": { "direction": "descending", "timestamp": "last_edited_time" },
                    "page_size": SEARCH_PAGE_SIZE,
                });
                let response = self
                    .authorized(
                        self.client.post(format!("{}/search", self.base_url)),
                        &config.access_token,
                    )
                    .json(&body)
                    .send()
                    .await
                    .map_err(|err| ProviderError::from_reqwest(ProviderType::Notion, err))?;
                let search: SearchResponse = read_json(ProviderType::Notion, response).await?;

                let documents: Vec<_> = search
                    .results
                    .iter()
                    .map(|page| normalize(ProviderType::Notion, page))
                    .collect();
                Ok(ProviderOutput::new(
                    format!("Fetched {} Notion pages", documents.len()),
                    ActionData::Documents { documents },
                ))
            }
            other => Err(ProviderError::unsupported_action(ProviderType::Notion, other)),
        }
    }
}
