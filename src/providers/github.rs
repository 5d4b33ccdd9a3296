//! GitHub adapter
//!
//! Repository and issue listings are returned as GitHub-shaped records rather
//! than documents: they describe projects, not knowledge content.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::providers::config::{OAuthTokenConfig, narrow};
use crate::providers::http::read_json;
use crate::providers::{
    Action, ActionData, AuthType, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput, required_str,
};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const PER_PAGE: &str = "20";

/// Repository summary returned by `fetch_repositories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub description: Option<String>,
    pub updated_at: Option<String>,
    pub language: Option<String>,
    pub stars: u64,
}

/// Open issue returned by `fetch_issues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: String,
    pub created_at: Option<String>,
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    id: u64,
    name: String,
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: u64,
    number: u64,
    title: String,
    html_url: String,
    state: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

impl From<RawRepository> for Repository {
    fn from(raw: RawRepository) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            full_name: raw.full_name,
            url: raw.html_url,
            description: raw.description,
            updated_at: raw.updated_at,
            language: raw.language,
            stars: raw.stargazers_count,
        }
    }
}

impl From<RawIssue> for Issue {
    fn from(raw: RawIssue) -> Self {
        Self {
            id: raw.id,
            number: raw.number,
            title: raw.title,
            url: raw.html_url,
            state: raw.state,
            created_at: raw.created_at,
            labels: raw.labels.into_iter().map(|label| label.name).collect(),
        }
    }
}

/// Validate an `owner/name` repository reference.
fn parse_repo<'a>(repo: &'a str, action: &Action) -> Result<(&'a str, &'a str), ProviderError> {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.chars().all(|c| c == '.')
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    match repo.trim().split_once('/') {
        Some((owner, name)) if valid_part(owner) && valid_part(name) => Ok((owner, name)),
        _ => Err(ProviderError::invalid_payload(
            action,
            format!("repo must look like owner/name, got '{repo}'"),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct GitHubAdapter {
    client: Client,
    base_url: String,
}

impl GitHubAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_GITHUB_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header(ACCEPT, GITHUB_ACCEPT)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::Github, err))?;
        read_json(ProviderType::Github, response).await
    }
}

#[async_trait]
impl ProviderAdapter for GitHubAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::Github,
            AuthType::OAuth2,
            &[
                Action::TestConnection,
                Action::FetchRepositories,
                Action::FetchIssues,
            ],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: OAuthTokenConfig = narrow(ProviderType::Github, &integration.config)?;
        let token = config.access_token.as_str();

        match action {
            Action::TestConnection => {
                let user: GitHubUser = self.fetch(self.get("/user", token)).await?;
                let identity = user
                    .login
                    .or(user.name)
                    .unwrap_or_else(|| user.id.to_string());
                Ok(ProviderOutput::new(
                    format!("Connected to GitHub as {identity}"),
                    ActionData::Identity { identity },
                ))
            }
            Action::FetchRepositories => {
                let raw: Vec<RawRepository> = self
                    .fetch(
                        self.get("/user/repos", token)
                            .query(&[("sort", "updated"), ("per_page", PER_PAGE)]),
                    )
                    .await?;
                let repositories: Vec<Repository> = raw.into_iter().map(Into::into).collect();
                Ok(ProviderOutput::new(
                    format!("Fetched {} repositories", repositories.len()),
                    ActionData::Repositories { repositories },
                ))
            }
            Action::FetchIssues => {
                let (owner, name) = parse_repo(required_str(payload, "repo", action)?, action)?;
                let raw: Vec<RawIssue> = self
                    .fetch(
                        self.get(&format!("/repos/{owner}/{name}/issues"), token)
                            .query(&[("state", "open"), ("per_page", PER_PAGE)]),
                    )
                    .await?;
                let issues: Vec<Issue> = raw.into_iter().map(Into::into).collect();
                Ok(ProviderOutput::new(
                    format!("Fetched {} open issues from {owner}/{name}", issues.len()),
                    ActionData::Issues { issues },
                ))
            }
            other => Err(ProviderError::unsupported_action(ProviderType::Github, other)),
        }
    }
}
