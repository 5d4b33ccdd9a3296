//! Google Drive adapter
//!
//! Reads go through the integration's OAuth bearer token when one is stored.
//! Folder listings may fall back to the server API key, which only sees
//! publicly shared folders.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::normalization::{NormalizedDocument, normalize};
use crate::providers::config::{GoogleDriveConfig, narrow};
use crate::providers::http::{ensure_success, read_json, truncate_chars};
use crate::providers::{
    Action, ActionData, AuthType, ProviderAdapter, ProviderError, ProviderMetadata,
    ProviderOutput, optional_str,
};

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
const RECENT_PAGE_SIZE: &str = "20";
const LIST_FIELDS: &str = "files(id,name,mimeType,size,modifiedTime,webViewLink)";
const MAX_CONTENT_CHARS: usize = 5000;
const CONTENT_FETCH_CONCURRENCY: usize = 4;
const TRUNCATION_MARKER: &str = "... [truncated]";

/// Credential used for a Drive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveAuth {
    Bearer(String),
    ApiKey(String),
}

impl DriveAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            DriveAuth::Bearer(token) => request.bearer_auth(token),
            DriveAuth::ApiKey(key) => request.query(&[("key", key)]),
        }
    }
}

/// One file of a folder listing: the normalized document plus its size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileEntry {
    #[serde(flatten)]
    pub document: NormalizedDocument,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub size_label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    mime_type: String,
    /// Drive reports byte sizes as decimal strings
    #[serde(default)]
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct About {
    user: AboutUser,
}

/// How a file's text body is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentSource {
    Export,
    Download,
    Skip,
}

impl ContentSource {
    fn for_mime(mime_type: &str) -> Self {
        if mime_type == GOOGLE_DOC_MIME {
            ContentSource::Export
        } else if mime_type.starts_with("text/") || mime_type == "application/json" {
            ContentSource::Download
        } else {
            ContentSource::Skip
        }
    }
}

/// Human readable byte size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exponent = 0;
    let mut scale = 1u64;
    while exponent < UNITS.len() - 1 && bytes >= scale * 1024 {
        scale *= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / scale as f64;
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exponent])
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[derive(Debug, Clone)]
pub struct GoogleDriveAdapter {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleDriveAdapter {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: DEFAULT_DRIVE_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Pick the credential for an integration: its token, else the server key.
    pub fn auth_for(&self, config: Option<&GoogleDriveConfig>) -> Result<DriveAuth, ProviderError> {
        if let Some(token) = config
            .and_then(|config| config.access_token.as_deref())
            .filter(|token| !token.is_empty())
        {
            return Ok(DriveAuth::Bearer(token.to_string()));
        }
        self.api_key
            .clone()
            .map(DriveAuth::ApiKey)
            .ok_or_else(|| {
                ProviderError::configuration(
                    ProviderType::GoogleDrive,
                    "no access token on the integration and KB_GOOGLE_API_KEY is not set",
                )
            })
    }

    /// List the files directly inside `folder_id`, with text content where available.
    pub async fn list_folder(
        &self,
        auth: &DriveAuth,
        folder_id: &str,
    ) -> Result<Vec<DriveFileEntry>, ProviderError> {
        let query = format!("'{}' in parents", escape_query_literal(folder_id));
        let request = self
            .client
            .get(format!("{}/files", self.base_url))
            .query(&[("q", query.as_str()), ("fields", LIST_FIELDS)]);
        let response = auth
            .apply(request)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::GoogleDrive, err))?;
        let listing: FileList = read_json(ProviderType::GoogleDrive, response).await?;

        let files = listing
            .files
            .into_iter()
            .map(|raw| {
                serde_json::from_value::<DriveFile>(raw.clone())
                    .map(|file| (file, raw))
                    .map_err(|err| ProviderError::malformed(ProviderType::GoogleDrive, err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let contents = self.folder_contents(auth, &files).await;
        let entries = files
            .into_iter()
            .zip(contents)
            .map(|((file, raw), content)| {
                let mut document = normalize(ProviderType::GoogleDrive, &raw);
                document.content = content.unwrap_or_default();
                let size = file.size.as_deref().and_then(|s| s.parse::<u64>().ok());
                DriveFileEntry {
                    document,
                    mime_type: file.mime_type,
                    size,
                    size_label: size.map(format_file_size).unwrap_or_else(|| "Unknown".to_string()),
                }
            })
            .collect();
        Ok(entries)
    }

    /// Fetch file bodies with at most `CONTENT_FETCH_CONCURRENCY` requests in
    /// flight. Results line up with `files`.
    async fn folder_contents(
        &self,
        auth: &DriveAuth,
        files: &[(DriveFile, JsonValue)],
    ) -> Vec<Option<String>> {
        let semaphore = Arc::new(Semaphore::new(CONTENT_FETCH_CONCURRENCY));
        let mut tasks = JoinSet::new();
        for (index, (file, _)) in files.iter().enumerate() {
            if ContentSource::for_mime(&file.mime_type) == ContentSource::Skip {
                continue;
            }
            let adapter = self.clone();
            let auth = auth.clone();
            let semaphore = semaphore.clone();
            let file_id = file.id.clone();
            let mime_type = file.mime_type.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, adapter.file_content(&auth, &file_id, &mime_type).await)
            });
        }

        let mut contents = vec![None; files.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, content)) => contents[index] = content,
                Err(err) => warn!(error = %err, "Drive content task failed"),
            }
        }
        contents
    }

    /// Fetch a file's text body. Failures are logged and yield `None`.
    async fn file_content(&self, auth: &DriveAuth, file_id: &str, mime_type: &str) -> Option<String> {
        let request = match ContentSource::for_mime(mime_type) {
            ContentSource::Export => self
                .client
                .get(format!("{}/files/{file_id}/export", self.base_url))
                .query(&[("mimeType", "text/plain")]),
            ContentSource::Download => self
                .client
                .get(format!("{}/files/{file_id}", self.base_url))
                .query(&[("alt", "media")]),
            ContentSource::Skip => return None,
        };

        let result = async {
            let response = auth
                .apply(request)
                .send()
                .await
                .map_err(|err| ProviderError::from_reqwest(ProviderType::GoogleDrive, err))?;
            let response = ensure_success(ProviderType::GoogleDrive, response).await?;
            response
                .text()
                .await
                .map_err(|err| ProviderError::from_reqwest(ProviderType::GoogleDrive, err))
        }
        .await;

        match result {
            Ok(text) => Some(truncate_chars(&text, MAX_CONTENT_CHARS, TRUNCATION_MARKER)),
            Err(err) => {
                debug!(file_id, error = %err, "Skipping Drive file content");
                None
            }
        }
    }

    async fn recent_files(&self, auth: &DriveAuth) -> Result<Vec<NormalizedDocument>, ProviderError> {
        let request = self
            .client
            .get(format!("{}/files", self.base_url))
            .query(&[("pageSize", RECENT_PAGE_SIZE), ("orderBy", "modifiedTime desc")]);
        let response = auth
            .apply(request)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::GoogleDrive, err))?;
        let listing: FileList = read_json(ProviderType::GoogleDrive, response).await?;
        Ok(listing
            .files
            .iter()
            .map(|raw| normalize(ProviderType::GoogleDrive, raw))
            .collect())
    }

    async fn whoami(&self, auth: &DriveAuth) -> Result<String, ProviderError> {
        let request = self
            .client
            .get(format!("{}/about", self.base_url))
            .query(&[("fields", "user")]);
        let response = auth
            .apply(request)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(ProviderType::GoogleDrive, err))?;
        let about: About = read_json(ProviderType::GoogleDrive, response).await?;
        about
            .user
            .display_name
            .or(about.user.email_address)
            .ok_or_else(|| ProviderError::malformed(ProviderType::GoogleDrive, "about.user is empty"))
    }
}

#[async_trait]
impl ProviderAdapter for GoogleDriveAdapter {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata::new(
            ProviderType::GoogleDrive,
            AuthType::OAuth2,
            &[Action::TestConnection, Action::FetchDocuments, Action::ListFolder],
        )
    }

    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError> {
        let config: GoogleDriveConfig = narrow(ProviderType::GoogleDrive, &integration.config)?;

        match action {
            Action::TestConnection => {
                let identity = self.whoami(&self.bearer_only(&config)?).await?;
                Ok(ProviderOutput::new(
                    format!("Connected to Google Drive as {identity}"),
                    ActionData::Identity { identity },
                ))
            }
            Action::FetchDocuments => {
                let documents = self.recent_files(&self.bearer_only(&config)?).await?;
                Ok(ProviderOutput::new(
                    format!("Fetched {} Google Drive files", documents.len()),
                    ActionData::Documents { documents },
                ))
            }
            Action::ListFolder => {
                let folder_id = optional_str(payload, "folderId")
                    .or_else(|| optional_str(payload, "folder_id"))
                    .or(config.folder_id.as_deref())
                    .ok_or_else(|| {
                        ProviderError::invalid_payload(
                            action,
                            "folderId is required when the integration has no folder_id",
                        )
                    })?;
                let auth = self.auth_for(Some(&config))?;
                let files = self.list_folder(&auth, folder_id).await?;
                let total_files = files.len();
                Ok(ProviderOutput::new(
                    format!("Listed {total_files} files from Google Drive folder"),
                    ActionData::Folder { files, total_files },
                ))
            }
            other => Err(ProviderError::unsupported_action(ProviderType::GoogleDrive, other)),
        }
    }
}

impl GoogleDriveAdapter {
    /// Account-scoped reads need the user's token; the API key cannot see them.
    fn bearer_only(&self, config: &GoogleDriveConfig) -> Result<DriveAuth, ProviderError> {
        config
            .access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| DriveAuth::Bearer(token.to_string()))
            .ok_or_else(|| ProviderError::InvalidConfig {
                provider: ProviderType::GoogleDrive,
                details: "missing access_token; connect the integration first".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes_use_binary_units_with_trimmed_decimals() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 + 1024 * 1024 * 256), "3.25 GB");
    }

    #[test]
    fn content_source_depends_on_mime_type() {
        assert_eq!(ContentSource::for_mime(GOOGLE_DOC_MIME), ContentSource::Export);
        assert_eq!(ContentSource::for_mime("text/markdown"), ContentSource::Download);
        assert_eq!(ContentSource::for_mime("application/json"), ContentSource::Download);
        assert_eq!(ContentSource::for_mime("image/png"), ContentSource::Skip);
    }

    #[test]
    fn folder_ids_are_escaped_inside_the_query() {
        assert_eq!(escape_query_literal("abc"), "abc");
        assert_eq!(escape_query_literal("a'b"), "a\\'b");
    }

    #[test]
    fn auth_prefers_integration_token_over_api_key() {
        let adapter = GoogleDriveAdapter::new(Client::new(), Some("server-key".into()));
        let config = GoogleDriveConfig {
            access_token: Some("tok".into()),
            refresh_token: None,
            folder_id: None,
        };
        assert_eq!(adapter.auth_for(Some(&config)).unwrap(), DriveAuth::Bearer("tok".into()));
        assert_eq!(adapter.auth_for(None).unwrap(), DriveAuth::ApiKey("server-key".into()));

        let keyless = GoogleDriveAdapter::new(Client::new(), Some("  ".into()));
        let err = keyless.auth_for(None).unwrap_err();
        assert_eq!(err.kind(), crate::providers::ErrorKind::Configuration);
    }
}
