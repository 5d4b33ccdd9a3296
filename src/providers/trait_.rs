//! Provider adapter trait definition
//!
//! Every provider type implements [`ProviderAdapter`]; the dispatcher only
//! ever talks to this interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use utoipa::ToSchema;

use crate::models::ProviderType;
use crate::models::integration::Model as Integration;
use crate::normalization::{NormalizedDocument, normalize};
use crate::providers::ProviderMetadata;
use crate::providers::github::{Issue, Repository};
use crate::providers::google_drive::DriveFileEntry;

/// Named operation an adapter can perform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    TestConnection,
    FetchDocuments,
    ListFolder,
    FetchRepositories,
    FetchIssues,
    SendMessage,
    SendEmail,
    SendWebhook,
    /// Any name not in the known set; adapters reject it
    Other(String),
}

impl Action {
    pub fn parse(name: &str) -> Self {
        match name {
            "test_connection" => Action::TestConnection,
            "fetch_documents" => Action::FetchDocuments,
            "list_folder" => Action::ListFolder,
            "fetch_repositories" => Action::FetchRepositories,
            "fetch_issues" => Action::FetchIssues,
            "send_message" => Action::SendMessage,
            "send_email" => Action::SendEmail,
            "send_webhook" => Action::SendWebhook,
            other => Action::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::TestConnection => "test_connection",
            Action::FetchDocuments => "fetch_documents",
            Action::ListFolder => "list_folder",
            Action::FetchRepositories => "fetch_repositories",
            Action::FetchIssues => "fetch_issues",
            Action::SendMessage => "send_message",
            Action::SendEmail => "send_email",
            Action::SendWebhook => "send_webhook",
            Action::Other(name) => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload returned by a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionData {
    /// `test_connection`: who the stored credential belongs to
    Identity { identity: String },
    /// Content listings, already normalized
    Documents { documents: Vec<NormalizedDocument> },
    /// Google Drive folder listing with file sizes
    Folder {
        files: Vec<DriveFileEntry>,
        #[serde(rename = "totalFiles")]
        total_files: usize,
    },
    Repositories { repositories: Vec<Repository> },
    Issues { issues: Vec<Issue> },
    /// Notification accepted by the destination
    Delivered {
        status: u16,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<JsonValue>,
    },
}

impl ActionData {
    /// Compact description stored in the activity log.
    pub fn summary(&self) -> JsonValue {
        match self {
            ActionData::Identity { identity } => json!({ "identity": identity }),
            ActionData::Documents { documents } => json!({ "documents": documents.len() }),
            ActionData::Folder { total_files, .. } => json!({ "files": total_files }),
            ActionData::Repositories { repositories } => {
                json!({ "repositories": repositories.len() })
            }
            ActionData::Issues { issues } => json!({ "issues": issues.len() }),
            ActionData::Delivered { status, .. } => json!({ "status": status }),
        }
    }

    /// Documents contained in a fetch result. Repository listings are
    /// normalized on the way out; notification results yield `None`.
    pub fn into_documents(self) -> Option<Vec<NormalizedDocument>> {
        match self {
            ActionData::Documents { documents } => Some(documents),
            ActionData::Folder { files, .. } => {
                Some(files.into_iter().map(|entry| entry.document).collect())
            }
            ActionData::Repositories { repositories } => Some(
                repositories
                    .iter()
                    .filter_map(|repo| serde_json::to_value(repo).ok())
                    .map(|raw| normalize(ProviderType::Github, &raw))
                    .collect(),
            ),
            ActionData::Identity { .. } | ActionData::Issues { .. } | ActionData::Delivered { .. } => {
                None
            }
        }
    }
}

/// Successful adapter result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOutput {
    pub message: String,
    pub data: ActionData,
}

impl ProviderOutput {
    pub fn new(message: impl Into<String>, data: ActionData) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Failure classification shared by adapters, the dispatcher and HTTP responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    InvalidConfig,
    InvalidPayload,
    UnsupportedProvider,
    UnsupportedAction,
    Upstream,
    Network,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::UnsupportedProvider => "unsupported_provider",
            ErrorKind::UnsupportedAction => "unsupported_action",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
        }
    }

    /// Network failures and timeouts may succeed when retried by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }
}

/// Adapter failure. The `Display` text is user-facing; server-side detail for
/// configuration problems is available through [`ProviderError::operator_detail`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{} integration is not configured on this server", .provider.display_name())]
    Configuration {
        provider: ProviderType,
        details: String,
    },
    #[error("{} integration config is invalid: {details}", .provider.display_name())]
    InvalidConfig {
        provider: ProviderType,
        details: String,
    },
    #[error("Invalid payload for {action}: {details}")]
    InvalidPayload { action: String, details: String },
    #[error("Unsupported {} action: {action}", .provider.display_name())]
    UnsupportedAction {
        provider: ProviderType,
        action: String,
    },
    #[error(
        "{} API error: {status} {reason}{}",
        .provider.display_name(),
        body_suffix(.body)
    )]
    Upstream {
        provider: ProviderType,
        status: u16,
        reason: String,
        body: Option<String>,
    },
    #[error("{} returned an unexpected response: {details}", .provider.display_name())]
    MalformedResponse {
        provider: ProviderType,
        details: String,
    },
    #[error("{} request failed: {details}", .provider.display_name())]
    Network {
        provider: ProviderType,
        details: String,
    },
    #[error("{} request timed out", .provider.display_name())]
    Timeout { provider: ProviderType },
}

fn body_suffix(body: &Option<String>) -> String {
    match body.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!(" - {text}"),
        _ => String::new(),
    }
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Configuration { .. } => ErrorKind::Configuration,
            ProviderError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            ProviderError::InvalidPayload { .. } => ErrorKind::InvalidPayload,
            ProviderError::UnsupportedAction { .. } => ErrorKind::UnsupportedAction,
            ProviderError::Upstream { .. } | ProviderError::MalformedResponse { .. } => {
                ErrorKind::Upstream
            }
            ProviderError::Network { .. } => ErrorKind::Network,
            ProviderError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn configuration(provider: ProviderType, details: impl Into<String>) -> Self {
        ProviderError::Configuration {
            provider,
            details: details.into(),
        }
    }

    pub fn invalid_payload(action: &Action, details: impl Into<String>) -> Self {
        ProviderError::InvalidPayload {
            action: action.to_string(),
            details: details.into(),
        }
    }

    pub fn unsupported_action(provider: ProviderType, action: &Action) -> Self {
        ProviderError::UnsupportedAction {
            provider,
            action: action.to_string(),
        }
    }

    pub fn malformed(provider: ProviderType, details: impl Into<String>) -> Self {
        ProviderError::MalformedResponse {
            provider,
            details: details.into(),
        }
    }

    /// Map a transport error. The URL is stripped because some requests carry
    /// an API key in the query string.
    pub fn from_reqwest(provider: ProviderType, err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            ProviderError::Timeout { provider }
        } else if err.is_decode() {
            ProviderError::malformed(provider, err.to_string())
        } else {
            ProviderError::Network {
                provider,
                details: err.to_string(),
            }
        }
    }

    /// Detail meant for server logs rather than end users.
    pub fn operator_detail(&self) -> Option<&str> {
        match self {
            ProviderError::Configuration { details, .. } => Some(details),
            _ => None,
        }
    }
}

/// Interface implemented once per provider type.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, auth mechanism and supported actions.
    fn metadata(&self) -> ProviderMetadata;

    /// Run `action` against the provider using the integration's stored config.
    ///
    /// Adapters own the unknown-action check and must answer
    /// [`ProviderError::UnsupportedAction`] for anything they do not handle.
    async fn execute(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> Result<ProviderOutput, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for name in [
            "test_connection",
            "fetch_documents",
            "list_folder",
            "fetch_repositories",
            "fetch_issues",
            "send_message",
            "send_email",
            "send_webhook",
        ] {
            let action = Action::parse(name);
            assert!(!matches!(action, Action::Other(_)), "{name}");
            assert_eq!(action.as_str(), name);
        }
        assert_eq!(Action::parse("explode"), Action::Other("explode".into()));
    }

    #[test]
    fn upstream_message_carries_status_reason_and_body() {
        let err = ProviderError::Upstream {
            provider: ProviderType::Slack,
            status: 500,
            reason: "Internal Server Error".into(),
            body: Some("no_service".into()),
        };
        assert_eq!(
            err.to_string(),
            "Slack API error: 500 Internal Server Error - no_service"
        );
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn unsupported_action_names_action_and_provider() {
        let err = ProviderError::unsupported_action(
            ProviderType::Discord,
            &Action::parse("fetch_documents"),
        );
        assert_eq!(err.to_string(), "Unsupported Discord action: fetch_documents");
    }

    #[test]
    fn configuration_error_hides_operator_detail_from_display() {
        let err = ProviderError::configuration(ProviderType::Email, "RESEND_API_KEY is not set");
        assert_eq!(err.to_string(), "Email integration is not configured on this server");
        assert_eq!(err.operator_detail(), Some("RESEND_API_KEY is not set"));
        assert!(!err.kind().is_transient());
    }
}
