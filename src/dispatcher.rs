//! Action dispatcher
//!
//! Loads an integration, picks its adapter from the [`Registry`], runs the
//! action under a timeout and folds every adapter outcome into an
//! [`ActionResult`]. Only request-shape and store failures escape as
//! [`DispatchError`].

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::integration::Model as Integration;
use crate::providers::{Action, ActionData, ErrorKind, ProviderError, Registry};
use crate::repositories::{NewActivity, Store, StoreError};

/// Body of `POST /integration-action`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub integration_id: Option<Uuid>,
    pub action: Option<String>,
    /// Action payload; unknown fields are ignored by adapters
    #[serde(default, alias = "payload")]
    #[schema(value_type = Object)]
    pub data: JsonValue,
}

/// Outcome of one dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ActionResult {
    pub fn succeeded(message: impl Into<String>, data: ActionData) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error: Some(message.clone()),
            message,
            data: None,
            error_kind: Some(kind),
        }
    }
}

impl From<ProviderError> for ActionResult {
    fn from(err: ProviderError) -> Self {
        ActionResult::failed(err.kind(), err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Integration not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    action_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>, action_timeout: Duration) -> Self {
        Self {
            store,
            registry,
            action_timeout,
        }
    }

    /// Validate the request, load the integration and run the action.
    ///
    /// Inactive integrations are accepted so draft credentials can be tested.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<ActionResult, DispatchError> {
        let integration_id = request
            .integration_id
            .ok_or_else(|| DispatchError::InvalidRequest("integrationId is required".into()))?;
        let action = request
            .action
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Action::parse)
            .ok_or_else(|| DispatchError::InvalidRequest("action is required".into()))?;

        let integration = self
            .store
            .get_integration(integration_id)
            .await?
            .ok_or(DispatchError::NotFound(integration_id))?;

        Ok(self.run(&integration, &action, &request.data).await)
    }

    /// Run `action` against an already loaded integration.
    #[instrument(
        skip_all,
        fields(integration_id = %integration.id, provider = %integration.integration_type, action = %action)
    )]
    pub async fn run(
        &self,
        integration: &Integration,
        action: &Action,
        payload: &JsonValue,
    ) -> ActionResult {
        let adapter = match integration
            .provider_type()
            .map_err(|err| err.to_string())
            .and_then(|provider| self.registry.get(provider).map_err(|err| err.to_string()))
        {
            Ok(adapter) => adapter,
            Err(message) => {
                warn!(reason = %message, "No adapter for integration type");
                record(&integration.integration_type, action, "unsupported_provider");
                return ActionResult::failed(ErrorKind::UnsupportedProvider, message);
            }
        };

        let outcome = match tokio::time::timeout(
            self.action_timeout,
            adapter.execute(integration, action, payload),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout {
                provider: adapter.metadata().name,
            }),
        };

        match outcome {
            Ok(output) => {
                record(&integration.integration_type, action, "success");
                info!(outcome = %output.message, "Action succeeded");
                self.log_activity(integration, action, &output.data).await;
                ActionResult::succeeded(output.message, output.data)
            }
            Err(err) => {
                record(&integration.integration_type, action, err.kind().as_str());
                match err.operator_detail() {
                    Some(detail) => error!(error = %err, detail, "Provider is not configured"),
                    None => warn!(error = %err, kind = err.kind().as_str(), "Action failed"),
                }
                err.into()
            }
        }
    }

    /// Append the audit entry. A failed append does not undo the action.
    async fn log_activity(&self, integration: &Integration, action: &Action, data: &ActionData) {
        let entry = NewActivity {
            team_id: integration.team_id,
            action: format!("Integration {action}"),
            metadata: json!({
                "integration_type": integration.integration_type,
                "integration_name": integration.integration_name,
                "action": action.as_str(),
                "result": data.summary(),
            }),
        };
        if let Err(err) = self.store.append_activity(entry).await {
            error!(error = %err, "Failed to append activity log entry");
        }
    }
}

fn record(provider: &str, action: &Action, outcome: &'static str) {
    counter!(
        "integration_actions_total",
        "provider" => provider.to_string(),
        "action" => action.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
