//! Sync orchestrator
//!
//! Pulls documents from every active integration of a team through the
//! [`ActionDispatcher`] and upserts them into the document store. One
//! failing integration never aborts the others.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dispatcher::ActionDispatcher;
use crate::models::{ProviderType, UnknownProviderType};
use crate::models::integration::Model as Integration;
use crate::providers::config::{GoogleDriveConfig, narrow};
use crate::providers::{Action, ErrorKind};
use crate::repositories::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Succeeded,
    Failed,
    /// Provider has nothing to fetch (notification-only)
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationOutcome {
    pub integration_id: Uuid,
    pub integration_type: String,
    pub integration_name: String,
    pub status: SyncStatus,
    /// Ids of the documents upserted for this integration
    pub document_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub integration_id: Uuid,
    pub integration_type: String,
    pub message: String,
}

/// Summary of one `sync_team` pass. `attempted` excludes skipped integrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub team_id: Uuid,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub documents_upserted: usize,
    pub outcomes: Vec<IntegrationOutcome>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn from_outcomes(team_id: Uuid, outcomes: Vec<IntegrationOutcome>) -> Self {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        let succeeded = count(SyncStatus::Succeeded);
        let failed = count(SyncStatus::Failed);
        let failures = outcomes
            .iter()
            .filter(|o| o.status == SyncStatus::Failed)
            .map(|o| SyncFailure {
                integration_id: o.integration_id,
                integration_type: o.integration_type.clone(),
                message: o.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            team_id,
            attempted: succeeded + failed,
            succeeded,
            failed,
            skipped: count(SyncStatus::Skipped),
            documents_upserted: outcomes.iter().map(|o| o.document_ids.len()).sum(),
            outcomes,
            failures,
        }
    }
}

/// Fetch action used to sync an integration, or `None` when it has no content.
///
/// Rows whose type is not a known provider are an error, not a skip.
pub fn fetch_plan(integration: &Integration) -> Result<Option<(Action, JsonValue)>, UnknownProviderType> {
    Ok(match integration.provider_type()? {
        ProviderType::GoogleDrive => {
            let folder_id = narrow::<GoogleDriveConfig>(ProviderType::GoogleDrive, &integration.config)
                .ok()
                .and_then(|config| config.folder_id)
                .filter(|id| !id.trim().is_empty());
            Some(match folder_id {
                Some(folder_id) => (Action::ListFolder, json!({ "folderId": folder_id })),
                None => (Action::FetchDocuments, JsonValue::Null),
            })
        }
        ProviderType::Notion => Some((Action::FetchDocuments, JsonValue::Null)),
        ProviderType::Github => Some((Action::FetchRepositories, JsonValue::Null)),
        ProviderType::Slack | ProviderType::Discord | ProviderType::Email | ProviderType::Webhook => {
            None
        }
    })
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    dispatcher: ActionDispatcher,
    concurrency: usize,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn Store>, dispatcher: ActionDispatcher, concurrency: usize) -> Self {
        Self {
            store,
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Sync every active integration of `team_id`.
    #[instrument(skip(self), fields(concurrency = self.concurrency))]
    pub async fn sync_team(&self, team_id: Uuid) -> Result<SyncReport, StoreError> {
        let integrations = self.store.list_active_integrations(team_id).await?;
        info!(count = integrations.len(), "Starting team sync");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (index, integration) in integrations.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let this = self.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, this.sync_integration(team_id, &integration).await)
            });
        }

        let mut outcomes: Vec<Option<IntegrationOutcome>> = vec![None; integrations.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => error!(error = %err, "Sync task panicked"),
            }
        }

        let outcomes = outcomes
            .into_iter()
            .zip(&integrations)
            .map(|(outcome, integration)| {
                outcome.unwrap_or_else(|| {
                    failed(integration, None, "sync task aborted unexpectedly".to_string())
                })
            })
            .collect();

        let report = SyncReport::from_outcomes(team_id, outcomes);
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            documents = report.documents_upserted,
            "Team sync finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(integration_id = %integration.id, provider = %integration.integration_type))]
    async fn sync_integration(&self, team_id: Uuid, integration: &Integration) -> IntegrationOutcome {
        let outcome = self.fetch_and_store(team_id, integration).await;
        let label = match outcome.status {
            SyncStatus::Succeeded => "success",
            SyncStatus::Failed => "failure",
            SyncStatus::Skipped => "skipped",
        };
        counter!(
            "sync_integrations_total",
            "provider" => integration.integration_type.clone(),
            "outcome" => label
        )
        .increment(1);
        outcome
    }

    async fn fetch_and_store(&self, team_id: Uuid, integration: &Integration) -> IntegrationOutcome {
        let plan = match fetch_plan(integration) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "Integration has an unknown provider type");
                return failed(integration, Some(ErrorKind::UnsupportedProvider), err.to_string());
            }
        };
        let Some((action, payload)) = plan else {
            return IntegrationOutcome {
                integration_id: integration.id,
                integration_type: integration.integration_type.clone(),
                integration_name: integration.integration_name.clone(),
                status: SyncStatus::Skipped,
                document_ids: Vec::new(),
                error: None,
                error_kind: None,
            };
        };

        let result = self.dispatcher.run(integration, &action, &payload).await;
        if !result.success {
            warn!(error = %result.message, "Integration fetch failed");
            return failed(integration, result.error_kind, result.message);
        }

        let documents = result
            .data
            .and_then(|data| data.into_documents())
            .unwrap_or_default();

        let mut document_ids = Vec::with_capacity(documents.len());
        for document in &documents {
            if let Err(err) = self.store.upsert_document(team_id, document).await {
                error!(error = %err, document_id = %document.id, "Document upsert failed");
                return failed(integration, None, format!("Failed to store documents: {err}"));
            }
            document_ids.push(document.id.clone());
        }

        IntegrationOutcome {
            integration_id: integration.id,
            integration_type: integration.integration_type.clone(),
            integration_name: integration.integration_name.clone(),
            status: SyncStatus::Succeeded,
            document_ids,
            error: None,
            error_kind: None,
        }
    }
}

fn failed(integration: &Integration, kind: Option<ErrorKind>, message: String) -> IntegrationOutcome {
    IntegrationOutcome {
        integration_id: integration.id,
        integration_type: integration.integration_type.clone(),
        integration_name: integration.integration_name.clone(),
        status: SyncStatus::Failed,
        document_ids: Vec::new(),
        error: Some(message),
        error_kind: kind,
    }
}
