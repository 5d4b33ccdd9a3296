//! # Repository Layer
//!
//! Per-table repositories over SeaORM plus the [`Store`] handle that the
//! dispatcher, OAuth flow and sync orchestrator receive at construction time.

pub mod activity_log;
pub mod document;
pub mod integration;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

pub use activity_log::{ActivityLogRepository, NewActivity};
pub use document::DocumentRepository;
pub use integration::{IntegrationRepository, NewIntegration};

use crate::models::integration::Model as IntegrationModel;
use crate::normalization::NormalizedDocument;

/// Errors surfaced by a [`Store`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("integration {0} not found")]
    IntegrationNotFound(Uuid),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Backing-store access used by the core services.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_integration(&self, id: Uuid) -> Result<Option<IntegrationModel>, StoreError>;

    async fn list_integrations(&self, team_id: Uuid) -> Result<Vec<IntegrationModel>, StoreError>;

    async fn list_active_integrations(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<IntegrationModel>, StoreError>;

    async fn save_integration(&self, new: NewIntegration) -> Result<IntegrationModel, StoreError>;

    /// Atomically set `is_active = true`, replacing `config` when one is given.
    async fn activate_integration(
        &self,
        id: Uuid,
        config: Option<JsonValue>,
    ) -> Result<IntegrationModel, StoreError>;

    async fn deactivate_integration(&self, id: Uuid) -> Result<IntegrationModel, StoreError>;

    async fn delete_integration(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn append_activity(&self, entry: NewActivity) -> Result<(), StoreError>;

    async fn upsert_document(
        &self,
        team_id: Uuid,
        document: &NormalizedDocument,
    ) -> Result<(), StoreError>;

    async fn count_documents(&self, team_id: Uuid) -> Result<u64, StoreError>;
}

/// [`Store`] backed by a SeaORM connection pool.
#[derive(Debug, Clone)]
pub struct DbStore {
    integrations: IntegrationRepository,
    activity: ActivityLogRepository,
    documents: DocumentRepository,
}

impl DbStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            integrations: IntegrationRepository::new(db.clone()),
            activity: ActivityLogRepository::new(db.clone()),
            documents: DocumentRepository::new(db),
        }
    }
}

#[async_trait]
impl Store for DbStore {
    async fn get_integration(&self, id: Uuid) -> Result<Option<IntegrationModel>, StoreError> {
        Ok(self.integrations.get_by_id(id).await?)
    }

    async fn list_integrations(&self, team_id: Uuid) -> Result<Vec<IntegrationModel>, StoreError> {
        Ok(self.integrations.list_by_team(team_id).await?)
    }

    async fn list_active_integrations(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<IntegrationModel>, StoreError> {
        Ok(self.integrations.list_active_by_team(team_id).await?)
    }

    async fn save_integration(&self, new: NewIntegration) -> Result<IntegrationModel, StoreError> {
        Ok(self.integrations.upsert_for_team(new).await?)
    }

    async fn activate_integration(
        &self,
        id: Uuid,
        config: Option<JsonValue>,
    ) -> Result<IntegrationModel, StoreError> {
        self.integrations
            .activate(id, config)
            .await?
            .ok_or(StoreError::IntegrationNotFound(id))
    }

    async fn deactivate_integration(&self, id: Uuid) -> Result<IntegrationModel, StoreError> {
        self.integrations
            .deactivate(id)
            .await?
            .ok_or(StoreError::IntegrationNotFound(id))
    }

    async fn delete_integration(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.integrations.delete(id).await?)
    }

    async fn append_activity(&self, entry: NewActivity) -> Result<(), StoreError> {
        self.activity.append(entry).await?;
        Ok(())
    }

    async fn upsert_document(
        &self,
        team_id: Uuid,
        document: &NormalizedDocument,
    ) -> Result<(), StoreError> {
        Ok(self.documents.upsert(team_id, document).await?)
    }

    async fn count_documents(&self, team_id: Uuid) -> Result<u64, StoreError> {
        Ok(self.documents.count_by_team(team_id).await?)
    }
}
