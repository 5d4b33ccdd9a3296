//! Document repository
//!
//! Upserts normalized documents keyed by team, source provider type and
//! provider-native id so that re-running a sync updates rows in place.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::document::{self, Entity as Document};
use crate::normalization::NormalizedDocument;

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    db: Arc<DatabaseConnection>,
}

impl DocumentRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn upsert(&self, team_id: Uuid, doc: &NormalizedDocument) -> Result<(), DbErr> {
        let row = document::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            title: Set(doc.title.clone()),
            content: Set(doc.content.clone()),
            source_integration: Set(doc.source_integration_type.as_str().to_string()),
            external_id: Set(doc.id.clone()),
            source_url: Set(doc.source_url.clone()),
            metadata: Set(Some(json!({ "lastModified": doc.last_modified }))),
            updated_at: Set(Utc::now().into()),
        };

        Document::insert(row)
            .on_conflict(
                OnConflict::columns([
                    document::Column::TeamId,
                    document::Column::SourceIntegration,
                    document::Column::ExternalId,
                ])
                .update_columns([
                    document::Column::Title,
                    document::Column::Content,
                    document::Column::SourceUrl,
                    document::Column::Metadata,
                    document::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn count_by_team(&self, team_id: Uuid) -> Result<u64, DbErr> {
        Document::find()
            .filter(document::Column::TeamId.eq(team_id))
            .count(&*self.db)
            .await
    }

    pub async fn list_by_team(&self, team_id: Uuid) -> Result<Vec<document::Model>, DbErr> {
        Document::find()
            .filter(document::Column::TeamId.eq(team_id))
            .all(&*self.db)
            .await
    }
}
