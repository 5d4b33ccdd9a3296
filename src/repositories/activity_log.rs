//! Activity log repository
//!
//! Append and read only; this crate never updates or deletes audit rows.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::activity_log::{self, Entity as ActivityLog};

/// Audit entry to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub team_id: Uuid,
    pub action: String,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone)]
pub struct ActivityLogRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn append(&self, entry: NewActivity) -> Result<activity_log::Model, DbErr> {
        activity_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(entry.team_id),
            action: Set(entry.action),
            metadata: Set(Some(entry.metadata)),
            created_at: Set(Utc::now().into()),
        }
        .insert(&*self.db)
        .await
    }

    /// Entries for a team, newest first.
    pub async fn list_by_team(&self, team_id: Uuid) -> Result<Vec<activity_log::Model>, DbErr> {
        ActivityLog::find()
            .filter(activity_log::Column::TeamId.eq(team_id))
            .order_by_desc(activity_log::Column::CreatedAt)
            .all(&*self.db)
            .await
    }
}
