//! Integration repository
//!
//! SeaORM operations on the integrations table. Writes that can flip
//! `is_active` run inside a transaction that first switches off any other
//! active row for the same team and provider type, so the
//! one-active-per-pair invariant holds even when rows were created by hand.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::ProviderType;
use crate::models::integration::{self, Entity as Integration};

/// Fields supplied when creating or reconnecting an integration.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub team_id: Uuid,
    pub provider_type: ProviderType,
    pub display_name: String,
    /// `None` keeps the stored config of an existing row untouched
    pub config: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub struct IntegrationRepository {
    db: Arc<DatabaseConnection>,
}

impl IntegrationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<integration::Model>, DbErr> {
        Integration::find_by_id(id).one(&*self.db).await
    }

    pub async fn list_by_team(&self, team_id: Uuid) -> Result<Vec<integration::Model>, DbErr> {
        Integration::find()
            .filter(integration::Column::TeamId.eq(team_id))
            .order_by_asc(integration::Column::CreatedAt)
            .all(&*self.db)
            .await
    }

    pub async fn list_active_by_team(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<integration::Model>, DbErr> {
        Integration::find()
            .filter(integration::Column::TeamId.eq(team_id))
            .filter(integration::Column::IsActive.eq(true))
            .order_by_asc(integration::Column::CreatedAt)
            .all(&*self.db)
            .await
    }

    /// Create an integration, or reuse the team's existing row for the same
    /// provider type.
    ///
    /// Supplying a new config on an existing row switches it off until the
    /// new credentials are confirmed.
    pub async fn upsert_for_team(&self, new: NewIntegration) -> Result<integration::Model, DbErr> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let existing = Integration::find()
            .filter(integration::Column::TeamId.eq(new.team_id))
            .filter(integration::Column::IntegrationType.eq(new.provider_type.as_str()))
            .order_by_desc(integration::Column::IsActive)
            .order_by_desc(integration::Column::UpdatedAt)
            .one(&txn)
            .await?;

        let model = match existing {
            Some(row) => {
                let mut active: integration::ActiveModel = row.into();
                active.integration_name = Set(new.display_name);
                if let Some(config) = new.config {
                    active.config = Set(config);
                    active.is_active = Set(false);
                }
                active.updated_at = Set(now.into());
                active.update(&txn).await?
            }
            None => {
                integration::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    team_id: Set(new.team_id),
                    integration_type: Set(new.provider_type.as_str().to_string()),
                    integration_name: Set(new.display_name),
                    config: Set(new.config.unwrap_or_else(|| serde_json::json!({}))),
                    is_active: Set(false),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        Ok(model)
    }

    /// Mark an integration active, optionally replacing its config in the
    /// same statement. Returns `None` when the row does not exist.
    ///
    /// The update is keyed by id only, so concurrent successful callers race
    /// with last-writer-wins semantics and never merge partial configs.
    pub async fn activate(
        &self,
        id: Uuid,
        config: Option<JsonValue>,
    ) -> Result<Option<integration::Model>, DbErr> {
        let txn = self.db.begin().await?;

        let Some(row) = Integration::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        deactivate_siblings(&txn, &row).await?;

        let mut update = Integration::update_many()
            .col_expr(integration::Column::IsActive, Expr::value(true))
            .col_expr(
                integration::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            );
        if let Some(config) = config {
            update = update.col_expr(integration::Column::Config, Expr::value(config));
        }
        update
            .filter(integration::Column::Id.eq(id))
            .exec(&txn)
            .await?;

        let updated = Integration::find_by_id(id).one(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Switch an integration off while keeping its config for reconnection.
    pub async fn deactivate(&self, id: Uuid) -> Result<Option<integration::Model>, DbErr> {
        let result = Integration::update_many()
            .col_expr(integration::Column::IsActive, Expr::value(false))
            .col_expr(
                integration::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(integration::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = Integration::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

async fn deactivate_siblings<C: ConnectionTrait>(
    conn: &C,
    row: &integration::Model,
) -> Result<(), DbErr> {
    Integration::update_many()
        .col_expr(integration::Column::IsActive, Expr::value(false))
        .filter(integration::Column::TeamId.eq(row.team_id))
        .filter(integration::Column::IntegrationType.eq(row.integration_type.clone()))
        .filter(integration::Column::Id.ne(row.id))
        .filter(integration::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}
