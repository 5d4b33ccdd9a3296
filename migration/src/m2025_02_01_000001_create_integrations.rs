//! Creates the integrations table.
//!
//! One row per (team, provider type) connection. A partial unique index keeps
//! at most one active row per pair so reconnecting must reuse the existing row.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Integrations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Integrations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Integrations::TeamId).uuid().not_null())
                    .col(
                        ColumnDef::new(Integrations::IntegrationType)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::IntegrationName)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::Config)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Integrations::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Integrations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Integrations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_integrations_team_id")
                    .table(Integrations::Table)
                    .col(Integrations::TeamId)
                    .to_owned(),
            )
            .await?;

        // Partial indexes are not expressible through the index builder; both
        // Postgres and SQLite accept this statement.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_integrations_one_active \
                 ON integrations (team_id, integration_type) WHERE is_active = TRUE",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_integrations_one_active")
            .await?;

        manager
            .drop_index(Index::drop().name("idx_integrations_team_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Integrations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Integrations {
    Table,
    Id,
    TeamId,
    IntegrationType,
    IntegrationName,
    Config,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
