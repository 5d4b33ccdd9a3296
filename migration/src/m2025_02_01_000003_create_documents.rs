//! Creates the documents table that synced content is upserted into.
//!
//! `external_id` holds the provider-native id; together with the team and the
//! source integration type it forms the re-sync key.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Documents::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Documents::Title).text().not_null())
                    .col(
                        ColumnDef::new(Documents::Content)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Documents::SourceIntegration)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Documents::ExternalId).text().not_null())
                    .col(ColumnDef::new(Documents::SourceUrl).text().null())
                    .col(ColumnDef::new(Documents::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Documents::UpdatedAt)
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
                    .name("idx_documents_team_source_external")
                    .table(Documents::Table)
                    .col(Documents::TeamId)
                    .col(Documents::SourceIntegration)
                    .col(Documents::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_documents_team_source_external")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    TeamId,
    Title,
    Content,
    SourceIntegration,
    ExternalId,
    SourceUrl,
    Metadata,
    UpdatedAt,
}
