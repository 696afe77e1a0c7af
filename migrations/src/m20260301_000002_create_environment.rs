use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_image::Image;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Environment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Environment::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Environment::Name).text().not_null())
                    .col(ColumnDef::new(Environment::ContainerId).string_len(255).null())
                    .col(
                        ColumnDef::new(Environment::ContainerName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Environment::Status)
                            .string_len(16)
                            .not_null()
                            .default("stopped"),
                    )
                    .col(ColumnDef::new(Environment::JupyterPort).integer().null())
                    .col(ColumnDef::new(Environment::JupyterToken).text().null())
                    .col(ColumnDef::new(Environment::Description).text().null())
                    .col(ColumnDef::new(Environment::CreatorId).integer().not_null())
                    .col(ColumnDef::new(Environment::ImageId).integer().not_null())
                    .col(
                        ColumnDef::new(Environment::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Environment::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environment_image")
                            .from(Environment::Table, Environment::ImageId)
                            .to(Image::Table, Image::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_environment_container_name")
                    .table(Environment::Table)
                    .col(Environment::ContainerName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_environment_creator_id")
                    .table(Environment::Table)
                    .col(Environment::CreatorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Environment::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Environment {
    Table,
    Id,
    Name,
    ContainerId,
    ContainerName,
    Status,
    JupyterPort,
    JupyterToken,
    Description,
    CreatorId,
    ImageId,
    CreatedAt,
    UpdatedAt,
}
