use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Feature::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Feature::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Feature::Resource).text().not_null())
                    .col(ColumnDef::new(Feature::ParameterName).text().not_null())
                    .col(ColumnDef::new(Feature::Value).text().not_null())
                    .col(ColumnDef::new(Feature::Name).text().null())
                    .col(ColumnDef::new(Feature::Description).text().null())
                    .col(ColumnDef::new(Feature::CreatorId).integer().not_null())
                    .col(
                        ColumnDef::new(Feature::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Feature::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key used to de-duplicate features across imports
        manager
            .create_index(
                Index::create()
                    .name("idx_feature_natural_key")
                    .table(Feature::Table)
                    .col(Feature::Resource)
                    .col(Feature::ParameterName)
                    .col(Feature::Value)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Feature::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Feature {
    Table,
    Id,
    Resource,
    ParameterName,
    Value,
    Name,
    Description,
    CreatorId,
    CreatedAt,
    UpdatedAt,
}
