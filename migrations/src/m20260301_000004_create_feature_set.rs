use sea_orm_migration::prelude::*;

use crate::m20260301_000003_create_feature::Feature;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FeatureSet::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeatureSet::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FeatureSet::Name).text().null())
                    .col(ColumnDef::new(FeatureSet::Description).text().null())
                    .col(ColumnDef::new(FeatureSet::CreatorId).integer().not_null())
                    .col(
                        ColumnDef::new(FeatureSet::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeatureSet::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FeatureFeatureSet::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(FeatureFeatureSet::FeatureId).integer().not_null())
                    .col(
                        ColumnDef::new(FeatureFeatureSet::FeatureSetId)
                            .integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(FeatureFeatureSet::FeatureId)
                            .col(FeatureFeatureSet::FeatureSetId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feature_feature_set_feature")
                            .from(FeatureFeatureSet::Table, FeatureFeatureSet::FeatureId)
                            .to(Feature::Table, Feature::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feature_feature_set_feature_set")
                            .from(FeatureFeatureSet::Table, FeatureFeatureSet::FeatureSetId)
                            .to(FeatureSet::Table, FeatureSet::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeatureFeatureSet::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FeatureSet::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum FeatureSet {
    Table,
    Id,
    Name,
    Description,
    CreatorId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FeatureFeatureSet {
    Table,
    FeatureId,
    FeatureSetId,
}
