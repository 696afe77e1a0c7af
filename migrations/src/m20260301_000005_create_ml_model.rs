use sea_orm_migration::prelude::*;

use crate::m20260301_000002_create_environment::Environment;
use crate::m20260301_000004_create_feature_set::FeatureSet;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MlModel::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MlModel::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MlModel::EnvironmentId).integer().not_null())
                    .col(ColumnDef::new(MlModel::MlModelName).text().not_null())
                    .col(ColumnDef::new(MlModel::Name).text().not_null())
                    .col(ColumnDef::new(MlModel::Description).text().null())
                    .col(ColumnDef::new(MlModel::CreatorId).integer().not_null())
                    .col(ColumnDef::new(MlModel::FeatureSetId).integer().null())
                    .col(
                        ColumnDef::new(MlModel::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MlModel::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ml_model_environment")
                            .from(MlModel::Table, MlModel::EnvironmentId)
                            .to(Environment::Table, Environment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ml_model_feature_set")
                            .from(MlModel::Table, MlModel::FeatureSetId)
                            .to(FeatureSet::Table, FeatureSet::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ml_model_environment_name")
                    .table(MlModel::Table)
                    .col(MlModel::EnvironmentId)
                    .col(MlModel::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ml_model_feature_set_id")
                    .table(MlModel::Table)
                    .col(MlModel::FeatureSetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MlModel::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MlModel {
    Table,
    Id,
    EnvironmentId,
    MlModelName,
    Name,
    Description,
    CreatorId,
    FeatureSetId,
    CreatedAt,
    UpdatedAt,
}
