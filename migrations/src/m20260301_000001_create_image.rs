use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Image::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Image::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Image::Name).text().not_null())
                    .col(ColumnDef::new(Image::Title).text().null())
                    .col(ColumnDef::new(Image::Description).text().null())
                    .col(ColumnDef::new(Image::CreatorId).integer().null())
                    .to_owned(),
            )
            .await?;

        // Archives refer to images by name only
        manager
            .create_index(
                Index::create()
                    .name("idx_image_name")
                    .table(Image::Table)
                    .col(Image::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Image::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Image {
    Table,
    Id,
    Name,
    Title,
    Description,
    CreatorId,
}
