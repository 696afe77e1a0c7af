pub use sea_orm_migration::prelude::*;

pub mod m20260301_000001_create_image;
pub mod m20260301_000002_create_environment;
pub mod m20260301_000003_create_feature;
pub mod m20260301_000004_create_feature_set;
pub mod m20260301_000005_create_ml_model;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_image::Migration),
            Box::new(m20260301_000002_create_environment::Migration),
            Box::new(m20260301_000003_create_feature::Migration),
            Box::new(m20260301_000004_create_feature_set::Migration),
            Box::new(m20260301_000005_create_ml_model::Migration),
        ]
    }
}
