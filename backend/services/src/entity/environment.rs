use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use ketos_shared::EnvironmentStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "environment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub container_id: Option<String>,
    #[sea_orm(unique)]
    pub container_name: String,
    pub status: String,
    pub jupyter_port: Option<i32>,
    pub jupyter_token: Option<String>,
    pub description: Option<String>,
    pub creator_id: i32,
    pub image_id: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Unknown status text is treated as stopped so a corrupt row can still be deleted.
    pub fn status(&self) -> EnvironmentStatus {
        self.status.parse().unwrap_or(EnvironmentStatus::Stopped)
    }

    pub fn is_running(&self) -> bool {
        self.status() == EnvironmentStatus::Running
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::image::Entity",
        from = "Column::ImageId",
        to = "super::image::Column::Id"
    )]
    Image,
    #[sea_orm(has_many = "super::ml_model::Entity")]
    MlModel,
}

impl Related<super::image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Image.def()
    }
}

impl Related<super::ml_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MlModel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
