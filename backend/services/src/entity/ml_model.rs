use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ml_model")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub environment_id: i32,
    /// Artifact directory name handed out by the environment.
    pub ml_model_name: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: i32,
    pub feature_set_id: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::environment::Entity",
        from = "Column::EnvironmentId",
        to = "super::environment::Column::Id"
    )]
    Environment,
    #[sea_orm(
        belongs_to = "super::feature_set::Entity",
        from = "Column::FeatureSetId",
        to = "super::feature_set::Column::Id"
    )]
    FeatureSet,
}

impl Related<super::environment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Environment.def()
    }
}

impl Related<super::feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ketos_shared::ModelInfo {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            environment_id: model.environment_id,
            ml_model_name: model.ml_model_name,
            name: model.name,
            description: model.description,
            feature_set_id: model.feature_set_id,
            creator_id: model.creator_id,
            created_at: model.created_at.with_timezone(&chrono::Utc),
            updated_at: model.updated_at.with_timezone(&chrono::Utc),
        }
    }
}
