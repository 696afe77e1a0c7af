use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feature")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub resource: String,
    pub parameter_name: String,
    pub value: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator_id: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::feature_feature_set::Entity")]
    FeatureFeatureSet,
}

impl Related<super::feature_feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureFeatureSet.def()
    }
}

impl Related<super::feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        super::feature_feature_set::Relation::FeatureSet.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::feature_feature_set::Relation::Feature.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ketos_shared::FeatureInfo {
    fn from(feature: Model) -> Self {
        Self {
            id: feature.id,
            resource: feature.resource,
            parameter_name: feature.parameter_name,
            value: feature.value,
            name: feature.name,
            description: feature.description,
            creator_id: feature.creator_id,
            created_at: feature.created_at.with_timezone(&chrono::Utc),
            updated_at: feature.updated_at.with_timezone(&chrono::Utc),
        }
    }
}
