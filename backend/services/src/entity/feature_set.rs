use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feature_set")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
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
    #[sea_orm(has_many = "super::ml_model::Entity")]
    MlModel,
}

impl Related<super::feature_feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureFeatureSet.def()
    }
}

impl Related<super::ml_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MlModel.def()
    }
}

impl Related<super::feature::Entity> for Entity {
    fn to() -> RelationDef {
        super::feature_feature_set::Relation::Feature.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::feature_feature_set::Relation::FeatureSet.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
