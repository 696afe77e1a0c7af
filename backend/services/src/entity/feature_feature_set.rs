use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Junction row linking a feature into a feature set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feature_feature_set")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub feature_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub feature_set_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::feature::Entity",
        from = "Column::FeatureId",
        to = "super::feature::Column::Id",
        on_delete = "Cascade"
    )]
    Feature,
    #[sea_orm(
        belongs_to = "super::feature_set::Entity",
        from = "Column::FeatureSetId",
        to = "super::feature_set::Column::Id",
        on_delete = "Cascade"
    )]
    FeatureSet,
}

impl Related<super::feature::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feature.def()
    }
}

impl Related<super::feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
