use std::collections::BTreeSet;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use ketos_shared::{Actor, FeatureSetInfo};

use crate::entity::{feature, feature_feature_set, feature_set, ml_model};
use crate::error::{ServiceError, ServiceResult};
use crate::now;

pub struct FeatureSetService {
    db: DatabaseConnection,
}

impl FeatureSetService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        name: Option<String>,
        description: Option<String>,
        actor: Actor,
    ) -> ServiceResult<feature_set::Model> {
        Self::insert(&self.db, name, description, actor).await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        name: Option<String>,
        description: Option<String>,
        actor: Actor,
    ) -> ServiceResult<feature_set::Model> {
        let timestamp = now();
        let created = feature_set::ActiveModel {
            name: Set(name),
            description: Set(description),
            creator_id: Set(actor.id),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        log::info!("Created feature set {}", created.id);
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<feature_set::Model> {
        Self::find(&self.db, id).await
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<feature_set::Model> {
        feature_set::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("feature set", id))
    }

    pub async fn list(&self) -> ServiceResult<Vec<feature_set::Model>> {
        let sets = feature_set::Entity::find()
            .order_by_asc(feature_set::Column::Id)
            .all(&self.db)
            .await?;
        Ok(sets)
    }

    pub async fn list_by_creator(&self, actor: Actor) -> ServiceResult<Vec<feature_set::Model>> {
        let sets = feature_set::Entity::find()
            .filter(feature_set::Column::CreatorId.eq(actor.id))
            .order_by_asc(feature_set::Column::Id)
            .all(&self.db)
            .await?;
        Ok(sets)
    }

    pub async fn update(
        &self,
        id: i32,
        name: Option<String>,
        description: Option<String>,
    ) -> ServiceResult<feature_set::Model> {
        let mut active: feature_set::ActiveModel = self.get(id).await?.into();
        if let Some(name) = name {
            active.name = Set(Some(name));
        }
        if let Some(description) = description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(now());
        Ok(active.update(&self.db).await?)
    }

    /// Clears membership, detaches backing models, then removes the set.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let set = self.get(id).await?;

        let txn = self.db.begin().await?;
        feature_feature_set::Entity::delete_many()
            .filter(feature_feature_set::Column::FeatureSetId.eq(set.id))
            .exec(&txn)
            .await?;
        ml_model::Entity::update_many()
            .col_expr(ml_model::Column::FeatureSetId, Expr::value(Option::<i32>::None))
            .filter(ml_model::Column::FeatureSetId.eq(set.id))
            .exec(&txn)
            .await?;
        feature_set::Entity::delete_by_id(set.id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Deleted feature set {}", set.id);
        Ok(())
    }

    pub async fn features(&self, id: i32) -> ServiceResult<Vec<feature::Model>> {
        let set = self.get(id).await?;
        Self::members(&self.db, &set).await
    }

    /// Members ordered by feature id.
    pub async fn members<C: ConnectionTrait>(
        conn: &C,
        set: &feature_set::Model,
    ) -> ServiceResult<Vec<feature::Model>> {
        let features = set
            .find_related(feature::Entity)
            .order_by_asc(feature::Column::Id)
            .all(conn)
            .await?;
        Ok(features)
    }

    pub async fn info(&self, id: i32) -> ServiceResult<FeatureSetInfo> {
        let set = self.get(id).await?;
        let features = Self::members(&self.db, &set).await?;
        Ok(FeatureSetInfo {
            id: set.id,
            name: set.name,
            description: set.description,
            creator_id: set.creator_id,
            features: features.into_iter().map(Into::into).collect(),
            created_at: set.created_at.with_timezone(&chrono::Utc),
            updated_at: set.updated_at.with_timezone(&chrono::Utc),
        })
    }

    /// Adds features not yet in the set; ids already present are ignored.
    pub async fn add_features(
        &self,
        id: i32,
        feature_ids: &[i32],
    ) -> ServiceResult<Vec<feature::Model>> {
        let set = self.get(id).await?;
        let wanted = ensure_features_exist(&self.db, feature_ids).await?;

        let txn = self.db.begin().await?;
        let present: BTreeSet<i32> = Self::members(&txn, &set)
            .await?
            .into_iter()
            .map(|f| f.id)
            .collect();
        for feature_id in wanted.difference(&present) {
            link(&txn, set.id, *feature_id).await?;
        }
        touch(&txn, set.clone()).await?;
        let members = Self::members(&txn, &set).await?;
        txn.commit().await?;

        Ok(members)
    }

    pub async fn remove_features(
        &self,
        id: i32,
        feature_ids: &[i32],
    ) -> ServiceResult<Vec<feature::Model>> {
        let set = self.get(id).await?;

        let txn = self.db.begin().await?;
        feature_feature_set::Entity::delete_many()
            .filter(feature_feature_set::Column::FeatureSetId.eq(set.id))
            .filter(feature_feature_set::Column::FeatureId.is_in(feature_ids.iter().copied()))
            .exec(&txn)
            .await?;
        touch(&txn, set.clone()).await?;
        let members = Self::members(&txn, &set).await?;
        txn.commit().await?;

        Ok(members)
    }

    pub async fn replace_features(
        &self,
        id: i32,
        feature_ids: &[i32],
    ) -> ServiceResult<Vec<feature::Model>> {
        let set = self.get(id).await?;
        ensure_features_exist(&self.db, feature_ids).await?;

        let txn = self.db.begin().await?;
        Self::replace_members(&txn, &set, feature_ids).await?;
        let members = Self::members(&txn, &set).await?;
        txn.commit().await?;

        Ok(members)
    }

    /// Overwrites the membership with exactly `feature_ids`.
    pub async fn replace_members<C: ConnectionTrait>(
        conn: &C,
        set: &feature_set::Model,
        feature_ids: &[i32],
    ) -> ServiceResult<()> {
        feature_feature_set::Entity::delete_many()
            .filter(feature_feature_set::Column::FeatureSetId.eq(set.id))
            .exec(conn)
            .await?;

        let unique: BTreeSet<i32> = feature_ids.iter().copied().collect();
        for feature_id in &unique {
            link(conn, set.id, *feature_id).await?;
        }
        touch(conn, set.clone()).await?;

        log::debug!("Feature set {} now has {} features", set.id, unique.len());
        Ok(())
    }
}

async fn ensure_features_exist<C: ConnectionTrait>(
    conn: &C,
    feature_ids: &[i32],
) -> ServiceResult<BTreeSet<i32>> {
    let wanted: BTreeSet<i32> = feature_ids.iter().copied().collect();
    let found: BTreeSet<i32> = feature::Entity::find()
        .filter(feature::Column::Id.is_in(wanted.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|f| f.id)
        .collect();

    match wanted.difference(&found).next() {
        Some(missing) => Err(ServiceError::not_found("feature", missing)),
        None => Ok(wanted),
    }
}

async fn link<C: ConnectionTrait>(conn: &C, feature_set_id: i32, feature_id: i32) -> ServiceResult<()> {
    let row = feature_feature_set::ActiveModel {
        feature_id: Set(feature_id),
        feature_set_id: Set(feature_set_id),
    };
    feature_feature_set::Entity::insert(row)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn touch<C: ConnectionTrait>(conn: &C, set: feature_set::Model) -> ServiceResult<()> {
    let mut active: feature_set::ActiveModel = set.into();
    active.updated_at = Set(now());
    active.update(conn).await?;
    Ok(())
}
