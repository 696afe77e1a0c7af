use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use ketos_shared::{Actor, FeatureDescriptor};

use crate::entity::{feature, feature_feature_set};
use crate::error::{map_unique_violation, ServiceError, ServiceResult};
use crate::now;

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct FeatureUpdate {
    pub resource: Option<String>,
    pub parameter_name: Option<String>,
    pub value: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

pub struct FeatureService {
    db: DatabaseConnection,
}

impl FeatureService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        descriptor: &FeatureDescriptor,
        actor: Actor,
    ) -> ServiceResult<feature::Model> {
        Self::insert(&self.db, descriptor, actor).await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        descriptor: &FeatureDescriptor,
        actor: Actor,
    ) -> ServiceResult<feature::Model> {
        validate(descriptor)?;

        let timestamp = now();
        let created = feature::ActiveModel {
            resource: Set(descriptor.resource.clone()),
            parameter_name: Set(descriptor.parameter_name.clone()),
            value: Set(descriptor.value.clone()),
            name: Set(descriptor.name.clone()),
            description: Set(descriptor.description.clone()),
            creator_id: Set(actor.id),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| map_unique_violation(e, || duplicate_message(descriptor)))?;

        log::info!(
            "Created feature {} ({}/{}={})",
            created.id, created.resource, created.parameter_name, created.value
        );
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<feature::Model> {
        feature::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("feature", id))
    }

    pub async fn get_by_natural_key(
        &self,
        resource: &str,
        parameter_name: &str,
        value: &str,
    ) -> ServiceResult<Option<feature::Model>> {
        Self::find_by_natural_key(&self.db, resource, parameter_name, value).await
    }

    pub async fn find_by_natural_key<C: ConnectionTrait>(
        conn: &C,
        resource: &str,
        parameter_name: &str,
        value: &str,
    ) -> ServiceResult<Option<feature::Model>> {
        let found = feature::Entity::find()
            .filter(feature::Column::Resource.eq(resource))
            .filter(feature::Column::ParameterName.eq(parameter_name))
            .filter(feature::Column::Value.eq(value))
            .one(conn)
            .await?;
        Ok(found)
    }

    /// Returns the feature matching the descriptor's natural key, creating it
    /// only when none exists. The flag is true when a row was inserted.
    pub async fn find_or_create<C: ConnectionTrait>(
        conn: &C,
        descriptor: &FeatureDescriptor,
        actor: Actor,
    ) -> ServiceResult<(feature::Model, bool)> {
        let (resource, parameter_name, value) = descriptor.natural_key();
        if let Some(existing) =
            Self::find_by_natural_key(conn, resource, parameter_name, value).await?
        {
            log::debug!("Reusing feature {} for {}/{}={}", existing.id, resource, parameter_name, value);
            return Ok((existing, false));
        }

        let created = Self::insert(conn, descriptor, actor).await?;
        Ok((created, true))
    }

    pub async fn list(&self) -> ServiceResult<Vec<feature::Model>> {
        let features = feature::Entity::find()
            .order_by_asc(feature::Column::Id)
            .all(&self.db)
            .await?;
        Ok(features)
    }

    pub async fn list_by_creator(&self, actor: Actor) -> ServiceResult<Vec<feature::Model>> {
        let features = feature::Entity::find()
            .filter(feature::Column::CreatorId.eq(actor.id))
            .order_by_asc(feature::Column::Id)
            .all(&self.db)
            .await?;
        Ok(features)
    }

    pub async fn update(&self, id: i32, update: FeatureUpdate) -> ServiceResult<feature::Model> {
        let current = self.get(id).await?;

        let merged = FeatureDescriptor {
            resource: update.resource.unwrap_or_else(|| current.resource.clone()),
            parameter_name: update
                .parameter_name
                .unwrap_or_else(|| current.parameter_name.clone()),
            value: update.value.unwrap_or_else(|| current.value.clone()),
            name: update.name.or_else(|| current.name.clone()),
            description: update.description.or_else(|| current.description.clone()),
        };
        validate(&merged)?;

        let mut active: feature::ActiveModel = current.into();
        active.resource = Set(merged.resource.clone());
        active.parameter_name = Set(merged.parameter_name.clone());
        active.value = Set(merged.value.clone());
        active.name = Set(merged.name.clone());
        active.description = Set(merged.description.clone());
        active.updated_at = Set(now());

        active
            .update(&self.db)
            .await
            .map_err(|e| map_unique_violation(e, || duplicate_message(&merged)))
    }

    /// Deletes the feature and drops it from every feature set.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let feature = self.get(id).await?;

        let txn = self.db.begin().await?;
        feature_feature_set::Entity::delete_many()
            .filter(feature_feature_set::Column::FeatureId.eq(feature.id))
            .exec(&txn)
            .await?;
        feature::Entity::delete_by_id(feature.id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Deleted feature {}", feature.id);
        Ok(())
    }
}

fn validate(descriptor: &FeatureDescriptor) -> ServiceResult<()> {
    let (resource, parameter_name, value) = descriptor.natural_key();
    if resource.is_empty() || parameter_name.is_empty() || value.is_empty() {
        return Err(ServiceError::BadInput(
            "feature resource, parameter_name and value are required".to_string(),
        ));
    }
    Ok(())
}

fn duplicate_message(descriptor: &FeatureDescriptor) -> String {
    format!(
        "feature {}/{}={} already exists",
        descriptor.resource, descriptor.parameter_name, descriptor.value
    )
}
