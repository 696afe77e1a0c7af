use std::path::PathBuf;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use ketos_shared::Actor;

use crate::entity::{environment, ml_model};
use crate::environment_service::EnvironmentService;
use crate::error::{map_unique_violation, ServiceError, ServiceResult};
use crate::feature_set_service::FeatureSetService;
use crate::settings::ensure_path_component;
use crate::now;

/// Row values for a model whose artifact directory is already known.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub environment_id: i32,
    pub ml_model_name: String,
    pub name: String,
    pub description: Option<String>,
    pub feature_set_id: Option<i32>,
}

pub struct MlModelService {
    db: DatabaseConnection,
    environments: Arc<EnvironmentService>,
}

impl MlModelService {
    pub fn new(db: DatabaseConnection, environments: Arc<EnvironmentService>) -> Self {
        Self { db, environments }
    }

    /// Registers a model slot with the environment and records the model.
    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        environment_id: i32,
        feature_set_id: Option<i32>,
        actor: Actor,
    ) -> ServiceResult<ml_model::Model> {
        let env = EnvironmentService::find(&self.db, environment_id).await?;
        if let Some(feature_set_id) = feature_set_id {
            FeatureSetService::find(&self.db, feature_set_id).await?;
        }
        Self::ensure_name_free(&self.db, env.id, name).await?;

        let ml_model_name = self.environments.register_model(&env).await?;

        Self::insert(
            &self.db,
            NewModel {
                environment_id: env.id,
                ml_model_name,
                name: name.to_string(),
                description,
                feature_set_id,
            },
            actor,
        )
        .await
    }

    pub async fn ensure_name_free<C: ConnectionTrait>(
        conn: &C,
        environment_id: i32,
        name: &str,
    ) -> ServiceResult<()> {
        let taken = ml_model::Entity::find()
            .filter(ml_model::Column::EnvironmentId.eq(environment_id))
            .filter(ml_model::Column::Name.eq(name))
            .count(conn)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "model {} already exists in environment {}",
                name, environment_id
            )));
        }
        Ok(())
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        new_model: NewModel,
        actor: Actor,
    ) -> ServiceResult<ml_model::Model> {
        ensure_path_component("model directory", &new_model.ml_model_name)?;
        let NewModel {
            environment_id,
            ml_model_name,
            name,
            description,
            feature_set_id,
        } = new_model;

        let timestamp = now();
        let created = ml_model::ActiveModel {
            environment_id: Set(environment_id),
            ml_model_name: Set(ml_model_name),
            name: Set(name.clone()),
            description: Set(description),
            creator_id: Set(actor.id),
            feature_set_id: Set(feature_set_id),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!("model {} already exists in environment {}", name, environment_id)
            })
        })?;

        log::info!(
            "Created model {} (id {}, directory {}) in environment {}",
            created.name, created.id, created.ml_model_name, created.environment_id
        );
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> ServiceResult<ml_model::Model> {
        Self::find(&self.db, id).await
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<ml_model::Model> {
        ml_model::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("model", id))
    }

    pub async fn list_for_environment(
        &self,
        environment_id: i32,
    ) -> ServiceResult<Vec<ml_model::Model>> {
        let env = EnvironmentService::find(&self.db, environment_id).await?;
        let models = ml_model::Entity::find()
            .filter(ml_model::Column::EnvironmentId.eq(env.id))
            .order_by_asc(ml_model::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models)
    }

    /// `feature_set_id`: `None` keeps the link, `Some(None)` clears it.
    pub async fn update(
        &self,
        id: i32,
        description: Option<String>,
        feature_set_id: Option<Option<i32>>,
    ) -> ServiceResult<ml_model::Model> {
        let model = self.get(id).await?;
        if let Some(Some(feature_set_id)) = feature_set_id {
            FeatureSetService::find(&self.db, feature_set_id).await?;
        }

        let mut active: ml_model::ActiveModel = model.into();
        if let Some(description) = description {
            active.description = Set(Some(description));
        }
        if let Some(feature_set_id) = feature_set_id {
            active.feature_set_id = Set(feature_set_id);
        }
        active.updated_at = Set(now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn link_feature_set<C: ConnectionTrait>(
        conn: &C,
        model: ml_model::Model,
        feature_set_id: i32,
    ) -> ServiceResult<ml_model::Model> {
        let mut active: ml_model::ActiveModel = model.into();
        active.feature_set_id = Set(Some(feature_set_id));
        active.updated_at = Set(now());
        Ok(active.update(conn).await?)
    }

    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let model = self.get(id).await?;
        ml_model::Entity::delete_by_id(model.id).exec(&self.db).await?;
        log::info!("Deleted model {} from environment {}", model.id, model.environment_id);
        Ok(())
    }

    pub fn artifact_directory(&self, model: &ml_model::Model, env: &environment::Model) -> PathBuf {
        self.environments
            .settings()
            .artifact_directory(&env.container_name, &model.ml_model_name)
    }
}
