use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;
use ketos_shared::{Actor, EnvironmentInfo, EnvironmentStatus};

use crate::container_runtime::{ContainerRuntime, ContainerSpec};
use crate::entity::{environment, ml_model};
use crate::environment_api::EnvironmentApi;
use crate::error::{ServiceError, ServiceResult};
use crate::image_service::ImageService;
use crate::settings::PlatformSettings;
use crate::now;

pub struct EnvironmentService {
    db: DatabaseConnection,
    runtime: Arc<dyn ContainerRuntime>,
    api: Arc<dyn EnvironmentApi>,
    settings: Arc<PlatformSettings>,
}

impl EnvironmentService {
    pub fn new(
        db: DatabaseConnection,
        runtime: Arc<dyn ContainerRuntime>,
        api: Arc<dyn EnvironmentApi>,
        settings: Arc<PlatformSettings>,
    ) -> Self {
        Self {
            db,
            runtime,
            api,
            settings,
        }
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    /// Provisions a container from the image and records the running environment.
    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        image_id: i32,
        actor: Actor,
    ) -> ServiceResult<environment::Model> {
        let image = ImageService::find(&self.db, image_id).await?;

        let container_name = Uuid::new_v4().simple().to_string();
        let jupyter_port = allocate_port()?;
        let data_dir = self.settings.data_directory(&container_name);
        tokio::fs::create_dir_all(&data_dir).await?;

        let spec = ContainerSpec {
            name: container_name.clone(),
            image: self.settings.image_reference(&image.name),
            network: self.settings.environment_network.clone(),
            host_port: jupyter_port,
            container_port: self.settings.notebook_container_port,
            host_data_dir: data_dir,
            mount_path: self.settings.environment_mount_path.clone(),
        };
        let container_id = self.runtime.run_container(&spec).await?;

        let token = match self.start_notebook(&container_name).await {
            Ok(token) => token,
            Err(e) => {
                self.discard_container(&container_id).await;
                return Err(e);
            }
        };

        let timestamp = now();
        let inserted = environment::ActiveModel {
            name: Set(name.to_string()),
            container_id: Set(Some(container_id.clone())),
            container_name: Set(container_name.clone()),
            status: Set(EnvironmentStatus::Running.to_string()),
            jupyter_port: Set(Some(i32::from(jupyter_port))),
            jupyter_token: Set(Some(token)),
            description: Set(description),
            creator_id: Set(actor.id),
            image_id: Set(image.id),
            created_at: Set(timestamp),
            updated_at: Set(timestamp),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        match inserted {
            Ok(env) => {
                log::info!(
                    "Created environment {} (id {}, container {}) from image {}",
                    env.name, env.id, env.container_name, image.name
                );
                Ok(env)
            }
            Err(e) => {
                self.discard_container(&container_id).await;
                Err(e.into())
            }
        }
    }

    async fn start_notebook(&self, container_name: &str) -> ServiceResult<String> {
        let endpoint = self.settings.environment_endpoint(container_name);
        self.api
            .await_ready(&endpoint, self.settings.ready_timeout)
            .await?;
        self.api.start_notebook(&endpoint).await
    }

    async fn discard_container(&self, container_id: &str) {
        if let Err(e) = self.runtime.remove_container(container_id).await {
            log::warn!("Failed to remove container {} after error: {}", container_id, e);
        }
    }

    pub async fn get(&self, id: i32) -> ServiceResult<environment::Model> {
        Self::find(&self.db, id).await
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, id: i32) -> ServiceResult<environment::Model> {
        environment::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("environment", id))
    }

    pub async fn list(&self) -> ServiceResult<Vec<environment::Model>> {
        let environments = environment::Entity::find()
            .order_by_asc(environment::Column::Id)
            .all(&self.db)
            .await?;
        Ok(environments)
    }

    pub async fn list_by_creator(&self, actor: Actor) -> ServiceResult<Vec<environment::Model>> {
        let environments = environment::Entity::find()
            .filter(environment::Column::CreatorId.eq(actor.id))
            .order_by_asc(environment::Column::Id)
            .all(&self.db)
            .await?;
        Ok(environments)
    }

    pub async fn update(
        &self,
        id: i32,
        name: Option<String>,
        description: Option<String>,
    ) -> ServiceResult<environment::Model> {
        let mut active: environment::ActiveModel = self.get(id).await?.into();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(description) = description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(now());
        Ok(active.update(&self.db).await?)
    }

    /// Starts the container again and fetches a fresh notebook token.
    pub async fn start(&self, id: i32) -> ServiceResult<environment::Model> {
        let env = self.get(id).await?;
        let container_id = require_container(&env)?;

        self.runtime.start_container(container_id).await?;
        let token = self.start_notebook(&env.container_name).await?;

        let mut active: environment::ActiveModel = env.into();
        active.status = Set(EnvironmentStatus::Running.to_string());
        active.jupyter_token = Set(Some(token));
        active.updated_at = Set(now());
        let env = active.update(&self.db).await?;

        log::info!("Environment {} is running", env.id);
        Ok(env)
    }

    pub async fn stop(&self, id: i32) -> ServiceResult<environment::Model> {
        let env = self.get(id).await?;
        let container_id = require_container(&env)?;

        self.runtime.stop_container(container_id).await?;

        let mut active: environment::ActiveModel = env.into();
        active.status = Set(EnvironmentStatus::Stopped.to_string());
        active.updated_at = Set(now());
        let env = active.update(&self.db).await?;

        log::info!("Environment {} is stopped", env.id);
        Ok(env)
    }

    /// Removes a stopped environment, its container and its model rows.
    /// The data directory is left on disk.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        let env = self.get(id).await?;
        if env.is_running() {
            return Err(ServiceError::Conflict(format!(
                "environment {} is running; stop it before deleting",
                env.id
            )));
        }

        if let Some(container_id) = env.container_id.as_deref() {
            self.runtime.remove_container(container_id).await?;
        }

        let txn = self.db.begin().await?;
        ml_model::Entity::delete_many()
            .filter(ml_model::Column::EnvironmentId.eq(env.id))
            .exec(&txn)
            .await?;
        environment::Entity::delete_by_id(env.id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Deleted environment {} (container {})", env.id, env.container_name);
        Ok(())
    }

    /// Asks the environment for a new model slot; returns its artifact directory name.
    pub async fn register_model(&self, env: &environment::Model) -> ServiceResult<String> {
        let endpoint = self.settings.environment_endpoint(&env.container_name);
        self.api.register_model(&endpoint).await
    }

    pub fn data_directory(&self, env: &environment::Model) -> PathBuf {
        self.settings.data_directory(&env.container_name)
    }

    pub fn packaging_directory(&self, env: &environment::Model) -> PathBuf {
        self.settings.packaging_directory(&env.container_name)
    }

    pub fn notebook_url(&self, env: &environment::Model) -> Option<String> {
        match (env.jupyter_port, env.jupyter_token.as_deref()) {
            (Some(port), Some(token)) => Some(self.settings.notebook_url(port, token)),
            _ => None,
        }
    }

    pub fn to_info(&self, env: environment::Model) -> EnvironmentInfo {
        let jupyter_url = self.notebook_url(&env);
        EnvironmentInfo {
            id: env.id,
            status: env.status(),
            name: env.name,
            description: env.description,
            container_id: env.container_id,
            container_name: env.container_name,
            jupyter_port: env.jupyter_port,
            jupyter_url,
            image_id: env.image_id,
            creator_id: env.creator_id,
            created_at: env.created_at.with_timezone(&chrono::Utc),
            updated_at: env.updated_at.with_timezone(&chrono::Utc),
        }
    }
}

fn require_container(env: &environment::Model) -> ServiceResult<&str> {
    env.container_id.as_deref().ok_or_else(|| {
        ServiceError::Conflict(format!("environment {} has no container", env.id))
    })
}

/// Lets the OS pick a free port. Another process may still grab it before
/// the container binds it.
fn allocate_port() -> ServiceResult<u16> {
    let listener = TcpListener::bind(("0.0.0.0", 0))?;
    Ok(listener.local_addr()?.port())
}
