//! Model packaging: exporting a model with its lineage into a zip archive
//! and recreating it from one.

pub mod archive;
mod export;
mod import;
pub mod metadata;

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::entity::{environment, feature, feature_set, image, ml_model};
use crate::environment_service::EnvironmentService;
use crate::error::{ServiceError, ServiceResult};
use crate::feature_set_service::FeatureSetService;
use crate::image_service::ImageService;
use crate::ml_model_service::MlModelService;
use crate::settings::PlatformSettings;

pub use import::{ArchiveUpload, ImportTargets};

/// Everything an archive records about one model.
#[derive(Debug, Clone)]
pub struct ModelLineage {
    pub model: ml_model::Model,
    pub environment: environment::Model,
    pub image: image::Model,
    pub feature_set: Option<(feature_set::Model, Vec<feature::Model>)>,
}

impl ModelLineage {
    pub async fn load<C: ConnectionTrait>(conn: &C, model_id: i32) -> ServiceResult<Self> {
        let model = MlModelService::find(conn, model_id).await?;
        let environment = EnvironmentService::find(conn, model.environment_id).await?;
        let image = ImageService::find(conn, environment.image_id).await?;

        let feature_set = match model.feature_set_id {
            Some(id) => {
                let set = FeatureSetService::find(conn, id).await?;
                let features = FeatureSetService::members(conn, &set).await?;
                Some((set, features))
            }
            None => None,
        };

        Ok(Self {
            model,
            environment,
            image,
            feature_set,
        })
    }
}

pub struct ModelPackager {
    db: DatabaseConnection,
    environments: Arc<EnvironmentService>,
}

impl ModelPackager {
    pub fn new(db: DatabaseConnection, environments: Arc<EnvironmentService>) -> Self {
        Self { db, environments }
    }

    fn settings(&self) -> &PlatformSettings {
        self.environments.settings()
    }
}

/// Runs blocking filesystem work off the async executor.
async fn run_blocking<T, F>(work: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServiceError::Io(std::io::Error::other(e)))?
}
