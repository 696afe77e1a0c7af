pub mod container_runtime;
pub mod database;
pub mod entity;
pub mod environment_api;
pub mod environment_service;
pub mod error;
pub mod feature_service;
pub mod feature_set_service;
pub mod image_service;
pub mod ml_model_service;
pub mod packaging;
pub mod retry;
pub mod settings;

pub use container_runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use environment_api::{EnvironmentApi, HttpEnvironmentApi};
pub use environment_service::EnvironmentService;
pub use error::{ServiceError, ServiceResult};
pub use feature_service::{FeatureService, FeatureUpdate};
pub use feature_set_service::FeatureSetService;
pub use image_service::ImageService;
pub use ml_model_service::{MlModelService, NewModel};
pub use packaging::{ArchiveUpload, ImportTargets, ModelLineage, ModelPackager};
pub use settings::{PlatformSettings, RegistrySettings};

use sea_orm::prelude::DateTimeWithTimeZone;

pub(crate) fn now() -> DateTimeWithTimeZone {
    chrono::Utc::now().fixed_offset()
}
