use std::fs;
use std::path::{Path, PathBuf};

use ketos_shared::{
    EnvironmentDescriptor, FeatureDescriptor, FeatureSetBundle, FeatureSetDescriptor,
    ImageDescriptor, ModelDescriptor, PackageMetadata, PackagedModel, PACKAGE_FORMAT_VERSION,
};

use super::metadata::{write_metadata, METADATA_DIR};
use super::{archive, run_blocking, ModelLineage, ModelPackager};
use crate::error::{ServiceError, ServiceResult};

impl ModelPackager {
    /// Writes `<ml_model_name>.zip` into the environment's packaging
    /// directory and returns its location. An older archive for the same
    /// model is replaced.
    pub async fn package_model(&self, model_id: i32) -> ServiceResult<PackagedModel> {
        let lineage = ModelLineage::load(&self.db, model_id).await?;
        let metadata = describe(&lineage);

        let env = &lineage.environment;
        let ml_model_name = lineage.model.ml_model_name.clone();
        let source = self
            .settings()
            .artifact_directory(&env.container_name, &ml_model_name);
        let packaging_dir = self.settings().packaging_directory(&env.container_name);
        let file_name = format!("{}.zip", ml_model_name);
        let archive_path = packaging_dir.join(&file_name);

        let target = archive_path.clone();
        let files = run_blocking(move || {
            build_archive(&source, &packaging_dir, &ml_model_name, &metadata, &target)
        })
        .await?;

        log::info!(
            "Packaged model {} ({} files) into {}",
            model_id,
            files,
            archive_path.display()
        );
        Ok(PackagedModel {
            model_id,
            archive_path,
            file_name,
        })
    }
}

fn build_archive(
    source: &Path,
    packaging_dir: &Path,
    ml_model_name: &str,
    metadata: &PackageMetadata,
    archive_path: &Path,
) -> ServiceResult<usize> {
    if !source.is_dir() {
        return Err(ServiceError::not_found(
            "artifact directory",
            source.display(),
        ));
    }
    fs::create_dir_all(packaging_dir)?;

    let staging: PathBuf = packaging_dir.join(ml_model_name);
    if staging.exists() {
        log::warn!("Removing stale staging directory {}", staging.display());
        fs::remove_dir_all(&staging)?;
    }

    let result = stage_and_zip(source, &staging, metadata, archive_path);
    if staging.exists() {
        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("Failed to remove staging directory {}: {}", staging.display(), e);
        }
    }
    result
}

fn stage_and_zip(
    source: &Path,
    staging: &Path,
    metadata: &PackageMetadata,
    archive_path: &Path,
) -> ServiceResult<usize> {
    archive::copy_tree(source, staging)?;
    if staging.join(METADATA_DIR).exists() {
        return Err(ServiceError::Conflict(format!(
            "artifact directory {} contains a reserved '{}' entry",
            source.display(),
            METADATA_DIR
        )));
    }
    write_metadata(staging, metadata)?;
    archive::zip_directory(staging, archive_path)
}

/// Builds the archive metadata. Credentials such as the notebook token are
/// never included.
pub(crate) fn describe(lineage: &ModelLineage) -> PackageMetadata {
    let ModelLineage {
        model,
        environment,
        image,
        feature_set,
    } = lineage;

    PackageMetadata {
        format_version: PACKAGE_FORMAT_VERSION,
        image: ImageDescriptor {
            name: image.name.clone(),
            title: image.title.clone(),
            description: image.description.clone(),
        },
        environment: EnvironmentDescriptor {
            name: environment.name.clone(),
            description: environment.description.clone(),
            container_name: Some(environment.container_name.clone()),
            created_at: Some(environment.created_at.with_timezone(&chrono::Utc)),
        },
        model: ModelDescriptor {
            name: model.name.clone(),
            description: model.description.clone(),
            ml_model_name: Some(model.ml_model_name.clone()),
            created_at: Some(model.created_at.with_timezone(&chrono::Utc)),
            updated_at: Some(model.updated_at.with_timezone(&chrono::Utc)),
        },
        feature_set: feature_set.as_ref().map(|(set, features)| FeatureSetBundle {
            feature_set: FeatureSetDescriptor {
                name: set.name.clone(),
                description: set.description.clone(),
            },
            features: features
                .iter()
                .map(|f| FeatureDescriptor {
                    resource: f.resource.clone(),
                    parameter_name: f.parameter_name.clone(),
                    value: f.value.clone(),
                    name: f.name.clone(),
                    description: f.description.clone(),
                })
                .collect(),
        }),
    }
}
