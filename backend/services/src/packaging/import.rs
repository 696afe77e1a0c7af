use std::fs;
use std::path::Path;

use ketos_shared::{Actor, ImportSummary, PackageMetadata};
use sea_orm::TransactionTrait;

use super::metadata::{read_metadata, LoadedMetadata};
use super::{archive, run_blocking, ModelPackager};
use crate::entity::{environment, feature_set};
use crate::environment_service::EnvironmentService;
use crate::error::{ServiceError, ServiceResult};
use crate::feature_service::FeatureService;
use crate::feature_set_service::FeatureSetService;
use crate::image_service::ImageService;
use crate::ml_model_service::{MlModelService, NewModel};
use crate::settings::ensure_path_component;

const UPLOAD_DIR: &str = "upload";
const CONTENTS_DIR: &str = "contents";

/// An uploaded model archive.
#[derive(Debug)]
pub struct ArchiveUpload {
    file_name: String,
    content: Vec<u8>,
}

impl ArchiveUpload {
    /// Accepts only non-empty `.zip` uploads. Any directory part of the
    /// client-supplied name is discarded.
    pub fn new(file_name: &str, content: Vec<u8>) -> ServiceResult<Self> {
        let file_name = Path::new(file_name.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        if file_name.is_empty() {
            return Err(ServiceError::BadInput("archive file name is empty".to_string()));
        }
        if !file_name.to_ascii_lowercase().ends_with(".zip") {
            return Err(ServiceError::BadInput(format!(
                "archive {} is not a .zip file",
                file_name
            )));
        }
        if content.is_empty() {
            return Err(ServiceError::BadInput(format!("archive {} is empty", file_name)));
        }
        Ok(Self { file_name, content })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Where an imported model should land. Unset targets are created from the
/// archive's own metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportTargets {
    pub environment_id: Option<i32>,
    pub feature_set_id: Option<i32>,
}

impl ImportTargets {
    /// Non-positive ids mean "not provided".
    pub fn new(environment_id: Option<i32>, feature_set_id: Option<i32>) -> Self {
        Self {
            environment_id: environment_id.filter(|id| *id > 0),
            feature_set_id: feature_set_id.filter(|id| *id > 0),
        }
    }
}

struct ResolvedTargets {
    image_id: i32,
    environment: Option<environment::Model>,
    feature_set: Option<feature_set::Model>,
}

impl ModelPackager {
    /// Recreates a model, and as much of its lineage as needed, from an
    /// archive produced by [`ModelPackager::package_model`].
    pub async fn load_model(
        &self,
        upload: ArchiveUpload,
        targets: ImportTargets,
        actor: Actor,
    ) -> ServiceResult<ImportSummary> {
        let workspace_root = self.settings().import_workspace_dir.clone();
        fs::create_dir_all(&workspace_root)?;
        let workspace = tempfile::Builder::new()
            .prefix("ketos-import-")
            .tempdir_in(&workspace_root)?;

        log::info!(
            "Importing {} ({} bytes) in {}",
            upload.file_name(),
            upload.content.len(),
            workspace.path().display()
        );

        let unpack_root = workspace.path().to_path_buf();
        let loaded = run_blocking(move || unpack(&unpack_root, upload)).await?;
        let result = self.import_unpacked(loaded, targets, actor).await;

        if let Err(e) = workspace.close() {
            log::warn!("Failed to clean up import workspace: {}", e);
        }
        result
    }

    async fn import_unpacked(
        &self,
        loaded: LoadedMetadata,
        targets: ImportTargets,
        actor: Actor,
    ) -> ServiceResult<ImportSummary> {
        let LoadedMetadata {
            metadata,
            package_root,
            reserved,
        } = loaded;

        let resolved = self.resolve_targets(&metadata, targets).await?;

        let (env, environment_created) = match resolved.environment {
            Some(env) => (env, false),
            None => {
                let env = self
                    .environments
                    .create(
                        &metadata.environment.name,
                        metadata.environment.description.clone(),
                        resolved.image_id,
                        actor,
                    )
                    .await?;
                (env, true)
            }
        };

        let ml_model_name = self.environments.register_model(&env).await?;
        ensure_path_component("model directory", &ml_model_name)?;

        let target_dir = self
            .settings()
            .artifact_directory(&env.container_name, &ml_model_name);
        let placed_dir = target_dir.clone();
        run_blocking(move || place_artifacts(&package_root, &placed_dir, &reserved)).await?;

        let committed = self
            .commit(
                &metadata,
                &env,
                ml_model_name,
                resolved.feature_set,
                environment_created,
                actor,
            )
            .await;

        if committed.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(&target_dir).await {
                log::warn!(
                    "Failed to remove artifacts at {} after aborted import: {}",
                    target_dir.display(),
                    e
                );
            }
            if environment_created {
                log::warn!(
                    "Environment {} was provisioned for an aborted import and is left in place",
                    env.id
                );
            }
        }
        committed
    }

    /// Everything the import refers to must exist before anything is changed.
    async fn resolve_targets(
        &self,
        metadata: &PackageMetadata,
        targets: ImportTargets,
    ) -> ServiceResult<ResolvedTargets> {
        let image = ImageService::find_by_name(&self.db, &metadata.image.name)
            .await?
            .ok_or_else(|| ServiceError::not_found("image", &metadata.image.name))?;

        let environment = match targets.environment_id {
            Some(id) => {
                let env = EnvironmentService::find(&self.db, id).await?;
                MlModelService::ensure_name_free(&self.db, env.id, &metadata.model.name).await?;
                Some(env)
            }
            None => None,
        };

        let feature_set = match targets.feature_set_id {
            Some(id) => {
                let set = FeatureSetService::find(&self.db, id).await?;
                if metadata.feature_set.is_none() {
                    log::info!("Archive has no feature set; target feature set {} is left untouched", id);
                }
                Some(set)
            }
            None => None,
        };

        Ok(ResolvedTargets {
            image_id: image.id,
            environment,
            feature_set,
        })
    }

    async fn commit(
        &self,
        metadata: &PackageMetadata,
        env: &environment::Model,
        ml_model_name: String,
        target_set: Option<feature_set::Model>,
        environment_created: bool,
        actor: Actor,
    ) -> ServiceResult<ImportSummary> {
        let txn = self.db.begin().await?;

        let mut model = MlModelService::insert(
            &txn,
            NewModel {
                environment_id: env.id,
                ml_model_name,
                name: metadata.model.name.clone(),
                description: metadata.model.description.clone(),
                feature_set_id: None,
            },
            actor,
        )
        .await?;

        let mut features_created = 0;
        let mut features_reused = 0;
        if let Some(bundle) = &metadata.feature_set {
            let mut feature_ids = Vec::with_capacity(bundle.features.len());
            for descriptor in &bundle.features {
                let (feature, created) = FeatureService::find_or_create(&txn, descriptor, actor).await?;
                if created {
                    features_created += 1;
                } else {
                    features_reused += 1;
                }
                feature_ids.push(feature.id);
            }

            let set = match target_set {
                Some(set) => set,
                None => {
                    FeatureSetService::insert(
                        &txn,
                        bundle.feature_set.name.clone(),
                        bundle.feature_set.description.clone(),
                        actor,
                    )
                    .await?
                }
            };
            FeatureSetService::replace_members(&txn, &set, &feature_ids).await?;
            model = MlModelService::link_feature_set(&txn, model, set.id).await?;
        }

        txn.commit().await?;

        log::info!(
            "Imported model {} into environment {} ({} features created, {} reused)",
            model.id,
            env.id,
            features_created,
            features_reused
        );
        Ok(ImportSummary {
            feature_set_id: model.feature_set_id,
            model: model.into(),
            environment_created,
            features_created,
            features_reused,
        })
    }
}

fn unpack(workspace: &Path, upload: ArchiveUpload) -> ServiceResult<LoadedMetadata> {
    let upload_dir = workspace.join(UPLOAD_DIR);
    fs::create_dir_all(&upload_dir)?;
    let upload_path = upload_dir.join(&upload.file_name);
    fs::write(&upload_path, &upload.content)?;
    drop(upload);

    let contents = workspace.join(CONTENTS_DIR);
    let files = archive::extract_archive(&upload_path, &contents).map_err(|e| match e {
        ServiceError::Archive(zip) => {
            ServiceError::BadInput(format!("upload is not a readable zip archive: {}", zip))
        }
        other => other,
    })?;
    fs::remove_dir_all(&upload_dir)?;
    log::debug!("Unpacked {} files into {}", files, contents.display());

    read_metadata(&contents)
}

fn place_artifacts(package_root: &Path, target_dir: &Path, reserved: &[String]) -> ServiceResult<usize> {
    // The environment may have seeded the slot when it registered the model
    if target_dir.exists() {
        log::debug!("Clearing model directory {}", target_dir.display());
        fs::remove_dir_all(target_dir)?;
    }
    fs::create_dir_all(target_dir)?;
    let moved = match archive::move_entries(package_root, target_dir, reserved) {
        Ok(moved) => moved,
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(target_dir) {
                log::warn!("Failed to remove {}: {}", target_dir.display(), cleanup);
            }
            return Err(e);
        }
    };
    log::debug!("Placed {} entries in {}", moved, target_dir.display());
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_name_must_be_zip() {
        assert!(ArchiveUpload::new("model.ZIP", vec![1]).is_ok());
        assert!(matches!(
            ArchiveUpload::new("model.tar.gz", vec![1]),
            Err(ServiceError::BadInput(_))
        ));
        assert!(matches!(ArchiveUpload::new("  ", vec![1]), Err(ServiceError::BadInput(_))));
    }

    #[test]
    fn upload_name_drops_directories() {
        let upload = ArchiveUpload::new("../../etc/model_3.zip", vec![1]).unwrap();
        assert_eq!(upload.file_name(), "model_3.zip");
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(ArchiveUpload::new("m.zip", Vec::new()), Err(ServiceError::BadInput(_))));
    }

    #[test]
    fn non_positive_targets_are_ignored() {
        let targets = ImportTargets::new(Some(0), Some(-4));
        assert!(targets.environment_id.is_none());
        assert!(targets.feature_set_id.is_none());

        let targets = ImportTargets::new(Some(7), None);
        assert_eq!(targets.environment_id, Some(7));
    }

    #[test]
    fn placing_artifacts_replaces_seeded_slot() {
        let tmp = tempfile::TempDir::new().unwrap();
        let package = tmp.path().join("package");
        fs::create_dir_all(package.join("metadata")).unwrap();
        fs::write(package.join("model.pkl"), b"trained").unwrap();
        let slot = tmp.path().join("data/model_2");
        fs::create_dir_all(&slot).unwrap();
        fs::write(slot.join("template.py"), b"# seeded").unwrap();

        let moved = place_artifacts(&package, &slot, &["metadata".to_string()]).unwrap();

        assert_eq!(moved, 1);
        assert_eq!(fs::read(slot.join("model.pkl")).unwrap(), b"trained");
        assert!(!slot.join("template.py").exists());
        assert!(!slot.join("metadata").exists());
    }

    #[test]
    fn garbage_upload_is_bad_input() {
        let tmp = tempfile::TempDir::new().unwrap();
        let upload = ArchiveUpload::new("m.zip", b"not a zip".to_vec()).unwrap();

        let err = unpack(tmp.path(), upload).unwrap_err();

        assert!(matches!(err, ServiceError::BadInput(_)));
    }
}
