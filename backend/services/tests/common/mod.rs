#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ketos_services::entity::{environment, feature_set, image, ml_model};
use ketos_services::{
    ContainerRuntime, ContainerSpec, EnvironmentApi, EnvironmentService, FeatureService,
    FeatureSetService, ImageService, MlModelService, ModelPackager, PlatformSettings,
    ServiceError, ServiceResult,
};
use ketos_shared::{Actor, FeatureDescriptor};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tempfile::TempDir;

pub const ALICE: Actor = Actor { id: 1 };
pub const BOB: Actor = Actor { id: 2 };

/// Records container operations instead of talking to a daemon.
#[derive(Default)]
pub struct FakeRuntime {
    pub calls: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn runs(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("run ")).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn run_container(&self, spec: &ContainerSpec) -> ServiceResult<String> {
        self.record(format!("run {} {}", spec.name, spec.image));
        Ok(format!("id-{}", spec.name))
    }

    async fn start_container(&self, container_id: &str) -> ServiceResult<()> {
        self.record(format!("start {}", container_id));
        Ok(())
    }

    async fn stop_container(&self, container_id: &str) -> ServiceResult<()> {
        self.record(format!("stop {}", container_id));
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> ServiceResult<()> {
        self.record(format!("remove {}", container_id));
        Ok(())
    }
}

/// Hands out sequential model directory names and seeds each slot under
/// the environment's data directory, as the in-container service does.
pub struct FakeEnvironmentApi {
    data_root: PathBuf,
    next_model: AtomicUsize,
    pub unreachable: AtomicBool,
}

impl FakeEnvironmentApi {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            next_model: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EnvironmentApi for FakeEnvironmentApi {
    async fn await_ready(&self, endpoint: &str, timeout: Duration) -> ServiceResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::NotReady {
                endpoint: endpoint.to_string(),
                timeout,
            });
        }
        Ok(())
    }

    async fn start_notebook(&self, _endpoint: &str) -> ServiceResult<String> {
        Ok("secret-token".to_string())
    }

    async fn register_model(&self, endpoint: &str) -> ServiceResult<String> {
        let n = self.next_model.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("model_{}", n);
        let container_name = endpoint.split(':').next().unwrap_or(endpoint);
        let slot = self.data_root.join(container_name).join(&name);
        fs::create_dir_all(&slot)?;
        fs::write(slot.join(format!("{}.template", name)), b"# generated")?;
        Ok(name)
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub db: DatabaseConnection,
    pub runtime: Arc<FakeRuntime>,
    pub api: Arc<FakeEnvironmentApi>,
    pub settings: Arc<PlatformSettings>,
    pub images: ImageService,
    pub environments: Arc<EnvironmentService>,
    pub features: FeatureService,
    pub feature_sets: FeatureSetService,
    pub models: MlModelService,
    pub packager: ModelPackager,
}

pub async fn harness() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("ketos.db");
    let db = Database::connect(format!("sqlite://{}?mode=rwc", db_path.display()))
        .await
        .unwrap();
    Migrator::up(&db, None).await.unwrap();

    let data_root = tmp.path().join("environments");
    let mut settings = PlatformSettings::with_data_root(&data_root);
    settings.import_workspace_dir = tmp.path().join("imports");
    let settings = Arc::new(settings);

    let runtime = Arc::new(FakeRuntime::default());
    let api = Arc::new(FakeEnvironmentApi::new(&data_root));
    let environments = Arc::new(EnvironmentService::new(
        db.clone(),
        runtime.clone(),
        api.clone(),
        settings.clone(),
    ));

    Harness {
        images: ImageService::new(db.clone()),
        features: FeatureService::new(db.clone()),
        feature_sets: FeatureSetService::new(db.clone()),
        models: MlModelService::new(db.clone(), environments.clone()),
        packager: ModelPackager::new(db.clone(), environments.clone()),
        environments,
        settings,
        runtime,
        api,
        db,
        tmp,
    }
}

pub fn descriptor(resource: &str, parameter_name: &str, value: &str) -> FeatureDescriptor {
    FeatureDescriptor {
        resource: resource.to_string(),
        parameter_name: parameter_name.to_string(),
        value: value.to_string(),
        name: Some(format!("{}-{}", parameter_name, value)),
        description: None,
    }
}

/// A model with trained files on disk, optionally linked to a feature set.
pub struct Fixture {
    pub image: image::Model,
    pub environment: environment::Model,
    pub model: ml_model::Model,
    pub feature_set: Option<feature_set::Model>,
}

impl Harness {
    pub async fn image(&self, name: &str) -> image::Model {
        self.images
            .create(name, Some("Python ML".into()), Some("scikit-learn".into()), ALICE)
            .await
            .unwrap()
    }

    pub async fn fixture(&self, with_features: bool) -> Fixture {
        let image = self.image("python-ml").await;
        let environment = self
            .environments
            .create("research", Some("churn notebooks".into()), image.id, ALICE)
            .await
            .unwrap();

        let feature_set = if with_features {
            let set = self
                .feature_sets
                .create(Some("customer".into()), Some("customer attributes".into()), ALICE)
                .await
                .unwrap();
            let mut ids = Vec::new();
            for d in [
                descriptor("warehouse", "column", "age"),
                descriptor("warehouse", "column", "tenure"),
            ] {
                ids.push(self.features.create(&d, ALICE).await.unwrap().id);
            }
            self.feature_sets.add_features(set.id, &ids).await.unwrap();
            Some(set)
        } else {
            None
        };

        let model = self
            .models
            .create(
                "churn",
                Some("predicts churn".into()),
                environment.id,
                feature_set.as_ref().map(|s| s.id),
                ALICE,
            )
            .await
            .unwrap();

        let artifacts = self.artifact_dir(&environment, &model);
        fs::create_dir_all(artifacts.join("weights")).unwrap();
        fs::write(artifacts.join("model.pkl"), b"trained").unwrap();
        fs::write(artifacts.join("weights/layer.bin"), [1u8, 2, 3]).unwrap();

        Fixture {
            image,
            environment,
            model,
            feature_set,
        }
    }

    pub fn artifact_dir(&self, env: &environment::Model, model: &ml_model::Model) -> PathBuf {
        self.settings
            .artifact_directory(&env.container_name, &model.ml_model_name)
    }
}

/// Sorted entry names of a zip archive.
pub fn archive_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}
