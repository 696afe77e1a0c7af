use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

pub const DEFAULT_ENVIRONMENTS_DATA_ROOT: &str = "/ketos/environments_data";

#[derive(Debug, Clone, Default)]
pub struct RegistrySettings {
    /// Prefix for image references, e.g. `registry.example.org`.
    pub domain: String,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl RegistrySettings {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Host layout and container parameters shared by the lifecycle services
/// and the packaging engine.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub environments_data_root: PathBuf,
    pub packaging_root: PathBuf,
    pub import_workspace_dir: PathBuf,
    pub registry: RegistrySettings,
    pub environment_network: Option<String>,
    pub environment_api_port: u16,
    pub notebook_container_port: u16,
    pub environment_mount_path: String,
    pub ready_timeout: Duration,
    pub public_host: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self::with_data_root(DEFAULT_ENVIRONMENTS_DATA_ROOT)
    }
}

impl PlatformSettings {
    pub fn with_data_root(root: impl Into<PathBuf>) -> Self {
        let environments_data_root = root.into();
        Self {
            packaging_root: environments_data_root.join("packaging"),
            environments_data_root,
            import_workspace_dir: std::env::temp_dir(),
            registry: RegistrySettings::default(),
            environment_network: None,
            environment_api_port: 5000,
            notebook_container_port: 8000,
            environment_mount_path: "/mlenvironment/models".to_string(),
            ready_timeout: Duration::from_secs(120),
            public_host: "localhost".to_string(),
        }
    }

    /// Host directory bind-mounted into the environment's container.
    pub fn data_directory(&self, container_name: &str) -> PathBuf {
        self.environments_data_root.join(container_name)
    }

    pub fn artifact_directory(&self, container_name: &str, ml_model_name: &str) -> PathBuf {
        self.data_directory(container_name).join(ml_model_name)
    }

    /// Export staging and archives for every model of one environment land here.
    pub fn packaging_directory(&self, container_name: &str) -> PathBuf {
        self.packaging_root.join(container_name)
    }

    pub fn image_reference(&self, image_name: &str) -> String {
        if self.registry.domain.is_empty() {
            image_name.to_string()
        } else {
            format!("{}/{}", self.registry.domain.trim_end_matches('/'), image_name)
        }
    }

    /// `host:port` of the environment's internal API on the environment network.
    pub fn environment_endpoint(&self, container_name: &str) -> String {
        format!("{}:{}", container_name, self.environment_api_port)
    }

    pub fn notebook_url(&self, port: i32, token: &str) -> String {
        format!("http://{}:{}/?token={}", self.public_host, port, token)
    }
}

/// Rejects names that would resolve outside their parent directory.
pub fn ensure_path_component(kind: &str, name: &str) -> ServiceResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ServiceError::BadInput(format!(
            "{} '{}' is not a plain directory name",
            kind, name
        ))),
    }
}
