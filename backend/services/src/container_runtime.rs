use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, HostConfig, PortBinding};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListContainersOptions,
    RemoveContainerOptionsBuilder, StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use futures::TryStreamExt;

use crate::error::{ServiceError, ServiceResult};
use crate::settings::RegistrySettings;

/// Everything needed to launch one environment container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: Option<String>,
    pub host_port: u16,
    pub container_port: u16,
    pub host_data_dir: PathBuf,
    pub mount_path: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates and starts a container, returning its runtime id.
    async fn run_container(&self, spec: &ContainerSpec) -> ServiceResult<String>;

    async fn start_container(&self, container_id: &str) -> ServiceResult<()>;

    async fn stop_container(&self, container_id: &str) -> ServiceResult<()>;

    async fn remove_container(&self, container_id: &str) -> ServiceResult<()>;
}

pub struct DockerRuntime {
    docker: Docker,
    credentials: Option<DockerCredentials>,
}

impl DockerRuntime {
    pub async fn new(registry: &RegistrySettings) -> anyhow::Result<Self> {
        use anyhow::Context;

        // DOCKER_HOST can be unix:///path or tcp://host:port
        let docker = if let Ok(docker_host) = std::env::var("DOCKER_HOST") {
            log::info!("Using DOCKER_HOST: {}", docker_host);
            if let Some(socket_path) = docker_host.strip_prefix("unix://") {
                Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                    .context(format!("Failed to connect to Docker socket: {}", socket_path))?
            } else {
                Docker::connect_with_http(&docker_host, 120, bollard::API_DEFAULT_VERSION)
                    .context(format!("Failed to connect to Docker host: {}", docker_host))?
            }
        } else {
            log::info!("Using Docker local defaults");
            Docker::connect_with_local_defaults()
                .context("Failed to connect to Docker daemon")?
        };

        let test_options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        match docker.list_containers(Some(test_options)).await {
            Ok(containers) => {
                log::info!(
                    "Docker connection successful. Found {} containers on initial connection test",
                    containers.len()
                );
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to connect to Docker daemon: {}. Make sure Docker is running and accessible.",
                    e
                ));
            }
        }

        let credentials = registry.has_credentials().then(|| DockerCredentials {
            username: Some(registry.username.clone()),
            password: Some(registry.password.clone()),
            serveraddress: (!registry.url.is_empty()).then(|| registry.url.clone()),
            ..Default::default()
        });

        Ok(Self { docker, credentials })
    }

    async fn pull_image(&self, image: &str) -> ServiceResult<()> {
        let options = CreateImageOptionsBuilder::default().from_image(image).build();

        let progress: Vec<_> = self
            .docker
            .create_image(Some(options), None, self.credentials.clone())
            .try_collect()
            .await
            .map_err(|e| {
                log::error!("Failed to pull image {}: {}", image, e);
                ServiceError::Runtime(format!("failed to pull image {}: {}", image, e))
            })?;

        log::info!("Pulled image {} ({} progress events)", image, progress.len());
        Ok(())
    }
}

/// Maps "already in the requested state" to success and unknown ids to NotFound.
fn settle(container_id: &str, result: Result<(), DockerError>) -> ServiceResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(DockerError::DockerResponseServerError { status_code: 304, .. }) => Ok(()),
        Err(DockerError::DockerResponseServerError { status_code: 404, .. }) => {
            Err(ServiceError::not_found("container", container_id))
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run_container(&self, spec: &ContainerSpec) -> ServiceResult<String> {
        self.pull_image(&spec.image).await?;

        let container_port = format!("{}/tcp", spec.container_port);
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            binds: Some(vec![format!(
                "{}:{}:rw",
                spec.host_data_dir.display(),
                spec.mount_path
            )]),
            network_mode: spec.network.clone(),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default().name(&spec.name).build();
        let created = self.docker.create_container(Some(options), body).await?;

        for warning in &created.warnings {
            log::warn!("Docker warning for container {}: {}", spec.name, warning);
        }

        self.docker
            .start_container(&created.id, None::<StartContainerOptions>)
            .await?;

        log::info!(
            "Started container {} ({}) from {} on host port {}",
            spec.name, created.id, spec.image, spec.host_port
        );
        Ok(created.id)
    }

    async fn start_container(&self, container_id: &str) -> ServiceResult<()> {
        let result = self
            .docker
            .start_container(container_id, None::<StartContainerOptions>)
            .await;
        settle(container_id, result)?;
        log::info!("Started container {}", container_id);
        Ok(())
    }

    async fn stop_container(&self, container_id: &str) -> ServiceResult<()> {
        let result = self
            .docker
            .stop_container(container_id, None::<StopContainerOptions>)
            .await;
        settle(container_id, result)?;
        log::info!("Stopped container {}", container_id);
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> ServiceResult<()> {
        let options = RemoveContainerOptionsBuilder::default().force(true).build();
        let result = self
            .docker
            .remove_container(container_id, Some(options))
            .await;
        match settle(container_id, result) {
            // Already gone is what we wanted
            Err(ServiceError::NotFound { .. }) => {
                log::warn!("Container {} was already removed", container_id);
                Ok(())
            }
            other => {
                other?;
                log::info!("Removed container {}", container_id);
                Ok(())
            }
        }
    }
}
