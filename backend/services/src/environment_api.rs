use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::net::TcpStream;

use crate::error::{ServiceError, ServiceResult};
use crate::retry::{retry_with_backoff, RetryConfig};

/// Calls into the API every environment container serves internally.
#[async_trait]
pub trait EnvironmentApi: Send + Sync {
    /// Waits until `endpoint` (`host:port`) accepts connections.
    async fn await_ready(&self, endpoint: &str, timeout: Duration) -> ServiceResult<()>;

    /// Starts the notebook service and returns its session token.
    async fn start_notebook(&self, endpoint: &str) -> ServiceResult<String>;

    /// Reserves a model slot and returns the artifact directory name.
    async fn register_model(&self, endpoint: &str) -> ServiceResult<String>;
}

#[derive(Debug, Deserialize)]
struct NotebookResponse {
    jupyter_token: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RegisterModelResponse {
    #[serde(rename = "modelName")]
    model_name: serde_json::Value,
}

/// Tokens and names come back as either strings or numbers.
fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

pub struct HttpEnvironmentApi {
    client: reqwest::Client,
}

impl HttpEnvironmentApi {
    pub fn new(request_timeout: Duration) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn post_json<T>(&self, endpoint: &str, path: &str) -> ServiceResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("http://{}{}", endpoint, path);
        let response = self
            .client
            .post(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| {
                log::error!("Environment API call {} failed: {}", url, e);
                ServiceError::EnvironmentApi(format!("{} failed: {}", url, e))
            })?;

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl EnvironmentApi for HttpEnvironmentApi {
    async fn await_ready(&self, endpoint: &str, timeout: Duration) -> ServiceResult<()> {
        let config = RetryConfig::with_deadline(timeout);
        let operation = format!("readiness check for {}", endpoint);

        retry_with_backoff(&config, &operation, move || async move {
            TcpStream::connect(endpoint).await.map(|_| ())
        })
        .await
        .map_err(|e| {
            log::warn!("Environment {} not reachable: {}", endpoint, e);
            ServiceError::NotReady {
                endpoint: endpoint.to_string(),
                timeout,
            }
        })
    }

    async fn start_notebook(&self, endpoint: &str) -> ServiceResult<String> {
        let response: NotebookResponse = self.post_json(endpoint, "/jupyter").await?;
        Ok(value_to_string(response.jupyter_token))
    }

    async fn register_model(&self, endpoint: &str) -> ServiceResult<String> {
        let response: RegisterModelResponse = self.post_json(endpoint, "/models").await?;
        let name = value_to_string(response.model_name);
        log::info!("Environment {} registered model directory {}", endpoint, name);
        Ok(name)
    }
}
