use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identity stamped as `creator_id` on every row a call creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i32,
}

impl Actor {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    Running,
    Stopped,
}

impl EnvironmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentStatus::Running => "running",
            EnvironmentStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Ok(EnvironmentStatus::Running),
            "stopped" => Ok(EnvironmentStatus::Stopped),
            other => Err(format!("unknown environment status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: i32,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub container_id: Option<String>,
    pub container_name: String,
    pub status: EnvironmentStatus,
    pub jupyter_port: Option<i32>,
    pub jupyter_url: Option<String>,
    pub image_id: i32,
    pub creator_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: i32,
    pub environment_id: i32,
    pub ml_model_name: String,
    pub name: String,
    pub description: Option<String>,
    pub feature_set_id: Option<i32>,
    pub creator_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub id: i32,
    pub resource: String,
    pub parameter_name: String,
    pub value: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSetInfo {
    pub id: i32,
    pub name: Option<String>,
    pub description: Option<String>,
    pub creator_id: i32,
    pub features: Vec<FeatureInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Location of an archive written by an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagedModel {
    pub model_id: i32,
    pub archive_path: PathBuf,
    pub file_name: String,
}

/// Outcome of importing one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub model: ModelInfo,
    pub environment_created: bool,
    pub feature_set_id: Option<i32>,
    pub features_created: usize,
    pub features_reused: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_status_round_trips_through_text() {
        assert_eq!("running".parse::<EnvironmentStatus>(), Ok(EnvironmentStatus::Running));
        assert_eq!("Stopped".parse::<EnvironmentStatus>(), Ok(EnvironmentStatus::Stopped));
        assert!("paused".parse::<EnvironmentStatus>().is_err());
        assert_eq!(EnvironmentStatus::Running.to_string(), "running");
    }

    #[test]
    fn environment_status_serializes_lowercase() {
        let json = serde_json::to_string(&EnvironmentStatus::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
    }
}
