//! Metadata carried inside a model archive.
//!
//! An archive describes one model's lineage: the base image it runs on,
//! the environment that hosted it, the model itself and, when the model
//! was linked to one, its feature set together with the member features.
//! The feature set and its features travel as a single optional bundle so
//! that one can never be present without the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever the envelope changes shape.
pub const PACKAGE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub image: ImageDescriptor,
    pub environment: EnvironmentDescriptor,
    pub model: ModelDescriptor,
    #[serde(default)]
    pub feature_set: Option<FeatureSetBundle>,
}

fn default_format_version() -> u32 {
    PACKAGE_FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ml_model_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub resource: String,
    pub parameter_name: String,
    pub value: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FeatureDescriptor {
    /// The (resource, parameter_name, value) triple that identifies a feature.
    pub fn natural_key(&self) -> (&str, &str, &str) {
        (&self.resource, &self.parameter_name, &self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSetBundle {
    #[serde(rename = "descriptor")]
    pub feature_set: FeatureSetDescriptor,
    #[serde(default)]
    pub features: Vec<FeatureDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_envelope_without_feature_set() {
        let json = r#"{
            "image": {"name": "python-ml"},
            "environment": {"name": "env", "description": "d"},
            "model": {"name": "m"}
        }"#;
        let metadata: PackageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.format_version, PACKAGE_FORMAT_VERSION);
        assert_eq!(metadata.image.name, "python-ml");
        assert!(metadata.feature_set.is_none());
    }

    #[test]
    fn feature_set_bundle_keeps_feature_order() {
        let json = r#"{
            "image": {"name": "python-ml"},
            "environment": {"name": "env"},
            "model": {"name": "m"},
            "feature_set": {
                "descriptor": {"name": "vitals"},
                "features": [
                    {"resource": "Observation", "parameter_name": "code", "value": "8867-4"},
                    {"resource": "Observation", "parameter_name": "code", "value": "8480-6"}
                ]
            }
        }"#;
        let metadata: PackageMetadata = serde_json::from_str(json).unwrap();
        let bundle = metadata.feature_set.unwrap();
        assert_eq!(bundle.feature_set.name.as_deref(), Some("vitals"));
        let values: Vec<_> = bundle.features.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["8867-4", "8480-6"]);
        assert_eq!(
            bundle.features[0].natural_key(),
            ("Observation", "code", "8867-4")
        );
    }
}
