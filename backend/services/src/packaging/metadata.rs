//! Reading and writing the lineage metadata stored in an archive.
//!
//! Archives written here carry a single `.ketos-metadata/package.json`.
//! Older archives keep the same envelope under `metadata/`, or spread the
//! lineage over one JSON file per entity, either under `metadata/` or
//! directly at the archive root. All of these are still accepted.

use std::fs;
use std::path::{Path, PathBuf};

use ketos_shared::{
    EnvironmentDescriptor, FeatureDescriptor, FeatureSetBundle, FeatureSetDescriptor,
    ImageDescriptor, ModelDescriptor, PackageMetadata, PACKAGE_FORMAT_VERSION,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

pub const METADATA_DIR: &str = ".ketos-metadata";
/// Directory used by older archives, for both the envelope and per-entity files.
pub const LEGACY_METADATA_DIR: &str = "metadata";
pub const METADATA_FILE: &str = "package.json";

const IMAGE_FILE: &str = "image.json";
const ENVIRONMENT_FILE: &str = "environment.json";
const MODEL_FILE: &str = "model.json";
const FEATURE_SET_FILE: &str = "feature_set.json";
const FEATURES_FILE: &str = "features.json";
const PER_ENTITY_FILES: [&str; 5] = [
    IMAGE_FILE,
    ENVIRONMENT_FILE,
    MODEL_FILE,
    FEATURE_SET_FILE,
    FEATURES_FILE,
];

/// Metadata found in an unpacked archive.
#[derive(Debug)]
pub struct LoadedMetadata {
    pub metadata: PackageMetadata,
    /// Directory holding the model artifacts.
    pub package_root: PathBuf,
    /// Top-level names under `package_root` that are metadata, not artifacts.
    pub reserved: Vec<String>,
}

/// Writes `.ketos-metadata/package.json` under `staging`.
pub fn write_metadata(staging: &Path, metadata: &PackageMetadata) -> ServiceResult<PathBuf> {
    let dir = staging.join(METADATA_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(METADATA_FILE);
    fs::write(&path, serde_json::to_vec_pretty(metadata)?)?;
    Ok(path)
}

/// Locates and parses the metadata in an unpacked archive.
pub fn read_metadata(unpacked: &Path) -> ServiceResult<LoadedMetadata> {
    let package_root = locate_package_root(unpacked)?;

    for dir_name in [METADATA_DIR, LEGACY_METADATA_DIR] {
        let envelope = package_root.join(dir_name).join(METADATA_FILE);
        if envelope.is_file() {
            return Ok(LoadedMetadata {
                metadata: read_envelope(&envelope)?,
                package_root,
                reserved: vec![dir_name.to_string()],
            });
        }
    }

    let legacy_dir = package_root.join(LEGACY_METADATA_DIR);
    if legacy_dir.join(MODEL_FILE).is_file() {
        log::warn!("Reading per-entity metadata from {}", legacy_dir.display());
        return Ok(LoadedMetadata {
            metadata: read_per_entity(&legacy_dir)?,
            package_root,
            reserved: vec![LEGACY_METADATA_DIR.to_string()],
        });
    }

    if package_root.join(MODEL_FILE).is_file() {
        log::warn!("Reading per-entity metadata from archive root");
        let mut reserved: Vec<String> = PER_ENTITY_FILES
            .iter()
            .filter(|name| package_root.join(name).is_file())
            .map(|name| name.to_string())
            .collect();
        if legacy_dir.exists() {
            reserved.push(LEGACY_METADATA_DIR.to_string());
        }
        return Ok(LoadedMetadata {
            metadata: read_per_entity(&package_root)?,
            package_root,
            reserved,
        });
    }

    Err(ServiceError::BadInput(
        "archive does not contain model metadata".to_string(),
    ))
}

fn read_envelope(path: &Path) -> ServiceResult<PackageMetadata> {
    let metadata: PackageMetadata = decode(&fs::read(path)?, METADATA_FILE)?;
    if metadata.format_version > PACKAGE_FORMAT_VERSION {
        return Err(ServiceError::BadInput(format!(
            "archive format version {} is newer than supported version {}",
            metadata.format_version, PACKAGE_FORMAT_VERSION
        )));
    }
    Ok(metadata)
}

/// Archive contents are caller input, so malformed JSON is a bad request.
fn decode<T: DeserializeOwned>(bytes: &[u8], file: &str) -> ServiceResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| ServiceError::BadInput(format!("invalid {}: {}", file, e)))
}

/// Archives zipped from a parent directory wrap everything in one folder.
fn locate_package_root(unpacked: &Path) -> ServiceResult<PathBuf> {
    if has_metadata(unpacked) {
        return Ok(unpacked.to_path_buf());
    }
    let entries = super::archive::list_top_level(unpacked)?;
    if let [only] = entries.as_slice() {
        if only.is_dir() && has_metadata(only) {
            log::debug!("Archive content is nested under {}", only.display());
            return Ok(only.clone());
        }
    }
    Ok(unpacked.to_path_buf())
}

fn has_metadata(dir: &Path) -> bool {
    dir.join(METADATA_DIR).is_dir()
        || dir.join(LEGACY_METADATA_DIR).is_dir()
        || dir.join(MODEL_FILE).is_file()
}

fn read_per_entity(dir: &Path) -> ServiceResult<PackageMetadata> {
    let image: ImageDescriptor = read_required(dir, IMAGE_FILE)?;
    let environment: EnvironmentDescriptor = read_required(dir, ENVIRONMENT_FILE)?;
    let model: ModelDescriptor = read_required(dir, MODEL_FILE)?;

    let feature_set: Option<FeatureSetDescriptor> = read_optional(dir, FEATURE_SET_FILE)?;
    let features: Option<Vec<FeatureDescriptor>> = read_optional(dir, FEATURES_FILE)?;

    let feature_set = match (feature_set, features) {
        (Some(feature_set), features) => Some(FeatureSetBundle {
            feature_set,
            features: features.unwrap_or_default(),
        }),
        (None, Some(features)) => {
            log::warn!(
                "Ignoring {} features listed without a feature set",
                features.len()
            );
            None
        }
        (None, None) => None,
    };

    Ok(PackageMetadata {
        format_version: PACKAGE_FORMAT_VERSION,
        image,
        environment,
        model,
        feature_set,
    })
}

fn read_required<T: DeserializeOwned>(dir: &Path, file: &str) -> ServiceResult<T> {
    read_optional(dir, file)?.ok_or_else(|| {
        ServiceError::BadInput(format!("archive metadata is missing {}", file))
    })
}

/// Per-entity files are raw row dumps; timestamps in them are informational
/// and their format varies, so they are dropped before decoding.
fn read_optional<T: DeserializeOwned>(dir: &Path, file: &str) -> ServiceResult<Option<T>> {
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(None);
    }
    let mut value: Value = decode(&fs::read(&path)?, file)?;
    strip_timestamps(&mut value);
    if value.is_null() {
        return Ok(None);
    }
    let decoded = serde_json::from_value(value)
        .map_err(|e| ServiceError::BadInput(format!("invalid {}: {}", file, e)))?;
    Ok(Some(decoded))
}

fn strip_timestamps(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("created_at");
            map.remove("updated_at");
        }
        Value::Array(items) => items.iter_mut().for_each(strip_timestamps),
        _ => {}
    }
}
