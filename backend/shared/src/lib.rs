pub mod models;
pub mod package;

pub use models::{
    Actor, EnvironmentInfo, EnvironmentStatus, FeatureInfo, FeatureSetInfo, ImageInfo,
    ImportSummary, ModelInfo, PackagedModel,
};
pub use package::{
    EnvironmentDescriptor, FeatureDescriptor, FeatureSetBundle, FeatureSetDescriptor,
    ImageDescriptor, ModelDescriptor, PackageMetadata, PACKAGE_FORMAT_VERSION,
};
