pub mod environment;
pub mod feature;
pub mod feature_feature_set;
pub mod feature_set;
pub mod image;
pub mod ml_model;
