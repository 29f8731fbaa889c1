// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::pose::Joint;
use crate::skeleton::Bone;

// Umbrella error for the retargeting pipeline
#[derive(Error, Debug)]
pub enum RetargetError {
    #[error("Pose Error: {0}")]
    Pose(#[from] PoseError),
    #[error("Binding Error: {0}")]
    Binding(#[from] BindingError),
    #[error("Config Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Geometry Error: {0}")]
    Geometry(#[from] GeometryError),
}

// Frame decoding and completeness
#[derive(Error, Debug)]
pub enum PoseError {
    #[error("Malformed pose payload: {0}")]
    Malformed(serde_json::Error),
    #[error("Truncated pose payload: {0}")]
    Truncated(serde_json::Error),
    #[error("Unsupported pose schema version {0}")]
    UnsupportedVersion(u32),
    #[error("Landmark {joint:?} has a non-finite coordinate")]
    NonFinite { joint: Joint },
    #[error("Pose frame is missing required joints: {missing:?}")]
    Incomplete { missing: Vec<Joint> },
}

impl From<serde_json::Error> for PoseError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() {
            PoseError::Truncated(err)
        } else {
            PoseError::Malformed(err)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Could not find bone {bone:?} at '{path}'")]
    MissingBone { bone: Bone, path: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryError {
    #[error("Direction vector is degenerate (zero length)")]
    DegenerateDirection,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Read(std::io::Error, PathBuf),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
