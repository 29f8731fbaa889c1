// src/config.rs
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::driver::DriveMode;
use crate::error::ConfigError;

/// Frame loop rates accepted by `validate`.
pub const TICK_RATE_RANGE_HZ: RangeInclusive<f32> = 1.0..=1000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetConfig {
    /// Drive the rig through IK targets instead of direct bone rotations.
    pub use_ik: bool,
    pub ik_weights: IkWeights,
    /// Interpolation rate per second for targets and bone rotations.
    pub pose_smoothness: f32,
    pub mirror_x: bool,
    pub scale_factor: f32,
    pub root_offset: Vector3<f32>,
    /// Weight of the newest sample in the landmark filter, in (0, 1].
    pub filter_factor: f32,
    /// Bone name prefix used by the skeleton schema.
    pub bone_prefix: String,
    pub tick_rate_hz: f32,
    pub receiver: ReceiverConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkWeights {
    pub head: f32,
    pub left_hand: f32,
    pub right_hand: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub output_directory: PathBuf,
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            use_ik: true,
            ik_weights: IkWeights::default(),
            pose_smoothness: 8.0,
            mirror_x: true,
            scale_factor: 0.5,
            root_offset: Vector3::new(0.0, 1.0, 0.0),
            filter_factor: 0.3,
            bone_prefix: "mixamorig:".to_string(),
            tick_rate_hz: 60.0,
            receiver: ReceiverConfig::default(),
            recording: RecordingConfig::default(),
        }
    }
}

impl Default for IkWeights {
    fn default() -> Self {
        Self {
            head: 1.0,
            left_hand: 1.0,
            right_hand: 1.0,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5052,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("PoseMimic")))
                .unwrap_or_else(|| PathBuf::from("./output")),
        }
    }
}

impl RetargetConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Read(e, path.to_path_buf()))?;
        let config = Self::from_json(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: RetargetConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path if given, else the platform config file, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "posemimic", "PoseMimic")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn drive_mode(&self) -> DriveMode {
        if self.use_ik {
            DriveMode::Ik
        } else {
            DriveMode::Fk
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(invalid("scale_factor", "must be a positive number", self.scale_factor));
        }
        if !(self.filter_factor > 0.0 && self.filter_factor <= 1.0) {
            return Err(invalid("filter_factor", "must be in (0, 1]", self.filter_factor));
        }
        if !(self.pose_smoothness.is_finite() && self.pose_smoothness > 0.0) {
            return Err(invalid("pose_smoothness", "must be a positive number", self.pose_smoothness));
        }
        if !TICK_RATE_RANGE_HZ.contains(&self.tick_rate_hz) {
            return Err(invalid("tick_rate_hz", "must be between 1 and 1000 Hz", self.tick_rate_hz));
        }
        if !self.root_offset.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "root_offset",
                reason: "components must be finite".to_string(),
            });
        }
        for (field, weight) in [
            ("ik_weights.head", self.ik_weights.head),
            ("ik_weights.left_hand", self.ik_weights.left_hand),
            ("ik_weights.right_hand", self.ik_weights.right_hand),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(invalid(field, "must be in [0, 1]", weight));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, rule: &str, value: f32) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: format!("{rule}, got {value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RetargetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.drive_mode(), DriveMode::Ik);
        assert_eq!(config.receiver.port, 5052);
        assert_eq!(config.filter_factor, 0.3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RetargetConfig::from_json(
            r#"{"use_ik": false, "root_offset": [0.0, 0.5, 1.0], "ik_weights": {"head": 0.25}}"#,
        )
        .unwrap();
        assert_eq!(config.drive_mode(), DriveMode::Fk);
        assert_eq!(config.root_offset, Vector3::new(0.0, 0.5, 1.0));
        assert_eq!(config.ik_weights.head, 0.25);
        assert_eq!(config.ik_weights.left_hand, 1.0);
        assert_eq!(config.scale_factor, 0.5);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            (r#"{"scale_factor": 0.0}"#, "scale_factor"),
            (r#"{"scale_factor": -1.0}"#, "scale_factor"),
            (r#"{"filter_factor": 0.0}"#, "filter_factor"),
            (r#"{"filter_factor": 1.5}"#, "filter_factor"),
            (r#"{"pose_smoothness": 0.0}"#, "pose_smoothness"),
            (r#"{"tick_rate_hz": -5.0}"#, "tick_rate_hz"),
            (r#"{"tick_rate_hz": 1e-30}"#, "tick_rate_hz"),
            (r#"{"tick_rate_hz": 5000.0}"#, "tick_rate_hz"),
            (r#"{"ik_weights": {"right_hand": 1.2}}"#, "ik_weights.right_hand"),
        ];
        for (json, expected) in cases {
            match RetargetConfig::from_json(json) {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{json}"),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_filter_factor_one_is_allowed() {
        assert!(RetargetConfig::from_json(r#"{"filter_factor": 1.0}"#).is_ok());
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            RetargetConfig::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let path = std::env::temp_dir().join("pose_mimic_no_such_config.json");
        assert!(matches!(
            RetargetConfig::load(&path),
            Err(ConfigError::Read(_, p)) if p == path
        ));
    }
}
