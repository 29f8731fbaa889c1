// src/normalize.rs - Source (camera) space to skeleton space
use nalgebra::Vector3;
use tracing::trace;

use crate::config::RetargetConfig;
use crate::pose::Landmarks;

/// Mapping from the estimator's coordinate frame into the avatar's.
///
/// The estimator's vertical axis grows downward and its depth axis points the
/// other way, so Y and Z are always flipped. X is flipped only when mirroring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSpace {
    pub mirror_x: bool,
    pub scale_factor: f32,
    pub root_offset: Vector3<f32>,
}

impl Default for CoordinateSpace {
    fn default() -> Self {
        Self {
            mirror_x: true,
            scale_factor: 0.5,
            root_offset: Vector3::new(0.0, 1.0, 0.0),
        }
    }
}

impl CoordinateSpace {
    pub fn from_config(config: &RetargetConfig) -> Self {
        Self {
            mirror_x: config.mirror_x,
            scale_factor: config.scale_factor,
            root_offset: config.root_offset,
        }
    }

    pub fn to_target(&self, source: &Vector3<f32>) -> Vector3<f32> {
        let x = if self.mirror_x { -source.x } else { source.x };
        Vector3::new(x, -source.y, -source.z) * self.scale_factor + self.root_offset
    }

    pub fn landmarks_to_target(&self, source: &Landmarks) -> Landmarks {
        source.map(|joint, p| {
            let converted = self.to_target(p);
            trace!(
                "{}: ({:.3}, {:.3}, {:.3}) -> ({:.3}, {:.3}, {:.3})",
                joint.wire_name(),
                p.x,
                p.y,
                p.z,
                converted.x,
                converted.y,
                converted.z
            );
            converted
        })
    }
}
