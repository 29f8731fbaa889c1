// src/filter.rs - Per-landmark single-pole low-pass filter
use nalgebra::Vector3;

use crate::pose::{Joint, Landmarks};

/// Exponential smoothing of each landmark against its previous filtered value.
///
/// `filter_factor` is the weight of the newest sample: 1.0 passes samples
/// through, values near 0 barely move. State is only the last output per joint.
pub struct LandmarkFilter {
    filter_factor: f32,
    last: [Option<Vector3<f32>>; Joint::COUNT],
}

impl LandmarkFilter {
    pub fn new(filter_factor: f32) -> Self {
        Self {
            filter_factor,
            last: [None; Joint::COUNT],
        }
    }

    pub fn filter_factor(&self) -> f32 {
        self.filter_factor
    }

    pub fn is_initialized(&self, joint: Joint) -> bool {
        self.last[joint as usize].is_some()
    }

    pub fn apply(&mut self, joint: Joint, sample: Vector3<f32>) -> Vector3<f32> {
        let slot = &mut self.last[joint as usize];
        let filtered = match *slot {
            None => sample,
            Some(previous) => previous.lerp(&sample, self.filter_factor),
        };
        *slot = Some(filtered);
        filtered
    }

    pub fn apply_all(&mut self, samples: &Landmarks) -> Landmarks {
        Landmarks::from_fn(|joint| self.apply(joint, samples[joint]))
    }
}
