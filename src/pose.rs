// src/pose.rs - Landmark identities, complete pose sets and the wire decoder
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::error::PoseError;

/// Schema version assumed when a packet does not carry one.
pub const SCHEMA_VERSION: u32 = 1;

/// Tracked body landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Joint {
    Head,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
}

impl Joint {
    pub const COUNT: usize = 7;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Head,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
    ];

    /// Name used by the landmark stream.
    pub fn wire_name(self) -> &'static str {
        match self {
            Joint::Head => "Head",
            Joint::LeftShoulder => "L.Shoulder",
            Joint::RightShoulder => "R.Shoulder",
            Joint::LeftElbow => "L.Elbow",
            Joint::RightElbow => "R.Elbow",
            Joint::LeftWrist => "L.Wrist",
            Joint::RightWrist => "R.Wrist",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Joint::ALL.into_iter().find(|joint| joint.wire_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One position per joint. Completeness is guaranteed by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmarks {
    points: [Vector3<f32>; Joint::COUNT],
}

impl Landmarks {
    pub fn new(
        head: Vector3<f32>,
        left_shoulder: Vector3<f32>,
        right_shoulder: Vector3<f32>,
        left_elbow: Vector3<f32>,
        right_elbow: Vector3<f32>,
        left_wrist: Vector3<f32>,
        right_wrist: Vector3<f32>,
    ) -> Self {
        Self {
            points: [
                head,
                left_shoulder,
                right_shoulder,
                left_elbow,
                right_elbow,
                left_wrist,
                right_wrist,
            ],
        }
    }

    pub fn from_fn(mut f: impl FnMut(Joint) -> Vector3<f32>) -> Self {
        Self {
            points: Joint::ALL.map(|joint| f(joint)),
        }
    }

    pub fn map(&self, mut f: impl FnMut(Joint, &Vector3<f32>) -> Vector3<f32>) -> Self {
        Self::from_fn(|joint| f(joint, &self[joint]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, &Vector3<f32>)> + '_ {
        Joint::ALL.into_iter().map(move |joint| (joint, &self[joint]))
    }
}

impl Index<Joint> for Landmarks {
    type Output = Vector3<f32>;

    fn index(&self, joint: Joint) -> &Self::Output {
        &self.points[joint.index()]
    }
}

impl IndexMut<Joint> for Landmarks {
    fn index_mut(&mut self, joint: Joint) -> &mut Self::Output {
        &mut self.points[joint.index()]
    }
}

// Wire types: {"version": 1, "pose": [{"index": 0, "name": "Head", "x": .., "y": .., "z": ..}]}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosePacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub pose: Vec<PoseLandmark>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseLandmark {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PosePacket {
    pub fn from_landmarks(landmarks: &Landmarks) -> Self {
        Self {
            version: Some(SCHEMA_VERSION),
            pose: landmarks
                .iter()
                .map(|(joint, p)| PoseLandmark {
                    index: Some(estimator_index(joint)),
                    name: joint.wire_name().to_string(),
                    x: p.x,
                    y: p.y,
                    z: p.z,
                })
                .collect(),
        }
    }
}

// Landmark indices of the upstream estimator's 33-point body model
fn estimator_index(joint: Joint) -> u32 {
    match joint {
        Joint::Head => 0,
        Joint::LeftShoulder => 11,
        Joint::RightShoulder => 12,
        Joint::LeftElbow => 13,
        Joint::RightElbow => 14,
        Joint::LeftWrist => 15,
        Joint::RightWrist => 16,
    }
}

/// A decoded frame. May be missing joints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseFrame {
    landmarks: HashMap<Joint, Vector3<f32>>,
}

impl PoseFrame {
    pub fn decode(payload: &[u8]) -> Result<Self, PoseError> {
        let packet: PosePacket = serde_json::from_slice(payload)?;
        Self::from_packet(packet)
    }

    pub fn from_packet(packet: PosePacket) -> Result<Self, PoseError> {
        let version = packet.version.unwrap_or(SCHEMA_VERSION);
        if version != SCHEMA_VERSION {
            return Err(PoseError::UnsupportedVersion(version));
        }

        let mut frame = PoseFrame::default();
        for landmark in packet.pose {
            // Unknown names are skipped, later duplicates win
            if let Some(joint) = Joint::from_wire_name(&landmark.name) {
                let position = Vector3::new(landmark.x, landmark.y, landmark.z);
                // Out-of-range numbers parse as infinities
                if !position.iter().all(|c| c.is_finite()) {
                    return Err(PoseError::NonFinite { joint });
                }
                frame.landmarks.insert(joint, position);
            }
        }
        Ok(frame)
    }

    pub fn get(&self, joint: Joint) -> Option<&Vector3<f32>> {
        self.landmarks.get(&joint)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn missing(&self) -> Vec<Joint> {
        Joint::ALL
            .into_iter()
            .filter(|joint| !self.landmarks.contains_key(joint))
            .collect()
    }

    pub fn into_landmarks(self) -> Result<Landmarks, PoseError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(PoseError::Incomplete { missing });
        }
        Ok(Landmarks::from_fn(|joint| self.landmarks[&joint]))
    }

    /// One line per landmark, `name: x:.. y:.. z:..`.
    pub fn summary(&self) -> String {
        Joint::ALL
            .into_iter()
            .filter_map(|joint| {
                self.get(joint).map(|p| {
                    format!(
                        "{}: x:{:.3}, y:{:.3}, z:{:.3}",
                        joint.wire_name(),
                        p.x,
                        p.y,
                        p.z
                    )
                })
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
