// src/data.rs - Session capture of the filtered pose stream
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::pose::{Joint, Landmarks};

#[derive(Debug, Serialize)]
struct PoseRecord {
    timestamp: f64,
    frame: u64,

    head_x: f32,
    head_y: f32,
    head_z: f32,

    left_shoulder_x: f32,
    left_shoulder_y: f32,
    left_shoulder_z: f32,

    right_shoulder_x: f32,
    right_shoulder_y: f32,
    right_shoulder_z: f32,

    left_elbow_x: f32,
    left_elbow_y: f32,
    left_elbow_z: f32,

    right_elbow_x: f32,
    right_elbow_y: f32,
    right_elbow_z: f32,

    left_wrist_x: f32,
    left_wrist_y: f32,
    left_wrist_z: f32,

    right_wrist_x: f32,
    right_wrist_y: f32,
    right_wrist_z: f32,
}

impl PoseRecord {
    fn new(frame: u64, timestamp: f64, pose: &Landmarks) -> Self {
        let head = pose[Joint::Head];
        let ls = pose[Joint::LeftShoulder];
        let rs = pose[Joint::RightShoulder];
        let le = pose[Joint::LeftElbow];
        let re = pose[Joint::RightElbow];
        let lw = pose[Joint::LeftWrist];
        let rw = pose[Joint::RightWrist];

        Self {
            timestamp,
            frame,
            head_x: head.x,
            head_y: head.y,
            head_z: head.z,
            left_shoulder_x: ls.x,
            left_shoulder_y: ls.y,
            left_shoulder_z: ls.z,
            right_shoulder_x: rs.x,
            right_shoulder_y: rs.y,
            right_shoulder_z: rs.z,
            left_elbow_x: le.x,
            left_elbow_y: le.y,
            left_elbow_z: le.z,
            right_elbow_x: re.x,
            right_elbow_y: re.y,
            right_elbow_z: re.z,
            left_wrist_x: lw.x,
            left_wrist_y: lw.y,
            left_wrist_z: lw.z,
            right_wrist_x: rw.x,
            right_wrist_y: rw.y,
            right_wrist_z: rw.z,
        }
    }
}

/// Buffers filtered poses in memory and writes them out as one CSV per session.
///
/// Rows carry the avatar's accepted-frame number, so gaps show frames that
/// were applied while nothing was being recorded.
pub struct PoseRecorder {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<PoseRecord>,
}

impl PoseRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name: session_name
                .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))),
            records: Vec::new(),
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add_frame(&mut self, frame: u64, pose: &Landmarks, timestamp: f64) {
        self.records.push(PoseRecord::new(frame, timestamp, pose));
    }

    /// Writes `<output_dir>/<session>/pose_data.csv` and returns its path.
    pub fn export_csv(&self) -> Result<PathBuf> {
        let session_dir = self.output_dir.join(&self.session_name);
        std::fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create {}", session_dir.display()))?;

        let csv_path = session_dir.join("pose_data.csv");
        let mut writer = Writer::from_path(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;

        Ok(csv_path)
    }
}
