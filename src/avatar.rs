// src/avatar.rs - Retargets streamed landmarks onto one skeleton
use nalgebra::Vector3;
use tracing::{debug, info, warn};

use crate::config::RetargetConfig;
use crate::driver::{driver_for, DriveMode, PoseDriver};
use crate::error::BindingError;
use crate::filter::LandmarkFilter;
use crate::normalize::CoordinateSpace;
use crate::pose::Landmarks;
use crate::skeleton::{BoneSchema, IkSolver, Rig, SkeletonBinding};

/// Anything that accepts complete landmark sets in source space.
pub trait PoseSink {
    fn update_pose(&mut self, source: &Landmarks);
}

/// Owns the pipeline state for a single avatar.
///
/// `update_pose` runs the normalizer and filter and stores the result as the
/// current pose. `tick` and `on_animator_ik` read it once per frame. All three
/// must be called from the frame loop; other threads go through the dispatcher.
pub struct AvatarController {
    space: CoordinateSpace,
    filter: LandmarkFilter,
    current: Option<Landmarks>,
    binding: SkeletonBinding,
    driver: Box<dyn PoseDriver>,
    accepted_frames: u64,
}

impl AvatarController {
    pub fn new(config: &RetargetConfig, rig: &dyn Rig) -> Self {
        let (controller, _) = Self::with_schema(config, rig, &BoneSchema::humanoid(&config.bone_prefix));
        controller
    }

    /// Build against an explicit schema. Missing bones are returned, and the
    /// operations that need them are skipped every frame.
    pub fn with_schema(
        config: &RetargetConfig,
        rig: &dyn Rig,
        schema: &BoneSchema,
    ) -> (Self, Vec<BindingError>) {
        let (binding, errors) = SkeletonBinding::resolve(rig, schema);
        let driver = driver_for(config, rig.owner_position());

        info!(
            "AvatarController initialized ({:?} mode, filter factor {}, smoothness {})",
            driver.mode(),
            config.filter_factor,
            config.pose_smoothness
        );

        let controller = Self {
            space: CoordinateSpace::from_config(config),
            filter: LandmarkFilter::new(config.filter_factor),
            current: None,
            binding,
            driver,
            accepted_frames: 0,
        };
        (controller, errors)
    }

    pub fn mode(&self) -> DriveMode {
        self.driver.mode()
    }

    pub fn current_pose(&self) -> Option<&Landmarks> {
        self.current.as_ref()
    }

    pub fn accepted_frames(&self) -> u64 {
        self.accepted_frames
    }

    pub fn binding(&self) -> &SkeletonBinding {
        &self.binding
    }

    /// Per-frame update: move IK targets or bone rotations toward the current pose.
    pub fn tick(&mut self, rig: &mut dyn Rig, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            warn!("Ignoring tick with invalid frame time {}", dt);
            return;
        }
        self.driver.drive(self.current.as_ref(), rig, &self.binding, dt);
    }

    /// The runtime's IK pass for this frame.
    pub fn on_animator_ik(&self, solver: &mut dyn IkSolver) {
        self.driver.solve_ik(self.current.as_ref(), solver);
    }

    /// Return bound bones to the rotations captured at startup.
    pub fn restore_rest_pose(&self, rig: &mut dyn Rig) {
        self.binding.restore_rest_pose(rig);
    }

    /// Source-space convenience taking the seven landmarks individually.
    #[allow(clippy::too_many_arguments)]
    pub fn update_pose_points(
        &mut self,
        head: Vector3<f32>,
        left_shoulder: Vector3<f32>,
        right_shoulder: Vector3<f32>,
        left_elbow: Vector3<f32>,
        right_elbow: Vector3<f32>,
        left_wrist: Vector3<f32>,
        right_wrist: Vector3<f32>,
    ) {
        self.update_pose(&Landmarks::new(
            head,
            left_shoulder,
            right_shoulder,
            left_elbow,
            right_elbow,
            left_wrist,
            right_wrist,
        ));
    }
}

impl PoseSink for AvatarController {
    fn update_pose(&mut self, source: &Landmarks) {
        let normalized = self.space.landmarks_to_target(source);
        if let Some((joint, _)) = normalized.iter().find(|(_, p)| !p.iter().all(|c| c.is_finite())) {
            warn!("Ignoring pose with non-finite {:?} landmark", joint);
            return;
        }
        let filtered = self.filter.apply_all(&normalized);
        self.current = Some(filtered);
        self.accepted_frames += 1;
        debug!("Pose frame {} applied", self.accepted_frames);
    }
}
