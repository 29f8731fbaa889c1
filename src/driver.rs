// src/driver.rs - Turns the filtered pose into IK targets or bone rotations
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{IkWeights, RetargetConfig};
use crate::error::GeometryError;
use crate::pose::{Joint, Landmarks};
use crate::skeleton::{Bone, IkGoal, IkSolver, Rig, SkeletonBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveMode {
    Ik,
    Fk,
}

/// Per-frame motion generation. Chosen once, at controller construction.
pub trait PoseDriver: Send {
    fn mode(&self) -> DriveMode;

    /// Advance toward `pose` by one frame of `dt` seconds. `None` means no
    /// frame has been accepted yet and nothing moves.
    fn drive(&mut self, pose: Option<&Landmarks>, rig: &mut dyn Rig, binding: &SkeletonBinding, dt: f32);

    /// Called from the runtime's IK pass, after `drive` for the same frame.
    fn solve_ik(&self, _pose: Option<&Landmarks>, _solver: &mut dyn IkSolver) {}
}

pub fn driver_for(config: &RetargetConfig, owner_position: Vector3<f32>) -> Box<dyn PoseDriver> {
    match config.drive_mode() {
        DriveMode::Ik => Box::new(IkDriver::new(config.ik_weights, config.pose_smoothness, owner_position)),
        DriveMode::Fk => Box::new(FkDriver::new(config.pose_smoothness)),
    }
}

/// Fraction of the remaining distance covered this frame.
fn step_fraction(dt: f32, smoothness: f32) -> f32 {
    (dt * smoothness).clamp(0.0, 1.0)
}

/// Rotation whose +Z axis points along `direction`, keeping +Y up where possible.
pub fn look_rotation(direction: &Vector3<f32>) -> Result<UnitQuaternion<f32>, GeometryError> {
    let forward = direction
        .try_normalize(f32::EPSILON)
        .ok_or(GeometryError::DegenerateDirection)?;
    // straight up or down has no usable up vector; fall back to +Z
    let up = if forward.dot(&Vector3::y()).abs() > 1.0 - 1e-4 {
        Vector3::z()
    } else {
        Vector3::y()
    };
    Ok(UnitQuaternion::face_towards(&forward, &up))
}

fn slerp_toward(current: &UnitQuaternion<f32>, target: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    // None only when both are (numerically) the same rotation
    current.try_slerp(target, t, 1.0e-6).unwrap_or(*target)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkTarget {
    pub goal: IkGoal,
    pub position: Vector3<f32>,
}

impl IkTarget {
    fn initial_offset(goal: IkGoal) -> Vector3<f32> {
        match goal {
            IkGoal::HeadLook => Vector3::new(0.0, 1.7, 0.0),
            IkGoal::LeftHand => Vector3::new(-0.5, 1.0, 0.0),
            IkGoal::RightHand => Vector3::new(0.5, 1.0, 0.0),
        }
    }
}

/// Moves one anchor per IK goal and reports them to the solver.
pub struct IkDriver {
    targets: [IkTarget; 3],
    weights: IkWeights,
    pose_smoothness: f32,
}

impl IkDriver {
    pub fn new(weights: IkWeights, pose_smoothness: f32, owner_position: Vector3<f32>) -> Self {
        let targets = IkGoal::ALL.map(|goal| IkTarget {
            goal,
            position: owner_position + IkTarget::initial_offset(goal),
        });
        debug!("IK targets created");
        Self {
            targets,
            weights,
            pose_smoothness,
        }
    }

    pub fn target(&self, goal: IkGoal) -> &IkTarget {
        &self.targets[goal as usize]
    }

    pub fn weight(&self, goal: IkGoal) -> f32 {
        match goal {
            IkGoal::HeadLook => self.weights.head,
            IkGoal::LeftHand => self.weights.left_hand,
            IkGoal::RightHand => self.weights.right_hand,
        }
    }
}

impl PoseDriver for IkDriver {
    fn mode(&self) -> DriveMode {
        DriveMode::Ik
    }

    fn drive(&mut self, pose: Option<&Landmarks>, rig: &mut dyn Rig, _binding: &SkeletonBinding, dt: f32) {
        let Some(pose) = pose else { return };
        let owner = rig.owner_position();
        let t = step_fraction(dt, self.pose_smoothness);

        for target in &mut self.targets {
            let desired = owner + pose[target.goal.joint()];
            target.position = target.position.lerp(&desired, t);
        }
    }

    fn solve_ik(&self, pose: Option<&Landmarks>, solver: &mut dyn IkSolver) {
        if pose.is_none() {
            return;
        }
        for target in &self.targets {
            solver.set_ik_goal(target.goal, self.weight(target.goal), target.position);
        }
    }
}

impl Drop for IkDriver {
    fn drop(&mut self) {
        debug!("IK targets released");
    }
}

/// A bone aimed from one landmark to another.
#[derive(Debug, Clone, Copy)]
struct LimbSegment {
    bone: Bone,
    proximal: Joint,
    distal: Joint,
}

const LIMB_SEGMENTS: [LimbSegment; 4] = [
    LimbSegment { bone: Bone::LeftArm, proximal: Joint::LeftShoulder, distal: Joint::LeftElbow },
    LimbSegment { bone: Bone::LeftForeArm, proximal: Joint::LeftElbow, distal: Joint::LeftWrist },
    LimbSegment { bone: Bone::RightArm, proximal: Joint::RightShoulder, distal: Joint::RightElbow },
    LimbSegment { bone: Bone::RightForeArm, proximal: Joint::RightElbow, distal: Joint::RightWrist },
];

/// Sets world rotations of arm and head bones directly from landmark directions.
pub struct FkDriver {
    pose_smoothness: f32,
}

impl FkDriver {
    pub fn new(pose_smoothness: f32) -> Self {
        Self { pose_smoothness }
    }

    fn aim_bone(&self, rig: &mut dyn Rig, binding: &SkeletonBinding, bone: Bone, direction: Vector3<f32>, t: f32) {
        let Some(handle) = binding.handle(bone) else { return };
        match look_rotation(&direction) {
            Ok(target) => {
                let current = rig.world_rotation(handle);
                rig.set_world_rotation(handle, slerp_toward(&current, &target, t));
            }
            Err(err) => trace!("Skipping {:?} this frame: {}", bone, err),
        }
    }
}

impl PoseDriver for FkDriver {
    fn mode(&self) -> DriveMode {
        DriveMode::Fk
    }

    fn drive(&mut self, pose: Option<&Landmarks>, rig: &mut dyn Rig, binding: &SkeletonBinding, dt: f32) {
        let Some(pose) = pose else { return };
        let t = step_fraction(dt, self.pose_smoothness);

        for segment in &LIMB_SEGMENTS {
            let direction = pose[segment.distal] - pose[segment.proximal];
            self.aim_bone(rig, binding, segment.bone, direction, t);
        }

        // Head aims from the spine toward the head landmark
        if let Some(spine) = binding.handle(Bone::Spine) {
            let direction = pose[Joint::Head] - rig.world_position(spine);
            self.aim_bone(rig, binding, Bone::Head, direction, t);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::RigSkeleton;
    use crate::skeleton::BoneSchema;

    fn bound_rig() -> (RigSkeleton, SkeletonBinding) {
        let rig = RigSkeleton::humanoid("mixamorig:", Vector3::zeros());
        let (binding, _) = SkeletonBinding::resolve(&rig, &BoneSchema::humanoid("mixamorig:"));
        (rig, binding)
    }

    fn sample_pose() -> Landmarks {
        Landmarks::new(
            Vector3::new(0.0, 1.8, 0.1),
            Vector3::new(0.2, 1.45, 0.0),
            Vector3::new(-0.2, 1.45, 0.0),
            Vector3::new(0.45, 1.3, 0.1),
            Vector3::new(-0.45, 1.3, 0.1),
            Vector3::new(0.6, 1.5, 0.3),
            Vector3::new(-0.6, 1.5, 0.3),
        )
    }

    #[test]
    fn test_look_rotation_points_forward_axis() {
        let dir = Vector3::new(1.0, 0.5, -2.0);
        let rot = look_rotation(&dir).unwrap();
        let forward = rot * Vector3::z();
        assert!((forward - dir.normalize()).norm() < 1e-5);
    }

    #[test]
    fn test_look_rotation_vertical_and_degenerate() {
        let up = look_rotation(&Vector3::new(0.0, 3.0, 0.0)).unwrap();
        assert!((up * Vector3::z() - Vector3::y()).norm() < 1e-5);
        assert!(up.coords.iter().all(|c| c.is_finite()));

        assert_eq!(look_rotation(&Vector3::zeros()), Err(GeometryError::DegenerateDirection));
    }

    #[test]
    fn test_ik_targets_start_at_rest_offsets() {
        let owner = Vector3::new(1.0, 0.0, 2.0);
        let driver = IkDriver::new(IkWeights::default(), 8.0, owner);
        assert_eq!(driver.target(IkGoal::HeadLook).position, owner + Vector3::new(0.0, 1.7, 0.0));
        assert_eq!(driver.target(IkGoal::LeftHand).position, owner + Vector3::new(-0.5, 1.0, 0.0));
        assert_eq!(driver.target(IkGoal::RightHand).position, owner + Vector3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_ik_targets_hold_without_pose() {
        let (mut rig, binding) = bound_rig();
        let mut driver = IkDriver::new(IkWeights::default(), 8.0, Vector3::zeros());
        let before = *driver.target(IkGoal::LeftHand);
        driver.drive(None, &mut rig, &binding, 0.016);
        assert_eq!(*driver.target(IkGoal::LeftHand), before);

        driver.solve_ik(None, &mut rig);
        for goal in IkGoal::ALL {
            assert!(rig.ik_request(goal).is_none());
        }
    }

    #[test]
    fn test_ik_target_interpolates_by_frame_time() {
        let (mut rig, binding) = bound_rig();
        rig.set_owner_position(Vector3::new(0.0, 0.0, 1.0));
        let mut driver = IkDriver::new(IkWeights::default(), 10.0, Vector3::zeros());
        let pose = sample_pose();
        let start = driver.target(IkGoal::RightHand).position;
        let desired = Vector3::new(0.0, 0.0, 1.0) + pose[Joint::RightWrist];

        driver.drive(Some(&pose), &mut rig, &binding, 0.05);
        let expected = start.lerp(&desired, 0.5);
        assert!((driver.target(IkGoal::RightHand).position - expected).norm() < 1e-6);

        // a long frame snaps rather than overshoots
        driver.drive(Some(&pose), &mut rig, &binding, 1.0);
        assert!((driver.target(IkGoal::RightHand).position - desired).norm() < 1e-6);
    }

    #[test]
    fn test_ik_reports_weights_and_positions() {
        let (mut rig, binding) = bound_rig();
        let weights = IkWeights { head: 0.5, left_hand: 1.0, right_hand: 0.0 };
        let mut driver = IkDriver::new(weights, 8.0, Vector3::zeros());
        let pose = sample_pose();
        driver.drive(Some(&pose), &mut rig, &binding, 0.016);
        driver.solve_ik(Some(&pose), &mut rig);

        let head = rig.ik_request(IkGoal::HeadLook).unwrap();
        assert_eq!(head.weight, 0.5);
        assert_eq!(head.position, driver.target(IkGoal::HeadLook).position);
        assert_eq!(rig.ik_request(IkGoal::LeftHand).unwrap().weight, 1.0);
        assert_eq!(rig.ik_request(IkGoal::RightHand).unwrap().weight, 0.0);
    }

    #[test]
    fn test_fk_aims_limbs_along_segments() {
        let (mut rig, binding) = bound_rig();
        let mut driver = FkDriver::new(8.0);
        let pose = sample_pose();
        // dt * smoothness >= 1 lands exactly on the target rotation
        driver.drive(Some(&pose), &mut rig, &binding, 1.0);

        let arm = binding.handle(Bone::LeftArm).unwrap();
        let expected = (pose[Joint::LeftElbow] - pose[Joint::LeftShoulder]).normalize();
        let forward = rig.world_rotation(arm) * Vector3::z();
        assert!((forward - expected).norm() < 1e-4, "forward {forward}, expected {expected}");

        let fore_arm = binding.handle(Bone::RightForeArm).unwrap();
        let expected = (pose[Joint::RightWrist] - pose[Joint::RightElbow]).normalize();
        let forward = rig.world_rotation(fore_arm) * Vector3::z();
        assert!((forward - expected).norm() < 1e-4);
    }

    #[test]
    fn test_fk_head_aims_from_spine() {
        let (mut rig, binding) = bound_rig();
        let mut driver = FkDriver::new(8.0);
        let pose = sample_pose();
        let spine = binding.handle(Bone::Spine).unwrap();
        let expected = (pose[Joint::Head] - rig.world_position(spine)).normalize();

        driver.drive(Some(&pose), &mut rig, &binding, 1.0);
        let head = binding.handle(Bone::Head).unwrap();
        assert!((rig.world_rotation(head) * Vector3::z() - expected).norm() < 1e-4);
    }

    #[test]
    fn test_fk_partial_step_moves_part_way() {
        let (mut rig, binding) = bound_rig();
        let mut driver = FkDriver::new(8.0);
        let pose = sample_pose();
        let arm = binding.handle(Bone::LeftArm).unwrap();
        let before = rig.world_rotation(arm);
        let target = look_rotation(&(pose[Joint::LeftElbow] - pose[Joint::LeftShoulder])).unwrap();

        driver.drive(Some(&pose), &mut rig, &binding, 0.05);
        let after = rig.world_rotation(arm);
        let full = before.angle_to(&target);
        assert!((before.angle_to(&after) - 0.4 * full).abs() < 1e-3);
    }

    #[test]
    fn test_fk_degenerate_segment_keeps_rotation() {
        let (mut rig, binding) = bound_rig();
        let mut driver = FkDriver::new(8.0);
        let mut pose = sample_pose();
        driver.drive(Some(&pose), &mut rig, &binding, 1.0);

        let fore_arm = binding.handle(Bone::LeftForeArm).unwrap();
        let arm = binding.handle(Bone::LeftArm).unwrap();
        let fore_arm_before = rig.local_rotation(fore_arm);
        let arm_before = rig.world_rotation(arm);

        // wrist collapses onto the elbow, upper arm still moves
        pose[Joint::LeftElbow] += Vector3::new(0.0, -0.2, 0.0);
        pose[Joint::LeftWrist] = pose[Joint::LeftElbow];
        driver.drive(Some(&pose), &mut rig, &binding, 1.0);

        assert_eq!(rig.local_rotation(fore_arm), fore_arm_before);
        assert!(rig.world_rotation(arm).angle_to(&arm_before) > 1e-3);
    }

    #[test]
    fn test_fk_skips_unbound_bones_and_missing_pose() {
        let rig_template = RigSkeleton::humanoid("mixamorig:", Vector3::zeros());
        let mut rig = rig_template.clone();
        let (binding, errors) = SkeletonBinding::resolve(&rig, &BoneSchema::humanoid("other:"));
        assert_eq!(errors.len(), Bone::COUNT);

        let mut driver = FkDriver::new(8.0);
        driver.drive(Some(&sample_pose()), &mut rig, &binding, 1.0);
        driver.drive(None, &mut rig, &binding, 1.0);

        let (full_binding, _) = SkeletonBinding::resolve(&rig, &BoneSchema::humanoid("mixamorig:"));
        for bone in Bone::ALL {
            let handle = full_binding.handle(bone).unwrap();
            assert_eq!(rig.local_rotation(handle), rig_template.local_rotation(handle));
        }
    }

    #[test]
    fn test_driver_for_follows_config() {
        let mut config = RetargetConfig::default();
        assert_eq!(driver_for(&config, Vector3::zeros()).mode(), DriveMode::Ik);
        config.use_ik = false;
        assert_eq!(driver_for(&config, Vector3::zeros()).mode(), DriveMode::Fk);
    }
}
