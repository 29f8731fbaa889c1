// src/skeleton.rs - Animation runtime boundary and the bone binding resolved against it
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BindingError;
use crate::pose::Joint;

/// Bones the retargeter reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bone {
    Hips,
    Spine,
    Head,
    LeftShoulder,
    RightShoulder,
    LeftArm,
    RightArm,
    LeftForeArm,
    RightForeArm,
    LeftHand,
    RightHand,
}

impl Bone {
    pub const COUNT: usize = 11;

    pub const ALL: [Bone; Bone::COUNT] = [
        Bone::Hips,
        Bone::Spine,
        Bone::Head,
        Bone::LeftShoulder,
        Bone::RightShoulder,
        Bone::LeftArm,
        Bone::RightArm,
        Bone::LeftForeArm,
        Bone::RightForeArm,
        Bone::LeftHand,
        Bone::RightHand,
    ];
}

/// Opaque reference to a bone inside a [`Rig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneHandle(pub usize);

/// IK goals the runtime's solver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IkGoal {
    HeadLook,
    LeftHand,
    RightHand,
}

impl IkGoal {
    pub const ALL: [IkGoal; 3] = [IkGoal::HeadLook, IkGoal::LeftHand, IkGoal::RightHand];

    /// Landmark the goal follows.
    pub fn joint(self) -> Joint {
        match self {
            IkGoal::HeadLook => Joint::Head,
            IkGoal::LeftHand => Joint::LeftWrist,
            IkGoal::RightHand => Joint::RightWrist,
        }
    }
}

/// Bone transforms of the animated skeleton. Only touched on the frame loop.
pub trait Rig {
    /// Resolve a slash separated path of bone names below the rig root.
    fn find_bone(&self, path: &str) -> Option<BoneHandle>;
    /// World position of the object that owns the skeleton.
    fn owner_position(&self) -> Vector3<f32>;
    fn local_rotation(&self, bone: BoneHandle) -> UnitQuaternion<f32>;
    fn set_local_rotation(&mut self, bone: BoneHandle, rotation: UnitQuaternion<f32>);
    fn world_position(&self, bone: BoneHandle) -> Vector3<f32>;
    fn world_rotation(&self, bone: BoneHandle) -> UnitQuaternion<f32>;
    fn set_world_rotation(&mut self, bone: BoneHandle, rotation: UnitQuaternion<f32>);
}

/// Receives effector requests during the runtime's IK pass.
pub trait IkSolver {
    fn set_ik_goal(&mut self, goal: IkGoal, weight: f32, position: Vector3<f32>);
}

/// Ordered list of bones and the path each is expected at.
#[derive(Debug, Clone)]
pub struct BoneSchema {
    entries: Vec<(Bone, String)>,
}

impl BoneSchema {
    pub fn new(entries: Vec<(Bone, String)>) -> Self {
        Self { entries }
    }

    /// Standard humanoid hierarchy with every bone name carrying `prefix`.
    pub fn humanoid(prefix: &str) -> Self {
        let name = |bone: &str| format!("{prefix}{bone}");
        let hips = name("Hips");
        let spine = format!("{hips}/{}", name("Spine"));
        let chest = format!("{spine}/{}/{}", name("Spine1"), name("Spine2"));
        let head = format!("{chest}/{}/{}", name("Neck"), name("Head"));
        let left_shoulder = format!("{chest}/{}", name("LeftShoulder"));
        let left_arm = format!("{left_shoulder}/{}", name("LeftArm"));
        let left_fore_arm = format!("{left_arm}/{}", name("LeftForeArm"));
        let left_hand = format!("{left_fore_arm}/{}", name("LeftHand"));
        let right_shoulder = format!("{chest}/{}", name("RightShoulder"));
        let right_arm = format!("{right_shoulder}/{}", name("RightArm"));
        let right_fore_arm = format!("{right_arm}/{}", name("RightForeArm"));
        let right_hand = format!("{right_fore_arm}/{}", name("RightHand"));

        Self::new(vec![
            (Bone::Hips, hips),
            (Bone::Spine, spine),
            (Bone::Head, head),
            (Bone::LeftShoulder, left_shoulder),
            (Bone::RightShoulder, right_shoulder),
            (Bone::LeftArm, left_arm),
            (Bone::RightArm, right_arm),
            (Bone::LeftForeArm, left_fore_arm),
            (Bone::RightForeArm, right_fore_arm),
            (Bone::LeftHand, left_hand),
            (Bone::RightHand, right_hand),
        ])
    }

    pub fn entries(&self) -> &[(Bone, String)] {
        &self.entries
    }

    pub fn path(&self, bone: Bone) -> Option<&str> {
        self.entries
            .iter()
            .find(|(b, _)| *b == bone)
            .map(|(_, path)| path.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundBone {
    pub handle: BoneHandle,
    pub rest_rotation: UnitQuaternion<f32>,
}

/// Resolved bones with their rest local rotations, captured once.
#[derive(Debug, Clone, Default)]
pub struct SkeletonBinding {
    bones: [Option<BoundBone>; Bone::COUNT],
}

impl SkeletonBinding {
    /// Resolve every schema entry. Failures are collected, not short-circuited.
    pub fn resolve(rig: &dyn Rig, schema: &BoneSchema) -> (Self, Vec<BindingError>) {
        let mut binding = SkeletonBinding::default();
        let mut errors = Vec::new();

        for (bone, path) in schema.entries() {
            match rig.find_bone(path) {
                Some(handle) => {
                    binding.bones[*bone as usize] = Some(BoundBone {
                        handle,
                        rest_rotation: rig.local_rotation(handle),
                    });
                }
                None => errors.push(BindingError::MissingBone {
                    bone: *bone,
                    path: path.clone(),
                }),
            }
        }

        for error in &errors {
            warn!("{}", error);
        }
        info!(
            "Skeleton bound: {}/{} bones resolved",
            binding.bound_count(),
            schema.entries().len()
        );

        (binding, errors)
    }

    pub fn get(&self, bone: Bone) -> Option<&BoundBone> {
        self.bones[bone as usize].as_ref()
    }

    pub fn handle(&self, bone: Bone) -> Option<BoneHandle> {
        self.get(bone).map(|b| b.handle)
    }

    pub fn rest_rotation(&self, bone: Bone) -> Option<UnitQuaternion<f32>> {
        self.get(bone).map(|b| b.rest_rotation)
    }

    pub fn is_bound(&self, bone: Bone) -> bool {
        self.bones[bone as usize].is_some()
    }

    pub fn bound_count(&self) -> usize {
        self.bones.iter().flatten().count()
    }

    /// Put every bound bone back to its captured rest rotation.
    pub fn restore_rest_pose(&self, rig: &mut dyn Rig) {
        for bound in self.bones.iter().flatten() {
            rig.set_local_rotation(bound.handle, bound.rest_rotation);
        }
    }
}
