// src/rig.rs - Headless skeleton used when no animation runtime is attached
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::HashMap;

use crate::skeleton::{BoneHandle, IkGoal, IkSolver, Rig};

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<BoneHandle>,
    local_position: Vector3<f32>,
    local_rotation: UnitQuaternion<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkRequest {
    pub weight: f32,
    pub position: Vector3<f32>,
}

/// Bone hierarchy with plain local transforms. IK requests are recorded, not solved.
#[derive(Debug, Clone)]
pub struct RigSkeleton {
    owner_position: Vector3<f32>,
    nodes: Vec<Node>,
    ik_requests: HashMap<IkGoal, IkRequest>,
}

impl RigSkeleton {
    pub fn new(owner_position: Vector3<f32>) -> Self {
        Self {
            owner_position,
            nodes: Vec::new(),
            ik_requests: HashMap::new(),
        }
    }

    pub fn add_bone(
        &mut self,
        parent: Option<BoneHandle>,
        name: impl Into<String>,
        local_position: Vector3<f32>,
    ) -> BoneHandle {
        self.nodes.push(Node {
            name: name.into(),
            parent,
            local_position,
            local_rotation: UnitQuaternion::identity(),
        });
        BoneHandle(self.nodes.len() - 1)
    }

    /// A T-posed humanoid, roughly 1.7 m tall, with bone names carrying `prefix`.
    pub fn humanoid(prefix: &str, owner_position: Vector3<f32>) -> Self {
        let mut rig = Self::new(owner_position);
        let bone = |rig: &mut Self, parent: Option<BoneHandle>, name: &str, x: f32, y: f32| {
            rig.add_bone(parent, format!("{prefix}{name}"), Vector3::new(x, y, 0.0))
        };

        let hips = bone(&mut rig, None, "Hips", 0.0, 1.0);
        let spine = bone(&mut rig, Some(hips), "Spine", 0.0, 0.1);
        let spine1 = bone(&mut rig, Some(spine), "Spine1", 0.0, 0.12);
        let spine2 = bone(&mut rig, Some(spine1), "Spine2", 0.0, 0.14);
        let neck = bone(&mut rig, Some(spine2), "Neck", 0.0, 0.16);
        bone(&mut rig, Some(neck), "Head", 0.0, 0.1);

        for (side, sign) in [("Left", 1.0_f32), ("Right", -1.0)] {
            let shoulder = bone(&mut rig, Some(spine2), &format!("{side}Shoulder"), 0.06 * sign, 0.12);
            let arm = bone(&mut rig, Some(shoulder), &format!("{side}Arm"), 0.12 * sign, 0.0);
            let fore_arm = bone(&mut rig, Some(arm), &format!("{side}ForeArm"), 0.27 * sign, 0.0);
            bone(&mut rig, Some(fore_arm), &format!("{side}Hand"), 0.25 * sign, 0.0);
        }

        rig
    }

    pub fn bone_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bone_name(&self, bone: BoneHandle) -> &str {
        &self.nodes[bone.0].name
    }

    pub fn set_owner_position(&mut self, position: Vector3<f32>) {
        self.owner_position = position;
    }

    pub fn ik_request(&self, goal: IkGoal) -> Option<IkRequest> {
        self.ik_requests.get(&goal).copied()
    }

    /// Called at the start of each IK pass, like a runtime resetting its goals.
    pub fn clear_ik_requests(&mut self) {
        self.ik_requests.clear();
    }

    fn child(&self, parent: Option<BoneHandle>, name: &str) -> Option<BoneHandle> {
        self.nodes
            .iter()
            .position(|node| node.parent == parent && node.name == name)
            .map(BoneHandle)
    }

    fn parent_world_rotation(&self, bone: BoneHandle) -> UnitQuaternion<f32> {
        self.nodes[bone.0]
            .parent
            .map(|parent| self.world_rotation(parent))
            .unwrap_or_else(UnitQuaternion::identity)
    }
}

impl Rig for RigSkeleton {
    fn find_bone(&self, path: &str) -> Option<BoneHandle> {
        let mut current = None;
        for name in path.split('/').filter(|segment| !segment.is_empty()) {
            current = Some(self.child(current, name)?);
        }
        current
    }

    fn owner_position(&self) -> Vector3<f32> {
        self.owner_position
    }

    fn local_rotation(&self, bone: BoneHandle) -> UnitQuaternion<f32> {
        self.nodes[bone.0].local_rotation
    }

    fn set_local_rotation(&mut self, bone: BoneHandle, rotation: UnitQuaternion<f32>) {
        self.nodes[bone.0].local_rotation = rotation;
    }

    fn world_position(&self, bone: BoneHandle) -> Vector3<f32> {
        let node = &self.nodes[bone.0];
        match node.parent {
            Some(parent) => {
                self.world_position(parent) + self.world_rotation(parent) * node.local_position
            }
            None => self.owner_position + node.local_position,
        }
    }

    fn world_rotation(&self, bone: BoneHandle) -> UnitQuaternion<f32> {
        self.parent_world_rotation(bone) * self.nodes[bone.0].local_rotation
    }

    fn set_world_rotation(&mut self, bone: BoneHandle, rotation: UnitQuaternion<f32>) {
        let local = self.parent_world_rotation(bone).inverse() * rotation;
        self.nodes[bone.0].local_rotation = local;
    }
}

impl IkSolver for RigSkeleton {
    fn set_ik_goal(&mut self, goal: IkGoal, weight: f32, position: Vector3<f32>) {
        self.ik_requests.insert(goal, IkRequest { weight, position });
    }
}
