//! Joint hierarchy
//!
//! The skinning code never owns a skeleton. It only talks to one through the
//! [`JointHierarchy`] contract: name and id lookups, world matrices, and the
//! two designated fallbacks (root joint, fallback joint name).
//!
//! [`Skeleton`] is a small implementation of the contract: named joints with
//! parent links and a local TRS each, flattened to world matrices by
//! [`Skeleton::update_world_matrices`].

use glam::{Mat4, Quat, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::config::SkinningConfig;

/// Numeric joint id as cached in a skin's resolution states.
pub type JointId = i32;

new_key_type! {
    pub struct JointKey;
}

/// Lookup contract the palette builder and name repair run against.
pub trait JointHierarchy {
    /// Cheap handle to a live joint.
    type Joint: Copy;

    fn joint_by_name(&self, name: &str) -> Option<Self::Joint>;

    fn joint_by_id(&self, id: JointId) -> Option<Self::Joint>;

    /// Non-negative numeric id of `joint`, suitable for caching.
    fn joint_id(&self, joint: Self::Joint) -> JointId;

    fn world_matrix(&self, joint: Self::Joint) -> Mat4;

    /// Origin that avatar-relative palettes are expressed against.
    fn reference_position(&self) -> Vec3;

    /// Joint used for one frame when a by-name lookup fails.
    fn root_joint(&self) -> Option<Self::Joint>;

    /// Name written over joint names that fail lookup during repair.
    fn fallback_joint_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub(crate) id: JointId,
    pub(crate) parent: Option<JointKey>,
    pub(crate) children: Vec<JointKey>,

    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    pub(crate) world_matrix: Mat4,
}

impl Joint {
    #[inline]
    #[must_use]
    pub fn id(&self) -> JointId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<JointKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World matrix as of the last [`Skeleton::update_world_matrices`].
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }
}

/// A minimal skeleton implementing [`JointHierarchy`].
///
/// Joint ids are assigned in insertion order starting at 0, so they double as
/// indices into `by_id`.
#[derive(Debug, Clone)]
pub struct Skeleton {
    joints: SlotMap<JointKey, Joint>,
    by_id: Vec<JointKey>,
    by_name: FxHashMap<String, JointKey>,
    roots: Vec<JointKey>,

    root_joint_name: String,
    fallback_joint_name: String,
    position: Vec3,
}

impl Skeleton {
    #[must_use]
    pub fn new(config: &SkinningConfig) -> Self {
        Self {
            joints: SlotMap::with_key(),
            by_id: Vec::new(),
            by_name: FxHashMap::default(),
            roots: Vec::new(),
            root_joint_name: config.root_joint_name.clone(),
            fallback_joint_name: config.fallback_joint_name.clone(),
            position: Vec3::ZERO,
        }
    }

    /// Adds a joint at the identity local transform.
    ///
    /// A joint whose name is already taken still gets an id, but name lookups
    /// keep resolving to the first joint with that name.
    pub fn add_joint(&mut self, name: &str, parent: Option<JointKey>) -> JointKey {
        let id = self.by_id.len() as JointId;
        let parent = parent.filter(|p| self.joints.contains_key(*p));

        let key = self.joints.insert(Joint {
            name: name.to_string(),
            id,
            parent,
            children: Vec::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            world_matrix: Mat4::IDENTITY,
        });

        match parent.and_then(|p| self.joints.get_mut(p)) {
            Some(parent_joint) => parent_joint.children.push(key),
            None => self.roots.push(key),
        }
        self.by_id.push(key);
        self.by_name.entry(name.to_string()).or_insert(key);
        key
    }

    #[inline]
    #[must_use]
    pub fn joint(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key)
    }

    /// Local transforms edited through this handle take effect on the next
    /// [`Skeleton::update_world_matrices`].
    #[inline]
    pub fn joint_mut(&mut self, key: JointKey) -> Option<&mut Joint> {
        self.joints.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Recomputes every joint's world matrix, parents before children.
    ///
    /// Uses an explicit stack, so deep chains cannot overflow.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(JointKey, Mat4)> = Vec::with_capacity(self.joints.len());
        for &root in self.roots.iter().rev() {
            stack.push((root, Mat4::IDENTITY));
        }

        while let Some((key, parent_world)) = stack.pop() {
            let Some(joint) = self.joints.get_mut(key) else {
                continue;
            };
            let world = parent_world * joint.local_matrix();
            joint.world_matrix = world;

            for &child in joint.children.iter().rev() {
                stack.push((child, world));
            }
        }
    }
}

impl JointHierarchy for Skeleton {
    type Joint = JointKey;

    fn joint_by_name(&self, name: &str) -> Option<JointKey> {
        self.by_name.get(name).copied()
    }

    fn joint_by_id(&self, id: JointId) -> Option<JointKey> {
        let index = usize::try_from(id).ok()?;
        self.by_id.get(index).copied()
    }

    fn joint_id(&self, joint: JointKey) -> JointId {
        self.joints.get(joint).map_or(0, |j| j.id)
    }

    fn world_matrix(&self, joint: JointKey) -> Mat4 {
        self.joints
            .get(joint)
            .map_or(Mat4::IDENTITY, |j| j.world_matrix)
    }

    fn reference_position(&self) -> Vec3 {
        self.position
    }

    fn root_joint(&self) -> Option<JointKey> {
        self.joint_by_name(&self.root_joint_name)
    }

    fn fallback_joint_name(&self) -> &str {
        &self.fallback_joint_name
    }
}
