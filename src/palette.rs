//! Joint palette
//!
//! Builds the per-frame array of skinning matrices for a skin: one entry per
//! joint, `world(joint) * inverse_bind`, index-aligned with the skin's joint
//! list. Joint references are resolved against a live [`JointHierarchy`] and
//! memoized in the skin record (see [`JointResolution`]).
//!
//! Building never fails. Joints that cannot be resolved fall back to the root
//! joint or to the bare inverse bind matrix, and the problem is logged once
//! per joint slot.

use std::ops::Index;

use glam::{Mat4, Vec3};

use crate::hierarchy::JointHierarchy;
use crate::skin_info::{JointDiagnostic, JointResolution, SkinInfo};

/// Skinning matrices for one pose of one skin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointPalette {
    matrices: Vec<Mat4>,
}

impl JointPalette {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matrices: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Raw bytes, column-major, ready for a storage buffer upload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    /// Rebuilds in place, reusing the existing allocation.
    pub fn rebuild<H: JointHierarchy>(
        &mut self,
        hierarchy: &H,
        skin: &SkinInfo,
        count: usize,
        relative_to_avatar: bool,
    ) {
        build_palette_into(hierarchy, skin, count, relative_to_avatar, &mut self.matrices);
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Mat4> {
        self.matrices
    }
}

impl Index<usize> for JointPalette {
    type Output = Mat4;

    fn index(&self, index: usize) -> &Mat4 {
        &self.matrices[index]
    }
}

impl AsRef<[Mat4]> for JointPalette {
    fn as_ref(&self) -> &[Mat4] {
        &self.matrices
    }
}

/// Builds a palette of `min(count, J)` matrices.
///
/// With `relative_to_avatar`, joint world transforms are shifted by the
/// negated [`JointHierarchy::reference_position`] before the bind matrix is
/// applied.
#[must_use]
pub fn build_palette<H: JointHierarchy>(
    hierarchy: &H,
    skin: &SkinInfo,
    count: usize,
    relative_to_avatar: bool,
) -> JointPalette {
    let mut palette = JointPalette::with_capacity(count.min(skin.joint_count()));
    palette.rebuild(hierarchy, skin, count, relative_to_avatar);
    palette
}

/// Same as [`build_palette`], writing into a caller-owned buffer.
pub fn build_palette_into<H: JointHierarchy>(
    hierarchy: &H,
    skin: &SkinInfo,
    count: usize,
    relative_to_avatar: bool,
    out: &mut Vec<Mat4>,
) {
    let count = count.min(skin.joint_count());
    let origin = if relative_to_avatar {
        Some(-hierarchy.reference_position())
    } else {
        None
    };

    out.clear();
    out.extend(
        skin.inverse_bind_matrices()[..count]
            .iter()
            .enumerate()
            .map(|(j, inv_bind)| skinning_matrix(hierarchy, skin, j, *inv_bind, origin)),
    );
}

fn skinning_matrix<H: JointHierarchy>(
    hierarchy: &H,
    skin: &SkinInfo,
    j: usize,
    inv_bind: Mat4,
    origin: Option<Vec3>,
) -> Mat4 {
    let Some(state) = skin.joint_state(j) else {
        return inv_bind;
    };

    let joint = match JointResolution::from_state(state, skin.give_up_threshold()) {
        JointResolution::GaveUp => return inv_bind,
        JointResolution::Pending { .. } => resolve_by_name(hierarchy, skin, j, state),
        JointResolution::Resolved(id) => {
            let joint = hierarchy.joint_by_id(id);
            if joint.is_none() && skin.first_report(j, JointDiagnostic::StaleId) {
                log::warn!(
                    "Joint not found: {} Id = {id}",
                    skin.joint_name(j).unwrap_or_default()
                );
            }
            joint
        }
    };

    let Some(joint) = joint else {
        if skin.first_report(j, JointDiagnostic::Unresolved) {
            log::warn!(
                "Rigged to invalid joint name {}",
                skin.joint_name(j).unwrap_or_default()
            );
        }
        return inv_bind;
    };

    let mut world = hierarchy.world_matrix(joint);
    if let Some(offset) = origin {
        world = Mat4::from_translation(offset) * world;
    }
    world * inv_bind
}

/// By-name resolution for a pending joint. On success the id is cached; on
/// failure the attempt is counted and the root joint stands in for this call.
fn resolve_by_name<H: JointHierarchy>(
    hierarchy: &H,
    skin: &SkinInfo,
    j: usize,
    state: i32,
) -> Option<H::Joint> {
    let found = {
        let names = skin.joint_names();
        names.get(j).and_then(|name| hierarchy.joint_by_name(name))
    };

    if let Some(joint) = found {
        skin.cache_joint_id(j, state, hierarchy.joint_id(joint));
        return Some(joint);
    }

    skin.record_failed_lookup(j, state);
    if skin.first_report(j, JointDiagnostic::RootFallback) {
        log::warn!(
            "Rigged to invalid joint name {}. Using 'root' fallback.",
            skin.joint_name(j).unwrap_or_default()
        );
    }
    hierarchy.root_joint()
}
