//! Skinning context
//!
//! [`Skinner`] ties the pieces together under one [`SkinningConfig`]:
//!
//! ```text
//! load:        SkinInfo::new ─► Skinner::prepare_weights (scrub once)
//! every pose:  Skinner::update_palette (repair names once, rebuild palette)
//!              Skinner::blend / skin_vertices (per vertex)
//! ```

use glam::{Mat4, Vec3};

use crate::blend::{SkinnedVertices, blend_vertex, blend_vertices, skin_vertices};
use crate::config::SkinningConfig;
use crate::errors::Result;
use crate::hierarchy::JointHierarchy;
use crate::palette::JointPalette;
use crate::skin_info::{SkinInfo, mesh_joint_count, repair_joint_names};
use crate::weights::{PackedWeights, as_packed_mut, scrub_weights};

#[derive(Debug, Clone, Default)]
pub struct Skinner {
    config: SkinningConfig,
}

impl Skinner {
    pub fn new(config: SkinningConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SkinningConfig {
        &self.config
    }

    /// Upper bound on palette size and weight indices.
    #[inline]
    #[must_use]
    pub fn max_joint_count(&self) -> usize {
        self.config.max_joints
    }

    #[inline]
    #[must_use]
    pub fn mesh_joint_count(&self, skin: &SkinInfo) -> usize {
        mesh_joint_count(skin, self.config.max_joints)
    }

    /// Creates a skin record using the configured give-up threshold.
    pub fn new_skin_info(
        &self,
        joint_names: Vec<String>,
        inverse_bind_matrices: Vec<Mat4>,
    ) -> Result<SkinInfo> {
        Ok(SkinInfo::new(joint_names, inverse_bind_matrices)?
            .with_give_up_threshold(self.config.give_up_threshold))
    }

    /// Scrubs a mesh's weights against its skin. Call once, at load time.
    pub fn prepare_weights(&self, skin: &SkinInfo, weights: &mut [PackedWeights]) {
        scrub_weights(weights, self.mesh_joint_count(skin));
    }

    /// [`Skinner::prepare_weights`] over a flat `[f32]` buffer.
    pub fn prepare_packed_weights(&self, skin: &SkinInfo, weights: &mut [f32]) -> Result<()> {
        self.prepare_weights(skin, as_packed_mut(weights)?);
        Ok(())
    }

    /// Repairs joint names (first call only) and rebuilds `palette` for the
    /// hierarchy's current pose.
    pub fn update_palette<H: JointHierarchy>(
        &self,
        hierarchy: &H,
        skin: &SkinInfo,
        relative_to_avatar: bool,
        palette: &mut JointPalette,
    ) {
        let repaired = repair_joint_names(hierarchy, skin);
        if repaired > 0 {
            log::debug!("Repaired {repaired} joint names of a {} joint skin", skin.joint_count());
        }
        palette.rebuild(hierarchy, skin, self.mesh_joint_count(skin), relative_to_avatar);
    }

    #[inline]
    #[must_use]
    pub fn blend(&self, weights: &PackedWeights, palette: &JointPalette) -> Mat4 {
        blend_vertex(weights, palette.as_slice(), self.config.handle_degenerate_scale)
    }

    pub fn blend_all(&self, weights: &[PackedWeights], palette: &JointPalette, out: &mut Vec<Mat4>) {
        blend_vertices(weights, palette.as_slice(), self.config.handle_degenerate_scale, out);
    }

    pub fn skin_vertices(
        &self,
        positions: &[Vec3],
        normals: &[Vec3],
        weights: &[PackedWeights],
        palette: &JointPalette,
    ) -> Result<SkinnedVertices> {
        skin_vertices(
            positions,
            normals,
            weights,
            palette.as_slice(),
            self.config.handle_degenerate_scale,
        )
    }
}
