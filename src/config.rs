//! Skinning configuration
//!
//! Policy constants for joint resolution and weight handling. All of them are
//! tunable; the defaults match what avatar meshes are authored against.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SkinningError};

/// Upper bound on the number of joints a single mesh may reference.
pub const MAX_JOINTS_PER_MESH: usize = 110;

/// Joint that invalid joint names are redirected to during name repair.
pub const DEFAULT_FALLBACK_JOINT_NAME: &str = "mPelvis";

/// Joint used for the current frame when a by-name lookup fails.
pub const DEFAULT_ROOT_JOINT_NAME: &str = "mRoot";

/// Resolution states at or below this value are never looked up again.
pub const GIVE_UP_THRESHOLD: i32 = -50;

/// Weight forced onto every slot of a vertex whose weights sum to zero.
pub const DEGENERATE_WEIGHT_SENTINEL: f32 = f32::MAX;

/// Returns true when development-time checks (weight validation after
/// scrubbing, degenerate blend reporting) should run.
#[inline]
#[must_use]
pub const fn runtime_checks_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "runtime-checks"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinningConfig {
    /// Palette size cap and exclusive upper bound for weight indices.
    pub max_joints: usize,
    /// Name written over joint names the skeleton does not know.
    pub fallback_joint_name: String,
    /// Name of the joint used when by-name resolution fails.
    pub root_joint_name: String,
    /// Give-up threshold for by-name resolution retries. Must be negative.
    pub give_up_threshold: i32,
    /// Replace zero-sum weights with [`DEGENERATE_WEIGHT_SENTINEL`] instead of
    /// leaving them un-normalized.
    pub handle_degenerate_scale: bool,
}

impl Default for SkinningConfig {
    fn default() -> Self {
        Self {
            max_joints: MAX_JOINTS_PER_MESH,
            fallback_joint_name: DEFAULT_FALLBACK_JOINT_NAME.to_string(),
            root_joint_name: DEFAULT_ROOT_JOINT_NAME.to_string(),
            give_up_threshold: GIVE_UP_THRESHOLD,
            handle_degenerate_scale: true,
        }
    }
}

impl SkinningConfig {
    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_joints == 0 {
            return Err(SkinningError::InvalidConfig(
                "max_joints must be at least 1".to_string(),
            ));
        }
        if self.give_up_threshold >= 0 {
            return Err(SkinningError::InvalidConfig(format!(
                "give_up_threshold must be negative, got {}",
                self.give_up_threshold
            )));
        }
        if self.fallback_joint_name.is_empty() {
            return Err(SkinningError::InvalidConfig(
                "fallback_joint_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
