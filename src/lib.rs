//! # Myth Skinning
//!
//! CPU-side preparation for skinned meshes: everything between "the skeleton
//! moved" and "the renderer has one matrix per vertex".
//!
//! - [`hierarchy`]: the joint lookup contract, plus a minimal [`Skeleton`]
//! - [`skin_info`]: per-mesh skin record, joint-name repair, resolution cache
//! - [`palette`]: per-pose joint palette construction
//! - [`weights`]: packed per-vertex weight decoding, scrubbing and validation
//! - [`blend`]: per-vertex matrix blend and CPU deformation
//! - [`skinner`]: the above bundled under one [`SkinningConfig`]
//!
//! Corrupt asset data never fails a frame: bad joint references fall back to
//! the root joint or the bind pose, bad weight indices are clamped, and each
//! problem is reported through `log`.

pub mod blend;
pub mod config;
pub mod errors;
pub mod hierarchy;
pub mod palette;
pub mod skin_info;
pub mod skinner;
pub mod weights;

pub use blend::{SkinnedVertices, blend_vertex, blend_vertices, skin_vertices};
pub use config::{
    DEFAULT_FALLBACK_JOINT_NAME, DEFAULT_ROOT_JOINT_NAME, GIVE_UP_THRESHOLD, MAX_JOINTS_PER_MESH,
    SkinningConfig,
};
pub use errors::{Result, SkinningError};
pub use hierarchy::{JointHierarchy, JointId, JointKey, Skeleton};
pub use palette::{JointPalette, build_palette, build_palette_into};
pub use skin_info::{JointResolution, SkinInfo, mesh_joint_count, repair_joint_names};
pub use skinner::Skinner;
pub use weights::{PackedWeights, scrub_packed_weights, scrub_weights, validate_weights};
