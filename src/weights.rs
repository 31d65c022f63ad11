//! Packed vertex weights
//!
//! Each vertex carries 4 floats. The integer part of a value is a joint
//! palette index, the fractional part that joint's blend weight:
//!
//! ```text
//! 3.25  ->  joint 3, weight 0.25
//! ```
//!
//! [`scrub_weights`] clamps indices into range once at load time;
//! [`validate_weights`] checks the post-scrub invariant (indices in range,
//! positive weight sum) without repairing anything.

use glam::Vec4;

use crate::config::runtime_checks_enabled;
use crate::errors::{Result, SkinningError};

/// Number of joint influences per vertex.
pub const INFLUENCES_PER_VERTEX: usize = 4;

/// One vertex's packed weights.
pub type PackedWeights = [f32; INFLUENCES_PER_VERTEX];

/// Largest `f32` below 1.0.
const MAX_FRACTION: f32 = 1.0 - f32::EPSILON / 2.0;

/// Splits a packed value into `(joint index, weight)`.
///
/// The weight is always in `[0, 1)`. Tiny negative values such as `-1e-10`
/// would otherwise round to a weight of exactly 1.0, which re-encodes as the
/// next joint with no weight.
///
/// Non-finite values decode to joint 0 with no weight.
#[inline]
#[must_use]
pub fn decode(value: f32) -> (i64, f32) {
    if !value.is_finite() {
        return (0, 0.0);
    }
    let index = value.floor();
    (index as i64, (value - index).min(MAX_FRACTION))
}

#[inline]
#[must_use]
pub fn encode(index: usize, weight: f32) -> f32 {
    index as f32 + weight
}

/// Views a flat `[f32]` buffer as packed 4-tuples without copying.
pub fn as_packed(weights: &[f32]) -> Result<&[PackedWeights]> {
    bytemuck::try_cast_slice(weights)
        .map_err(|_| SkinningError::MisalignedWeightBuffer { len: weights.len() })
}

pub fn as_packed_mut(weights: &mut [f32]) -> Result<&mut [PackedWeights]> {
    let len = weights.len();
    bytemuck::try_cast_slice_mut(weights).map_err(|_| SkinningError::MisalignedWeightBuffer { len })
}

/// Views `Vec4` weights (as stored in vertex attribute buffers) as 4-tuples.
#[inline]
#[must_use]
pub fn vec4_as_packed(weights: &[Vec4]) -> &[PackedWeights] {
    bytemuck::cast_slice(weights)
}

#[inline]
pub fn vec4_as_packed_mut(weights: &mut [Vec4]) -> &mut [PackedWeights] {
    bytemuck::cast_slice_mut(weights)
}

/// Checks that every slot indexes a joint in `[0, max_joints)` and that
/// every vertex's weights sum to a positive value.
///
/// Every violation is logged; the first one is returned.
pub fn validate_weights(weights: &[PackedWeights], max_joints: usize) -> Result<()> {
    let mut first_error = None;

    for (vertex, packed) in weights.iter().enumerate() {
        let mut sum = 0.0_f32;
        for (slot, &value) in packed.iter().enumerate() {
            let (index, weight) = decode(value);
            if index < 0 || index >= max_joints as i64 {
                let err = SkinningError::WeightIndexOutOfRange {
                    vertex,
                    slot,
                    index,
                    max_joints,
                };
                log::error!("{err}");
                first_error.get_or_insert(err);
            }
            sum += weight;
        }
        if sum.is_nan() || sum <= 0.0 {
            let err = SkinningError::DegenerateWeights { vertex, sum };
            log::error!("{err}");
            first_error.get_or_insert(err);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Clamps every slot's joint index into `[0, max_joints - 1]`, keeping its
/// weight. Out-of-range indices are redirected to the nearest valid joint.
///
/// Runs [`validate_weights`] afterwards when runtime checks are enabled;
/// whatever it finds is logged, not returned.
pub fn scrub_weights(weights: &mut [PackedWeights], max_joints: usize) {
    if max_joints == 0 {
        log::warn!("Skipping weight scrub of {} vertices: no joints", weights.len());
        return;
    }
    let last = (max_joints - 1) as i64;

    for packed in weights.iter_mut() {
        for value in packed.iter_mut() {
            let (index, weight) = decode(*value);
            *value = encode(index.clamp(0, last) as usize, weight);
        }
    }

    if runtime_checks_enabled() {
        let _ = validate_weights(weights, max_joints);
    }
}

/// [`scrub_weights`] over a flat buffer whose length is a multiple of 4.
pub fn scrub_packed_weights(weights: &mut [f32], max_joints: usize) -> Result<()> {
    scrub_weights(as_packed_mut(weights)?, max_joints);
    Ok(())
}
