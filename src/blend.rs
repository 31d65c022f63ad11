//! Vertex blending
//!
//! Turns a vertex's packed weights and a joint palette into the single matrix
//! that places the vertex for the current pose (linear blend skinning):
//!
//! ```text
//! M = Σ w_k · palette[i_k],   Σ w_k = 1
//! ```
//!
//! [`blend_vertex`] is the per-vertex hot path: no allocation, four terms.

use glam::{Mat4, Vec3};

use crate::config::{DEGENERATE_WEIGHT_SENTINEL, runtime_checks_enabled};
use crate::errors::{Result, SkinningError};
use crate::weights::{INFLUENCES_PER_VERTEX, PackedWeights, decode};

/// Blends up to 4 palette matrices for one vertex.
///
/// Weights are normalized to sum to 1. When they sum to zero (an unscrubbed
/// vertex) and `handle_degenerate_scale` is set, every weight is forced to
/// [`DEGENERATE_WEIGHT_SENTINEL`]: the result is visibly wrong but
/// deterministic. Without the flag such weights are used un-normalized.
///
/// Indices past the end of the palette read its last entry; an empty
/// palette yields [`Mat4::ZERO`].
#[inline]
#[must_use]
pub fn blend_vertex(weights: &PackedWeights, palette: &[Mat4], handle_degenerate_scale: bool) -> Mat4 {
    let Some(last) = palette.len().checked_sub(1) else {
        return Mat4::ZERO;
    };

    let mut indices = [0_usize; INFLUENCES_PER_VERTEX];
    let mut fractions = [0.0_f32; INFLUENCES_PER_VERTEX];
    let mut scale = 0.0_f32;
    for (k, &value) in weights.iter().enumerate() {
        let (index, weight) = decode(value);
        indices[k] = usize::try_from(index).map_or(0, |i| i.min(last));
        fractions[k] = weight;
        scale += weight;
    }

    if scale > 0.0 {
        // A subnormal scale has no finite reciprocal.
        for w in &mut fractions {
            *w /= scale;
        }
    } else if handle_degenerate_scale {
        if runtime_checks_enabled() {
            log::warn!("Degenerate vertex weights {weights:?}, using sentinel weights");
        }
        fractions = [DEGENERATE_WEIGHT_SENTINEL; INFLUENCES_PER_VERTEX];
    }

    let mut result = Mat4::ZERO;
    for (&index, &weight) in indices.iter().zip(&fractions) {
        result += palette[index] * weight;
    }
    result
}

/// Blends every vertex of `weights` into `out`, reusing its allocation.
pub fn blend_vertices(
    weights: &[PackedWeights],
    palette: &[Mat4],
    handle_degenerate_scale: bool,
    out: &mut Vec<Mat4>,
) {
    out.clear();
    out.extend(
        weights
            .iter()
            .map(|w| blend_vertex(w, palette, handle_degenerate_scale)),
    );
}

/// CPU-deformed vertex data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedVertices {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Deforms positions and normals by their blended vertex matrices.
///
/// `normals` may be empty; otherwise it must match `positions` in length, as
/// must `weights`.
pub fn skin_vertices(
    positions: &[Vec3],
    normals: &[Vec3],
    weights: &[PackedWeights],
    palette: &[Mat4],
    handle_degenerate_scale: bool,
) -> Result<SkinnedVertices> {
    let expected = positions.len();
    if weights.len() != expected {
        return Err(SkinningError::VertexCountMismatch {
            context: "weights",
            expected,
            actual: weights.len(),
        });
    }
    if !normals.is_empty() && normals.len() != expected {
        return Err(SkinningError::VertexCountMismatch {
            context: "normals",
            expected,
            actual: normals.len(),
        });
    }

    let mut output = SkinnedVertices {
        positions: Vec::with_capacity(expected),
        normals: Vec::with_capacity(normals.len()),
    };

    for (i, (position, packed)) in positions.iter().zip(weights).enumerate() {
        let m = blend_vertex(packed, palette, handle_degenerate_scale);
        output.positions.push(m.transform_point3(*position));
        if let Some(normal) = normals.get(i) {
            output
                .normals
                .push(m.transform_vector3(*normal).normalize_or_zero());
        }
    }

    Ok(output)
}
