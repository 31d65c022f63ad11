//! Error Types
//!
//! This module defines the error types used by the skinning crate.
//!
//! # Overview
//!
//! Nothing on the per-frame path (palette building, vertex blending) returns
//! an error: corrupt asset data degrades to fallback matrices and is reported
//! through `log`. [`SkinningError`] covers the remaining failure modes, which
//! are caller mistakes or development-time diagnostics:
//! - Skin records built from sequences of different length
//! - Weight buffers that cannot be viewed as 4-tuples
//! - Weight validation failures
//! - Invalid configuration
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_skinning::errors::{SkinningError, Result};
//!
//! fn load_skin() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the skinning crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkinningError {
    // ========================================================================
    // Skin Record Errors
    // ========================================================================
    /// Joint names and inverse bind matrices have different lengths.
    #[error("Skin info length mismatch: {names} joint names, {bind_matrices} inverse bind matrices")]
    SkinInfoLengthMismatch {
        /// Number of joint names supplied
        names: usize,
        /// Number of inverse bind matrices supplied
        bind_matrices: usize,
    },

    // ========================================================================
    // Weight Buffer Errors
    // ========================================================================
    /// A flat weight buffer whose length is not a multiple of 4.
    #[error("Packed weight buffer length {len} is not a multiple of 4")]
    MisalignedWeightBuffer {
        /// Length of the flat buffer
        len: usize,
    },

    /// A slot decodes to a joint index outside `[0, max_joints)`.
    #[error("Vertex {vertex} slot {slot}: joint index {index} out of range (max joints: {max_joints})")]
    WeightIndexOutOfRange {
        /// Vertex index in the buffer
        vertex: usize,
        /// Slot within the vertex (0..4)
        slot: usize,
        /// Decoded joint index
        index: i64,
        /// Exclusive upper bound
        max_joints: usize,
    },

    /// The four fractional weights of a vertex do not sum to a positive value.
    #[error("Vertex {vertex}: weight sum {sum} is not positive")]
    DegenerateWeights {
        /// Vertex index in the buffer
        vertex: usize,
        /// Sum of the fractional parts
        sum: f32,
    },

    /// Per-vertex input slices disagree on the vertex count.
    #[error("Vertex count mismatch: {context} has {actual} entries, expected {expected}")]
    VertexCountMismatch {
        /// Which slice was wrong
        context: &'static str,
        /// Expected number of vertices
        expected: usize,
        /// Actual number of entries
        actual: usize,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration failed validation.
    #[error("Invalid skinning config: {0}")]
    InvalidConfig(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(String),
}

impl From<serde_json::Error> for SkinningError {
    fn from(err: serde_json::Error) -> Self {
        SkinningError::JsonError(err.to_string())
    }
}

/// Alias for `Result<T, SkinningError>`.
pub type Result<T> = std::result::Result<T, SkinningError>;
