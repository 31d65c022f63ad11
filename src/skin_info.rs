//! Skin info
//!
//! Per-mesh skin record: which joints the mesh is rigged to and their inverse
//! bind matrices, plus the memoized joint resolution states that the palette
//! builder updates in place.
//!
//! # Concurrency
//!
//! One `SkinInfo` is shared by every instance of a mesh, possibly across
//! threads (`Arc<SkinInfo>`). All mutation goes through `&self`:
//! - resolution states are `AtomicI32`s, updated with compare-and-swap;
//! - joint names sit behind a `RwLock`, repaired at most once, guarded by an
//!   `AtomicBool` that is re-checked under the write lock;
//! - "log once" diagnostics are per joint slot bit sets.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use glam::Mat4;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::GIVE_UP_THRESHOLD;
use crate::errors::{Result, SkinningError};
use crate::hierarchy::{JointHierarchy, JointId};

/// Resolution state a fresh skin starts every joint in.
pub const UNRESOLVED: JointId = -1;

/// Decoded form of a joint's cached resolution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointResolution {
    /// Resolved to this joint id; looked up by id from now on.
    Resolved(JointId),
    /// Not resolved yet. `failed_attempts` by-name lookups have failed so far.
    Pending { failed_attempts: u32 },
    /// Too many failed attempts; never looked up again.
    GaveUp,
}

impl JointResolution {
    #[must_use]
    pub fn from_state(state: JointId, give_up_threshold: JointId) -> Self {
        if state <= give_up_threshold {
            JointResolution::GaveUp
        } else if state < 0 {
            JointResolution::Pending {
                failed_attempts: (-1 - state) as u32,
            }
        } else {
            JointResolution::Resolved(state)
        }
    }
}

/// Diagnostics that are reported at most once per joint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JointDiagnostic {
    /// By-name lookup failed, root joint used instead.
    RootFallback = 1 << 0,
    /// Cached id no longer names a joint.
    StaleId = 1 << 1,
    /// No joint at all; the bind matrix was used as is.
    Unresolved = 1 << 2,
}

#[derive(Debug)]
pub struct SkinInfo {
    joint_names: RwLock<Vec<String>>,
    joint_states: Vec<AtomicI32>,
    inverse_bind_matrices: Vec<Mat4>,

    names_scrubbed: AtomicBool,
    reported: Vec<AtomicU8>,
    give_up_threshold: JointId,
}

impl SkinInfo {
    /// Creates a skin record with every joint unresolved.
    ///
    /// `joint_names` and `inverse_bind_matrices` are index-aligned and must
    /// have the same length.
    pub fn new(joint_names: Vec<String>, inverse_bind_matrices: Vec<Mat4>) -> Result<Self> {
        if joint_names.len() != inverse_bind_matrices.len() {
            return Err(SkinningError::SkinInfoLengthMismatch {
                names: joint_names.len(),
                bind_matrices: inverse_bind_matrices.len(),
            });
        }

        let count = joint_names.len();
        Ok(Self {
            joint_names: RwLock::new(joint_names),
            joint_states: (0..count).map(|_| AtomicI32::new(UNRESOLVED)).collect(),
            inverse_bind_matrices,
            names_scrubbed: AtomicBool::new(false),
            reported: (0..count).map(|_| AtomicU8::new(0)).collect(),
            give_up_threshold: GIVE_UP_THRESHOLD,
        })
    }

    /// Overrides the give-up threshold. Non-negative values are ignored.
    #[must_use]
    pub fn with_give_up_threshold(mut self, threshold: JointId) -> Self {
        if threshold < 0 {
            self.give_up_threshold = threshold;
        } else {
            log::warn!("Ignoring non-negative give-up threshold {threshold}");
        }
        self
    }

    /// Number of joints J.
    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.inverse_bind_matrices.len()
    }

    #[inline]
    #[must_use]
    pub fn joint_names(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.joint_names.read()
    }

    #[must_use]
    pub fn joint_name(&self, index: usize) -> Option<String> {
        self.joint_names.read().get(index).cloned()
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind_matrices
    }

    #[inline]
    #[must_use]
    pub fn give_up_threshold(&self) -> JointId {
        self.give_up_threshold
    }

    /// Raw cached state of joint `index`.
    #[inline]
    #[must_use]
    pub fn joint_state(&self, index: usize) -> Option<JointId> {
        self.joint_states
            .get(index)
            .map(|s| s.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn resolution(&self, index: usize) -> Option<JointResolution> {
        self.joint_state(index)
            .map(|s| JointResolution::from_state(s, self.give_up_threshold))
    }

    /// Whether the one-shot name repair has run.
    #[inline]
    #[must_use]
    pub fn names_scrubbed(&self) -> bool {
        self.names_scrubbed.load(Ordering::Acquire)
    }

    /// Forgets cached ids and failed attempts, e.g. after the mesh is rebound
    /// to a different skeleton. Name repairs are kept.
    pub fn reset_resolution(&self) {
        for state in &self.joint_states {
            state.store(UNRESOLVED, Ordering::Release);
        }
        for flags in &self.reported {
            flags.store(0, Ordering::Relaxed);
        }
    }

    // ========================================================================
    // Palette builder support
    // ========================================================================

    /// Caches `id` for joint `index` if the state is still `expected`.
    /// Losing the race is fine: the winner cached an equally valid answer.
    pub(crate) fn cache_joint_id(&self, index: usize, expected: JointId, id: JointId) {
        if id < 0 {
            return;
        }
        if let Some(state) = self.joint_states.get(index) {
            let _ = state.compare_exchange(expected, id, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    /// Records one more failed by-name lookup for joint `index`.
    pub(crate) fn record_failed_lookup(&self, index: usize, expected: JointId) {
        if let Some(state) = self.joint_states.get(index)
            && expected > self.give_up_threshold
        {
            let _ = state.compare_exchange(
                expected,
                expected - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    /// Returns true the first time `diagnostic` is raised for joint `index`.
    pub(crate) fn first_report(&self, index: usize, diagnostic: JointDiagnostic) -> bool {
        let bit = diagnostic as u8;
        self.reported
            .get(index)
            .is_some_and(|flags| flags.fetch_or(bit, Ordering::Relaxed) & bit == 0)
    }
}

/// Number of joints of `skin` that take part in a palette.
#[inline]
#[must_use]
pub fn mesh_joint_count(skin: &SkinInfo, max_joints: usize) -> usize {
    max_joints.min(skin.joint_count())
}

/// Rewrites joint names the hierarchy does not know to its fallback joint.
///
/// Runs once per skin record; later calls are no-ops and return 0.
/// Returns the number of names replaced.
pub fn repair_joint_names<H: JointHierarchy>(hierarchy: &H, skin: &SkinInfo) -> usize {
    if skin.names_scrubbed.load(Ordering::Acquire) {
        return 0;
    }

    let mut names = skin.joint_names.write();
    // Another thread may have finished the repair while we waited.
    if skin.names_scrubbed.load(Ordering::Acquire) {
        return 0;
    }

    let fallback = hierarchy.fallback_joint_name();
    let mut replaced = 0;
    for name in names.iter_mut() {
        if hierarchy.joint_by_name(name).is_none() {
            log::debug!("Mesh rigged to invalid joint {name}, using {fallback}");
            *name = fallback.to_string();
            replaced += 1;
        }
    }

    skin.names_scrubbed.store(true, Ordering::Release);
    replaced
}
