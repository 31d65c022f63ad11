//! Joint Palette Tests
//!
//! Tests for:
//! - Palette sizing (min of requested count and joint count)
//! - By-name resolution and id memoization
//! - Root fallback and the bounded retry counter
//! - Give-up, stale id and no-joint fallbacks
//! - Avatar-relative palettes and buffer reuse

use std::cell::Cell;

use glam::{Mat4, Vec3};

use myth_skinning::config::{GIVE_UP_THRESHOLD, SkinningConfig};
use myth_skinning::hierarchy::{JointHierarchy, JointId, Skeleton};
use myth_skinning::palette::{JointPalette, build_palette, build_palette_into};
use myth_skinning::skin_info::{JointResolution, SkinInfo};

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-5;

fn mat_approx(a: &Mat4, b: &Mat4) -> bool {
    a.abs_diff_eq(*b, EPSILON)
}

fn test_config() -> SkinningConfig {
    SkinningConfig {
        root_joint_name: "root".to_string(),
        fallback_joint_name: "pelvis".to_string(),
        ..SkinningConfig::default()
    }
}

/// root (identity) -> pelvis (0,0,1) -> chest (0,0,2 in world)
fn test_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::new(&test_config());
    let root = skeleton.add_joint("root", None);
    let pelvis = skeleton.add_joint("pelvis", Some(root));
    let chest = skeleton.add_joint("chest", Some(pelvis));
    skeleton.joint_mut(pelvis).unwrap().position = Vec3::new(0.0, 0.0, 1.0);
    skeleton.joint_mut(chest).unwrap().position = Vec3::new(0.0, 0.0, 1.0);
    skeleton.update_world_matrices();
    skeleton
}

fn skin(names: &[&str]) -> SkinInfo {
    SkinInfo::new(
        names.iter().map(ToString::to_string).collect(),
        vec![Mat4::IDENTITY; names.len()],
    )
    .unwrap()
}

/// Wraps a hierarchy and counts lookups.
struct CountingHierarchy<'a, H: JointHierarchy> {
    inner: &'a H,
    name_lookups: Cell<usize>,
    id_lookups: Cell<usize>,
}

impl<'a, H: JointHierarchy> CountingHierarchy<'a, H> {
    fn new(inner: &'a H) -> Self {
        Self {
            inner,
            name_lookups: Cell::new(0),
            id_lookups: Cell::new(0),
        }
    }
}

impl<H: JointHierarchy> JointHierarchy for CountingHierarchy<'_, H> {
    type Joint = H::Joint;

    fn joint_by_name(&self, name: &str) -> Option<H::Joint> {
        self.name_lookups.set(self.name_lookups.get() + 1);
        self.inner.joint_by_name(name)
    }

    fn joint_by_id(&self, id: JointId) -> Option<H::Joint> {
        self.id_lookups.set(self.id_lookups.get() + 1);
        self.inner.joint_by_id(id)
    }

    fn joint_id(&self, joint: H::Joint) -> JointId {
        self.inner.joint_id(joint)
    }

    fn world_matrix(&self, joint: H::Joint) -> Mat4 {
        self.inner.world_matrix(joint)
    }

    fn reference_position(&self) -> Vec3 {
        self.inner.reference_position()
    }

    fn root_joint(&self) -> Option<H::Joint> {
        self.inner.root_joint()
    }

    fn fallback_joint_name(&self) -> &str {
        self.inner.fallback_joint_name()
    }
}

/// Resolves "a" by name but reports an id that no longer exists.
struct StaleIdHierarchy;

impl JointHierarchy for StaleIdHierarchy {
    type Joint = u8;

    fn joint_by_name(&self, name: &str) -> Option<u8> {
        (name == "a").then_some(0)
    }

    fn joint_by_id(&self, _id: JointId) -> Option<u8> {
        None
    }

    fn joint_id(&self, _joint: u8) -> JointId {
        7
    }

    fn world_matrix(&self, _joint: u8) -> Mat4 {
        Mat4::from_translation(Vec3::X)
    }

    fn reference_position(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn root_joint(&self) -> Option<u8> {
        None
    }

    fn fallback_joint_name(&self) -> &str {
        "a"
    }
}

// ============================================================================
// Sizing
// ============================================================================

#[test]
fn palette_len_is_min_of_requested_and_joint_count() {
    let skeleton = test_skeleton();
    let skin = skin(&["root", "pelvis", "chest"]);

    assert_eq!(build_palette(&skeleton, &skin, 2, false).len(), 2);
    assert_eq!(build_palette(&skeleton, &skin, 3, false).len(), 3);
    assert_eq!(build_palette(&skeleton, &skin, 100, false).len(), 3);
    assert!(build_palette(&skeleton, &skin, 0, false).is_empty());
}

#[test]
fn palette_of_empty_skin_is_empty() {
    let skeleton = test_skeleton();
    let skin = skin(&[]);
    assert!(build_palette(&skeleton, &skin, 10, false).is_empty());
}

// ============================================================================
// Resolution & Memoization
// ============================================================================

#[test]
fn resolved_joint_uses_world_times_inverse_bind() {
    let skeleton = test_skeleton();
    let inv_bind = Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0));
    let skin = SkinInfo::new(vec!["chest".to_string()], vec![inv_bind]).unwrap();

    let palette = build_palette(&skeleton, &skin, 1, false);

    // Bind pose: world * inverse bind cancels out.
    assert!(mat_approx(&palette[0], &Mat4::IDENTITY));
}

#[test]
fn by_name_resolution_caches_joint_id() {
    let skeleton = test_skeleton();
    let skin = skin(&["chest", "root"]);
    assert_eq!(skin.resolution(0), Some(JointResolution::Pending { failed_attempts: 0 }));

    let _ = build_palette(&skeleton, &skin, 2, false);

    assert_eq!(skin.joint_state(0), Some(2));
    assert_eq!(skin.joint_state(1), Some(0));
    assert_eq!(skin.resolution(0), Some(JointResolution::Resolved(2)));
}

#[test]
fn cached_ids_skip_name_lookups() {
    let skeleton = test_skeleton();
    let counting = CountingHierarchy::new(&skeleton);
    let skin = skin(&["root", "pelvis", "chest"]);

    let first = build_palette(&counting, &skin, 3, false);
    assert_eq!(counting.name_lookups.get(), 3);
    assert_eq!(counting.id_lookups.get(), 0);

    let second = build_palette(&counting, &skin, 3, false);
    assert_eq!(counting.name_lookups.get(), 3);
    assert_eq!(counting.id_lookups.get(), 3);
    assert_eq!(first, second);
}

#[test]
fn palette_follows_pose_changes() {
    let mut skeleton = test_skeleton();
    let skin = skin(&["pelvis"]);
    let _ = build_palette(&skeleton, &skin, 1, false);

    let pelvis = skeleton.joint_by_name("pelvis").unwrap();
    skeleton.joint_mut(pelvis).unwrap().position = Vec3::new(3.0, 0.0, 0.0);
    skeleton.update_world_matrices();

    let palette = build_palette(&skeleton, &skin, 1, false);
    assert!(mat_approx(&palette[0], &Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0))));
}

// ============================================================================
// Fallbacks
// ============================================================================

#[test]
fn unknown_name_falls_back_to_root_and_counts_attempt() {
    let mut skeleton = test_skeleton();
    let root = skeleton.joint_by_name("root").unwrap();
    skeleton.joint_mut(root).unwrap().position = Vec3::new(5.0, 0.0, 0.0);
    skeleton.update_world_matrices();

    let skin = skin(&["missing"]);
    let palette = build_palette(&skeleton, &skin, 1, false);

    assert!(mat_approx(&palette[0], &Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))));
    assert_eq!(skin.joint_state(0), Some(-2));
    assert_eq!(skin.resolution(0), Some(JointResolution::Pending { failed_attempts: 1 }));
}

#[test]
fn retry_counter_converges_to_give_up() {
    let skeleton = test_skeleton();
    let counting = CountingHierarchy::new(&skeleton);
    let skin = skin(&["missing"]);

    for _ in 0..200 {
        let _ = build_palette(&counting, &skin, 1, false);
    }

    assert_eq!(skin.joint_state(0), Some(GIVE_UP_THRESHOLD));
    assert_eq!(skin.resolution(0), Some(JointResolution::GaveUp));
    // -1 down to -50: one failed lookup per decrement.
    assert_eq!(counting.name_lookups.get(), 49);
    assert!(counting.name_lookups.get() <= 50);

    let _ = build_palette(&counting, &skin, 1, false);
    assert_eq!(counting.name_lookups.get(), 49);
    assert_eq!(counting.id_lookups.get(), 0);
}

#[test]
fn gave_up_joint_uses_inverse_bind_matrix() {
    let skeleton = test_skeleton();
    let inv_bind = Mat4::from_scale(Vec3::splat(2.0));
    let skin = SkinInfo::new(vec!["missing".to_string()], vec![inv_bind])
        .unwrap()
        .with_give_up_threshold(-2);

    // First failure: root fallback (identity world).
    let palette = build_palette(&skeleton, &skin, 1, false);
    assert!(mat_approx(&palette[0], &inv_bind));
    assert_eq!(skin.resolution(0), Some(JointResolution::GaveUp));

    let palette = build_palette(&skeleton, &skin, 1, false);
    assert!(mat_approx(&palette[0], &inv_bind));
    assert_eq!(skin.joint_state(0), Some(-2));
}

#[test]
fn missing_root_uses_inverse_bind_matrix() {
    let mut skeleton = Skeleton::new(&test_config());
    let pelvis = skeleton.add_joint("pelvis", None);
    skeleton.joint_mut(pelvis).unwrap().position = Vec3::new(0.0, 0.0, 1.0);
    skeleton.update_world_matrices();

    let inv_bind = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let skin = SkinInfo::new(vec!["missing".to_string()], vec![inv_bind]).unwrap();

    let palette = build_palette(&skeleton, &skin, 1, false);
    assert!(mat_approx(&palette[0], &inv_bind));
    assert_eq!(skin.joint_state(0), Some(-2));
}

#[test]
fn stale_cached_id_falls_back_without_touching_state() {
    let skin = skin(&["a"]);

    let palette = build_palette(&StaleIdHierarchy, &skin, 1, false);
    assert!(mat_approx(&palette[0], &Mat4::from_translation(Vec3::X)));
    assert_eq!(skin.joint_state(0), Some(7));

    let palette = build_palette(&StaleIdHierarchy, &skin, 1, false);
    assert!(mat_approx(&palette[0], &Mat4::IDENTITY));
    assert_eq!(skin.joint_state(0), Some(7));
}

#[test]
fn reset_resolution_forgets_cached_ids() {
    let skeleton = test_skeleton();
    let skin = skin(&["chest", "missing"]);
    let _ = build_palette(&skeleton, &skin, 2, false);
    assert_eq!(skin.joint_state(0), Some(2));
    assert_eq!(skin.joint_state(1), Some(-2));

    skin.reset_resolution();
    assert_eq!(skin.joint_state(0), Some(-1));
    assert_eq!(skin.joint_state(1), Some(-1));
}

// ============================================================================
// Avatar-relative palettes & buffer reuse
// ============================================================================

#[test]
fn relative_to_avatar_subtracts_reference_position() {
    let mut skeleton = test_skeleton();
    let root = skeleton.joint_by_name("root").unwrap();
    skeleton.joint_mut(root).unwrap().position = Vec3::new(10.0, 0.0, 0.0);
    skeleton.set_position(Vec3::new(10.0, 0.0, 0.0));
    skeleton.update_world_matrices();

    let skin = skin(&["pelvis"]);

    let absolute = build_palette(&skeleton, &skin, 1, false);
    assert!(mat_approx(&absolute[0], &Mat4::from_translation(Vec3::new(10.0, 0.0, 1.0))));

    let relative = build_palette(&skeleton, &skin, 1, true);
    assert!(mat_approx(&relative[0], &Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0))));
}

#[test]
fn build_into_reuses_buffer() {
    let skeleton = test_skeleton();
    let skin = skin(&["root", "pelvis"]);

    let mut buffer = vec![Mat4::ZERO; 8];
    build_palette_into(&skeleton, &skin, 5, false, &mut buffer);
    assert_eq!(buffer.len(), 2);
    assert!(buffer.capacity() >= 8);
    assert!(mat_approx(&buffer[1], &Mat4::from_translation(Vec3::Z)));
}

#[test]
fn palette_rebuild_and_byte_view() {
    let skeleton = test_skeleton();
    let skin = skin(&["root", "pelvis", "chest"]);

    let mut palette = JointPalette::new();
    palette.rebuild(&skeleton, &skin, 3, false);
    assert_eq!(palette.len(), 3);
    assert_eq!(palette.as_bytes().len(), 3 * 64);

    palette.rebuild(&skeleton, &skin, 1, false);
    assert_eq!(palette.as_slice().len(), 1);
    assert_eq!(palette.as_ref(), palette.as_slice());

    let matrices: Vec<Mat4> = palette.into_inner();
    assert_eq!(matrices, vec![Mat4::IDENTITY]);
}
