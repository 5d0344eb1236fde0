//! Growable vertex attribute storage.

use std::sync::Arc;

use glam::{Vec3, Vec4};
use parking_lot::RwLock;

/// Attribute store shared by every geometry of one model.
pub type SharedAttributes = Arc<RwLock<AttributeStore>>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WeightedNormal {
    normal: Vec3,
    count: u32,
}

/// Positions, normals, UVs and colors in four independent sequences.
///
/// Writes past the end grow the sequence, filling the gap with zero
/// elements. Reads past the end return zero instead of failing, so malformed
/// face data degrades to degenerate triangles rather than errors.
///
/// UVs are stored with three components so cube map coordinates survive;
/// planar layouts only read `x` and `y`.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    positions: Vec<Vec3>,
    normals: Vec<WeightedNormal>,
    uvs: Vec<Vec3>,
    colors: Vec<Vec4>,
    revision: u64,
}

fn grow_to<T: Default + Clone>(values: &mut Vec<T>, index: usize) {
    if index >= values.len() {
        values.resize(index + 1, T::default());
    }
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a new, empty store for sharing between geometries.
    pub fn shared() -> SharedAttributes {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Counter bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn append_position(&mut self, position: Vec3) -> usize {
        self.touch();
        self.positions.push(position);
        self.positions.len() - 1
    }

    /// Append an explicit normal. It starts with a weight of one and still
    /// blends with later accumulations.
    pub fn append_normal(&mut self, normal: Vec3) -> usize {
        self.touch();
        self.normals.push(WeightedNormal { normal, count: 1 });
        self.normals.len() - 1
    }

    pub fn append_uv(&mut self, uv: Vec3) -> usize {
        self.touch();
        self.uvs.push(uv);
        self.uvs.len() - 1
    }

    pub fn append_color(&mut self, color: Vec4) -> usize {
        self.touch();
        self.colors.push(color);
        self.colors.len() - 1
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) {
        self.touch();
        grow_to(&mut self.positions, index);
        self.positions[index] = position;
    }

    /// Overwrite a normal slot, resetting its weight to one.
    pub fn set_normal(&mut self, index: usize, normal: Vec3) {
        self.touch();
        grow_to(&mut self.normals, index);
        self.normals[index] = WeightedNormal { normal, count: 1 };
    }

    pub fn set_uv(&mut self, index: usize, uv: Vec3) {
        self.touch();
        grow_to(&mut self.uvs, index);
        self.uvs[index] = uv;
    }

    pub fn set_color(&mut self, index: usize, color: Vec4) {
        self.touch();
        grow_to(&mut self.colors, index);
        self.colors[index] = color;
    }

    pub fn position(&self, index: usize) -> Vec3 {
        self.positions.get(index).copied().unwrap_or(Vec3::ZERO)
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        self.normals
            .get(index)
            .map_or(Vec3::ZERO, |slot| slot.normal)
    }

    pub fn uv(&self, index: usize) -> Vec3 {
        self.uvs.get(index).copied().unwrap_or(Vec3::ZERO)
    }

    pub fn color(&self, index: usize) -> Vec4 {
        self.colors.get(index).copied().unwrap_or(Vec4::ZERO)
    }

    /// Number of contributions blended into a normal slot. Gap-filled slots
    /// have a weight of zero.
    pub fn normal_weight(&self, index: usize) -> u32 {
        self.normals.get(index).map_or(0, |slot| slot.count)
    }

    /// Blend `candidate` into the running average of a normal slot.
    ///
    /// `normal = normalize((normal * (count - 1) + candidate) / count)` after
    /// incrementing `count`. The result depends on accumulation order once
    /// three or more normals are blended.
    pub fn accumulate_normal(&mut self, index: usize, candidate: Vec3) {
        self.touch();
        grow_to(&mut self.normals, index);
        let slot = &mut self.normals[index];
        slot.count += 1;
        let count = slot.count as f32;
        slot.normal = ((slot.normal * (count - 1.0) + candidate) / count).normalize_or_zero();
    }

    /// Grow the normal sequence to at least `count` slots. Existing slots
    /// are left untouched.
    pub fn set_normal_count(&mut self, count: usize) {
        if count > self.normals.len() {
            self.touch();
            self.normals.resize(count, WeightedNormal::default());
        }
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn normal_count(&self) -> usize {
        self.normals.len()
    }

    pub fn uv_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Drop every attribute.
    pub fn clear(&mut self) {
        self.touch();
        self.positions.clear();
        self.normals.clear();
        self.uvs.clear();
        self.colors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_append_returns_zero_based_index() {
        let mut store = AttributeStore::new();
        assert_eq!(store.append_position(Vec3::X), 0);
        assert_eq!(store.append_position(Vec3::Y), 1);
        assert_eq!(store.position(1), Vec3::Y);
        assert_eq!(store.position_count(), 2);
    }

    #[test]
    fn test_sparse_set_fills_with_zero() {
        let mut store = AttributeStore::new();
        store.set_uv(3, Vec3::new(0.5, 0.25, 0.0));
        assert_eq!(store.uv_count(), 4);
        assert_eq!(store.uv(0), Vec3::ZERO);
        assert_eq!(store.uv(3), Vec3::new(0.5, 0.25, 0.0));

        store.set_color(1, Vec4::ONE);
        assert_eq!(store.color_count(), 2);
        assert_eq!(store.color(0), Vec4::ZERO);
    }

    #[test]
    fn test_out_of_range_reads_are_zero() {
        let store = AttributeStore::new();
        assert_eq!(store.position(10), Vec3::ZERO);
        assert_eq!(store.normal(usize::MAX), Vec3::ZERO);
        assert_eq!(store.uv(0), Vec3::ZERO);
        assert_eq!(store.color(7), Vec4::ZERO);
        assert_eq!(store.normal_weight(3), 0);
    }

    #[test]
    fn test_accumulate_two_normals() {
        let mut store = AttributeStore::new();
        store.accumulate_normal(0, Vec3::Z);
        assert_eq!(store.normal(0), Vec3::Z);
        store.accumulate_normal(0, Vec3::Y);

        let n = store.normal(0);
        assert_relative_eq!(n.x, 0.0);
        assert_relative_eq!(n.y, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_relative_eq!(n.z, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_eq!(store.normal_weight(0), 2);
    }

    #[test]
    fn test_accumulate_is_order_sensitive_with_three_normals() {
        let mut forward = AttributeStore::new();
        for n in [Vec3::Z, Vec3::Y, Vec3::X] {
            forward.accumulate_normal(0, n);
        }
        let mut backward = AttributeStore::new();
        for n in [Vec3::X, Vec3::Y, Vec3::Z] {
            backward.accumulate_normal(0, n);
        }

        // Incremental blend: the last normal gets weight 1/3 against the
        // already normalized running value.
        let running = Vec3::new(0.0, 1.0, 1.0).normalize();
        let expected = ((running * 2.0 + Vec3::X) / 3.0).normalize();
        let got = forward.normal(0);
        assert_relative_eq!(got.x, expected.x, epsilon = 1e-6);
        assert_relative_eq!(got.y, expected.y, epsilon = 1e-6);
        assert_relative_eq!(got.z, expected.z, epsilon = 1e-6);

        assert!((forward.normal(0) - backward.normal(0)).length() > 1e-3);
    }

    #[test]
    fn test_explicit_normal_participates_in_accumulation() {
        let mut store = AttributeStore::new();
        let index = store.append_normal(Vec3::Z);
        assert_eq!(store.normal_weight(index), 1);

        store.accumulate_normal(index, Vec3::Y);
        let n = store.normal(index);
        assert_relative_eq!(n.y, n.z, epsilon = 1e-6);
        assert_eq!(store.normal_weight(index), 2);

        store.set_normal(index, Vec3::X);
        assert_eq!(store.normal_weight(index), 1);
        assert_eq!(store.normal(index), Vec3::X);
    }

    #[test]
    fn test_opposite_normals_cancel_to_zero() {
        let mut store = AttributeStore::new();
        store.accumulate_normal(0, Vec3::Z);
        store.accumulate_normal(0, -Vec3::Z);
        assert_eq!(store.normal(0), Vec3::ZERO);
    }

    #[test]
    fn test_set_normal_count_preserves_existing() {
        let mut store = AttributeStore::new();
        store.append_normal(Vec3::Y);
        store.set_normal_count(4);
        assert_eq!(store.normal_count(), 4);
        assert_eq!(store.normal(0), Vec3::Y);
        assert_eq!(store.normal_weight(3), 0);

        store.set_normal_count(2);
        assert_eq!(store.normal_count(), 4);
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut store = AttributeStore::new();
        let start = store.revision();
        store.append_position(Vec3::ONE);
        assert!(store.revision() > start);

        let before = store.revision();
        let _ = store.position(0);
        assert_eq!(store.revision(), before);

        store.clear();
        assert!(store.revision() > before);
        assert_eq!(store.position_count(), 0);
    }
}
