//! Polygonal faces indexing the attribute store.

use glam::Vec3;

use super::attributes::AttributeStore;

/// Flat normals shorter than this are degenerate and not accumulated.
pub const FLAT_NORMAL_EPSILON: f32 = 1e-5;

/// Convert a 1-based face index into a 0-based attribute slot. The sentinel
/// `0` has no slot.
pub fn slot(index: u16) -> Option<usize> {
    (index as usize).checked_sub(1)
}

/// A polygon with independent 1-based index sequences per attribute kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Face {
    pub vertex_indices: Vec<u16>,
    pub uv_indices: Vec<u16>,
    pub normal_indices: Vec<u16>,
}

impl Face {
    /// Whether the face has enough positions to form a triangle.
    pub fn is_renderable(&self) -> bool {
        self.vertex_indices.len() >= 3
    }

    /// Triangles produced by fanning the face around its first corner.
    pub fn triangle_count(&self) -> usize {
        self.vertex_indices.len().saturating_sub(2)
    }
}

fn truncate_indices(values: &[u32], kind: &str) -> Vec<u16> {
    values
        .iter()
        .map(|&value| {
            u16::try_from(value).unwrap_or_else(|_| {
                log::error!(
                    "{} index {} does not fit in 16 bits, truncating to {}",
                    kind,
                    value,
                    value as u16
                );
                value as u16
            })
        })
        .collect()
}

/// Ordered faces plus the running counts used to size vertex buffers.
#[derive(Debug, Clone, Default)]
pub struct FaceList {
    faces: Vec<Face>,
    triangle_count: usize,
    vertex_count: usize,
}

impl FaceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a face and return its position in the list.
    ///
    /// Indices are 1-based with `0` meaning absent. Values that do not fit
    /// in 16 bits are logged and truncated. Faces with fewer than three
    /// positions are logged and kept, but produce no triangles.
    ///
    /// When `normals` is empty or starts with `0`, a flat normal is computed
    /// from the first three positions and blended into the normal slot of
    /// every position the face references; the face's normal indices then
    /// mirror its position indices.
    pub fn add_face(
        &mut self,
        positions: &[u32],
        uvs: &[u32],
        normals: &[u32],
        attributes: &mut AttributeStore,
    ) -> usize {
        let mut face = Face {
            vertex_indices: truncate_indices(positions, "position"),
            ..Face::default()
        };

        if !face.is_renderable() {
            log::error!(
                "Malformed face {}: {} position indices, at least 3 required",
                self.faces.len(),
                face.vertex_indices.len()
            );
        }

        if !uvs.is_empty() {
            face.uv_indices = truncate_indices(uvs, "uv");
        }

        let normals_absent = normals.first().map_or(true, |&first| first == 0);
        if normals_absent {
            if face.is_renderable() {
                accumulate_flat_normal(&face.vertex_indices, attributes);
                face.normal_indices = face.vertex_indices.clone();
            }
        } else {
            face.normal_indices = truncate_indices(normals, "normal");
        }

        self.triangle_count += face.triangle_count();
        self.vertex_count += face.vertex_indices.len();
        self.faces.push(face);
        self.faces.len() - 1
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Face> {
        self.faces.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Face> {
        self.faces.iter()
    }

    /// Triangles the faces expand to, the sum of `len - 2` over renderable
    /// faces.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Position indices across all faces, including malformed ones.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Faces with at least three positions.
    pub fn renderable_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_renderable()).count()
    }

    pub fn clear(&mut self) {
        self.faces.clear();
        self.triangle_count = 0;
        self.vertex_count = 0;
    }
}

impl<'a> IntoIterator for &'a FaceList {
    type Item = &'a Face;
    type IntoIter = std::slice::Iter<'a, Face>;

    fn into_iter(self) -> Self::IntoIter {
        self.faces.iter()
    }
}

fn accumulate_flat_normal(vertex_indices: &[u16], attributes: &mut AttributeStore) {
    attributes.set_normal_count(attributes.position_count());

    let corner = |i: usize| slot(vertex_indices[i]).map_or(Vec3::ZERO, |s| attributes.position(s));
    let p0 = corner(0);
    let edge1 = corner(1) - p0;
    let edge2 = corner(2) - p0;
    let normal = edge1.cross(edge2).normalize_or_zero();

    if normal.length() <= FLAT_NORMAL_EPSILON {
        log::debug!("Degenerate face, flat normal not accumulated");
        return;
    }

    for &index in vertex_indices {
        match slot(index) {
            Some(s) => attributes.accumulate_normal(s, normal),
            None => log::warn!("Face references position 0, skipping normal accumulation"),
        }
    }
}
