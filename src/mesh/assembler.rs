//! Fan triangulation and interleaving of faces into GPU-ready buffers.

use glam::Vec3;

use crate::error::GeometryError;

use super::attributes::AttributeStore;
use super::face::{slot, Face, FaceList};
use super::layout::{UvDimension, VertexCapabilities};

/// Corners addressable by a 16-bit index buffer.
pub const MAX_CORNERS: usize = u16::MAX as usize + 1;

/// Output of one assembly pass.
///
/// Every triangle corner gets its own vertex record, so `indices` is always
/// the dense sequence `0..N`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    vertices: Vec<f32>,
    indices: Vec<u16>,
    stride: usize,
}

impl MeshBuffers {
    /// Interleaved vertex records as raw bytes for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Interleaved vertex records, `stride / 4` floats each.
    pub fn vertex_floats(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Index buffer as raw bytes for upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of emitted corners.
    pub fn vertex_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

const FLOAT_SIZE: usize = std::mem::size_of::<f32>();

/// Bounds-checked cursor over a pre-sized vertex buffer. Offsets in errors
/// are in bytes.
struct VertexWriter {
    data: Vec<f32>,
    cursor: usize,
}

impl VertexWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            data: vec![0.0; bytes / FLOAT_SIZE],
            cursor: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len() * FLOAT_SIZE
    }

    fn offset(&self) -> usize {
        self.cursor * FLOAT_SIZE
    }

    fn write(&mut self, values: &[f32]) -> Result<(), GeometryError> {
        let end = self.cursor + values.len();
        if end > self.data.len() {
            debug_assert!(
                false,
                "vertex write of {} bytes at {} overflows buffer of {}",
                values.len() * FLOAT_SIZE,
                self.offset(),
                self.capacity()
            );
            return Err(GeometryError::BufferIntegrity {
                offset: self.offset(),
                len: values.len() * FLOAT_SIZE,
                capacity: self.capacity(),
            });
        }
        self.data[self.cursor..end].copy_from_slice(values);
        self.cursor = end;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    position: Vec3,
    normal: Vec3,
    uv: Vec3,
}

struct Assembler<'a> {
    attributes: &'a AttributeStore,
    capabilities: VertexCapabilities,
    writer: VertexWriter,
    indices: Vec<u16>,
}

impl Assembler<'_> {
    fn corner(&self, face: &Face, ix: usize) -> Corner {
        let lookup = |indices: &[u16]| indices.get(ix).copied().and_then(slot);
        let position = lookup(&face.vertex_indices).map_or(Vec3::ZERO, |s| self.attributes.position(s));
        let normal = lookup(&face.normal_indices).map_or(Vec3::ZERO, |s| self.attributes.normal(s));
        let uv = if self.capabilities.has_texture {
            lookup(&face.uv_indices).map_or(Vec3::ZERO, |s| self.attributes.uv(s))
        } else {
            Vec3::ZERO
        };
        Corner {
            position,
            normal,
            uv,
        }
    }

    fn emit(&mut self, corner: Corner) -> Result<(), GeometryError> {
        self.writer.write(&corner.position.to_array())?;
        self.writer.write(&corner.normal.to_array())?;
        if self.capabilities.has_texture {
            match self.capabilities.uv_dimension {
                UvDimension::Planar => self.writer.write(&[corner.uv.x, corner.uv.y])?,
                UvDimension::Cube => self.writer.write(&corner.uv.to_array())?,
            }
        }
        // The corner limit is checked before assembly starts.
        self.indices.push(self.indices.len() as u16);
        Ok(())
    }

    fn face(&mut self, face: &Face) -> Result<(), GeometryError> {
        let anchor = self.corner(face, 0);
        let count = face.vertex_indices.len();
        for ix in 1..count - 1 {
            self.emit(anchor)?;
            let next = self.corner(face, ix);
            self.emit(next)?;
            let after = self.corner(face, ix + 1);
            self.emit(after)?;
        }
        Ok(())
    }
}

/// Expand `faces` into interleaved vertex records and a 16-bit index buffer.
///
/// Each face is fanned around its first corner. Attribute indices resolve
/// through the zero element when they are `0`, missing or out of range.
pub fn assemble(
    faces: &FaceList,
    attributes: &AttributeStore,
    capabilities: VertexCapabilities,
) -> Result<MeshBuffers, GeometryError> {
    let corners = faces.triangle_count() * 3;
    if corners > MAX_CORNERS {
        log::error!(
            "Mesh emits {} corners, a 16-bit index buffer holds at most {}",
            corners,
            MAX_CORNERS
        );
        return Err(GeometryError::IndexRangeExceeded { corners });
    }

    let stride = capabilities.stride();
    let mut assembler = Assembler {
        attributes,
        capabilities,
        writer: VertexWriter::with_capacity(corners * stride),
        indices: Vec::with_capacity(corners),
    };

    for (i, face) in faces.iter().enumerate() {
        if !face.is_renderable() {
            log::warn!(
                "Skipping malformed face {} with {} position indices",
                i,
                face.vertex_indices.len()
            );
            continue;
        }
        assembler.face(face)?;
    }

    let Assembler {
        writer, indices, ..
    } = assembler;

    if writer.offset() != writer.capacity() {
        debug_assert!(
            false,
            "assembled {} bytes into a buffer sized for {}",
            writer.offset(),
            writer.capacity()
        );
        return Err(GeometryError::BufferIntegrity {
            offset: writer.offset(),
            len: 0,
            capacity: writer.capacity(),
        });
    }

    Ok(MeshBuffers {
        vertices: writer.data,
        indices,
        stride,
    })
}
