//! Polygon mesh construction and vertex buffer assembly.
//!
//! A mesh is built from an [`AttributeStore`] (positions, normals, UVs and
//! colors in independent arrays) and a [`FaceList`] whose faces index each
//! array separately. [`assemble`] expands the faces into one interleaved
//! vertex record per triangle corner, laid out per [`VertexCapabilities`].

mod assembler;
mod attributes;
mod face;
mod layout;

pub use assembler::{assemble, MeshBuffers, MAX_CORNERS};
pub use attributes::{AttributeStore, SharedAttributes};
pub use face::{slot, Face, FaceList, FLAT_NORMAL_EPSILON};
pub use layout::{
    UvDimension, VertexAttribute, VertexAttributeFormat, VertexAttributeSemantic,
    VertexCapabilities, VertexLayout,
};
