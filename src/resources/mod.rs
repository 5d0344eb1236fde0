//! GPU-backed scene resources.
//!
//! Resources are built on any thread, then materialized on the render
//! thread through [`GpuResource::activate`].

mod geometry;
mod lifecycle;
mod texture;

pub use geometry::{Geometry, GeometryBuffers, RenderRange};
pub use lifecycle::{GpuResource, ResourceLifecycle, ResourceState, SharedResource, WeakResource};
pub use texture::{SharedTexture, Texture, TextureCache, TextureImage};
