//! # scene-geometry
//!
//! Retained-mode scene geometry: polygon meshes built on any thread and
//! synchronized to GPU buffers on the render thread.
//!
//! ## Overview
//!
//! - [`mesh`] - attribute storage, faces with independent index spaces, and
//!   fan triangulation into interleaved vertex buffers
//! - [`Geometry`] / [`Texture`] - GPU resources with a dirty-driven
//!   activate/deactivate lifecycle
//! - [`RenderContext`] / [`CreationContext`] - the render thread's context
//!   and the cross-thread handle used to register resources with it
//! - [`RenderState`] - texture and material a geometry is drawn with
//! - [`scene`] - node, group and drawable list interfaces
//! - [`ModelBuilder`] - builds a model from an OBJ-style call sequence
//! - [`backend`] - backend trait, dummy backend for tests, optional wgpu
//!
//! ## Example
//!
//! ```
//! use glam::{Mat4, Vec3};
//! use scene_geometry::{ContextConfig, DrawableList, ModelBuilder, Node, RenderContext};
//!
//! # fn main() -> Result<(), scene_geometry::GeometryError> {
//! let ctx = RenderContext::new(ContextConfig::default());
//! let mut builder = ModelBuilder::new(ctx.creation_context());
//! builder.start_model("triangle.obj");
//! builder.add_vertex(Vec3::new(0.0, 0.0, 0.0));
//! builder.add_vertex(Vec3::new(1.0, 0.0, 0.0));
//! builder.add_vertex(Vec3::new(0.0, 1.0, 0.0));
//! builder.add_face(&[1, 2, 3], &[], &[]);
//! let root = builder.finish_model().expect("model started");
//!
//! ctx.update()?;
//! let mut drawables = DrawableList::new();
//! root.cull(&Mat4::IDENTITY, &mut drawables);
//! assert_eq!(drawables.draw(&ctx), 1);
//! let frame = ctx.end_frame()?;
//! assert_eq!(frame.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod loader;
pub mod mesh;
pub mod render_state;
pub mod resources;
pub mod scene;
pub mod types;

pub use backend::{create_backend, DummyBackend, GraphicsBackend};
pub use context::{CreationContext, RenderContext, UpdateSummary};
pub use error::{BackendError, BackendResult, GeometryError};
pub use loader::ModelBuilder;
pub use mesh::{AttributeStore, Face, FaceList, SharedAttributes};
pub use render_state::{Material, RenderState, SharedRenderState};
pub use resources::{Geometry, GpuResource, ResourceState, SharedTexture, Texture, TextureImage};
pub use scene::{Drawable, DrawableList, Group, Node};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend selection for the render context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    /// Host-memory backend - no GPU required
    #[default]
    Dummy,
    /// wgpu backend - requires the `wgpu-backend` feature
    Wgpu,
}

/// Configuration for creating a [`RenderContext`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Which backend to use
    pub backend: BackendType,
    /// Debug label for the context and its device
    pub label: String,
    /// Largest buffer the backend may allocate, in bytes
    pub max_buffer_size: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Dummy,
            label: "Render Context".to_string(),
            max_buffer_size: 256 << 20,
        }
    }
}

impl ContextConfig {
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_buffer_size(mut self, size: u64) -> Self {
        self.max_buffer_size = size;
        self
    }
}

/// Log the crate version. Call once at startup, after the logger is set up.
pub fn init() {
    log::info!("scene-geometry v{} initialized", VERSION);
}
