//! Backend abstraction layer
//!
//! Every GPU call made by the scene resources goes through [`GraphicsBackend`].
//! The [`DummyBackend`] keeps everything in host memory and is what the tests
//! and headless tools run against; the wgpu backend is available behind the
//! `wgpu-backend` feature.

mod dummy;
#[cfg(feature = "wgpu-backend")]
mod wgpu_backend;

pub use dummy::{DummyBackend, DummyProbe};
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuBackend;

use std::any::Any;

use glam::{Mat4, Vec4};

use crate::error::{BackendError, BackendResult};
use crate::mesh::VertexLayout;
use crate::types::{BufferDescriptor, IndexFormat, TextureDescriptor};
use crate::{BackendType, ContextConfig};

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

impl BufferHandle {
    /// Backend-assigned identifier.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

impl TextureHandle {
    /// Backend-assigned identifier.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Opaque attribute slot identifiers a draw binds its vertex streams to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeSlots {
    pub position: u32,
    pub normal: u32,
    pub uv: u32,
}

impl Default for AttributeSlots {
    fn default() -> Self {
        Self {
            position: 0,
            normal: 1,
            uv: 2,
        }
    }
}

/// One indexed draw of an interleaved vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
    /// First index of the drawn range.
    pub first_index: u32,
    /// Number of indices drawn.
    pub index_count: u32,
    /// Attributes of one interleaved vertex record.
    pub layout: VertexLayout,
    /// Shader locations the layout's attributes bind to.
    pub slots: AttributeSlots,
    pub texture: Option<TextureHandle>,
    pub transform: Mat4,
    pub tint: Vec4,
}

/// Core backend trait
///
/// Implementations are driven from the render thread only; `Send` lets the
/// owning [`RenderContext`](crate::RenderContext) be handed to that thread.
pub trait GraphicsBackend: Send {
    /// Human readable backend name.
    fn name(&self) -> &'static str;

    /// Create an uninitialized buffer.
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    /// Write bytes into a buffer at the given offset.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> BackendResult<()>;

    /// Release a buffer. Unknown handles are ignored.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a texture.
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Upload the pixel data of every layer of a texture.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Release a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Submit an indexed draw.
    fn draw_indexed(&mut self, command: &DrawCommand) -> BackendResult<()>;

    /// Close the current frame and hand over the draws submitted since the
    /// previous call, in submission order.
    fn end_frame(&mut self) -> Vec<DrawCommand> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Fail unless `len` bytes at `offset` fit in a buffer of `size` bytes.
pub(crate) fn check_write_range(offset: u64, len: u64, size: u64) -> BackendResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(BackendError::WriteOutOfBounds { offset, len, size }),
    }
}

/// Create the backend requested by `config`.
///
/// Falls back to the dummy backend when the requested one is not compiled in
/// or fails to initialize.
pub fn create_backend(config: &ContextConfig) -> Box<dyn GraphicsBackend> {
    match config.backend {
        BackendType::Dummy => Box::new(DummyBackend::with_max_buffer_size(config.max_buffer_size)),
        BackendType::Wgpu => create_wgpu_backend(config),
    }
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend(config: &ContextConfig) -> Box<dyn GraphicsBackend> {
    match WgpuBackend::new(config) {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            log::warn!("wgpu backend unavailable ({}), falling back to dummy backend", e);
            Box::new(DummyBackend::with_max_buffer_size(config.max_buffer_size))
        }
    }
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend(config: &ContextConfig) -> Box<dyn GraphicsBackend> {
    log::warn!("wgpu backend not compiled in (enable the `wgpu-backend` feature), falling back to dummy backend");
    Box::new(DummyBackend::with_max_buffer_size(config.max_buffer_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_dummy_backend() {
        let backend = create_backend(&ContextConfig::default());
        assert_eq!(backend.name(), "Dummy Backend");
    }

    #[cfg(not(feature = "wgpu-backend"))]
    #[test]
    fn test_wgpu_request_falls_back_to_dummy() {
        let config = ContextConfig::default().with_backend(BackendType::Wgpu);
        let backend = create_backend(&config);
        assert_eq!(backend.name(), "Dummy Backend");
    }

    #[test]
    fn test_backend_downcast() {
        let mut backend = create_backend(&ContextConfig::default());
        assert!(backend.as_any().is::<DummyBackend>());
        assert!(backend.as_any_mut().downcast_mut::<DummyBackend>().is_some());
        assert!(backend.end_frame().is_empty());
    }

    #[test]
    fn test_write_range_does_not_overflow() {
        assert!(check_write_range(4, 4, 8).is_ok());
        assert!(check_write_range(8, 0, 8).is_ok());
        assert!(check_write_range(6, 4, 8).is_err());
        assert_eq!(
            check_write_range(u64::MAX, 2, 8),
            Err(BackendError::WriteOutOfBounds {
                offset: u64::MAX,
                len: 2,
                size: 8
            })
        );
    }

    #[test]
    fn test_default_attribute_slots() {
        let slots = AttributeSlots::default();
        assert_eq!((slots.position, slots.normal, slots.uv), (0, 1, 2));
    }
}
