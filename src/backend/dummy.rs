//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't touch GPU hardware. It keeps buffer and texture
//! contents in host memory and records every draw so tests can inspect what
//! a real backend would have received through a [`DummyProbe`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BackendError, BackendResult};
use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureUsage};

use super::{check_write_range, BufferHandle, DrawCommand, GraphicsBackend, TextureHandle};

#[derive(Debug)]
struct DummyBuffer {
    descriptor: BufferDescriptor,
    data: Vec<u8>,
}

#[derive(Debug)]
struct DummyTexture {
    descriptor: TextureDescriptor,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyState {
    next_id: u64,
    buffers: HashMap<u64, DummyBuffer>,
    textures: HashMap<u64, DummyTexture>,
    buffers_created: usize,
    buffers_destroyed: usize,
    textures_created: usize,
    textures_destroyed: usize,
    frames: usize,
    draws: Vec<DrawCommand>,
    fail_allocations: bool,
}

impl DummyState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    state: Arc<Mutex<DummyState>>,
    max_buffer_size: u64,
}

impl DummyBackend {
    /// Create a new dummy backend without a buffer size limit.
    pub fn new() -> Self {
        Self::with_max_buffer_size(u64::MAX)
    }

    /// Create a dummy backend that rejects buffers larger than `max_buffer_size`.
    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(DummyState::default())),
            max_buffer_size,
        }
    }

    /// Get a probe sharing this backend's state.
    pub fn probe(&self) -> DummyProbe {
        DummyProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(BackendError::OutOfMemory);
        }
        if desc.size > self.max_buffer_size {
            return Err(BackendError::BufferCreationFailed(format!(
                "size {} exceeds maximum buffer size {}",
                desc.size, self.max_buffer_size
            )));
        }

        let id = state.allocate_id();
        log::trace!(
            "DummyBackend: creating buffer {} {:?} (size: {})",
            id,
            desc.label,
            desc.size
        );
        state.buffers.insert(
            id,
            DummyBuffer {
                descriptor: desc.clone(),
                data: vec![0u8; desc.size as usize],
            },
        );
        state.buffers_created += 1;
        Ok(BufferHandle(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(BackendError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        if !entry.descriptor.usage.contains(BufferUsage::COPY_DST) {
            return Err(BackendError::MissingUsage {
                kind: "buffer",
                id: buffer.0,
                usage: "COPY_DST",
            });
        }

        let len = data.len() as u64;
        check_write_range(offset, len, entry.data.len() as u64)?;

        log::trace!(
            "DummyBackend: write_buffer {} offset={} len={}",
            buffer.0,
            offset,
            len
        );
        let start = offset as usize;
        entry.data[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        if state.buffers.remove(&buffer.0).is_some() {
            log::trace!("DummyBackend: destroying buffer {}", buffer.0);
            state.buffers_destroyed += 1;
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(BackendError::OutOfMemory);
        }

        let id = state.allocate_id();
        log::trace!(
            "DummyBackend: creating texture {} {:?} ({}x{}, {:?})",
            id,
            desc.label,
            desc.width,
            desc.height,
            desc.target
        );
        state.textures.insert(
            id,
            DummyTexture {
                descriptor: desc.clone(),
                data: Vec::new(),
            },
        );
        state.textures_created += 1;
        Ok(TextureHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .textures
            .get_mut(&texture.0)
            .ok_or(BackendError::UnknownHandle {
                kind: "texture",
                id: texture.0,
            })?;
        if !entry.descriptor.usage.contains(TextureUsage::COPY_DST) {
            return Err(BackendError::MissingUsage {
                kind: "texture",
                id: texture.0,
                usage: "COPY_DST",
            });
        }

        let expected = desc.data_size();
        if data.len() as u64 != expected {
            return Err(BackendError::WriteOutOfBounds {
                offset: 0,
                len: data.len() as u64,
                size: expected,
            });
        }

        log::trace!(
            "DummyBackend: write_texture {} {:?} len={}",
            texture.0,
            desc.label,
            data.len()
        );
        entry.descriptor = desc.clone();
        entry.data = data.to_vec();
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let mut state = self.state.lock();
        if state.textures.remove(&texture.0).is_some() {
            log::trace!("DummyBackend: destroying texture {}", texture.0);
            state.textures_destroyed += 1;
        }
    }

    fn draw_indexed(&mut self, command: &DrawCommand) -> BackendResult<()> {
        let mut state = self.state.lock();
        for (kind, handle) in [
            ("buffer", command.vertex_buffer),
            ("buffer", command.index_buffer),
        ] {
            if !state.buffers.contains_key(&handle.0) {
                return Err(BackendError::UnknownHandle {
                    kind,
                    id: handle.0,
                });
            }
        }

        log::trace!(
            "DummyBackend: draw_indexed first={} count={} stride={}",
            command.first_index,
            command.index_count,
            command.layout.stride()
        );
        state.draws.push(command.clone());
        Ok(())
    }

    fn end_frame(&mut self) -> Vec<DrawCommand> {
        let mut state = self.state.lock();
        state.frames += 1;
        std::mem::take(&mut state.draws)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Read-side view into a [`DummyBackend`].
///
/// The probe stays valid after the backend is boxed and moved into a
/// [`RenderContext`](crate::RenderContext).
#[derive(Debug, Clone)]
pub struct DummyProbe {
    state: Arc<Mutex<DummyState>>,
}

impl DummyProbe {
    /// Total buffers created since the last counter reset.
    pub fn buffers_created(&self) -> usize {
        self.state.lock().buffers_created
    }

    /// Total buffers destroyed since the last counter reset.
    pub fn buffers_destroyed(&self) -> usize {
        self.state.lock().buffers_destroyed
    }

    /// Total textures created since the last counter reset.
    pub fn textures_created(&self) -> usize {
        self.state.lock().textures_created
    }

    /// Total textures destroyed since the last counter reset.
    pub fn textures_destroyed(&self) -> usize {
        self.state.lock().textures_destroyed
    }

    /// Buffer and texture creations combined.
    pub fn allocation_count(&self) -> usize {
        let state = self.state.lock();
        state.buffers_created + state.textures_created
    }

    /// Number of buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Number of textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Contents of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(&buffer.0)
            .map(|b| b.data.clone())
    }

    /// Descriptor a live buffer was created with.
    pub fn buffer_descriptor(&self, buffer: BufferHandle) -> Option<BufferDescriptor> {
        self.state
            .lock()
            .buffers
            .get(&buffer.0)
            .map(|b| b.descriptor.clone())
    }

    /// Pixel data uploaded to a live texture.
    pub fn texture_contents(&self, texture: TextureHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .textures
            .get(&texture.0)
            .map(|t| t.data.clone())
    }

    /// Descriptor of a live texture.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.state
            .lock()
            .textures
            .get(&texture.0)
            .map(|t| t.descriptor.clone())
    }

    /// Draws submitted in the current frame, i.e. since the last
    /// [`GraphicsBackend::end_frame`] or [`clear_draws`](Self::clear_draws).
    pub fn draws(&self) -> Vec<DrawCommand> {
        self.state.lock().draws.clone()
    }

    pub fn clear_draws(&self) {
        self.state.lock().draws.clear();
    }

    /// Number of frames closed with [`GraphicsBackend::end_frame`].
    pub fn frames(&self) -> usize {
        self.state.lock().frames
    }

    /// Make every subsequent buffer and texture allocation fail.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    /// Zero the creation and destruction counters.
    pub fn reset_counters(&self) {
        let mut state = self.state.lock();
        state.buffers_created = 0;
        state.buffers_destroyed = 0;
        state.textures_created = 0;
        state.textures_destroyed = 0;
    }
}
