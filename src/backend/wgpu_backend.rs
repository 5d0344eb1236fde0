//! wgpu backend implementation
//!
//! Headless: the backend owns a device and queue but no surface. Buffers and
//! textures are real wgpu objects; draws are queued until
//! [`GraphicsBackend::end_frame`] hands them to the frame recorder that owns
//! the render pipeline. The recorder reaches the wgpu objects behind handles
//! through [`RenderContext::backend_as`](crate::RenderContext::backend_as).

use std::any::Any;
use std::collections::HashMap;

use crate::error::{BackendError, BackendResult};
use crate::mesh::{VertexAttributeFormat, VertexAttributeSemantic, VertexLayout};
use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};
use crate::ContextConfig;

use super::{check_write_range, AttributeSlots, BufferHandle, DrawCommand, GraphicsBackend, TextureHandle};

/// wgpu-based graphics backend
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, wgpu::Texture>,
    next_id: u64,
    pending_draws: Vec<DrawCommand>,
}

impl WgpuBackend {
    /// Create a headless backend, blocking until the device is ready.
    pub fn new(config: &ContextConfig) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(config))
    }

    pub async fn new_async(config: &ContextConfig) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::Unavailable("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let limits = wgpu::Limits {
            max_buffer_size: config.max_buffer_size.min(adapter.limits().max_buffer_size),
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(config.label.as_str()),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                },
                None,
            )
            .await
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            next_id: 0,
            pending_draws: Vec::new(),
        })
    }

    /// Name of the adapter the device was created on.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Look up the wgpu buffer behind a handle.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle.0)
    }

    /// Look up the wgpu texture behind a handle.
    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle.0)
    }

    /// Vertex attributes of `layout`, bound to the shader locations in
    /// `slots`, for building the render pipeline of a [`DrawCommand`].
    pub fn vertex_attributes(layout: &VertexLayout, slots: AttributeSlots) -> Vec<wgpu::VertexAttribute> {
        layout
            .attributes
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: match attribute.format {
                    VertexAttributeFormat::Float2 => wgpu::VertexFormat::Float32x2,
                    VertexAttributeFormat::Float3 => wgpu::VertexFormat::Float32x3,
                },
                offset: attribute.offset as u64,
                shader_location: match attribute.semantic {
                    VertexAttributeSemantic::Position => slots.position,
                    VertexAttributeSemantic::Normal => slots.normal,
                    VertexAttributeSemantic::TexCoord0 => slots.uv,
                },
            })
            .collect()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        result
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        result
    }

    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if desc.size > self.device.limits().max_buffer_size {
            return Err(BackendError::BufferCreationFailed(format!(
                "size {} exceeds device limit {}",
                desc.size,
                self.device.limits().max_buffer_size
            )));
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: Self::convert_buffer_usage(desc.usage),
            mapped_at_creation: false,
        });

        let id = self.allocate_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let buf = self
            .buffers
            .get(&buffer.0)
            .ok_or(BackendError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            })?;

        check_write_range(offset, data.len() as u64, buf.size())?;

        self.queue.write_buffer(buf, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.target.layer_count(),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });

        let id = self.allocate_id();
        self.textures.insert(id, texture);
        Ok(TextureHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<()> {
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or(BackendError::UnknownHandle {
                kind: "texture",
                id: texture.0,
            })?;

        if data.len() as u64 != desc.data_size() {
            return Err(BackendError::WriteOutOfBounds {
                offset: 0,
                len: data.len() as u64,
                size: desc.data_size(),
            });
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.block_size()),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.target.layer_count(),
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.remove(&texture.0) {
            tex.destroy();
        }
    }

    fn draw_indexed(&mut self, command: &DrawCommand) -> BackendResult<()> {
        if !self.buffers.contains_key(&command.vertex_buffer.0) {
            return Err(BackendError::UnknownHandle {
                kind: "buffer",
                id: command.vertex_buffer.0,
            });
        }
        if !self.buffers.contains_key(&command.index_buffer.0) {
            return Err(BackendError::UnknownHandle {
                kind: "buffer",
                id: command.index_buffer.0,
            });
        }
        self.pending_draws.push(command.clone());
        Ok(())
    }

    fn end_frame(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.pending_draws)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{UvDimension, VertexCapabilities};

    #[test]
    fn test_vertex_attributes_follow_slots() {
        let layout = VertexCapabilities::textured(UvDimension::Cube).layout();
        let slots = AttributeSlots {
            position: 4,
            normal: 5,
            uv: 6,
        };
        let attributes = WgpuBackend::vertex_attributes(&layout, slots);

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[0].shader_location, 4);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attributes[2].shader_location, 6);
    }
}
