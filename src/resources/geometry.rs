//! Geometry: a polygon mesh with GPU vertex and index buffers.

use std::sync::Arc;

use glam::{Mat4, Vec4};
use parking_lot::Mutex;

use crate::backend::{AttributeSlots, BufferHandle, DrawCommand, GraphicsBackend};
use crate::context::RenderContext;
use crate::error::GeometryError;
use crate::mesh::{assemble, AttributeStore, Face, FaceList, SharedAttributes, VertexCapabilities};
use crate::render_state::SharedRenderState;
use crate::scene::{Drawable, DrawableList, Node};
use crate::types::{BufferDescriptor, IndexFormat};

use super::lifecycle::{GpuResource, ResourceLifecycle, ResourceState};

/// Buffer copies must be a multiple of this many bytes.
const COPY_ALIGNMENT: u64 = 4;

fn align_copy(size: u64) -> u64 {
    size.div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT
}

/// GPU buffers of a materialized geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBuffers {
    pub vertex: BufferHandle,
    pub index: BufferHandle,
    pub stride: u32,
    pub index_count: u32,
    /// Capabilities the vertex records were laid out for.
    pub capabilities: VertexCapabilities,
}

/// Sub-range of the index buffer to draw. A zero length draws everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderRange {
    pub start: u32,
    pub length: u32,
}

impl RenderRange {
    /// `(first_index, index_count)` for a buffer of `total` indices, or
    /// `None` if the range does not fit.
    pub fn resolve(&self, total: u32) -> Option<(u32, u32)> {
        if self.length == 0 {
            return Some((0, total));
        }
        match self.start.checked_add(self.length) {
            Some(end) if end <= total => Some((self.start, self.length)),
            _ => None,
        }
    }
}

/// What the current buffers were assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BuildStamp {
    revision: u64,
    capabilities: VertexCapabilities,
}

/// A mesh made of faces over a (possibly shared) attribute store.
///
/// Construction happens on any thread. [`GpuResource::activate`] assembles
/// the faces and uploads them on the render thread; any later change to the
/// faces, the attribute store or the render state's texture makes the
/// geometry dirty again, and it is not drawn until re-activated.
#[derive(Debug)]
pub struct Geometry {
    name: String,
    faces: FaceList,
    attributes: SharedAttributes,
    render_state: Option<SharedRenderState>,
    lifecycle: ResourceLifecycle,
    buffers: Option<GeometryBuffers>,
    built_from: Option<BuildStamp>,
    range: RenderRange,
}

impl Geometry {
    pub fn new(attributes: SharedAttributes) -> Self {
        Self {
            name: String::new(),
            faces: FaceList::new(),
            attributes,
            render_state: None,
            lifecycle: ResourceLifecycle::new(),
            buffers: None,
            built_from: None,
            range: RenderRange::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wrap for sharing between the scene graph and the render context.
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Add a face of 1-based attribute indices. See [`FaceList::add_face`].
    pub fn add_face(&mut self, positions: &[u32], uvs: &[u32], normals: &[u32]) -> usize {
        let index = {
            let mut attributes = self.attributes.write();
            self.faces.add_face(positions, uvs, normals, &mut attributes)
        };
        self.lifecycle.mark_dirty();
        index
    }

    pub fn attributes(&self) -> &SharedAttributes {
        &self.attributes
    }

    pub fn set_attributes(&mut self, attributes: SharedAttributes) {
        self.attributes = attributes;
        self.lifecycle.mark_dirty();
    }

    pub fn render_state(&self) -> Option<&SharedRenderState> {
        self.render_state.as_ref()
    }

    pub fn set_render_state(&mut self, render_state: SharedRenderState) {
        self.render_state = Some(render_state);
        self.lifecycle.mark_dirty();
    }

    pub fn render_range(&self) -> RenderRange {
        self.range
    }

    /// Limit draws to `length` indices starting at `start`. A zero length
    /// restores full draws.
    pub fn set_render_range(&mut self, start: u32, length: u32) {
        self.range = RenderRange { start, length };
    }

    pub fn faces(&self) -> &FaceList {
        &self.faces
    }

    pub fn face(&self, index: usize) -> Option<&Face> {
        self.faces.get(index)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.triangle_count()
    }

    pub fn vertex_count(&self) -> usize {
        self.faces.vertex_count()
    }

    /// Buffers of the last successful materialization.
    pub fn buffers(&self) -> Option<GeometryBuffers> {
        self.buffers
    }

    /// Capabilities of the bound render state, without diagnostics.
    fn current_capabilities(&self) -> VertexCapabilities {
        self.render_state
            .as_ref()
            .map_or(VertexCapabilities::UNTEXTURED, |state| state.read().capabilities())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(buffers) = self.buffers.take() {
            backend.destroy_buffer(buffers.vertex);
            backend.destroy_buffer(buffers.index);
        }
        self.built_from = None;
    }

    fn materialize(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        faces: &FaceList,
        attributes: &AttributeStore,
        capabilities: VertexCapabilities,
    ) -> Result<Option<GeometryBuffers>, GeometryError> {
        let corners = faces.triangle_count() * 3;
        if corners == 0 {
            return Ok(None);
        }

        let stride = capabilities.stride();
        let vertex_desc = BufferDescriptor::vertex((corners * stride) as u64)
            .with_label(format!("{} vertices", label));
        let index_desc = BufferDescriptor::index(align_copy(corners as u64 * IndexFormat::Uint16.size()))
            .with_label(format!("{} indices", label));

        let vertex = backend.create_buffer(&vertex_desc)?;
        let index = match backend.create_buffer(&index_desc) {
            Ok(handle) => handle,
            Err(e) => {
                backend.destroy_buffer(vertex);
                return Err(e.into());
            }
        };

        match Self::upload(backend, vertex, index, faces, attributes, capabilities) {
            Ok(index_count) => Ok(Some(GeometryBuffers {
                vertex,
                index,
                stride: stride as u32,
                index_count,
                capabilities,
            })),
            Err(e) => {
                backend.destroy_buffer(vertex);
                backend.destroy_buffer(index);
                Err(e)
            }
        }
    }

    fn upload(
        backend: &mut dyn GraphicsBackend,
        vertex: BufferHandle,
        index: BufferHandle,
        faces: &FaceList,
        attributes: &AttributeStore,
        capabilities: VertexCapabilities,
    ) -> Result<u32, GeometryError> {
        let mesh = assemble(faces, attributes, capabilities)?;
        backend.write_buffer(vertex, 0, mesh.vertex_bytes())?;

        let mut index_bytes = mesh.index_bytes().to_vec();
        index_bytes.resize(align_copy(index_bytes.len() as u64) as usize, 0);
        backend.write_buffer(index, 0, &index_bytes)?;

        Ok(mesh.vertex_count() as u32)
    }

    /// Issue one indexed draw. Returns `false` when the geometry is not
    /// materialized, is stale, has nothing to draw, or its render range does
    /// not fit.
    pub fn draw(&self, ctx: &RenderContext, transform: &Mat4) -> bool {
        if !ctx.is_on_render_thread() {
            log::error!("Geometry::draw called off the render thread");
            return false;
        }
        if self.needs_activation() {
            log::trace!("Geometry '{}' is not materialized, skipping draw", self.name);
            return false;
        }
        let Some(buffers) = self.buffers else {
            return false;
        };
        let Some((first_index, index_count)) = self.range.resolve(buffers.index_count) else {
            log::warn!(
                "Geometry '{}' render range {}+{} exceeds {} indices",
                self.name,
                self.range.start,
                self.range.length,
                buffers.index_count
            );
            return false;
        };

        let (slots, texture, tint) = match &self.render_state {
            Some(state) => {
                let state = state.read();
                (state.slots(), state.texture_handle(), state.tint())
            }
            None => (AttributeSlots::default(), None, Vec4::ONE),
        };

        let command = DrawCommand {
            vertex_buffer: buffers.vertex,
            index_buffer: buffers.index,
            index_format: IndexFormat::Uint16,
            first_index,
            index_count,
            layout: buffers.capabilities.layout(),
            slots,
            texture,
            transform: *transform,
            tint,
        };

        match ctx.backend().draw_indexed(&command) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to draw geometry '{}': {}", self.name, e);
                false
            }
        }
    }
}

impl GpuResource for Geometry {
    fn label(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ResourceState {
        self.lifecycle.state()
    }

    fn is_dirty(&self) -> bool {
        if self.lifecycle.is_dirty() {
            return true;
        }
        match self.built_from {
            Some(stamp) => {
                stamp.revision != self.attributes.read().revision()
                    || stamp.capabilities != self.current_capabilities()
            }
            None => false,
        }
    }

    fn activate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError> {
        ctx.ensure_render_thread("Geometry::activate")?;
        if !self.needs_activation() {
            return Ok(());
        }

        let capabilities = match &self.render_state {
            Some(state) => state.read().capabilities(),
            None => {
                log::error!(
                    "Geometry '{}' has no render state, assembling without texture coordinates",
                    self.name
                );
                VertexCapabilities::UNTEXTURED
            }
        };

        let mut backend = ctx.backend();
        self.release(backend.as_mut());

        let attributes = Arc::clone(&self.attributes);
        let attributes = attributes.read();
        let result = Self::materialize(
            backend.as_mut(),
            &self.name,
            &self.faces,
            &attributes,
            capabilities,
        );

        match result {
            Ok(buffers) => {
                log::debug!(
                    "Geometry '{}' materialized: {} triangles, stride {}",
                    self.name,
                    self.faces.triangle_count(),
                    capabilities.stride()
                );
                self.buffers = buffers;
                self.built_from = Some(BuildStamp {
                    revision: attributes.revision(),
                    capabilities,
                });
                self.lifecycle.materialized();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to materialize geometry '{}': {}", self.name, e);
                self.lifecycle.failed();
                Err(e)
            }
        }
    }

    fn deactivate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError> {
        ctx.ensure_render_thread("Geometry::deactivate")?;
        self.release(ctx.backend().as_mut());
        self.lifecycle.released();
        Ok(())
    }
}

static_assertions::assert_impl_all!(Geometry: Send, Sync);

impl Node for Mutex<Geometry> {
    fn name(&self) -> String {
        self.lock().name.clone()
    }

    fn cull(self: Arc<Self>, transform: &Mat4, list: &mut DrawableList) {
        list.add_drawable(self, *transform);
    }
}

impl Drawable for Mutex<Geometry> {
    fn draw(&self, ctx: &RenderContext, transform: &Mat4) -> bool {
        self.lock().draw(ctx, transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, DummyProbe};
    use crate::mesh::AttributeStore;
    use crate::render_state::RenderState;
    use crate::resources::{Texture, TextureImage};
    use crate::types::TextureTarget;
    use crate::ContextConfig;
    use glam::Vec3;

    fn context() -> (RenderContext, DummyProbe) {
        let backend = DummyBackend::new();
        let probe = backend.probe();
        (
            RenderContext::with_backend(ContextConfig::default(), Box::new(backend)),
            probe,
        )
    }

    fn square() -> Geometry {
        let attributes = AttributeStore::shared();
        {
            let mut store = attributes.write();
            store.append_position(Vec3::new(0.0, 0.0, 0.0));
            store.append_position(Vec3::new(1.0, 0.0, 0.0));
            store.append_position(Vec3::new(1.0, 1.0, 0.0));
            store.append_position(Vec3::new(0.0, 1.0, 0.0));
        }
        let mut geometry = Geometry::new(attributes).with_name("square");
        geometry.set_render_state(RenderState::new().shared());
        geometry.add_face(&[1, 2, 3, 4], &[], &[]);
        geometry
    }

    #[test]
    fn test_align_copy() {
        assert_eq!(align_copy(0), 0);
        assert_eq!(align_copy(6), 8);
        assert_eq!(align_copy(12), 12);
    }

    #[test]
    fn test_render_range_resolve() {
        assert_eq!(RenderRange::default().resolve(12), Some((0, 12)));
        assert_eq!(RenderRange { start: 3, length: 9 }.resolve(12), Some((3, 9)));
        assert_eq!(RenderRange { start: 3, length: 10 }.resolve(12), None);
        assert_eq!(
            RenderRange {
                start: u32::MAX,
                length: 1
            }
            .resolve(12),
            None
        );
    }

    #[test]
    fn test_activate_uploads_buffers() {
        let (ctx, probe) = context();
        let mut geometry = square();
        geometry.activate(&ctx).unwrap();

        let buffers = geometry.buffers().unwrap();
        assert_eq!(buffers.stride, 24);
        assert_eq!(buffers.index_count, 6);
        assert_eq!(probe.buffer_contents(buffers.vertex).unwrap().len(), 6 * 24);

        let index_bytes = probe.buffer_contents(buffers.index).unwrap();
        let indices: Vec<u16> = index_bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(geometry.state(), ResourceState::Materialized);
        assert!(!geometry.is_dirty());
    }

    #[test]
    fn test_odd_index_count_is_padded() {
        let (ctx, probe) = context();
        let attributes = AttributeStore::shared();
        let mut geometry = Geometry::new(attributes);
        geometry.set_render_state(RenderState::new().shared());
        geometry.add_face(&[1, 2, 3], &[], &[]);
        geometry.activate(&ctx).unwrap();

        let buffers = geometry.buffers().unwrap();
        let descriptor = probe.buffer_descriptor(buffers.index).unwrap();
        assert_eq!(descriptor.size, 8);
        assert_eq!(buffers.index_count, 3);
    }

    #[test]
    fn test_missing_render_state_uses_untextured_layout() {
        let (ctx, _probe) = context();
        let attributes = AttributeStore::shared();
        let mut geometry = Geometry::new(attributes);
        geometry.add_face(&[1, 2, 3], &[], &[]);

        geometry.activate(&ctx).unwrap();
        assert_eq!(geometry.buffers().unwrap().stride, 24);
    }

    #[test]
    fn test_empty_geometry_materializes_without_buffers() {
        let (ctx, probe) = context();
        let mut geometry = Geometry::new(AttributeStore::shared());
        geometry.add_face(&[1, 2], &[], &[]);

        geometry.activate(&ctx).unwrap();
        assert_eq!(geometry.state(), ResourceState::Materialized);
        assert!(geometry.buffers().is_none());
        assert_eq!(probe.buffers_created(), 0);
        assert!(!geometry.draw(&ctx, &Mat4::IDENTITY));
    }

    #[test]
    fn test_shared_store_mutation_marks_dirty() {
        let (ctx, _probe) = context();
        let mut geometry = square();
        geometry.activate(&ctx).unwrap();
        assert!(!geometry.is_dirty());

        geometry.attributes().write().set_position(0, Vec3::splat(-1.0));
        assert!(geometry.is_dirty());
        assert!(!geometry.draw(&ctx, &Mat4::IDENTITY));

        geometry.activate(&ctx).unwrap();
        assert!(!geometry.is_dirty());
    }

    #[test]
    fn test_texture_bound_later_changes_stride() {
        let (ctx, probe) = context();
        let mut geometry = square();
        geometry.activate(&ctx).unwrap();
        assert_eq!(geometry.buffers().unwrap().stride, 24);

        let texture = Texture::new(TextureTarget::CubeMap)
            .with_image(TextureImage::new(
                1,
                1,
                crate::types::TextureFormat::Rgba8Unorm,
                vec![0; 24],
            ))
            .shared();
        geometry
            .render_state()
            .unwrap()
            .write()
            .set_texture(Some(texture));
        assert!(geometry.is_dirty());

        geometry.activate(&ctx).unwrap();
        let buffers = geometry.buffers().unwrap();
        assert_eq!(buffers.stride, 36);
        assert_eq!(probe.buffer_contents(buffers.vertex).unwrap().len(), 6 * 36);
    }

    #[test]
    fn test_draw_issues_command() {
        let (ctx, probe) = context();
        let mut geometry = square();
        assert!(!geometry.draw(&ctx, &Mat4::IDENTITY));

        geometry.activate(&ctx).unwrap();
        let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(geometry.draw(&ctx, &transform));

        let draws = probe.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 6);
        assert_eq!(draws[0].first_index, 0);
        assert_eq!(draws[0].layout.stride(), 24);
        assert_eq!(draws[0].transform, transform);
        assert_eq!(draws[0].texture, None);
    }

    #[test]
    fn test_render_range() {
        let (ctx, probe) = context();
        let mut geometry = square();
        geometry.activate(&ctx).unwrap();

        geometry.set_render_range(3, 3);
        assert!(geometry.draw(&ctx, &Mat4::IDENTITY));
        assert_eq!(probe.draws()[0].first_index, 3);
        assert_eq!(probe.draws()[0].index_count, 3);

        geometry.set_render_range(3, 4);
        assert!(!geometry.draw(&ctx, &Mat4::IDENTITY));
        assert_eq!(probe.draws().len(), 1);

        geometry.set_render_range(0, 0);
        assert!(geometry.draw(&ctx, &Mat4::IDENTITY));
        assert_eq!(probe.draws()[1].index_count, 6);
    }

    #[test]
    fn test_index_range_exceeded_leaves_unmaterialized() {
        let (ctx, probe) = context();
        let mut geometry = Geometry::new(AttributeStore::shared());
        for _ in 0..21846 {
            geometry.add_face(&[1, 2, 3], &[], &[1, 1, 1]);
        }

        let err = geometry.activate(&ctx).unwrap_err();
        assert!(matches!(err, GeometryError::IndexRangeExceeded { .. }));
        assert_eq!(geometry.state(), ResourceState::Unmaterialized);
        assert!(geometry.is_dirty());
        assert_eq!(probe.live_buffers(), 0);
    }
}
