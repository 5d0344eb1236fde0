//! Texture resource and name cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GraphicsBackend, TextureHandle};
use crate::context::RenderContext;
use crate::error::GeometryError;
use crate::types::{TextureDescriptor, TextureFormat, TextureTarget};

use super::lifecycle::{GpuResource, ResourceLifecycle, ResourceState};

/// Texture shared between render states.
pub type SharedTexture = Arc<Mutex<Texture>>;

/// Decoded pixel data. Cube maps carry all six layers back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// A 1x1 RGBA image.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new(1, 1, TextureFormat::Rgba8Unorm, rgba.to_vec())
    }
}

/// A texture whose GPU copy is created on the render thread.
///
/// A texture without an image materializes to nothing; it is valid once it
/// has an image or GPU storage.
#[derive(Debug)]
pub struct Texture {
    name: String,
    target: TextureTarget,
    image: Option<TextureImage>,
    lifecycle: ResourceLifecycle,
    handle: Option<TextureHandle>,
}

impl Texture {
    pub fn new(target: TextureTarget) -> Self {
        Self {
            name: String::new(),
            target,
            image: None,
            lifecycle: ResourceLifecycle::new(),
            handle: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_image(mut self, image: TextureImage) -> Self {
        self.set_image(image);
        self
    }

    /// Wrap for sharing.
    pub fn shared(self) -> SharedTexture {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn image(&self) -> Option<&TextureImage> {
        self.image.as_ref()
    }

    /// Replace the pixel data. The GPU copy is rebuilt on next activation.
    pub fn set_image(&mut self, image: TextureImage) {
        self.image = Some(image);
        self.lifecycle.mark_dirty();
    }

    /// GPU handle, present only while materialized with an image.
    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.image.is_some() || self.handle.is_some()
    }

    /// Descriptor matching the current image.
    pub fn descriptor(&self) -> Option<TextureDescriptor> {
        self.image.as_ref().map(|image| {
            let desc = TextureDescriptor::new(image.width, image.height, self.target, image.format);
            if self.name.is_empty() {
                desc
            } else {
                desc.with_label(self.name.clone())
            }
        })
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(handle) = self.handle.take() {
            backend.destroy_texture(handle);
        }
    }

    fn upload(
        backend: &mut dyn GraphicsBackend,
        desc: &TextureDescriptor,
        image: &TextureImage,
    ) -> Result<TextureHandle, GeometryError> {
        let handle = backend.create_texture(desc)?;
        if let Err(e) = backend.write_texture(handle, desc, &image.data) {
            backend.destroy_texture(handle);
            return Err(e.into());
        }
        Ok(handle)
    }
}

impl GpuResource for Texture {
    fn label(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ResourceState {
        self.lifecycle.state()
    }

    fn is_dirty(&self) -> bool {
        self.lifecycle.is_dirty()
    }

    fn activate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError> {
        ctx.ensure_render_thread("Texture::activate")?;
        if !self.lifecycle.needs_rebuild() {
            return Ok(());
        }

        let mut backend = ctx.backend();
        self.release(backend.as_mut());

        let (Some(desc), Some(image)) = (self.descriptor(), self.image.as_ref()) else {
            log::debug!("Texture '{}' has no image, nothing to upload", self.name);
            self.lifecycle.materialized();
            return Ok(());
        };

        match Self::upload(backend.as_mut(), &desc, image) {
            Ok(handle) => {
                log::debug!("Texture '{}' materialized as {:?}", self.name, handle);
                self.handle = Some(handle);
                self.lifecycle.materialized();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to materialize texture '{}': {}", self.name, e);
                self.lifecycle.failed();
                Err(e)
            }
        }
    }

    fn deactivate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError> {
        ctx.ensure_render_thread("Texture::deactivate")?;
        self.release(ctx.backend().as_mut());
        self.lifecycle.released();
        Ok(())
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

/// Textures by name, with a default used when a lookup misses.
#[derive(Debug)]
pub struct TextureCache {
    textures: HashMap<String, SharedTexture>,
    default_texture: SharedTexture,
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureCache {
    /// Create a cache whose default texture is 1x1 opaque white.
    pub fn new() -> Self {
        let default_texture = Texture::new(TextureTarget::Texture2D)
            .with_name("default")
            .with_image(TextureImage::solid([255, 255, 255, 255]))
            .shared();
        Self {
            textures: HashMap::new(),
            default_texture,
        }
    }

    pub fn add_texture(&mut self, name: impl Into<String>, texture: SharedTexture) {
        self.textures.insert(name.into(), texture);
    }

    pub fn find_texture(&self, name: &str) -> Option<SharedTexture> {
        self.textures.get(name).cloned()
    }

    pub fn default_texture(&self) -> SharedTexture {
        Arc::clone(&self.default_texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::ContextConfig;

    fn context() -> (RenderContext, crate::backend::DummyProbe) {
        let backend = DummyBackend::new();
        let probe = backend.probe();
        let ctx = RenderContext::with_backend(ContextConfig::default(), Box::new(backend));
        (ctx, probe)
    }

    #[test]
    fn test_texture_upload() {
        let (ctx, probe) = context();
        let mut texture = Texture::new(TextureTarget::Texture2D)
            .with_name("checker")
            .with_image(TextureImage::new(
                2,
                1,
                TextureFormat::Rgba8Unorm,
                vec![0, 0, 0, 255, 255, 255, 255, 255],
            ));

        texture.activate(&ctx).unwrap();
        let handle = texture.handle().unwrap();
        assert_eq!(texture.state(), ResourceState::Materialized);
        assert_eq!(probe.texture_contents(handle).unwrap().len(), 8);
        assert_eq!(
            probe.texture_descriptor(handle).unwrap().label.as_deref(),
            Some("checker")
        );

        texture.activate(&ctx).unwrap();
        assert_eq!(probe.textures_created(), 1);
    }

    #[test]
    fn test_set_image_rebuilds() {
        let (ctx, probe) = context();
        let mut texture = Texture::new(TextureTarget::Texture2D).with_image(TextureImage::solid([1, 2, 3, 4]));
        texture.activate(&ctx).unwrap();

        texture.set_image(TextureImage::solid([5, 6, 7, 8]));
        assert!(texture.is_dirty());
        texture.activate(&ctx).unwrap();

        assert_eq!(probe.textures_created(), 2);
        assert_eq!(probe.textures_destroyed(), 1);
        assert_eq!(probe.texture_contents(texture.handle().unwrap()).unwrap(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_texture_without_image() {
        let (ctx, probe) = context();
        let mut texture = Texture::new(TextureTarget::CubeMap);
        assert!(!texture.is_valid());

        texture.activate(&ctx).unwrap();
        assert_eq!(texture.state(), ResourceState::Materialized);
        assert!(texture.handle().is_none());
        assert!(!texture.is_valid());
        assert_eq!(probe.textures_created(), 0);
    }

    #[test]
    fn test_cube_map_upload_checks_layers() {
        let (ctx, probe) = context();
        // One layer of data for a six-layer target.
        let mut texture = Texture::new(TextureTarget::CubeMap).with_image(TextureImage::solid([0; 4]));

        assert!(texture.activate(&ctx).is_err());
        assert_eq!(texture.state(), ResourceState::Unmaterialized);
        assert!(texture.is_dirty());
        assert_eq!(probe.live_textures(), 0);

        texture.set_image(TextureImage::new(1, 1, TextureFormat::Rgba8Unorm, vec![0; 24]));
        texture.activate(&ctx).unwrap();
        assert_eq!(probe.live_textures(), 1);
    }

    #[test]
    fn test_deactivate_releases() {
        let (ctx, probe) = context();
        let mut texture = Texture::new(TextureTarget::Texture2D).with_image(TextureImage::solid([0; 4]));
        texture.activate(&ctx).unwrap();
        texture.deactivate(&ctx).unwrap();
        texture.deactivate(&ctx).unwrap();

        assert_eq!(texture.state(), ResourceState::Destroyed);
        assert!(texture.is_dirty());
        assert!(texture.handle().is_none());
        assert!(texture.is_valid());
        assert_eq!(probe.live_textures(), 0);
        assert_eq!(probe.textures_destroyed(), 1);
    }

    #[test]
    fn test_cache_lookup() {
        let mut cache = TextureCache::new();
        let brick = Texture::new(TextureTarget::Texture2D).with_name("brick").shared();
        cache.add_texture("brick.png", Arc::clone(&brick));

        assert!(Arc::ptr_eq(&cache.find_texture("brick.png").unwrap(), &brick));
        assert!(cache.find_texture("missing.png").is_none());
        assert!(cache.default_texture().lock().is_valid());
        assert_eq!(cache.len(), 1);
    }
}
