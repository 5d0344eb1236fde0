//! Render state: the texture, material and attribute slots a geometry is
//! drawn with.
//!
//! Geometries only read capabilities from here (whether a texture is bound
//! and how many UV components it needs); shading itself happens elsewhere.

use std::sync::Arc;

use glam::Vec4;
use parking_lot::RwLock;

use crate::backend::{AttributeSlots, TextureHandle};
use crate::mesh::{UvDimension, VertexCapabilities};
use crate::resources::SharedTexture;
use crate::types::TextureTarget;

/// Render state shared between the geometries of one material.
pub type SharedRenderState = Arc<RwLock<RenderState>>;

/// Phong-style material colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub specular_exponent: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.5, 0.5, 0.5, 1.0),
            diffuse: Vec4::ONE,
            specular: Vec4::ONE,
            specular_exponent: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderState {
    name: String,
    texture: Option<SharedTexture>,
    fallback_texture: Option<SharedTexture>,
    slots: AttributeSlots,
    material: Material,
    tint: Vec4,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            texture: None,
            fallback_texture: None,
            slots: AttributeSlots::default(),
            material: Material::default(),
            tint: Vec4::ONE,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Wrap for sharing.
    pub fn shared(self) -> SharedRenderState {
        Arc::new(RwLock::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn texture(&self) -> Option<&SharedTexture> {
        self.texture.as_ref()
    }

    pub fn set_texture(&mut self, texture: Option<SharedTexture>) {
        self.texture = texture;
    }

    pub fn fallback_texture(&self) -> Option<&SharedTexture> {
        self.fallback_texture.as_ref()
    }

    /// Texture used while the own texture is absent or has no content yet.
    pub fn set_fallback_texture(&mut self, texture: Option<SharedTexture>) {
        self.fallback_texture = texture;
    }

    /// The texture draws sample: the own texture if it is valid, otherwise
    /// the fallback.
    pub fn effective_texture(&self) -> Option<&SharedTexture> {
        match &self.texture {
            Some(texture) if texture.lock().is_valid() => Some(texture),
            _ => self.fallback_texture.as_ref(),
        }
    }

    pub fn has_texture(&self) -> bool {
        self.effective_texture().is_some()
    }

    /// Three components for cube maps, two otherwise.
    pub fn uv_dimension(&self) -> UvDimension {
        match self.effective_texture().map(|t| t.lock().target()) {
            Some(TextureTarget::CubeMap) => UvDimension::Cube,
            _ => UvDimension::Planar,
        }
    }

    pub fn capabilities(&self) -> VertexCapabilities {
        VertexCapabilities {
            has_texture: self.has_texture(),
            uv_dimension: self.uv_dimension(),
        }
    }

    /// GPU handle of the effective texture, if it is materialized.
    pub fn texture_handle(&self) -> Option<TextureHandle> {
        self.effective_texture().and_then(|t| t.lock().handle())
    }

    pub fn slots(&self) -> AttributeSlots {
        self.slots
    }

    pub fn set_slots(&mut self, slots: AttributeSlots) {
        self.slots = slots;
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    pub fn set_ambient(&mut self, color: Vec4) {
        self.material.ambient = color;
    }

    pub fn set_diffuse(&mut self, color: Vec4) {
        self.material.diffuse = color;
    }

    pub fn tint(&self) -> Vec4 {
        self.tint
    }

    pub fn set_tint(&mut self, color: Vec4) {
        self.tint = color;
    }
}

static_assertions::assert_impl_all!(RenderState: Send, Sync);
