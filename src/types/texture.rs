//! Texture types and descriptors.

use bitflags::bitflags;

/// Binding target of a texture.
///
/// Cube maps are sampled with 3-component direction vectors, so geometry
/// drawn with a cube map carries 3-component UVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureTarget {
    /// Regular 2D texture.
    #[default]
    Texture2D,
    /// Six-faced cube map.
    CubeMap,
}

impl TextureTarget {
    /// Number of array layers the target occupies.
    pub fn layer_count(&self) -> u32 {
        match self {
            Self::Texture2D => 1,
            Self::CubeMap => 6,
        }
    }
}

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
}

impl TextureFormat {
    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb => 4,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied to.
        const COPY_DST = 1 << 0;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 1;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::TEXTURE_BINDING | Self::COPY_DST
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width of one layer in pixels.
    pub width: u32,
    /// Height of one layer in pixels.
    pub height: u32,
    /// Binding target.
    pub target: TextureTarget,
    /// Pixel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a descriptor for a sampled texture.
    pub fn new(width: u32, height: u32, target: TextureTarget, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            target,
            format,
            usage: TextureUsage::default(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Bytes of pixel data needed to fill every layer.
    pub fn data_size(&self) -> u64 {
        self.width as u64
            * self.height as u64
            * self.format.block_size() as u64
            * self.target.layer_count() as u64
    }
}
