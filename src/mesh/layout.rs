//! Vertex layout definitions for assembled meshes.
//!
//! Assembled meshes use a single interleaved buffer. Each record is
//!
//! ```text
//! offset  0: position  Float3
//! offset 12: normal    Float3
//! offset 24: texcoord  Float2 | Float3   (only when a texture is bound)
//! ```
//!
//! so the stride is 24, 32 or 36 bytes depending on the bound render state.

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeSemantic {
    /// Vertex position (float3).
    Position,
    /// Vertex normal (float3).
    Normal,
    /// Texture coordinates (float2, or float3 for cube maps).
    TexCoord0,
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> usize {
        match self {
            Self::Float2 => 8,
            Self::Float3 => 12,
        }
    }

    /// Number of `f32` components.
    pub fn components(&self) -> usize {
        self.size() / 4
    }
}

/// Number of texture coordinate components a draw needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UvDimension {
    /// `(u, v)` for 2D textures.
    #[default]
    Planar,
    /// `(s, t, r)` direction for cube maps.
    Cube,
}

impl UvDimension {
    pub fn components(&self) -> usize {
        match self {
            Self::Planar => 2,
            Self::Cube => 3,
        }
    }

    pub fn format(&self) -> VertexAttributeFormat {
        match self {
            Self::Planar => VertexAttributeFormat::Float2,
            Self::Cube => VertexAttributeFormat::Float3,
        }
    }
}

/// What the bound render state needs from the vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexCapabilities {
    pub has_texture: bool,
    pub uv_dimension: UvDimension,
}

impl VertexCapabilities {
    /// Capabilities of an untextured draw.
    pub const UNTEXTURED: Self = Self {
        has_texture: false,
        uv_dimension: UvDimension::Planar,
    };

    pub fn textured(uv_dimension: UvDimension) -> Self {
        Self {
            has_texture: true,
            uv_dimension,
        }
    }

    /// Bytes per interleaved vertex record.
    pub fn stride(&self) -> usize {
        let uv = if self.has_texture {
            self.uv_dimension.format().size()
        } else {
            0
        };
        VertexAttributeFormat::Float3.size() * 2 + uv
    }

    /// Layout of the interleaved record.
    pub fn layout(&self) -> VertexLayout {
        let mut layout = VertexLayout::new()
            .with_attribute(VertexAttribute::new(
                VertexAttributeSemantic::Position,
                VertexAttributeFormat::Float3,
                0,
            ))
            .with_attribute(VertexAttribute::new(
                VertexAttributeSemantic::Normal,
                VertexAttributeFormat::Float3,
                12,
            ));
        if self.has_texture {
            layout = layout.with_attribute(VertexAttribute::new(
                VertexAttributeSemantic::TexCoord0,
                self.uv_dimension.format(),
                24,
            ));
        }
        layout
    }
}

/// A single vertex attribute description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic meaning of this attribute.
    pub semantic: VertexAttributeSemantic,
    /// Data format of this attribute.
    pub format: VertexAttributeFormat,
    /// Byte offset within the vertex record.
    pub offset: u32,
}

impl VertexAttribute {
    /// Create a new vertex attribute.
    pub fn new(semantic: VertexAttributeSemantic, format: VertexAttributeFormat, offset: u32) -> Self {
        Self {
            semantic,
            format,
            offset,
        }
    }
}

/// Interleaved vertex layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create an empty vertex layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this layout.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Find an attribute by semantic.
    pub fn find_attribute(&self, semantic: VertexAttributeSemantic) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    /// Check if this layout has an attribute with the given semantic.
    pub fn has_semantic(&self, semantic: VertexAttributeSemantic) -> bool {
        self.find_attribute(semantic).is_some()
    }

    /// Record size implied by the attributes.
    pub fn stride(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| a.offset as usize + a.format.size())
            .max()
            .unwrap_or(0)
    }
}
