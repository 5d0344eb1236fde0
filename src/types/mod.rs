//! Descriptor types shared by the backends and the resources.

mod buffer;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage, IndexFormat};
pub use texture::{TextureDescriptor, TextureFormat, TextureTarget, TextureUsage};
