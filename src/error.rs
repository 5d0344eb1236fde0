//! Error types for GPU backends and geometry materialization.

use thiserror::Error;

/// Errors reported by a [`GraphicsBackend`](crate::backend::GraphicsBackend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    WriteOutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("Unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },
    #[error("{kind} {id} was not created with {usage} usage")]
    MissingUsage {
        kind: &'static str,
        id: u64,
        usage: &'static str,
    },
    #[error("Backend not available: {0}")]
    Unavailable(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while materializing or drawing scene resources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// A GPU operation was attempted off the render thread.
    #[error("{operation} called off the render thread")]
    WrongContext { operation: &'static str },

    /// The assembler tried to write past the pre-sized vertex buffer. This
    /// means the face/triangle accounting is broken.
    #[error("Buffer integrity violated: write of {len} bytes at offset {offset} exceeds {capacity}")]
    BufferIntegrity {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The mesh emits more corners than a 16-bit index buffer can address.
    #[error("Mesh emits {corners} corners, more than a 16-bit index buffer can address")]
    IndexRangeExceeded { corners: usize },

    /// The backend failed to allocate or write GPU storage.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}
