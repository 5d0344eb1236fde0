//! Materialization state shared by every GPU resource.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context::RenderContext;
use crate::error::GeometryError;

/// Where a resource is in its GPU lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// No GPU storage has been created, or the last attempt failed.
    #[default]
    Unmaterialized,
    /// GPU storage exists and reflects the construction data it was built
    /// from.
    Materialized,
    /// GPU storage was released by [`GpuResource::deactivate`].
    Destroyed,
}

/// State enum plus dirty flag.
///
/// A resource starts unmaterialized and dirty. It only needs a rebuild when
/// it is not materialized or is dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLifecycle {
    state: ResourceState,
    dirty: bool,
}

impl Default for ResourceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLifecycle {
    pub fn new() -> Self {
        Self {
            state: ResourceState::Unmaterialized,
            dirty: true,
        }
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_materialized(&self) -> bool {
        self.state == ResourceState::Materialized
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_rebuild(&self) -> bool {
        !self.is_materialized() || self.dirty
    }

    /// Storage was created and uploaded.
    pub fn materialized(&mut self) {
        self.state = ResourceState::Materialized;
        self.dirty = false;
    }

    /// Materialization failed; the resource is unusable until the next
    /// successful activation.
    pub fn failed(&mut self) {
        self.state = ResourceState::Unmaterialized;
        self.dirty = true;
    }

    /// Storage was released.
    pub fn released(&mut self) {
        if self.state == ResourceState::Materialized {
            self.state = ResourceState::Destroyed;
        }
        self.dirty = true;
    }
}

/// A resource whose GPU storage is managed by the render thread.
///
/// Both entry points fail with [`GeometryError::WrongContext`] without
/// touching the backend when called off the context's render thread.
pub trait GpuResource: Send {
    /// Debug label used in diagnostics.
    fn label(&self) -> &str;

    fn state(&self) -> ResourceState;

    /// Whether GPU storage is stale relative to construction data.
    fn is_dirty(&self) -> bool;

    /// Create or rebuild GPU storage. A materialized, clean resource is left
    /// untouched.
    fn activate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError>;

    /// Release GPU storage and mark the resource dirty. Safe to call
    /// repeatedly.
    fn deactivate(&mut self, ctx: &RenderContext) -> Result<(), GeometryError>;

    /// Whether the next activation would rebuild.
    fn needs_activation(&self) -> bool {
        self.state() != ResourceState::Materialized || self.is_dirty()
    }
}

pub type SharedResource = Arc<Mutex<dyn GpuResource>>;
pub type WeakResource = Weak<Mutex<dyn GpuResource>>;
