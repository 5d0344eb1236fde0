//! Scene graph interfaces.
//!
//! A frame culls the graph from its root: every [`Node`] either forwards to
//! its children or contributes itself to a [`DrawableList`], which is then
//! drawn on the render thread.

mod drawable_list;
mod group;

pub use drawable_list::DrawableList;
pub use group::Group;

use std::sync::Arc;

use glam::Mat4;

use crate::context::RenderContext;

/// Something that can be placed in the scene graph.
pub trait Node: Send + Sync {
    fn name(&self) -> String;

    /// Contribute drawables under `transform`.
    fn cull(self: Arc<Self>, transform: &Mat4, list: &mut DrawableList);
}

/// Something that can issue draw calls.
pub trait Drawable: Send + Sync {
    /// Draw with the given world transform. Returns `false` if nothing was
    /// drawn.
    fn draw(&self, ctx: &RenderContext, transform: &Mat4) -> bool;
}
