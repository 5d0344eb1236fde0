use std::sync::Arc;

use glam::Mat4;

use crate::context::RenderContext;

use super::Drawable;

/// Drawables collected by one cull pass, in cull order.
#[derive(Default)]
pub struct DrawableList {
    entries: Vec<(Arc<dyn Drawable>, Mat4)>,
}

impl DrawableList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_drawable(&mut self, drawable: Arc<dyn Drawable>, transform: Mat4) {
        self.entries.push((drawable, transform));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw every entry and return how many actually drew.
    pub fn draw(&self, ctx: &RenderContext) -> usize {
        self.entries
            .iter()
            .filter(|(drawable, transform)| drawable.draw(ctx, transform))
            .count()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for DrawableList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawableList")
            .field("len", &self.entries.len())
            .finish()
    }
}
