use std::sync::Arc;

use glam::Mat4;
use parking_lot::RwLock;

use super::{DrawableList, Node};

/// A named node with children and a local transform.
pub struct Group {
    name: RwLock<String>,
    transform: RwLock<Mat4>,
    children: RwLock<Vec<Arc<dyn Node>>>,
}

impl Default for Group {
    fn default() -> Self {
        Self::new("")
    }
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: RwLock::new(name.into()),
            transform: RwLock::new(Mat4::IDENTITY),
            children: RwLock::new(Vec::new()),
        }
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn transform(&self) -> Mat4 {
        *self.transform.read()
    }

    pub fn set_transform(&self, transform: Mat4) {
        *self.transform.write() = transform;
    }

    /// Add a child. Adding a node that is already a child does nothing.
    pub fn add_node(&self, node: Arc<dyn Node>) {
        let mut children = self.children.write();
        if !children.iter().any(|child| Arc::ptr_eq(child, &node)) {
            children.push(node);
        }
    }

    /// Remove a child, returning whether it was present.
    pub fn remove_node(&self, node: &Arc<dyn Node>) -> bool {
        let mut children = self.children.write();
        let before = children.len();
        children.retain(|child| !Arc::ptr_eq(child, node));
        children.len() != before
    }

    pub fn children(&self) -> Vec<Arc<dyn Node>> {
        self.children.read().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }
}

impl Node for Group {
    fn name(&self) -> String {
        self.name.read().clone()
    }

    fn cull(self: Arc<Self>, transform: &Mat4, list: &mut DrawableList) {
        let world = *transform * self.transform();
        for child in self.children() {
            child.cull(&world, list);
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &*self.name.read())
            .field("children", &self.child_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Group: Send, Sync);
