//! Model construction from an OBJ-style call sequence.
//!
//! A parser drives [`ModelBuilder`] with vertices, groups, materials and
//! faces as it reads them. Every geometry of one model shares a single
//! attribute store, since OBJ indices are global to the file, and is queued
//! with the [`CreationContext`] for activation on the render thread.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec3, Vec4};
use parking_lot::Mutex;

use crate::context::CreationContext;
use crate::mesh::{AttributeStore, SharedAttributes};
use crate::render_state::{Material, RenderState, SharedRenderState};
use crate::resources::Geometry;
use crate::scene::{Group, Node};

#[derive(Debug, Default)]
struct MaterialEntry {
    material: Material,
    diffuse_texture: Option<String>,
    state: Option<SharedRenderState>,
}

/// Builds a [`Group`] of geometries from parser callbacks.
pub struct ModelBuilder {
    creation: CreationContext,
    materials: HashMap<String, MaterialEntry>,
    current_material: Option<String>,
    root: Option<Arc<Group>>,
    attributes: Option<SharedAttributes>,
    current_geometry: Option<Arc<Mutex<Geometry>>>,
    geometries: Vec<Arc<Mutex<Geometry>>>,
    default_render_state: Option<SharedRenderState>,
}

fn color(rgb: Vec3) -> Vec4 {
    rgb.extend(1.0)
}

impl ModelBuilder {
    pub fn new(creation: CreationContext) -> Self {
        Self {
            creation,
            materials: HashMap::new(),
            current_material: None,
            root: None,
            attributes: None,
            current_geometry: None,
            geometries: Vec::new(),
            default_render_state: None,
        }
    }

    /// Begin a new model, finishing any model in progress. The root group
    /// is reused across models and renamed to `name`.
    pub fn start_model(&mut self, name: &str) {
        self.finish_model();
        let root = self.root.get_or_insert_with(|| Arc::new(Group::default()));
        root.set_name(name);
        self.attributes = Some(AttributeStore::shared());
        self.geometries.clear();
    }

    /// End the current model and return its root group.
    pub fn finish_model(&mut self) -> Option<Arc<Group>> {
        self.attributes = None;
        self.current_geometry = None;
        self.current_material = None;
        self.root.clone()
    }

    pub fn model_root(&self) -> Option<&Arc<Group>> {
        self.root.as_ref()
    }

    /// Attach subsequent models to `root` instead of a fresh group.
    pub fn set_model_root(&mut self, root: Arc<Group>) {
        self.root = Some(root);
    }

    /// Geometries created since the last [`start_model`](Self::start_model).
    pub fn geometries(&self) -> &[Arc<Mutex<Geometry>>] {
        &self.geometries
    }

    /// Attribute store of the model in progress.
    pub fn attributes(&self) -> Option<&SharedAttributes> {
        self.attributes.as_ref()
    }

    pub fn add_vertex(&mut self, point: Vec3) {
        match &self.attributes {
            Some(attributes) => {
                attributes.write().append_position(point);
            }
            None => log::warn!("add_vertex called before start_model"),
        }
    }

    pub fn add_normal(&mut self, normal: Vec3) {
        match &self.attributes {
            Some(attributes) => {
                attributes.write().append_normal(normal);
            }
            None => log::warn!("add_normal called before start_model"),
        }
    }

    pub fn add_uv(&mut self, u: f32, v: f32, w: f32) {
        match &self.attributes {
            Some(attributes) => {
                attributes.write().append_uv(Vec3::new(u, v, w));
            }
            None => log::warn!("add_uv called before start_model"),
        }
    }

    /// Start a new geometry named after the first group name.
    pub fn set_group_names<S: AsRef<str>>(&mut self, names: &[S]) {
        let name = names.first().map_or("", |n| n.as_ref());
        self.start_geometry(name);
    }

    pub fn set_object_name(&mut self, name: &str) {
        self.start_geometry(name);
    }

    fn start_geometry(&mut self, name: &str) {
        let (Some(root), Some(attributes)) = (&self.root, &self.attributes) else {
            log::warn!("Geometry '{}' started before start_model", name);
            return;
        };

        let render_state = Arc::clone(
            self.default_render_state
                .get_or_insert_with(|| RenderState::new().with_name("default").shared()),
        );
        let mut geometry = Geometry::new(Arc::clone(attributes)).with_name(name);
        geometry.set_render_state(render_state);
        let geometry = geometry.shared();

        self.creation.register(&geometry);
        let node: Arc<dyn Node> = geometry.clone();
        root.add_node(node);
        self.geometries.push(Arc::clone(&geometry));
        self.current_geometry = Some(geometry);
    }

    /// Start defining material `name`, or resume editing it if it already
    /// exists. Render states already created for it keep being shared and
    /// pick up later edits.
    pub fn create_material(&mut self, name: &str) {
        self.materials.entry(name.to_string()).or_default();
        self.current_material = Some(name.to_string());
    }

    fn current_material_mut(&mut self) -> Option<&mut MaterialEntry> {
        let name = self.current_material.as_ref()?;
        self.materials.get_mut(name)
    }

    fn edit_material(&mut self, edit: impl FnOnce(&mut Material)) {
        if let Some(entry) = self.current_material_mut() {
            edit(&mut entry.material);
            if let Some(state) = &entry.state {
                state.write().set_material(entry.material);
            }
        }
    }

    pub fn set_ambient_color(&mut self, rgb: Vec3) {
        self.edit_material(|material| material.ambient = color(rgb));
    }

    pub fn set_diffuse_color(&mut self, rgb: Vec3) {
        self.edit_material(|material| material.diffuse = color(rgb));
    }

    pub fn set_specular_color(&mut self, rgb: Vec3) {
        self.edit_material(|material| material.specular = color(rgb));
    }

    pub fn set_specular_exponent(&mut self, exponent: f32) {
        self.edit_material(|material| material.specular_exponent = exponent);
    }

    /// Texture resolved through the creation context's texture cache.
    pub fn set_diffuse_texture(&mut self, file_name: &str) {
        let creation = self.creation.clone();
        if let Some(entry) = self.current_material_mut() {
            entry.diffuse_texture = Some(file_name.to_string());
            if let Some(state) = &entry.state {
                state.write().set_texture(Some(creation.load_texture(file_name)));
            }
        }
    }

    /// Draw the current geometry with material `name`. Unknown materials are
    /// logged and ignored.
    pub fn set_material_name(&mut self, name: &str) {
        let Some(entry) = self.materials.get_mut(name) else {
            log::error!("Failed to find material: '{}'", name);
            return;
        };

        let creation = &self.creation;
        let state = Arc::clone(entry.state.get_or_insert_with(|| {
            let mut state = RenderState::new().with_name(name);
            if let Some(file_name) = &entry.diffuse_texture {
                state.set_texture(Some(creation.load_texture(file_name)));
            }
            state.set_material(entry.material);
            state.shared()
        }));

        if self.current_geometry.is_none() {
            self.start_geometry("");
        }
        if let Some(geometry) = &self.current_geometry {
            geometry.lock().set_render_state(state);
        }
    }

    /// Add a face to the current geometry, starting an unnamed one if no
    /// group has been named yet.
    pub fn add_face(&mut self, positions: &[u32], uvs: &[u32], normals: &[u32]) {
        if self.current_geometry.is_none() {
            self.start_geometry("");
        }
        match &self.current_geometry {
            Some(geometry) => {
                geometry.lock().add_face(positions, uvs, normals);
            }
            None => log::warn!("add_face called before start_model"),
        }
    }
}

impl std::fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("materials", &self.materials.len())
            .field("geometries", &self.geometries.len())
            .field("in_model", &self.attributes.is_some())
            .finish()
    }
}
