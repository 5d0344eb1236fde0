//! Shared fixtures for the integration tests.
//!
//! Every test runs against the dummy backend; the [`DummyProbe`] exposes
//! what a real GPU would have received.

#![allow(dead_code)]

use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use scene_geometry::backend::{DummyBackend, DummyProbe};
use scene_geometry::{AttributeStore, ContextConfig, Geometry, RenderContext, RenderState, SharedAttributes};

/// A render context bound to the test thread plus a probe into its backend.
pub struct TestContext {
    pub ctx: RenderContext,
    pub probe: DummyProbe,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = DummyBackend::new();
        let probe = backend.probe();
        let ctx = RenderContext::with_backend(ContextConfig::default(), Box::new(backend));
        Self { ctx, probe }
    }
}

/// Store with the unit triangle `(0,0,0), (1,0,0), (0,1,0)`.
pub fn unit_triangle_store() -> SharedAttributes {
    let attributes = AttributeStore::shared();
    {
        let mut store = attributes.write();
        store.append_position(Vec3::new(0.0, 0.0, 0.0));
        store.append_position(Vec3::new(1.0, 0.0, 0.0));
        store.append_position(Vec3::new(0.0, 1.0, 0.0));
    }
    attributes
}

/// Store with a regular polygon of `sides` corners in the XY plane.
pub fn polygon_store(sides: usize) -> SharedAttributes {
    let attributes = AttributeStore::shared();
    {
        let mut store = attributes.write();
        for i in 0..sides {
            let angle = i as f32 / sides as f32 * std::f32::consts::TAU;
            store.append_position(Vec3::new(angle.cos(), angle.sin(), 0.0));
            store.append_uv(Vec3::new(angle.cos() * 0.5 + 0.5, angle.sin() * 0.5 + 0.5, 0.0));
        }
    }
    attributes
}

/// 1-based indices `1..=count`.
pub fn one_based(count: usize) -> Vec<u32> {
    (1..=count as u32).collect()
}

/// Geometry with an untextured render state.
pub fn geometry(attributes: SharedAttributes) -> Geometry {
    let mut geometry = Geometry::new(attributes).with_name("test");
    geometry.set_render_state(RenderState::new().shared());
    geometry
}

pub fn shared_geometry(attributes: SharedAttributes) -> Arc<Mutex<Geometry>> {
    geometry(attributes).shared()
}

/// Interpret vertex buffer bytes as floats.
pub fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Interpret index buffer bytes as `u16`s, dropping copy padding.
pub fn indices(bytes: &[u8], count: usize) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .take(count)
        .map(|c| u16::from_ne_bytes([c[0], c[1]]))
        .collect()
}
