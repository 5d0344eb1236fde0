//! The render thread's context and the handle other threads use to hand it
//! resources.
//!
//! Resources can be built anywhere, but every GPU call has to happen on the
//! thread that owns the [`RenderContext`]. A [`CreationContext`] queues
//! resources from any thread; [`RenderContext::update`] adopts them and
//! keeps them materialized.

use std::sync::{mpsc, Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use crate::backend::{create_backend, DrawCommand, GraphicsBackend};
use crate::error::GeometryError;
use crate::resources::{GpuResource, ResourceState, SharedTexture, TextureCache, WeakResource};
use crate::ContextConfig;

/// Cloneable, `Send` handle for registering resources with a
/// [`RenderContext`] from any thread.
#[derive(Debug, Clone)]
pub struct CreationContext {
    sender: mpsc::Sender<WeakResource>,
    textures: Arc<Mutex<TextureCache>>,
}

impl CreationContext {
    /// Queue a resource for activation on the next [`RenderContext::update`].
    /// The context only holds a weak reference.
    pub fn add_resource(&self, resource: WeakResource) {
        if self.sender.send(resource).is_err() {
            log::warn!("Render context is gone, resource not registered");
        }
    }

    /// Queue a resource held in an `Arc<Mutex<_>>`.
    pub fn register<R: GpuResource + 'static>(&self, resource: &Arc<Mutex<R>>) {
        let weak: Weak<Mutex<R>> = Arc::downgrade(resource);
        let weak: WeakResource = weak;
        self.add_resource(weak);
    }

    /// Cache a texture under `name` and queue it for activation.
    pub fn add_texture(&self, name: impl Into<String>, texture: SharedTexture) {
        self.register(&texture);
        self.textures.lock().add_texture(name, texture);
    }

    /// Texture cached under `name`, or the default texture.
    pub fn load_texture(&self, name: &str) -> SharedTexture {
        let cache = self.textures.lock();
        cache.find_texture(name).unwrap_or_else(|| {
            log::warn!("Texture '{}' not found, using default texture", name);
            cache.default_texture()
        })
    }

    pub fn find_texture(&self, name: &str) -> Option<SharedTexture> {
        self.textures.lock().find_texture(name)
    }

    pub fn default_texture(&self) -> SharedTexture {
        self.textures.lock().default_texture()
    }
}

/// Outcome of one [`RenderContext::update`] or
/// [`RenderContext::initialize_gpu`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Resources taken over from the creation queue.
    pub adopted: usize,
    /// Resources that were (re)materialized.
    pub activated: usize,
    /// Resources whose activation failed.
    pub failed: usize,
}

/// Owner of the backend, bound to the render thread.
pub struct RenderContext {
    config: ContextConfig,
    thread: ThreadId,
    backend: Mutex<Box<dyn GraphicsBackend>>,
    creation: CreationContext,
    pending: Mutex<mpsc::Receiver<WeakResource>>,
    resources: Mutex<Vec<WeakResource>>,
}

impl RenderContext {
    /// Create a context bound to the calling thread, with the backend
    /// selected by `config`.
    pub fn new(config: ContextConfig) -> Self {
        let backend = create_backend(&config);
        Self::with_backend(config, backend)
    }

    /// Create a context bound to the calling thread around an existing
    /// backend.
    pub fn with_backend(config: ContextConfig, backend: Box<dyn GraphicsBackend>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let creation = CreationContext {
            sender,
            textures: Arc::new(Mutex::new(TextureCache::new())),
        };
        let default_texture = creation.default_texture();
        creation.register(&default_texture);

        log::info!(
            "Render context '{}' created with {} backend",
            config.label,
            backend.name()
        );

        Self {
            config,
            thread: thread::current().id(),
            backend: Mutex::new(backend),
            creation,
            pending: Mutex::new(receiver),
            resources: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn is_on_render_thread(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Fail with [`GeometryError::WrongContext`] off the render thread.
    pub fn ensure_render_thread(&self, operation: &'static str) -> Result<(), GeometryError> {
        if self.is_on_render_thread() {
            Ok(())
        } else {
            log::error!("{} called off the render thread", operation);
            Err(GeometryError::WrongContext { operation })
        }
    }

    /// Make the calling thread the render thread.
    pub fn bind_to_current_thread(&mut self) {
        log::debug!("Render context '{}' bound to {:?}", self.config.label, thread::current().id());
        self.thread = thread::current().id();
    }

    pub fn creation_context(&self) -> CreationContext {
        self.creation.clone()
    }

    /// Locked access to the backend.
    pub fn backend(&self) -> MutexGuard<'_, Box<dyn GraphicsBackend>> {
        self.backend.lock()
    }

    /// Run `f` against the backend if it is a `B`.
    pub fn backend_as<B: GraphicsBackend + 'static, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut backend = self.backend.lock();
        backend.as_any_mut().downcast_mut::<B>().map(f)
    }

    /// Close the frame and take the draws submitted since the last call.
    /// Call once per frame after the drawable list has been drawn.
    pub fn end_frame(&self) -> Result<Vec<DrawCommand>, GeometryError> {
        self.ensure_render_thread("RenderContext::end_frame")?;
        let draws = self.backend.lock().end_frame();
        log::trace!("Frame ended with {} draws", draws.len());
        Ok(draws)
    }

    /// Number of adopted resources that are still alive.
    pub fn resource_count(&self) -> usize {
        self.resources
            .lock()
            .iter()
            .filter(|r| r.strong_count() > 0)
            .count()
    }

    /// Adopt queued resources, then activate every adopted resource that is
    /// new or dirty. Resources released by [`shutdown_gpu`](Self::shutdown_gpu)
    /// wait for [`initialize_gpu`](Self::initialize_gpu).
    pub fn update(&self) -> Result<UpdateSummary, GeometryError> {
        self.ensure_render_thread("RenderContext::update")?;

        let mut summary = UpdateSummary {
            adopted: self.adopt_pending(),
            ..UpdateSummary::default()
        };

        for resource in self.live_resources() {
            let mut resource = resource.lock();
            if resource.state() == ResourceState::Destroyed || !resource.needs_activation() {
                continue;
            }
            self.activate_one(&mut *resource, &mut summary);
        }
        Ok(summary)
    }

    /// Materialize every adopted resource, including ones released by
    /// [`shutdown_gpu`](Self::shutdown_gpu). Call when the GPU context is
    /// (re)created.
    pub fn initialize_gpu(&self) -> Result<UpdateSummary, GeometryError> {
        self.ensure_render_thread("RenderContext::initialize_gpu")?;

        let mut summary = UpdateSummary {
            adopted: self.adopt_pending(),
            ..UpdateSummary::default()
        };
        for resource in self.live_resources() {
            let mut resource = resource.lock();
            if resource.needs_activation() {
                self.activate_one(&mut *resource, &mut summary);
            }
        }
        log::info!(
            "GPU initialized: {} activated, {} failed",
            summary.activated,
            summary.failed
        );
        Ok(summary)
    }

    /// Release the GPU storage of every adopted resource. Call before the GPU
    /// context goes away.
    pub fn shutdown_gpu(&self) -> Result<(), GeometryError> {
        self.ensure_render_thread("RenderContext::shutdown_gpu")?;
        self.adopt_pending();
        for resource in self.live_resources() {
            resource.lock().deactivate(self)?;
        }
        log::info!("GPU shut down for render context '{}'", self.config.label);
        Ok(())
    }

    fn adopt_pending(&self) -> usize {
        let queued: Vec<WeakResource> = self.pending.lock().try_iter().collect();
        let adopted = queued.len();
        let mut resources = self.resources.lock();
        resources.retain(|r| r.strong_count() > 0);
        resources.extend(queued);
        if adopted > 0 {
            log::debug!("Adopted {} resources", adopted);
        }
        adopted
    }

    fn live_resources(&self) -> Vec<Arc<Mutex<dyn GpuResource>>> {
        self.resources.lock().iter().filter_map(Weak::upgrade).collect()
    }

    fn activate_one(&self, resource: &mut dyn GpuResource, summary: &mut UpdateSummary) {
        match resource.activate(self) {
            Ok(()) => summary.activated += 1,
            Err(e) => {
                log::error!("Failed to activate '{}': {}", resource.label(), e);
                summary.failed += 1;
            }
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("label", &self.config.label)
            .field("thread", &self.thread)
            .field("backend", &self.backend.lock().name())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderContext: Send, Sync);
static_assertions::assert_impl_all!(CreationContext: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::resources::{Texture, TextureImage};
    use crate::types::TextureTarget;

    #[test]
    fn test_default_texture_activated_on_first_update() {
        let backend = DummyBackend::new();
        let probe = backend.probe();
        let ctx = RenderContext::with_backend(ContextConfig::default(), Box::new(backend));

        let summary = ctx.update().unwrap();
        assert_eq!(summary.adopted, 1);
        assert_eq!(summary.activated, 1);
        assert_eq!(probe.live_textures(), 1);

        let summary = ctx.update().unwrap();
        assert_eq!(summary, UpdateSummary::default());
    }

    #[test]
    fn test_wrong_thread() {
        let ctx = RenderContext::new(ContextConfig::default());
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!ctx.is_on_render_thread());
                assert_eq!(
                    ctx.update(),
                    Err(GeometryError::WrongContext {
                        operation: "RenderContext::update"
                    })
                );
            });
        });
        assert!(ctx.is_on_render_thread());
    }

    #[test]
    fn test_backend_as_reaches_concrete_backend() {
        let ctx = RenderContext::new(ContextConfig::default());
        let probe = ctx.backend_as(|backend: &mut DummyBackend| backend.probe());
        assert!(probe.is_some());
        assert!(ctx.end_frame().unwrap().is_empty());
        assert_eq!(probe.map(|p| p.frames()), Some(1));
    }

    #[test]
    fn test_bind_to_current_thread() {
        let ctx = RenderContext::new(ContextConfig::default());
        let handle = std::thread::spawn(move || {
            let mut ctx = ctx;
            assert!(!ctx.is_on_render_thread());
            ctx.bind_to_current_thread();
            ctx.is_on_render_thread()
        });
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_load_texture_falls_back_to_default() {
        let ctx = RenderContext::new(ContextConfig::default());
        let creation = ctx.creation_context();
        let brick = Texture::new(TextureTarget::Texture2D)
            .with_image(TextureImage::solid([9; 4]))
            .shared();
        creation.add_texture("brick.png", Arc::clone(&brick));

        assert!(Arc::ptr_eq(&creation.load_texture("brick.png"), &brick));
        assert!(Arc::ptr_eq(
            &creation.load_texture("missing.png"),
            &creation.default_texture()
        ));
    }

    #[test]
    fn test_dropped_resources_are_pruned() {
        let ctx = RenderContext::new(ContextConfig::default());
        let creation = ctx.creation_context();
        let texture = Texture::new(TextureTarget::Texture2D).shared();
        creation.register(&texture);

        ctx.update().unwrap();
        assert_eq!(ctx.resource_count(), 2);
        drop(texture);
        assert_eq!(ctx.resource_count(), 1);
    }
}
