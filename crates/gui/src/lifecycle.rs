//! Activation lifecycle: build, run, teardown.
//!
//! Each [`ActivationHandle`] owns everything allocated for one activation:
//! the scene, its GPU resources, the renderer, the camera and controls, the
//! viewport binding and any in-flight image decodes. Teardown releases all of
//! it exactly once and in a fixed order.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use shared::ViewerConfig;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::camera::{InputEvent, OrbitController, PerspectiveCamera};
use crate::error::{Result, ViewerError};
use crate::render::{
    FrameInput, FrameScheduler, FrameToken, RenderBackend, RenderLoop, Renderer, SceneResources,
    SurfaceId, SurfaceSize,
};
use crate::scene::{self, Scene};
use crate::state::settings::ControlSettings;
use crate::texture::decode::{self, DecodePoll, FsImageLoader, ImageLoader, PendingDecode};
use crate::texture::{self, PageTexture};
use crate::viewport::{HostContainer, ViewportBinder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Uninitialized,
    Building,
    Running,
    TearingDown,
    TornDown,
}

/// Creates activations and refuses to run two at once
pub struct LifecycleCoordinator<B: RenderBackend> {
    backend: B,
    runtime: Handle,
    loader: Arc<dyn ImageLoader>,
    controls: ControlSettings,
    live: Option<Arc<AtomicBool>>,
}

impl<B: RenderBackend> LifecycleCoordinator<B> {
    pub fn new(backend: B, runtime: Handle) -> Self {
        Self {
            backend,
            runtime,
            loader: Arc::new(FsImageLoader),
            controls: ControlSettings::default(),
            live: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_controls(mut self, controls: ControlSettings) -> Self {
        self.controls = controls;
        self
    }

    pub fn set_controls(&mut self, controls: ControlSettings) {
        self.controls = controls;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the last activation has not been torn down yet
    pub fn is_active(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|alive| alive.load(Ordering::Acquire))
    }

    /// Build a scene for `config`, mount it into `host` and start rendering.
    ///
    /// Fails without leaving anything allocated or mounted.
    pub fn activate(
        &mut self,
        config: ViewerConfig,
        host: Rc<dyn HostContainer>,
        scheduler: Rc<dyn FrameScheduler>,
    ) -> Result<ActivationHandle<B::Renderer>> {
        config.validate().map_err(ViewerError::InvalidConfig)?;
        if self.is_active() {
            return Err(ViewerError::AlreadyActive);
        }
        if host.surface_count() > 0 {
            return Err(ViewerError::HostOccupied);
        }

        let mut handle = ActivationHandle::new(scheduler);
        handle.state = ActivationState::Building;
        tracing::debug!(activation = %handle.id, "Building scene with {} pages", config.page_count);

        let stage = match self.build_stage(&config, host) {
            Ok(stage) => stage,
            Err(e) => {
                tracing::error!(activation = %handle.id, "Activation failed: {e}");
                handle.teardown();
                return Err(e);
            }
        };
        handle.stage = Some(stage);

        handle.render_loop.start(handle.scheduler.as_ref());
        handle.state = ActivationState::Running;
        handle.spawn_decodes(&config, &self.runtime, &self.loader);
        self.live = Some(handle.alive.clone());

        tracing::info!(
            activation = %handle.id,
            "Viewer running ({} pages{})",
            config.page_count,
            if config.replacement_image.is_some() { ", replacement image" } else { "" }
        );
        Ok(handle)
    }

    fn build_stage(
        &mut self,
        config: &ViewerConfig,
        host: Rc<dyn HostContainer>,
    ) -> Result<Stage<B::Renderer>> {
        let size = host
            .client_size()
            .filter(|s| !s.is_empty())
            .ok_or(ViewerError::HostDetached)?;

        let scene = scene::build(config);
        let mut renderer = self.backend.create_renderer(size)?;

        let mut resources = match SceneResources::upload(&mut renderer, &scene) {
            Ok(resources) => resources,
            Err(e) => {
                renderer.dispose();
                return Err(e);
            }
        };

        let binder = match ViewportBinder::bind(renderer.surface(), host) {
            Ok(binder) => binder,
            Err(e) => {
                resources.release(&mut renderer);
                renderer.dispose();
                return Err(e);
            }
        };

        let camera = PerspectiveCamera::new(size.aspect());
        let controller = OrbitController::new(self.controls.clone(), &camera, size.height as f32);

        Ok(Stage {
            renderer,
            scene,
            resources,
            camera,
            controller,
            binder,
            decodes: Vec::new(),
            released: false,
        })
    }
}

/// Per-activation scene, renderer and camera
struct Stage<R: Renderer> {
    renderer: R,
    scene: Scene,
    resources: SceneResources,
    camera: PerspectiveCamera,
    controller: OrbitController,
    binder: ViewportBinder,
    decodes: Vec<PendingDecode>,
    released: bool,
}

impl<R: Renderer> Stage<R> {
    /// One tick: pending decodes, resize, camera, render
    fn frame(&mut self, id: Uuid) -> Result<()> {
        self.apply_decodes(id)?;

        if let Some(size) = self.binder.poll_resize() {
            self.resize(size);
        }

        self.controller.advance(&mut self.camera);

        self.renderer.render(&FrameInput {
            background: self.scene.background,
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            camera_position: self.camera.position,
            lights: &self.scene.lights,
            draws: self.resources.draws(),
        })
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.camera.set_aspect(size.aspect());
        self.renderer.set_size(size);
        self.controller.set_viewport_height(size.height as f32);
    }

    /// Apply decodes that finished since the last frame
    fn apply_decodes(&mut self, id: Uuid) -> Result<()> {
        let mut waiting = Vec::with_capacity(self.decodes.len());
        for mut pending in std::mem::take(&mut self.decodes) {
            match pending.poll() {
                DecodePoll::Pending => waiting.push(pending),
                outcome => self.apply_decode(id, pending.page_index(), outcome)?,
            }
        }
        self.decodes = waiting;
        Ok(())
    }

    fn apply_decode(&mut self, id: Uuid, page_index: usize, outcome: DecodePoll) -> Result<()> {
        match outcome {
            DecodePoll::Ready(Ok(image)) => self.set_page_image(page_index, image),
            DecodePoll::Ready(Err(e)) => {
                tracing::warn!(
                    activation = %id,
                    "Replacement image for page {page_index} failed ({e}); using ruled paper"
                );
                self.set_page_fallback(page_index)
            }
            DecodePoll::Abandoned => {
                tracing::warn!(
                    activation = %id,
                    "Decode for page {page_index} vanished; using ruled paper"
                );
                self.set_page_fallback(page_index)
            }
            DecodePoll::Pending => Ok(()),
        }
    }

    fn set_page_image(&mut self, page_index: usize, image: RgbaImage) -> Result<()> {
        let Some(texture) = self.resources.page_texture(page_index) else {
            return Ok(());
        };
        self.renderer.update_texture(texture, &image)?;
        if let Some(PageTexture::Image { decoded, .. }) = self.scene.page_texture_mut(page_index) {
            *decoded = Some(image);
        }
        Ok(())
    }

    fn set_page_fallback(&mut self, page_index: usize) -> Result<()> {
        let Some(texture) = self.resources.page_texture(page_index) else {
            return Ok(());
        };
        let fallback = texture::ruled_paper(page_index);
        self.renderer.update_texture(texture, fallback.pixels())?;
        self.scene.set_page_texture(page_index, fallback);
        Ok(())
    }

    /// Unbind, unmount, free GPU resources, dispose the renderer
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.binder.unobserve();
        self.binder.detach();
        self.decodes.clear();
        self.resources.release(&mut self.renderer);
        self.renderer.dispose();
    }
}

/// One build-run-teardown cycle
pub struct ActivationHandle<R: Renderer> {
    id: Uuid,
    state: ActivationState,
    alive: Arc<AtomicBool>,
    scheduler: Rc<dyn FrameScheduler>,
    render_loop: RenderLoop,
    stage: Option<Stage<R>>,
}

impl<R: Renderer> ActivationHandle<R> {
    fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ActivationState::Uninitialized,
            alive: Arc::new(AtomicBool::new(true)),
            scheduler,
            render_loop: RenderLoop::new(),
            stage: None,
        }
    }

    fn spawn_decodes(
        &mut self,
        config: &ViewerConfig,
        runtime: &Handle,
        loader: &Arc<dyn ImageLoader>,
    ) {
        let (Some(stage), Some(source)) = (self.stage.as_mut(), config.replacement_image.as_ref())
        else {
            return;
        };
        tracing::debug!(activation = %self.id, "Decoding {} for page 0", source.describe());
        stage.decodes.push(decode::spawn_decode(
            runtime,
            loader.clone(),
            source.clone(),
            0,
            self.alive.clone(),
        ));
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ActivationState::Running
    }

    /// The scene of this activation; kept readable after teardown
    pub fn scene(&self) -> Option<&Scene> {
        self.stage.as_ref().map(|s| &s.scene)
    }

    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.stage.as_ref().map(|s| &s.camera)
    }

    pub fn controller(&self) -> Option<&OrbitController> {
        self.stage.as_ref().map(|s| &s.controller)
    }

    pub fn renderer(&self) -> Option<&R> {
        self.stage.as_ref().map(|s| &s.renderer)
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.stage.as_ref().map(|s| s.renderer.surface())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.render_loop.frames_rendered()
    }

    pub fn has_pending_decodes(&self) -> bool {
        self.stage.as_ref().is_some_and(|s| !s.decodes.is_empty())
    }

    /// Handle a refresh tick from the scheduler.
    ///
    /// Returns `Ok(false)` if the token was stale or the activation is not
    /// running. A render failure tears the activation down and is returned.
    pub fn on_frame(&mut self, token: FrameToken) -> Result<bool> {
        if self.state != ActivationState::Running {
            return Ok(false);
        }
        let id = self.id;
        let Some(stage) = self.stage.as_mut() else {
            return Ok(false);
        };

        let result = self
            .render_loop
            .tick(token, self.scheduler.as_ref(), || stage.frame(id));
        match result {
            Ok(ran) => Ok(ran),
            Err(e) => {
                tracing::error!(activation = %id, "Render failed: {e}");
                self.teardown();
                Err(e)
            }
        }
    }

    /// Forward pointer/wheel input to the camera controls
    pub fn handle_input(&mut self, event: InputEvent) {
        if self.state != ActivationState::Running {
            return;
        }
        if let Some(stage) = self.stage.as_mut() {
            stage.controller.handle_input(event);
        }
    }

    pub fn reset_camera(&mut self) {
        if let (ActivationState::Running, Some(stage)) = (self.state, self.stage.as_mut()) {
            stage.controller.reset();
        }
    }

    /// Wait for every in-flight decode and apply the results.
    ///
    /// A failed texture update tears the activation down, as in `on_frame`.
    pub async fn wait_for_decodes(&mut self) -> Result<()> {
        if self.state != ActivationState::Running {
            return Ok(());
        }
        let id = self.id;
        let Some(stage) = self.stage.as_mut() else {
            return Ok(());
        };

        let mut failure = None;
        for pending in std::mem::take(&mut stage.decodes) {
            let page_index = pending.page_index();
            let outcome = pending.wait().await;
            if let Err(e) = stage.apply_decode(id, page_index, outcome) {
                failure = Some(e);
                break;
            }
        }

        match failure {
            None => Ok(()),
            Some(e) => {
                tracing::error!(activation = %id, "Texture update failed: {e}");
                self.teardown();
                Err(e)
            }
        }
    }

    /// Stop rendering and release everything. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        match self.state {
            ActivationState::TearingDown | ActivationState::TornDown => return,
            _ => {}
        }
        self.state = ActivationState::TearingDown;
        self.alive.store(false, Ordering::Release);

        self.render_loop.stop(self.scheduler.as_ref());
        if let Some(stage) = self.stage.as_mut() {
            stage.release();
        }

        self.state = ActivationState::TornDown;
        tracing::info!(
            activation = %self.id,
            "Viewer torn down after {} frames",
            self.render_loop.frames_rendered()
        );
    }
}

impl<R: Renderer> Drop for ActivationHandle<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::{ResourceLedger, TrackingBackend, ViewerHarness};

    #[tokio::test]
    async fn test_activate_runs() {
        let mut h = ViewerHarness::new(Handle::current());
        let handle = h.activate(ViewerConfig::new(5)).unwrap();
        assert_eq!(handle.state(), ActivationState::Running);
        assert_eq!(h.host.surface_count(), 1);
        assert_eq!(h.scheduler.queued(), 1);
        assert_eq!(handle.scene().unwrap().pages.len(), 5);
        assert!(h.coordinator.is_active());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut h = ViewerHarness::new(Handle::current());
        let result = h.activate(ViewerConfig::new(0));
        assert!(matches!(result, Err(ViewerError::InvalidConfig(_))));
        assert_eq!(h.ledger.renderers_created(), 0);
    }

    #[tokio::test]
    async fn test_second_activation_requires_teardown() {
        let mut h = ViewerHarness::new(Handle::current());
        let mut first = h.activate(ViewerConfig::new(2)).unwrap();
        assert!(matches!(
            h.activate(ViewerConfig::new(3)),
            Err(ViewerError::AlreadyActive)
        ));

        first.teardown();
        let second = h.activate(ViewerConfig::new(3)).unwrap();
        assert_eq!(second.scene().unwrap().pages.len(), 3);
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_occupied_host_rejected() {
        let mut h = ViewerHarness::new(Handle::current());
        h.host.append_surface(SurfaceId(999));
        assert!(matches!(
            h.activate(ViewerConfig::new(1)),
            Err(ViewerError::HostOccupied)
        ));
    }

    #[tokio::test]
    async fn test_detached_host_rejected() {
        let mut h = ViewerHarness::new(Handle::current());
        h.host.detach();
        assert!(matches!(
            h.activate(ViewerConfig::new(1)),
            Err(ViewerError::HostDetached)
        ));
        assert_eq!(h.ledger.allocations(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_nothing() {
        let backend = TrackingBackend::new(ResourceLedger::new()).fail_create();
        let mut h = ViewerHarness::with_backend(backend, Handle::current());
        assert!(matches!(
            h.activate(ViewerConfig::new(5)),
            Err(ViewerError::Backend(_))
        ));
        assert_eq!(h.host.surface_count(), 0);
        assert!(!h.coordinator.is_active());
    }

    #[tokio::test]
    async fn test_teardown_twice_is_noop() {
        let mut h = ViewerHarness::new(Handle::current());
        let mut handle = h.activate(ViewerConfig::new(5)).unwrap();
        handle.teardown();
        let releases = h.ledger.releases();
        handle.teardown();
        assert_eq!(h.ledger.releases(), releases);
        assert_eq!(h.ledger.double_frees(), 0);
        assert_eq!(h.ledger.renderers_disposed(), 1);
        assert_eq!(handle.state(), ActivationState::TornDown);
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let mut h = ViewerHarness::new(Handle::current());
        let handle = h.activate(ViewerConfig::new(2)).unwrap();
        drop(handle);
        assert_eq!(h.host.surface_count(), 0);
        assert_eq!(h.ledger.live_resources(), 0);
        assert!(!h.coordinator.is_active());
    }

    #[tokio::test]
    async fn test_input_ignored_after_teardown() {
        let mut h = ViewerHarness::new(Handle::current());
        let mut handle = h.activate(ViewerConfig::new(1)).unwrap();
        handle.teardown();
        let before = handle.controller().unwrap().goal();
        handle.handle_input(InputEvent::Wheel { delta: 4.0 });
        assert_eq!(handle.controller().unwrap().goal(), before);
    }

    #[tokio::test]
    async fn test_decode_applied_between_frames() {
        let image = fixtures::png_bytes(8, 4, [200, 10, 10, 255]);
        let mut h = ViewerHarness::new(Handle::current());
        let mut handle = h
            .activate(fixtures::config_with_bytes(2, image))
            .unwrap();

        handle.wait_for_decodes().await.unwrap();
        let page = handle.scene().unwrap().pages[0].texture().unwrap();
        assert!(!page.is_pending());
        assert_eq!(page.pixels().dimensions(), (8, 4));
        assert_eq!(h.ledger.texture_updates(), 1);
    }

    #[tokio::test]
    async fn test_bad_image_falls_back_to_ruled_paper() {
        let mut h = ViewerHarness::new(Handle::current());
        let mut handle = h
            .activate(fixtures::config_with_bytes(2, b"garbage".to_vec()))
            .unwrap();

        handle.wait_for_decodes().await.unwrap();
        let page = handle.scene().unwrap().pages[0].texture().unwrap();
        assert!(matches!(page, PageTexture::SyntheticRuled { .. }));
        assert!(page.lines().is_empty());
        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn test_failed_texture_update_tears_down() {
        let backend = TrackingBackend::new(ResourceLedger::new()).fail_update_texture_at(0);
        let mut h = ViewerHarness::with_backend(backend, Handle::current());
        let image = fixtures::png_bytes(4, 4, [1, 2, 3, 255]);
        let mut handle = h.activate(fixtures::config_with_bytes(3, image)).unwrap();

        let result = handle.wait_for_decodes().await;
        assert!(matches!(result, Err(ViewerError::Backend(_))));
        assert_eq!(handle.state(), ActivationState::TornDown);
        assert!(!handle.has_pending_decodes());
        assert_eq!(h.host.surface_count(), 0);
        assert_eq!(h.ledger.live_resources(), 0);
        assert_eq!(h.ledger.double_frees(), 0);
        assert_eq!(h.ledger.renderers_disposed(), 1);
        assert!(!h.coordinator.is_active());
    }

    #[tokio::test]
    async fn test_controls_apply_to_next_activation() {
        let mut h = ViewerHarness::new(Handle::current());
        let controls = ControlSettings {
            damping_factor: 0.2,
            enable_pan: false,
            ..ControlSettings::default()
        };
        h.coordinator.set_controls(controls.clone());

        let handle = h.activate(ViewerConfig::new(1)).unwrap();
        assert_eq!(handle.controller().unwrap().settings(), &controls);
        assert_eq!(h.coordinator.backend().ledger().renderers_created(), 1);
    }
}
