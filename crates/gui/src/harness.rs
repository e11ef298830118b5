//! Headless test harness for viewer activations.
//!
//! Stands in for the GPU, the host container, the display refresh signal
//! and slow image sources, recording everything into a [`ResourceLedger`]
//! so leak/double-free properties can be asserted directly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use glam::Vec3;
use image::RgbaImage;
use shared::{ImageSource, ViewerConfig};
use tokio::runtime::Handle;

use crate::error::{Result, ViewerError};
use crate::lifecycle::{ActivationHandle, LifecycleCoordinator};
use crate::render::{
    FrameInput, FrameScheduler, FrameToken, GeometryId, MaterialDesc, MaterialId, RenderBackend,
    Renderer, SurfaceId, SurfaceSize, TextureId,
};
use crate::scene::mesh::MeshData;
use crate::state::settings::ControlSettings;
use crate::texture::decode::ImageLoader;
use crate::viewport::HostContainer;

// ── Resource ledger ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Geometry,
    Texture,
    Material,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_id: u64,
    live: HashSet<(Kind, u64)>,
    created: HashMap<Kind, usize>,
    released: HashMap<Kind, usize>,
    double_frees: usize,
    texture_pixels: HashMap<u64, RgbaImage>,
    material_descs: HashMap<u64, MaterialDesc>,
    texture_updates: usize,
    render_calls: usize,
    camera_positions: Vec<Vec3>,
    renderers_created: usize,
    renderers_disposed: usize,
    sizes: Vec<SurfaceSize>,
}

/// Shared record of every allocation, release and render call
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger(Rc<RefCell<LedgerState>>);

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        let mut state = self.0.borrow_mut();
        state.next_id += 1;
        state.next_id
    }

    fn allocate(&self, kind: Kind) -> u64 {
        let id = self.next_id();
        let mut state = self.0.borrow_mut();
        state.live.insert((kind, id));
        *state.created.entry(kind).or_default() += 1;
        id
    }

    fn release(&self, kind: Kind, id: u64) {
        let mut state = self.0.borrow_mut();
        if state.live.remove(&(kind, id)) {
            *state.released.entry(kind).or_default() += 1;
            match kind {
                Kind::Texture => {
                    state.texture_pixels.remove(&id);
                }
                Kind::Material => {
                    state.material_descs.remove(&id);
                }
                Kind::Geometry => {}
            }
        } else {
            state.double_frees += 1;
        }
    }

    /// Geometries + textures + materials ever created
    pub fn allocations(&self) -> usize {
        self.0.borrow().created.values().sum()
    }

    pub fn releases(&self) -> usize {
        self.0.borrow().released.values().sum()
    }

    pub fn live_resources(&self) -> usize {
        self.0.borrow().live.len()
    }

    /// Releases of ids that were not live
    pub fn double_frees(&self) -> usize {
        self.0.borrow().double_frees
    }

    pub fn geometries_created(&self) -> usize {
        self.0.borrow().created.get(&Kind::Geometry).copied().unwrap_or(0)
    }

    pub fn textures_created(&self) -> usize {
        self.0.borrow().created.get(&Kind::Texture).copied().unwrap_or(0)
    }

    pub fn materials_created(&self) -> usize {
        self.0.borrow().created.get(&Kind::Material).copied().unwrap_or(0)
    }

    pub fn render_calls(&self) -> usize {
        self.0.borrow().render_calls
    }

    pub fn texture_updates(&self) -> usize {
        self.0.borrow().texture_updates
    }

    /// Current pixels of a live texture
    pub fn texture_pixels(&self, id: TextureId) -> Option<RgbaImage> {
        self.0.borrow().texture_pixels.get(&id.0).cloned()
    }

    /// Descriptor of a live material
    pub fn material_desc(&self, id: MaterialId) -> Option<MaterialDesc> {
        self.0.borrow().material_descs.get(&id.0).copied()
    }

    /// Pixels of every live texture, in allocation order
    pub fn live_texture_pixels(&self) -> Vec<RgbaImage> {
        let state = self.0.borrow();
        let mut ids: Vec<_> = state.texture_pixels.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().filter_map(|id| state.texture_pixels.get(id).cloned()).collect()
    }

    /// Camera position of every rendered frame
    pub fn camera_positions(&self) -> Vec<Vec3> {
        self.0.borrow().camera_positions.clone()
    }

    pub fn renderers_created(&self) -> usize {
        self.0.borrow().renderers_created
    }

    pub fn renderers_disposed(&self) -> usize {
        self.0.borrow().renderers_disposed
    }

    /// Sizes passed to `set_size`
    pub fn resizes(&self) -> Vec<SurfaceSize> {
        self.0.borrow().sizes.clone()
    }
}

// ── Tracking backend ────────────────────────────────────────────

/// Failure points, counted per renderer
#[derive(Debug, Clone, Copy, Default)]
struct FailurePlan {
    create_renderer: bool,
    texture_at: Option<usize>,
    update_at: Option<usize>,
    render_at: Option<usize>,
}

/// Backend whose renderers only record what they are asked to do
#[derive(Debug, Clone, Default)]
pub struct TrackingBackend {
    ledger: ResourceLedger,
    plan: FailurePlan,
}

impl TrackingBackend {
    pub fn new(ledger: ResourceLedger) -> Self {
        Self {
            ledger,
            plan: FailurePlan::default(),
        }
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Refuse to create renderers
    pub fn fail_create(mut self) -> Self {
        self.plan.create_renderer = true;
        self
    }

    /// Fail the `n`th (0-based) texture creation
    pub fn fail_texture_at(mut self, n: usize) -> Self {
        self.plan.texture_at = Some(n);
        self
    }

    /// Fail the `n`th (0-based) texture update
    pub fn fail_update_texture_at(mut self, n: usize) -> Self {
        self.plan.update_at = Some(n);
        self
    }

    /// Fail the `n`th (0-based) render call
    pub fn fail_render_at(mut self, n: usize) -> Self {
        self.plan.render_at = Some(n);
        self
    }
}

impl RenderBackend for TrackingBackend {
    type Renderer = TrackingRenderer;

    fn create_renderer(&mut self, size: SurfaceSize) -> Result<TrackingRenderer> {
        if self.plan.create_renderer {
            return Err(ViewerError::Backend("no GPU context".into()));
        }
        let surface = SurfaceId(self.ledger.next_id());
        self.ledger.0.borrow_mut().renderers_created += 1;
        Ok(TrackingRenderer {
            ledger: self.ledger.clone(),
            plan: self.plan,
            surface,
            size,
            textures_made: 0,
            updates: 0,
            renders: 0,
            disposed: false,
        })
    }
}

#[derive(Debug)]
pub struct TrackingRenderer {
    ledger: ResourceLedger,
    plan: FailurePlan,
    surface: SurfaceId,
    size: SurfaceSize,
    textures_made: usize,
    updates: usize,
    renders: usize,
    disposed: bool,
}

impl TrackingRenderer {
    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn check_alive(&self) -> Result<()> {
        if self.disposed {
            Err(ViewerError::Backend("renderer used after dispose".into()))
        } else {
            Ok(())
        }
    }
}

impl Renderer for TrackingRenderer {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn set_size(&mut self, size: SurfaceSize) {
        self.size = size;
        self.ledger.0.borrow_mut().sizes.push(size);
    }

    fn create_geometry(&mut self, mesh: &MeshData) -> Result<GeometryId> {
        self.check_alive()?;
        if mesh.indices.is_empty() {
            return Err(ViewerError::Backend("empty geometry".into()));
        }
        Ok(GeometryId(self.ledger.allocate(Kind::Geometry)))
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId> {
        self.check_alive()?;
        let n = self.textures_made;
        self.textures_made += 1;
        if self.plan.texture_at == Some(n) {
            return Err(ViewerError::Backend(format!("texture {n} allocation failed")));
        }
        let id = self.ledger.allocate(Kind::Texture);
        self.ledger
            .0
            .borrow_mut()
            .texture_pixels
            .insert(id, image.clone());
        Ok(TextureId(id))
    }

    fn update_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<()> {
        self.check_alive()?;
        let n = self.updates;
        self.updates += 1;
        if self.plan.update_at == Some(n) {
            return Err(ViewerError::Backend(format!("texture update {n} failed")));
        }
        let mut state = self.ledger.0.borrow_mut();
        if !state.live.contains(&(Kind::Texture, id.0)) {
            return Err(ViewerError::Backend(format!("unknown texture {}", id.0)));
        }
        state.texture_pixels.insert(id.0, image.clone());
        state.texture_updates += 1;
        Ok(())
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId> {
        self.check_alive()?;
        if let Some(texture) = desc.texture() {
            if !self.ledger.0.borrow().live.contains(&(Kind::Texture, texture.0)) {
                return Err(ViewerError::Backend("material references a dead texture".into()));
            }
        }
        let id = self.ledger.allocate(Kind::Material);
        self.ledger.0.borrow_mut().material_descs.insert(id, *desc);
        Ok(MaterialId(id))
    }

    fn render(&mut self, frame: &FrameInput<'_>) -> Result<()> {
        self.check_alive()?;
        let n = self.renders;
        self.renders += 1;
        if self.plan.render_at == Some(n) {
            return Err(ViewerError::Backend(format!("render {n} failed")));
        }
        let mut state = self.ledger.0.borrow_mut();
        state.render_calls += 1;
        state.camera_positions.push(frame.camera_position);
        Ok(())
    }

    fn release_geometry(&mut self, id: GeometryId) {
        self.ledger.release(Kind::Geometry, id.0);
    }

    fn release_texture(&mut self, id: TextureId) {
        self.ledger.release(Kind::Texture, id.0);
    }

    fn release_material(&mut self, id: MaterialId) {
        self.ledger.release(Kind::Material, id.0);
    }

    fn dispose(&mut self) {
        let mut state = self.ledger.0.borrow_mut();
        if self.disposed {
            state.double_frees += 1;
            return;
        }
        self.disposed = true;
        state.renderers_disposed += 1;
    }
}

// ── Host container ──────────────────────────────────────────────

/// In-memory container with a settable size
#[derive(Debug)]
pub struct TestHost {
    size: RefCell<Option<SurfaceSize>>,
    surfaces: RefCell<Vec<SurfaceId>>,
}

impl TestHost {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Rc::new(Self {
            size: RefCell::new(Some(SurfaceSize::new(width, height))),
            surfaces: RefCell::new(Vec::new()),
        })
    }

    pub fn resize(&self, width: u32, height: u32) {
        *self.size.borrow_mut() = Some(SurfaceSize::new(width, height));
    }

    /// Simulate the caller removing the container from the page
    pub fn detach(&self) {
        *self.size.borrow_mut() = None;
    }

    /// Drop all children behind the viewer's back
    pub fn clear_surfaces(&self) {
        self.surfaces.borrow_mut().clear();
    }

    pub fn surfaces(&self) -> Vec<SurfaceId> {
        self.surfaces.borrow().clone()
    }
}

impl HostContainer for TestHost {
    fn client_size(&self) -> Option<SurfaceSize> {
        *self.size.borrow()
    }

    fn append_surface(&self, surface: SurfaceId) {
        self.surfaces.borrow_mut().push(surface);
    }

    fn remove_surface(&self, surface: SurfaceId) -> bool {
        let mut surfaces = self.surfaces.borrow_mut();
        let before = surfaces.len();
        surfaces.retain(|s| *s != surface);
        surfaces.len() != before
    }

    fn surface_count(&self) -> usize {
        self.surfaces.borrow().len()
    }
}

// ── Frame scheduler ─────────────────────────────────────────────

/// Frame requests queue up until the test fires them.
///
/// Cancelled tokens stay in the queue, modelling a refresh tick that was
/// already dispatched when the cancel happened.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: RefCell<u64>,
    queue: RefCell<VecDeque<FrameToken>>,
    cancelled: RefCell<Vec<FrameToken>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn cancelled(&self) -> Vec<FrameToken> {
        self.cancelled.borrow().clone()
    }

    pub fn take_next(&self) -> Option<FrameToken> {
        self.queue.borrow_mut().pop_front()
    }

    /// Deliver the oldest queued token to `handle`
    pub fn fire<R: Renderer>(&self, handle: &mut ActivationHandle<R>) -> Option<Result<bool>> {
        let token = self.take_next()?;
        Some(handle.on_frame(token))
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self) -> FrameToken {
        let mut next = self.next.borrow_mut();
        *next += 1;
        let token = FrameToken(*next);
        self.queue.borrow_mut().push_back(token);
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.cancelled.borrow_mut().push(token);
    }
}

// ── Image loaders ───────────────────────────────────────────────

/// Loader that blocks until [`GatedLoader::release`] is called
#[derive(Debug)]
pub struct GatedLoader {
    bytes: Vec<u8>,
    open: Mutex<bool>,
    opened: Condvar,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl GatedLoader {
    pub fn new(bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bytes,
            open: Mutex::new(false),
            opened: Condvar::new(),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    pub fn release(&self) {
        if let Ok(mut open) = self.open.lock() {
            *open = true;
        }
        self.opened.notify_all();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ImageLoader for GatedLoader {
    fn load(&self, _source: &ImageSource) -> Result<Vec<u8>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let mut open = self
            .open
            .lock()
            .map_err(|_| ViewerError::Backend("gate poisoned".into()))?;
        while !*open {
            open = self
                .opened
                .wait(open)
                .map_err(|_| ViewerError::Backend("gate poisoned".into()))?;
        }
        drop(open);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }
}

/// Loader serving fixed bytes for any source
#[derive(Debug, Clone)]
pub struct StaticLoader(pub Vec<u8>);

impl ImageLoader for StaticLoader {
    fn load(&self, _source: &ImageSource) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

// ── Viewer harness ──────────────────────────────────────────────

/// Coordinator wired to tracking doubles
pub struct ViewerHarness {
    pub ledger: ResourceLedger,
    pub host: Rc<TestHost>,
    pub scheduler: Rc<ManualScheduler>,
    pub coordinator: LifecycleCoordinator<TrackingBackend>,
}

impl ViewerHarness {
    /// Harness reading images from disk (or inline bytes)
    pub fn new(runtime: Handle) -> Self {
        Self::with_backend(TrackingBackend::new(ResourceLedger::new()), runtime)
    }

    pub fn with_backend(backend: TrackingBackend, runtime: Handle) -> Self {
        let ledger = backend.ledger().clone();
        Self {
            ledger,
            host: TestHost::new(800, 600),
            scheduler: Rc::new(ManualScheduler::new()),
            coordinator: LifecycleCoordinator::new(backend, runtime),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.coordinator = self.coordinator.with_loader(loader);
        self
    }

    pub fn with_controls(mut self, controls: ControlSettings) -> Self {
        self.coordinator = self.coordinator.with_controls(controls);
        self
    }

    pub fn activate(&mut self, config: ViewerConfig) -> Result<ActivationHandle<TrackingRenderer>> {
        self.coordinator
            .activate(config, self.host.clone(), self.scheduler.clone())
    }

    /// Fire `n` frames; stops at the first ignored or failed one
    pub fn tick(&self, handle: &mut ActivationHandle<TrackingRenderer>, n: usize) -> Result<usize> {
        let mut rendered = 0;
        for _ in 0..n {
            match self.scheduler.fire(handle) {
                Some(Ok(true)) => rendered += 1,
                Some(Ok(false)) | None => break,
                Some(Err(e)) => return Err(e),
            }
        }
        Ok(rendered)
    }
}
