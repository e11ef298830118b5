//! egui panel hosting the viewer surface.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use eframe::egui::{self, Ui};
use glam::Vec2;

use notebook_gui_lib::camera::{InputEvent, PointerButton};
use notebook_gui_lib::error::ViewerError;
use notebook_gui_lib::lifecycle::ActivationHandle;
use notebook_gui_lib::render::{FrameScheduler, FrameToken, SurfaceId, SurfaceSize};
use notebook_gui_lib::viewport::HostContainer;

use super::renderer::{GlRenderer, SurfaceRegistry};

const ACCESSIBLE_LABEL: &str = "3D Notebook Visualization";
/// Scroll points per wheel notch
const POINTS_PER_NOTCH: f32 = 50.0;

// ── Host container ───────────────────────────────────────────

/// The central panel's rectangle, in physical pixels
#[derive(Default)]
pub struct PanelHost {
    size: Cell<Option<SurfaceSize>>,
    surfaces: RefCell<Vec<SurfaceId>>,
}

impl PanelHost {
    fn set_size(&self, size: Option<SurfaceSize>) {
        self.size.set(size);
    }

    fn surfaces(&self) -> Vec<SurfaceId> {
        self.surfaces.borrow().clone()
    }
}

impl HostContainer for PanelHost {
    fn client_size(&self) -> Option<SurfaceSize> {
        self.size.get()
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

// ── Frame scheduler ──────────────────────────────────────────

/// Frame requests become egui repaints; tokens are delivered on the next
/// update
pub struct RepaintScheduler {
    ctx: egui::Context,
    next: Cell<u64>,
    due: RefCell<VecDeque<FrameToken>>,
}

impl RepaintScheduler {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            next: Cell::new(0),
            due: RefCell::new(VecDeque::new()),
        }
    }

    fn take_due(&self) -> Vec<FrameToken> {
        self.due.borrow_mut().drain(..).collect()
    }
}

impl FrameScheduler for RepaintScheduler {
    fn request_frame(&self) -> FrameToken {
        let token = FrameToken(self.next.get() + 1);
        self.next.set(token.0);
        self.due.borrow_mut().push_back(token);
        self.ctx.request_repaint();
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.due.borrow_mut().retain(|t| *t != token);
    }
}

// ── Panel ────────────────────────────────────────────────────

pub struct ViewerPanel {
    host: Rc<PanelHost>,
    scheduler: Rc<RepaintScheduler>,
    registry: SurfaceRegistry,
}

impl ViewerPanel {
    pub fn new(ctx: egui::Context, registry: SurfaceRegistry) -> Self {
        Self {
            host: Rc::new(PanelHost::default()),
            scheduler: Rc::new(RepaintScheduler::new(ctx)),
            registry,
        }
    }

    pub fn host(&self) -> Rc<dyn HostContainer> {
        self.host.clone()
    }

    pub fn scheduler(&self) -> Rc<dyn FrameScheduler> {
        self.scheduler.clone()
    }

    pub fn has_size(&self) -> bool {
        self.host.client_size().is_some()
    }

    /// Lay out the panel, forward input, run due frames and paint.
    ///
    /// Returns the error of a failed frame; the activation has already torn
    /// itself down by then.
    pub fn show(
        &mut self,
        ui: &mut Ui,
        handle: Option<&mut ActivationHandle<GlRenderer>>,
    ) -> Option<ViewerError> {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let response = response.on_hover_text(ACCESSIBLE_LABEL);
        let ppp = ui.ctx().pixels_per_point();

        let px = rect.size() * ppp;
        let size = SurfaceSize::new(px.x.round() as u32, px.y.round() as u32);
        self.host.set_size(Some(size).filter(|s| !s.is_empty()));

        let mut failure = None;
        if let Some(handle) = handle {
            forward_input(ui, &response, rect, ppp, handle);
            for token in self.scheduler.take_due() {
                if let Err(e) = handle.on_frame(token) {
                    failure = Some(e);
                    break;
                }
            }
        } else {
            // Nobody is listening for these
            self.scheduler.take_due();
        }

        if !ui.is_rect_visible(rect) {
            return failure;
        }

        let surfaces = self.host.surfaces();
        if surfaces.is_empty() {
            ui.painter().rect_filled(rect, 0.0, egui::Color32::from_rgb(0xF5, 0xF5, 0xF5));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Viewer closed",
                egui::FontId::proportional(14.0),
                egui::Color32::from_rgb(120, 120, 130),
            );
            return failure;
        }

        let registry = self.registry.borrow();
        for surface in surfaces {
            let Some(gl_surface) = registry.get(&surface).cloned() else {
                continue;
            };
            let callback = egui::PaintCallback {
                rect,
                callback: Arc::new(eframe::egui_glow::CallbackFn::new(move |info, painter| {
                    let clip = info.viewport_in_pixels();
                    let viewport = [
                        clip.left_px as i32,
                        clip.from_bottom_px as i32,
                        clip.width_px as i32,
                        clip.height_px as i32,
                    ];
                    if let Ok(surface) = gl_surface.lock() {
                        surface.paint(painter.gl(), viewport);
                    }
                })),
            };
            ui.painter().add(callback);
        }
        failure
    }
}

fn forward_input(
    ui: &Ui,
    response: &egui::Response,
    rect: egui::Rect,
    ppp: f32,
    handle: &mut ActivationHandle<GlRenderer>,
) {
    let to_px = |pos: egui::Pos2| {
        let local = (pos - rect.min) * ppp;
        Vec2::new(local.x, local.y)
    };
    let pointer = response.interact_pointer_pos().map(to_px);

    for (egui_button, button) in [
        (egui::PointerButton::Primary, PointerButton::Primary),
        (egui::PointerButton::Secondary, PointerButton::Secondary),
        (egui::PointerButton::Middle, PointerButton::Middle),
    ] {
        if response.drag_started_by(egui_button) {
            if let Some(position) = pointer {
                handle.handle_input(InputEvent::PointerDown { button, position });
            }
        }
    }

    if response.dragged() {
        if let Some(position) = pointer {
            handle.handle_input(InputEvent::PointerMove { position });
        }
    }
    if response.drag_stopped() {
        handle.handle_input(InputEvent::PointerUp);
    }

    if response.hovered() {
        let scroll = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll.abs() > 0.1 {
            handle.handle_input(InputEvent::Wheel {
                delta: scroll / POINTS_PER_NOTCH,
            });
        }
    }
}
