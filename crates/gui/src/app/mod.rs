//! Main application module

mod keyboard;
mod styles;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use eframe::egui;
use shared::ViewerConfig;

use notebook_gui_lib::lifecycle::{ActivationHandle, LifecycleCoordinator};
use notebook_gui_lib::state::{AppState, ViewerSettings};

use crate::gl::{GlBackend, GlRenderer, ViewerPanel};
use crate::ui::{status_bar, summary_panel};

/// Main application
pub struct NotebookApp {
    state: AppState,
    /// Live activation; declared before `_runtime` so it is torn down first
    handle: Option<ActivationHandle<GlRenderer>>,
    coordinator: Option<LifecycleCoordinator<GlBackend>>,
    panel: Option<ViewerPanel>,
    /// Revision of the config the current (or last failed) activation used
    built_revision: Option<u64>,
    /// Runs image decodes; outlives every activation
    _runtime: tokio::runtime::Runtime,
}

impl NotebookApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: ViewerConfig,
        settings: ViewerSettings,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        styles::configure_styles(&cc.egui_ctx, settings.ui.font_size);
        let controls = settings.controls.clone();
        let mut state = AppState::new(config, settings);

        let (coordinator, panel) = match cc.gl.clone() {
            Some(gl) => {
                let registry = Rc::new(RefCell::new(HashMap::new()));
                let backend = GlBackend::new(gl, registry.clone());
                let coordinator = LifecycleCoordinator::new(backend, runtime.handle().clone())
                    .with_controls(controls);
                (
                    Some(coordinator),
                    Some(ViewerPanel::new(cc.egui_ctx.clone(), registry)),
                )
            }
            None => {
                tracing::error!("No OpenGL context; the viewer is disabled");
                state.status = Some("OpenGL unavailable".to_string());
                (None, None)
            }
        };

        Self {
            state,
            handle: None,
            coordinator,
            panel,
            built_revision: None,
            _runtime: runtime,
        }
    }

    /// Tear down and rebuild the activation when the config or the open
    /// flag changed
    fn sync_activation(&mut self) {
        let (Some(coordinator), Some(panel)) = (self.coordinator.as_mut(), self.panel.as_ref())
        else {
            return;
        };
        let revision = self.state.revision();
        let stale = self.built_revision != Some(revision);

        if self.handle.is_some() && (stale || !self.state.viewer_open) {
            if let Some(mut handle) = self.handle.take() {
                handle.teardown();
            }
        }

        if self.handle.is_none()
            && self.state.wants_activation(self.built_revision)
            && panel.has_size()
        {
            self.built_revision = Some(revision);
            match coordinator.activate(self.state.config.clone(), panel.host(), panel.scheduler()) {
                Ok(handle) => {
                    self.state.status = None;
                    self.handle = Some(handle);
                }
                Err(e) => {
                    tracing::warn!("Could not open viewer: {e}");
                    self.state.status = Some(format!("Viewer failed: {e}"));
                }
            }
        }
    }
}

impl eframe::App for NotebookApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        keyboard::handle_keyboard(ctx, &mut self.state, self.handle.as_mut());

        // ── Left panel: Summary ──────────────────────────────
        egui::SidePanel::left("summary")
            .default_width(220.0)
            .width_range(180.0..=360.0)
            .resizable(true)
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::same(8)))
            .show(ctx, |ui| {
                summary_panel::show(ui, &mut self.state, self.handle.as_mut());
            });

        // ── Status bar ───────────────────────────────────────
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(
                egui::Frame::side_top_panel(&ctx.style())
                    .inner_margin(egui::Margin::symmetric(8, 2)),
            )
            .show(ctx, |ui| {
                status_bar::show(ui, &self.state, self.handle.as_ref());
            });

        self.sync_activation();

        // ── Central panel: viewer host ───────────────────────
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| match self.panel.as_mut() {
                Some(panel) => {
                    if let Some(e) = panel.show(ui, self.handle.as_mut()) {
                        self.handle = None;
                        self.state.close_viewer();
                        self.state.status = Some(format!("Viewer stopped: {e}"));
                    }
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label("OpenGL is required to show the notebook");
                    });
                }
            });

        // The host size is only known after the panel has been laid out once
        if self.handle.is_none()
            && self.state.wants_activation(self.built_revision)
            && self.panel.as_ref().is_some_and(|p| p.has_size())
        {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&glow::Context>) {
        if let Some(mut handle) = self.handle.take() {
            handle.teardown();
        }
        self.state.settings.save();
    }
}
