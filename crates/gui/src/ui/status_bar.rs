use egui::Ui;

use notebook_gui_lib::lifecycle::ActivationHandle;

use crate::gl::GlRenderer;
use crate::state::AppState;

pub fn show(ui: &mut Ui, state: &AppState, handle: Option<&ActivationHandle<GlRenderer>>) {
    ui.horizontal(|ui| {
        ui.weak(format!("Pages: {}", state.config.page_count));
        ui.separator();

        match handle {
            Some(handle) if handle.is_running() => {
                ui.weak(format!("Frames: {}", handle.frames_rendered()));
                if handle.has_pending_decodes() {
                    ui.separator();
                    ui.weak("Decoding image…");
                }
            }
            _ => {
                ui.weak("Viewer closed");
            }
        }

        if let Some(status) = &state.status {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(status);
            });
        }
    });
}
