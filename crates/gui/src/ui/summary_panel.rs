use egui::Ui;

use notebook_gui_lib::lifecycle::ActivationHandle;
use shared::ImageSource;

use crate::gl::GlRenderer;
use crate::state::AppState;

/// Upper bound of the page slider
const SLIDER_MAX_PAGES: u32 = 12;

pub fn show(ui: &mut Ui, state: &mut AppState, handle: Option<&mut ActivationHandle<GlRenderer>>) {
    ui.heading("Summary");
    ui.add_space(4.0);

    // ── Pages ─────────────────────────────────────────────
    let mut pages = state.config.page_count;
    let slider = ui.add(egui::Slider::new(&mut pages, 1..=SLIDER_MAX_PAGES).text("Pages"));
    if slider.changed() {
        state.set_page_count(pages);
    }

    ui.separator();

    // ── Page 0 image ──────────────────────────────────────
    ui.label("First page");
    ui.monospace(state.image_label());
    ui.horizontal(|ui| {
        if ui.button("Choose image…").clicked() {
            choose_image(state);
        }
        let has_image = state.config.replacement_image.is_some();
        if ui.add_enabled(has_image, egui::Button::new("Clear image")).clicked() {
            state.clear_image();
        }
    });

    ui.separator();

    // ── Viewer ────────────────────────────────────────────
    ui.horizontal(|ui| {
        if state.viewer_open {
            if ui.button("Close viewer").clicked() {
                state.close_viewer();
            }
        } else if ui.button("Open viewer").clicked() {
            state.open_viewer();
        }

        let running = handle.as_ref().is_some_and(|h| h.is_running());
        if ui.add_enabled(running, egui::Button::new("Reset camera")).clicked() {
            if let Some(handle) = handle {
                handle.reset_camera();
            }
        }
    });

    ui.add_space(8.0);
    ui.weak("Drag to orbit, right-drag to pan, scroll to zoom.");
}

/// Ask for an image file to show on the first page
pub fn choose_image(state: &mut AppState) {
    if let Some(path) = rfd::FileDialog::new()
        .set_title("Choose page image")
        .add_filter("Images", &["png", "jpg", "jpeg"])
        .pick_file()
    {
        tracing::info!("Using {} for the first page", path.display());
        state.set_image(ImageSource::uri(path.display().to_string()));
    }
}
