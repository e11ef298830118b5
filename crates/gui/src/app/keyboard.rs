//! Keyboard shortcut handling

use eframe::egui;

use notebook_gui_lib::lifecycle::ActivationHandle;

use crate::gl::GlRenderer;
use crate::state::AppState;
use crate::ui::summary_panel;

/// Handle keyboard shortcuts for the application
pub fn handle_keyboard(
    ctx: &egui::Context,
    state: &mut AppState,
    handle: Option<&mut ActivationHandle<GlRenderer>>,
) {
    // Don't handle shortcuts when a text field is focused
    if ctx.memory(|m| m.focused().is_some()) {
        return;
    }

    let (close, open_image, reset) = ctx.input(|i| {
        (
            i.key_pressed(egui::Key::Escape),
            i.modifiers.command && i.key_pressed(egui::Key::O),
            !i.modifiers.command && i.key_pressed(egui::Key::R),
        )
    });

    // Escape — close the viewer
    if close {
        state.close_viewer();
    }
    // Ctrl+O — choose the first-page image (outside the input lock; the
    // dialog blocks)
    if open_image {
        summary_panel::choose_image(state);
    }
    // R — reset camera
    if reset {
        if let Some(handle) = handle {
            handle.reset_camera();
        }
    }
}
