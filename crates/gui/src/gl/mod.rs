//! OpenGL backend and the egui panel that hosts it

pub mod panel;
pub mod renderer;

pub use panel::ViewerPanel;
pub use renderer::{GlBackend, GlRenderer, SurfaceRegistry};
