// Library crate: the viewer core, testable without a window or GPU.
// The eframe shell and the OpenGL backend live in the binary crate.

pub mod camera;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod lifecycle;
pub mod render;
pub mod scene;
pub mod state;
pub mod texture;
pub mod validation;
pub mod viewport;
