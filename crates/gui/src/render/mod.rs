//! Renderer abstraction.
//!
//! The lifecycle code only talks to [`Renderer`] and [`RenderBackend`]; the
//! desktop binary plugs in an OpenGL implementation and the tests plug in
//! [`crate::harness::TrackingBackend`].

pub mod render_loop;
pub mod resources;

use glam::{Mat4, Vec3};
use image::RgbaImage;

use crate::error::Result;
use crate::scene::mesh::MeshData;
use crate::scene::Light;

pub use render_loop::{FrameScheduler, FrameToken, LoopState, RenderLoop};
pub use resources::SceneResources;

/// Drawable surface owned by one renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u64);

/// Pixel size of a surface or host container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialDesc {
    Standard {
        color: [f32; 3],
        roughness: f32,
        metalness: f32,
    },
    Basic {
        texture: TextureId,
        double_sided: bool,
    },
}

/// Polygon offset (`factor`, `units`) applied while rasterizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub factor: f32,
    pub units: f32,
}

/// Pages lie flush on the cover's front face; pull them toward the viewer
pub const PAGE_DEPTH_BIAS: DepthBias = DepthBias {
    factor: -1.0,
    units: -1.0,
};

impl MaterialDesc {
    pub fn texture(&self) -> Option<TextureId> {
        match self {
            MaterialDesc::Basic { texture, .. } => Some(*texture),
            MaterialDesc::Standard { .. } => None,
        }
    }

    /// Depth bias to draw with, if any
    pub fn depth_bias(&self) -> Option<DepthBias> {
        match self {
            MaterialDesc::Basic { .. } => Some(PAGE_DEPTH_BIAS),
            MaterialDesc::Standard { .. } => None,
        }
    }
}

/// One mesh to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub model: Mat4,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub background: [f32; 3],
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub lights: &'a [Light],
    pub draws: &'a [DrawItem],
}

/// GPU-side resources of one activation.
///
/// Every `create_*` call must be paired with the matching `release_*` call,
/// and `dispose` is the last call a renderer receives.
pub trait Renderer {
    fn surface(&self) -> SurfaceId;

    /// Resize the drawable surface (pixels)
    fn set_size(&mut self, size: SurfaceSize);

    fn create_geometry(&mut self, mesh: &MeshData) -> Result<GeometryId>;

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId>;

    /// Replace a texture's pixels; dimensions may change
    fn update_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<()>;

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId>;

    fn render(&mut self, frame: &FrameInput<'_>) -> Result<()>;

    fn release_geometry(&mut self, id: GeometryId);

    fn release_texture(&mut self, id: TextureId);

    fn release_material(&mut self, id: MaterialId);

    fn dispose(&mut self);
}

/// Creates one renderer per activation
pub trait RenderBackend {
    type Renderer: Renderer;

    fn create_renderer(&mut self, size: SurfaceSize) -> Result<Self::Renderer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_size_aspect() {
        assert_eq!(SurfaceSize::new(800, 400).aspect(), 2.0);
        assert_eq!(SurfaceSize::new(0, 400).aspect(), 1.0);
        assert!(SurfaceSize::new(10, 0).is_empty());
    }

    #[test]
    fn test_material_texture() {
        let basic = MaterialDesc::Basic {
            texture: TextureId(7),
            double_sided: true,
        };
        assert_eq!(basic.texture(), Some(TextureId(7)));
        let standard = MaterialDesc::Standard {
            color: [1.0; 3],
            roughness: 0.5,
            metalness: 0.0,
        };
        assert_eq!(standard.texture(), None);
    }

    #[test]
    fn test_only_page_materials_are_biased() {
        let basic = MaterialDesc::Basic {
            texture: TextureId(1),
            double_sided: true,
        };
        let bias = basic.depth_bias().unwrap();
        assert!(bias.factor < 0.0 && bias.units < 0.0);

        let standard = MaterialDesc::Standard {
            color: [0.0; 3],
            roughness: 0.7,
            metalness: 0.1,
        };
        assert_eq!(standard.depth_bias(), None);
    }
}
