//! Static notebook scene: cover, stacked pages and lighting.
//!
//! `build` is a pure function of the config. The only later mutation is the
//! page 0 texture swap once a replacement image finishes decoding.

pub mod mesh;

use glam::{Mat4, Vec3};
use shared::ViewerConfig;

use crate::texture::canvas::Canvas;
use crate::texture::{self, CanvasFactory, PageTexture};
use mesh::MeshData;

pub const BACKGROUND_COLOR: u32 = 0xF5F5F5;

pub const COVER_SIZE: [f32; 3] = [4.0, 5.0, 0.2];
const COVER_COLOR: u32 = 0x2266AA;
const COVER_ROUGHNESS: f32 = 0.7;
const COVER_METALNESS: f32 = 0.1;

pub const PAGE_SIZE: [f32; 2] = [3.8, 4.8];
pub const PAGE_BASE_OFFSET: f32 = 0.1;
pub const PAGE_OFFSET_STEP: f32 = 0.01;

const AMBIENT_INTENSITY: f32 = 0.5;
const DIRECTIONAL_INTENSITY: f32 = 0.8;
const DIRECTIONAL_POSITION: Vec3 = Vec3::new(1.0, 1.0, 1.0);

fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Lit material
    Standard {
        color: [f32; 3],
        roughness: f32,
        metalness: f32,
    },
    /// Unlit material showing a texture
    Basic { map: PageTexture, double_sided: bool },
}

impl Material {
    pub fn map(&self) -> Option<&PageTexture> {
        match self {
            Material::Basic { map, .. } => Some(map),
            Material::Standard { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub geometry: MeshData,
    pub material: Material,
    pub position: Vec3,
}

impl Mesh {
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
    }

    pub fn texture(&self) -> Option<&PageTexture> {
        self.material.map()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    /// Shines from `position` toward the origin
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
    },
}

/// Everything rendered for one activation
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: [f32; 3],
    pub cover: Mesh,
    /// Front-to-back by stacking offset
    pub pages: Vec<Mesh>,
    pub lights: Vec<Light>,
}

impl Scene {
    /// Cover first, then pages in stacking order
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        std::iter::once(&self.cover).chain(self.pages.iter())
    }

    pub fn mesh_count(&self) -> usize {
        1 + self.pages.len()
    }

    /// Swap the texture bound to a page's material
    pub fn set_page_texture(&mut self, page_index: usize, texture: PageTexture) -> bool {
        match self.pages.get_mut(page_index).map(|p| &mut p.material) {
            Some(Material::Basic { map, .. }) => {
                *map = texture;
                true
            }
            _ => false,
        }
    }

    pub fn page_texture_mut(&mut self, page_index: usize) -> Option<&mut PageTexture> {
        match self.pages.get_mut(page_index).map(|p| &mut p.material) {
            Some(Material::Basic { map, .. }) => Some(map),
            _ => None,
        }
    }
}

/// Z offset of page `index` in front of the cover center
pub fn page_offset(index: usize) -> f32 {
    PAGE_BASE_OFFSET + index as f32 * PAGE_OFFSET_STEP
}

/// Build the notebook scene for `config`
pub fn build(config: &ViewerConfig) -> Scene {
    build_with(config, Canvas::new)
}

/// [`build`] drawing page textures on canvases from `make_canvas`
pub fn build_with(config: &ViewerConfig, make_canvas: CanvasFactory) -> Scene {
    let [cw, ch, cd] = COVER_SIZE;
    let cover = Mesh {
        name: "cover".to_string(),
        geometry: mesh::cuboid(cw, ch, cd),
        material: Material::Standard {
            color: rgb(COVER_COLOR),
            roughness: COVER_ROUGHNESS,
            metalness: COVER_METALNESS,
        },
        position: Vec3::ZERO,
    };

    let [pw, ph] = PAGE_SIZE;
    let pages = (0..config.page_count as usize)
        .map(|index| Mesh {
            name: format!("page-{index}"),
            geometry: mesh::plane(pw, ph),
            material: Material::Basic {
                map: texture::synthesize_with(index, config, make_canvas),
                double_sided: true,
            },
            position: Vec3::new(0.0, 0.0, page_offset(index)),
        })
        .collect();

    let lights = vec![
        Light::Ambient {
            color: [1.0, 1.0, 1.0],
            intensity: AMBIENT_INTENSITY,
        },
        Light::Directional {
            color: [1.0, 1.0, 1.0],
            intensity: DIRECTIONAL_INTENSITY,
            position: DIRECTIONAL_POSITION,
        },
    ];

    Scene {
        background: rgb(BACKGROUND_COLOR),
        cover,
        pages,
        lights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MeshValidator;
    use shared::ImageSource;

    #[test]
    fn test_page_count_matches_config() {
        for n in [1, 2, 5, 12] {
            let scene = build(&ViewerConfig::new(n));
            assert_eq!(scene.pages.len(), n as usize);
            assert_eq!(scene.mesh_count(), n as usize + 1);
            assert_eq!(scene.meshes().count(), n as usize + 1);
        }
    }

    #[test]
    fn test_pages_stack_in_front_of_cover() {
        let scene = build(&ViewerConfig::new(5));
        let zs: Vec<f32> = scene.pages.iter().map(|p| p.position.z).collect();
        assert!((zs[0] - 0.1).abs() < 1e-6);
        assert!(zs.windows(2).all(|w| w[1] > w[0]));
        // page 0 lies flush on the cover's front face; renderers bias pages
        // toward the viewer
        assert!(zs[0] >= COVER_SIZE[2] * 0.5);
    }

    #[test]
    fn test_failing_canvas_still_builds_every_page() {
        fn no_canvas(_: u32, _: u32) -> crate::error::Result<Canvas> {
            Err(crate::error::ViewerError::Canvas("no 2D context".into()))
        }
        let scene = build_with(&ViewerConfig::new(4), no_canvas);
        assert_eq!(scene.pages.len(), 4);
        for page in &scene.pages {
            let tex = page.texture().unwrap();
            assert!(matches!(tex, PageTexture::Blank { .. }), "{}", page.name);
            assert_eq!(
                tex.pixels().dimensions(),
                (texture::PAGE_TEXTURE_WIDTH, texture::PAGE_TEXTURE_HEIGHT)
            );
        }
    }

    #[test]
    fn test_geometry_is_valid() {
        let scene = build(&ViewerConfig::new(2));
        for mesh in scene.meshes() {
            let errors = MeshValidator::new(&mesh.geometry).validate_all();
            assert!(errors.is_empty(), "{}: {:?}", mesh.name, errors);
        }
        let cover = MeshValidator::new(&scene.cover.geometry);
        assert!(cover.assert_dimensions_approx(COVER_SIZE, 1e-4));
        let page = MeshValidator::new(&scene.pages[0].geometry);
        assert!(page.assert_dimensions_approx([3.8, 4.8, 0.0], 1e-4));
    }

    #[test]
    fn test_lighting_is_fixed() {
        let scene = build(&ViewerConfig::new(1));
        assert_eq!(scene.lights.len(), 2);
        assert!(matches!(scene.lights[0], Light::Ambient { intensity, .. } if intensity == 0.5));
        assert!(matches!(
            scene.lights[1],
            Light::Directional { intensity, .. } if intensity == 0.8
        ));
    }

    #[test]
    fn test_every_page_has_its_own_texture() {
        let scene = build(&ViewerConfig::new(3));
        assert!(scene.cover.texture().is_none());
        assert!(scene.pages.iter().all(|p| p.texture().is_some()));
    }

    #[test]
    fn test_replacement_image_only_on_first_page() {
        let config = ViewerConfig::new(3).with_image(ImageSource::uri("summary.png"));
        let scene = build(&config);
        assert!(scene.pages[0].texture().unwrap().is_pending());
        assert!(!scene.pages[1].texture().unwrap().is_pending());
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = ViewerConfig::new(4);
        assert_eq!(build(&config), build(&config));
    }

    #[test]
    fn test_set_page_texture() {
        let mut scene = build(&ViewerConfig::new(2));
        let blank = texture::ruled_paper_on(None, 1);
        assert!(scene.set_page_texture(1, blank.clone()));
        assert_eq!(scene.pages[1].texture(), Some(&blank));
        assert!(!scene.set_page_texture(7, blank));
    }

    #[test]
    fn test_background_color() {
        let scene = build(&ViewerConfig::default());
        assert!((scene.background[0] - 0xF5 as f32 / 255.0).abs() < 1e-6);
    }
}
