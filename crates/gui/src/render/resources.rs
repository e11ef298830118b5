//! Per-activation ledger of uploaded GPU resources.

use crate::error::Result;
use crate::scene::{Material, Mesh, Scene};

use super::{DrawItem, GeometryId, MaterialDesc, MaterialId, Renderer, TextureId};

/// Every id uploaded for one scene, in allocation order
#[derive(Debug, Default)]
pub struct SceneResources {
    geometries: Vec<GeometryId>,
    textures: Vec<TextureId>,
    materials: Vec<MaterialId>,
    /// Texture bound to each page, by page index
    page_textures: Vec<TextureId>,
    draws: Vec<DrawItem>,
}

impl SceneResources {
    /// Upload `scene`. On failure everything allocated so far is released
    /// before the error is returned.
    pub fn upload<R: Renderer + ?Sized>(renderer: &mut R, scene: &Scene) -> Result<Self> {
        let mut resources = Self::default();
        match resources.upload_all(renderer, scene) {
            Ok(()) => {
                tracing::debug!(
                    "Uploaded {} geometries, {} textures, {} materials",
                    resources.geometries.len(),
                    resources.textures.len(),
                    resources.materials.len()
                );
                Ok(resources)
            }
            Err(e) => {
                resources.release(renderer);
                Err(e)
            }
        }
    }

    fn upload_all<R: Renderer + ?Sized>(&mut self, renderer: &mut R, scene: &Scene) -> Result<()> {
        self.upload_mesh(renderer, &scene.cover)?;
        for page in &scene.pages {
            if let Some(texture) = self.upload_mesh(renderer, page)? {
                self.page_textures.push(texture);
            }
        }
        Ok(())
    }

    /// Returns the texture created for the mesh's map, if any
    fn upload_mesh<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        mesh: &Mesh,
    ) -> Result<Option<TextureId>> {
        let geometry = renderer.create_geometry(&mesh.geometry)?;
        self.geometries.push(geometry);

        let (desc, texture) = match &mesh.material {
            Material::Standard {
                color,
                roughness,
                metalness,
            } => (
                MaterialDesc::Standard {
                    color: *color,
                    roughness: *roughness,
                    metalness: *metalness,
                },
                None,
            ),
            Material::Basic { map, double_sided } => {
                let texture = renderer.create_texture(map.pixels())?;
                self.textures.push(texture);
                (
                    MaterialDesc::Basic {
                        texture,
                        double_sided: *double_sided,
                    },
                    Some(texture),
                )
            }
        };

        let material = renderer.create_material(&desc)?;
        self.materials.push(material);

        self.draws.push(DrawItem {
            geometry,
            material,
            model: mesh.model_matrix(),
        });
        Ok(texture)
    }

    pub fn draws(&self) -> &[DrawItem] {
        &self.draws
    }

    pub fn page_texture(&self, page_index: usize) -> Option<TextureId> {
        self.page_textures.get(page_index).copied()
    }

    /// Number of ids still held
    pub fn len(&self) -> usize {
        self.geometries.len() + self.textures.len() + self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every held id exactly once. Calling again releases nothing.
    pub fn release<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.draws.clear();
        self.page_textures.clear();
        for id in self.materials.drain(..) {
            renderer.release_material(id);
        }
        for id in self.textures.drain(..) {
            renderer.release_texture(id);
        }
        for id in self.geometries.drain(..) {
            renderer.release_geometry(id);
        }
    }
}
