use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use glam::{Mat4, Vec3};
use glow::HasContext;
use image::RgbaImage;

use notebook_gui_lib::error::{Result, ViewerError};
use notebook_gui_lib::render::{
    DrawItem, FrameInput, GeometryId, MaterialDesc, MaterialId, RenderBackend, Renderer,
    SurfaceId, SurfaceSize, TextureId,
};
use notebook_gui_lib::scene::mesh::{MeshData, VERTEX_STRIDE};
use notebook_gui_lib::scene::Light;

/// Live surfaces by id, shared between the backend and the host panel
pub type SurfaceRegistry = Rc<RefCell<HashMap<SurfaceId, Arc<Mutex<GlSurface>>>>>;

// ── GPU handles ──────────────────────────────────────────────

struct GpuMesh {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
}

/// Last frame submitted by the render loop, drawn by the paint callback
struct FrameSnapshot {
    background: [f32; 3],
    view_projection: Mat4,
    ambient: Vec3,
    light_color: Vec3,
    light_dir: Vec3,
    draws: Vec<DrawItem>,
}

impl FrameSnapshot {
    fn capture(frame: &FrameInput<'_>) -> Self {
        let mut ambient = Vec3::ZERO;
        let mut light_color = Vec3::ZERO;
        let mut light_dir = Vec3::Z;
        for light in frame.lights {
            match *light {
                Light::Ambient { color, intensity } => {
                    ambient += Vec3::from(color) * intensity;
                }
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    light_color = Vec3::from(color) * intensity;
                    light_dir = position.normalize_or_zero();
                }
            }
        }
        Self {
            background: frame.background,
            view_projection: frame.projection * frame.view,
            ambient,
            light_color,
            light_dir,
            draws: frame.draws.to_vec(),
        }
    }
}

// ── Shared surface ───────────────────────────────────────────

/// GL objects of one renderer plus the frame to draw
pub struct GlSurface {
    program: glow::Program,
    meshes: HashMap<u64, GpuMesh>,
    textures: HashMap<u64, glow::Texture>,
    materials: HashMap<u64, MaterialDesc>,
    frame: Option<FrameSnapshot>,
}

impl GlSurface {
    /// Draw the last submitted frame into `viewport` ([x, y, w, h] pixels)
    pub fn paint(&self, gl: &glow::Context, viewport: [i32; 4]) {
        let Some(frame) = &self.frame else {
            return;
        };
        let [x, y, w, h] = viewport;

        unsafe {
            gl.viewport(x, y, w, h);
            gl.scissor(x, y, w, h);
            gl.enable(glow::SCISSOR_TEST);

            let [r, g, b] = frame.background;
            gl.clear_color(r, g, b, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LEQUAL);
            gl.disable(glow::CULL_FACE);

            gl.use_program(Some(self.program));
            set_uniform_vec3(gl, self.program, "u_ambient", frame.ambient);
            set_uniform_vec3(gl, self.program, "u_light_color", frame.light_color);
            set_uniform_vec3(gl, self.program, "u_light_dir", frame.light_dir);
            gl.uniform_1_i32(gl.get_uniform_location(self.program, "u_map").as_ref(), 0);

            for draw in &frame.draws {
                let (Some(mesh), Some(material)) = (
                    self.meshes.get(&draw.geometry.0),
                    self.materials.get(&draw.material.0),
                ) else {
                    continue;
                };
                set_uniform_mat4(gl, self.program, "u_mvp", &(frame.view_projection * draw.model));
                set_uniform_mat4(gl, self.program, "u_model", &draw.model);
                self.bind_material(gl, material);
                draw_mesh(gl, mesh);
            }

            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.disable(glow::POLYGON_OFFSET_FILL);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::SCISSOR_TEST);
            gl.use_program(None);
        }
    }

    unsafe fn bind_material(&self, gl: &glow::Context, material: &MaterialDesc) {
        let lit = gl.get_uniform_location(self.program, "u_lit");
        let use_map = gl.get_uniform_location(self.program, "u_use_map");
        match material.depth_bias() {
            Some(bias) => {
                gl.enable(glow::POLYGON_OFFSET_FILL);
                gl.polygon_offset(bias.factor, bias.units);
            }
            None => gl.disable(glow::POLYGON_OFFSET_FILL),
        }
        match material {
            MaterialDesc::Standard { color, .. } => {
                gl.uniform_1_i32(lit.as_ref(), 1);
                gl.uniform_1_i32(use_map.as_ref(), 0);
                set_uniform_vec3(gl, self.program, "u_color", Vec3::from(*color));
            }
            MaterialDesc::Basic { texture, .. } => {
                gl.uniform_1_i32(lit.as_ref(), 0);
                let bound = self.textures.get(&texture.0).copied();
                gl.uniform_1_i32(use_map.as_ref(), i32::from(bound.is_some()));
                set_uniform_vec3(gl, self.program, "u_color", Vec3::ONE);
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, bound);
            }
        }
    }

    fn delete_all(&mut self, gl: &glow::Context) -> usize {
        let leftover = self.meshes.len() + self.textures.len() + self.materials.len();
        unsafe {
            for (_, mesh) in self.meshes.drain() {
                delete_mesh(gl, mesh);
            }
            for (_, texture) in self.textures.drain() {
                gl.delete_texture(texture);
            }
            gl.delete_program(self.program);
        }
        self.materials.clear();
        self.frame = None;
        leftover
    }
}

// ── Backend ──────────────────────────────────────────────────

/// Creates one [`GlRenderer`] per activation on the window's GL context
pub struct GlBackend {
    gl: Arc<glow::Context>,
    registry: SurfaceRegistry,
    next_surface: u64,
}

impl GlBackend {
    pub fn new(gl: Arc<glow::Context>, registry: SurfaceRegistry) -> Self {
        Self {
            gl,
            registry,
            next_surface: 0,
        }
    }
}

impl RenderBackend for GlBackend {
    type Renderer = GlRenderer;

    fn create_renderer(&mut self, size: SurfaceSize) -> Result<GlRenderer> {
        let program = compile_program(&self.gl, MESH_VERT, MESH_FRAG)?;
        self.next_surface += 1;
        let surface = SurfaceId(self.next_surface);

        let shared = Arc::new(Mutex::new(GlSurface {
            program,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
            frame: None,
        }));
        self.registry.borrow_mut().insert(surface, shared.clone());
        tracing::debug!("Created GL surface {} at {}x{}", surface.0, size.width, size.height);

        Ok(GlRenderer {
            gl: self.gl.clone(),
            registry: self.registry.clone(),
            surface,
            shared,
            next_id: 0,
            disposed: false,
        })
    }
}

// ── Renderer ─────────────────────────────────────────────────

pub struct GlRenderer {
    gl: Arc<glow::Context>,
    registry: SurfaceRegistry,
    surface: SurfaceId,
    shared: Arc<Mutex<GlSurface>>,
    next_id: u64,
    disposed: bool,
}

impl GlRenderer {
    fn lock(&self) -> Result<MutexGuard<'_, GlSurface>> {
        if self.disposed {
            return Err(ViewerError::Backend("renderer already disposed".into()));
        }
        self.shared
            .lock()
            .map_err(|_| ViewerError::Backend("GL surface lock poisoned".into()))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Renderer for GlRenderer {
    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn set_size(&mut self, size: SurfaceSize) {
        // The paint callback takes its viewport from egui each frame
        tracing::debug!("Surface {} now {}x{}", self.surface.0, size.width, size.height);
    }

    fn create_geometry(&mut self, mesh: &MeshData) -> Result<GeometryId> {
        let id = self.next_id();
        let mut surface = self.lock()?;
        let gpu = upload_mesh(&self.gl, mesh)?;
        surface.meshes.insert(id, gpu);
        Ok(GeometryId(id))
    }

    fn create_texture(&mut self, image: &RgbaImage) -> Result<TextureId> {
        let id = self.next_id();
        let mut surface = self.lock()?;
        let texture = unsafe { self.gl.create_texture() }.map_err(ViewerError::Backend)?;
        upload_pixels(&self.gl, texture, image);
        surface.textures.insert(id, texture);
        Ok(TextureId(id))
    }

    fn update_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<()> {
        let texture = self
            .lock()?
            .textures
            .get(&id.0)
            .copied()
            .ok_or_else(|| ViewerError::Backend(format!("unknown texture {}", id.0)))?;
        upload_pixels(&self.gl, texture, image);
        Ok(())
    }

    fn create_material(&mut self, desc: &MaterialDesc) -> Result<MaterialId> {
        let id = self.next_id();
        self.lock()?.materials.insert(id, *desc);
        Ok(MaterialId(id))
    }

    fn render(&mut self, frame: &FrameInput<'_>) -> Result<()> {
        self.lock()?.frame = Some(FrameSnapshot::capture(frame));
        Ok(())
    }

    fn release_geometry(&mut self, id: GeometryId) {
        match self.lock() {
            Ok(mut surface) => {
                if let Some(mesh) = surface.meshes.remove(&id.0) {
                    unsafe { delete_mesh(&self.gl, mesh) };
                }
            }
            Err(e) => tracing::warn!("Cannot release geometry {}: {e}", id.0),
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        match self.lock() {
            Ok(mut surface) => {
                if let Some(texture) = surface.textures.remove(&id.0) {
                    unsafe { self.gl.delete_texture(texture) };
                }
            }
            Err(e) => tracing::warn!("Cannot release texture {}: {e}", id.0),
        }
    }

    fn release_material(&mut self, id: MaterialId) {
        if let Ok(mut surface) = self.lock() {
            surface.materials.remove(&id.0);
        }
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        match self.lock() {
            Ok(mut surface) => {
                let leftover = surface.delete_all(&self.gl);
                if leftover > 0 {
                    tracing::warn!(
                        "Surface {} disposed with {leftover} live objects",
                        self.surface.0
                    );
                }
            }
            Err(e) => tracing::warn!("Disposing surface {}: {e}", self.surface.0),
        }
        self.registry.borrow_mut().remove(&self.surface);
        self.disposed = true;
        tracing::debug!("Disposed GL surface {}", self.surface.0);
    }
}

// ── GPU upload ───────────────────────────────────────────────

fn upload_mesh(gl: &glow::Context, data: &MeshData) -> Result<GpuMesh> {
    unsafe {
        let vao = gl.create_vertex_array().map_err(ViewerError::Backend)?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer().map_err(ViewerError::Backend)?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            cast_slice(&data.vertices),
            glow::STATIC_DRAW,
        );

        let stride = (VERTEX_STRIDE * 4) as i32;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // normal: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 3 * 4);
        // uv: location 2
        gl.enable_vertex_attrib_array(2);
        gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, 6 * 4);

        let ibo = gl.create_buffer().map_err(ViewerError::Backend)?;
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(
            glow::ELEMENT_ARRAY_BUFFER,
            cast_slice(&data.indices),
            glow::STATIC_DRAW,
        );

        gl.bind_vertex_array(None);
        gl.bind_buffer(glow::ARRAY_BUFFER, None);

        Ok(GpuMesh {
            vao,
            vbo,
            ibo,
            index_count: data.indices.len() as i32,
        })
    }
}

fn upload_pixels(gl: &glow::Context, texture: glow::Texture, image: &RgbaImage) {
    let (w, h) = image.dimensions();
    unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            w as i32,
            h as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(image.as_raw())),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
    }
}

unsafe fn delete_mesh(gl: &glow::Context, mesh: GpuMesh) {
    gl.delete_vertex_array(mesh.vao);
    gl.delete_buffer(mesh.vbo);
    gl.delete_buffer(mesh.ibo);
}

unsafe fn draw_mesh(gl: &glow::Context, mesh: &GpuMesh) {
    gl.bind_vertex_array(Some(mesh.vao));
    gl.draw_elements(glow::TRIANGLES, mesh.index_count, glow::UNSIGNED_INT, 0);
    gl.bind_vertex_array(None);
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program> {
    unsafe {
        let program = gl.create_program().map_err(ViewerError::Backend)?;
        let mut shaders = Vec::with_capacity(2);

        for (kind, src) in [(glow::VERTEX_SHADER, vert_src), (glow::FRAGMENT_SHADER, frag_src)] {
            let shader = gl.create_shader(kind).map_err(ViewerError::Backend)?;
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                gl.delete_program(program);
                return Err(ViewerError::Backend(format!("shader compile error: {log}")));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(ViewerError::Backend(format!("program link error: {log}")));
        }
        Ok(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: Vec3) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
    }
}

fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;
uniform mat4 u_model;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_uv;

out vec3 v_normal;
out vec2 v_uv;

void main() {
    gl_Position = u_mvp * vec4(a_position, 1.0);
    v_normal = mat3(u_model) * a_normal;
    v_uv = a_uv;
}
"#;

const MESH_FRAG: &str = r#"#version 330 core
uniform sampler2D u_map;
uniform int u_use_map;
uniform int u_lit;
uniform vec3 u_color;
uniform vec3 u_ambient;
uniform vec3 u_light_color;
uniform vec3 u_light_dir;

in vec3 v_normal;
in vec2 v_uv;

out vec4 frag_color;

void main() {
    vec4 base = u_use_map != 0 ? texture(u_map, v_uv) : vec4(u_color, 1.0);
    if (u_lit == 0) {
        frag_color = base;
        return;
    }
    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) {
        n = -n;
    }
    vec3 light = u_ambient + u_light_color * max(dot(n, u_light_dir), 0.0);
    frag_color = vec4(base.rgb * light, base.a);
}
"#;
