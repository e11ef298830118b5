use glam::{Vec2, Vec3};

/// Floats per vertex: position(3) + normal(3) + uv(2)
pub const VERTEX_STRIDE: usize = 8;

/// CPU-side mesh data: interleaved [pos.x, pos.y, pos.z, norm.x, norm.y, norm.z, u, v]
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        // UV (0, 0) is the top-left corner so canvas rows upload without a flip
        const UVS: [Vec2; 4] = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        let base = self.vertex_count() as u32;
        for (v, uv) in corners.iter().zip(UVS) {
            self.vertices
                .extend_from_slice(&[v.x, v.y, v.z, normal.x, normal.y, normal.z, uv.x, uv.y]);
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// Axis-aligned box centered on the origin
pub fn cuboid(w: f32, h: f32, d: f32) -> MeshData {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let hd = d * 0.5;

    let v = Vec3::new;
    let faces: [([Vec3; 4], Vec3); 6] = [
        // Front (+Z)
        ([v(-hw, -hh, hd), v(hw, -hh, hd), v(hw, hh, hd), v(-hw, hh, hd)], Vec3::Z),
        // Back (-Z)
        ([v(hw, -hh, -hd), v(-hw, -hh, -hd), v(-hw, hh, -hd), v(hw, hh, -hd)], Vec3::NEG_Z),
        // Right (+X)
        ([v(hw, -hh, hd), v(hw, -hh, -hd), v(hw, hh, -hd), v(hw, hh, hd)], Vec3::X),
        // Left (-X)
        ([v(-hw, -hh, -hd), v(-hw, -hh, hd), v(-hw, hh, hd), v(-hw, hh, -hd)], Vec3::NEG_X),
        // Top (+Y)
        ([v(-hw, hh, hd), v(hw, hh, hd), v(hw, hh, -hd), v(-hw, hh, -hd)], Vec3::Y),
        // Bottom (-Y)
        ([v(-hw, -hh, -hd), v(hw, -hh, -hd), v(hw, -hh, hd), v(-hw, -hh, hd)], Vec3::NEG_Y),
    ];

    let mut mesh = MeshData {
        vertices: Vec::with_capacity(24 * VERTEX_STRIDE),
        indices: Vec::with_capacity(36),
    };
    for (quad, normal) in faces {
        mesh.push_quad(quad, normal);
    }
    mesh
}

/// Single quad in the XY plane facing +Z
pub fn plane(w: f32, h: f32) -> MeshData {
    let hw = w * 0.5;
    let hh = h * 0.5;
    let mut mesh = MeshData {
        vertices: Vec::with_capacity(4 * VERTEX_STRIDE),
        indices: Vec::with_capacity(6),
    };
    mesh.push_quad(
        [
            Vec3::new(-hw, -hh, 0.0),
            Vec3::new(hw, -hh, 0.0),
            Vec3::new(hw, hh, 0.0),
            Vec3::new(-hw, hh, 0.0),
        ],
        Vec3::Z,
    );
    mesh
}
