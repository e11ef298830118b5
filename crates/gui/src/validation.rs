//! Mesh validation utilities.
//!
//! `MeshValidator` provides methods to check mesh data integrity:
//! correct stride, in-range indices, normalized normals, UV range, AABB dimensions.

use glam::Vec3;

use crate::scene::mesh::{MeshData, VERTEX_STRIDE};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_mesh(data: &MeshData) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for v in data.vertices.chunks_exact(VERTEX_STRIDE) {
            let p = Vec3::new(v[0], v[1], v[2]);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Validator for `MeshData` integrity checks.
pub struct MeshValidator<'a> {
    mesh: &'a MeshData,
}

impl<'a> MeshValidator<'a> {
    /// Create a new validator for the given mesh.
    pub fn new(mesh: &'a MeshData) -> Self {
        Self { mesh }
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.indices.len() / 3
    }

    /// Check that the vertex buffer length is a multiple of the stride.
    pub fn is_stride_valid(&self) -> bool {
        self.mesh.vertices.len() % VERTEX_STRIDE == 0
    }

    pub fn is_index_stride_valid(&self) -> bool {
        self.mesh.indices.len() % 3 == 0
    }

    /// Check that all indices are within the valid vertex range.
    pub fn are_indices_in_range(&self) -> bool {
        let max_idx = self.vertex_count() as u32;
        self.mesh.indices.iter().all(|&i| i < max_idx)
    }

    /// Check that all vertex normals have unit length (within epsilon).
    pub fn are_normals_normalized(&self, epsilon: f32) -> bool {
        self.mesh
            .vertices
            .chunks_exact(VERTEX_STRIDE)
            .all(|v| (Vec3::new(v[3], v[4], v[5]).length() - 1.0).abs() <= epsilon)
    }

    /// Check that every texture coordinate lies in [0, 1].
    pub fn are_uvs_in_range(&self) -> bool {
        self.mesh
            .vertices
            .chunks_exact(VERTEX_STRIDE)
            .all(|v| (0.0..=1.0).contains(&v[6]) && (0.0..=1.0).contains(&v[7]))
    }

    /// Dimensions (width, height, depth) of the bounding box.
    pub fn dimensions(&self) -> [f32; 3] {
        Aabb::from_mesh(self.mesh).size().to_array()
    }

    pub fn assert_dimensions_approx(&self, expected: [f32; 3], tolerance: f32) -> bool {
        let dims = self.dimensions();
        dims.iter()
            .zip(expected)
            .all(|(d, e)| (d - e).abs() < tolerance)
    }

    /// Run all validation checks and return a list of error messages.
    /// An empty list means the mesh is valid.
    pub fn validate_all(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.is_stride_valid() {
            errors.push(format!(
                "Vertex buffer length {} is not a multiple of {VERTEX_STRIDE}",
                self.mesh.vertices.len()
            ));
        }

        if !self.is_index_stride_valid() {
            errors.push(format!(
                "Index buffer length {} is not a multiple of 3",
                self.mesh.indices.len()
            ));
        }

        if !self.are_indices_in_range() {
            let max_idx = self.vertex_count() as u32;
            let out_of_range: Vec<_> = self
                .mesh
                .indices
                .iter()
                .filter(|&&i| i >= max_idx)
                .take(5)
                .collect();
            errors.push(format!(
                "Indices out of range (vertex_count={}): {:?}",
                max_idx, out_of_range
            ));
        }

        if self.vertex_count() > 0 && !self.are_normals_normalized(0.1) {
            errors.push("Some normals are not unit-length (epsilon=0.1)".to_string());
        }

        if !self.are_uvs_in_range() {
            errors.push("Some UVs are outside [0, 1]".to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_triangle() -> MeshData {
        MeshData {
            vertices: vec![
                // pos(0,0,0) normal(0,0,1) uv(0,1)
                0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0,
                1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
                0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0,
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_counts() {
        let mesh = simple_triangle();
        let v = MeshValidator::new(&mesh);
        assert_eq!(v.vertex_count(), 3);
        assert_eq!(v.triangle_count(), 1);
    }

    #[test]
    fn test_stride_invalid() {
        let bad = MeshData {
            vertices: vec![0.0; 10],
            indices: vec![],
        };
        assert!(!MeshValidator::new(&bad).is_stride_valid());
    }

    #[test]
    fn test_indices_out_of_range() {
        let bad = MeshData {
            vertices: vec![0.0; VERTEX_STRIDE],
            indices: vec![0, 1, 2],
        };
        assert!(!MeshValidator::new(&bad).are_indices_in_range());
    }

    #[test]
    fn test_normals_not_normalized() {
        let bad = MeshData {
            vertices: vec![0.0, 0.0, 0.0, 0.0, 0.0, 5.0, 0.5, 0.5],
            indices: vec![0],
        };
        assert!(!MeshValidator::new(&bad).are_normals_normalized(0.01));
    }

    #[test]
    fn test_uv_out_of_range() {
        let bad = MeshData {
            vertices: vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.5, 0.5],
            indices: vec![0],
        };
        let errors = MeshValidator::new(&bad).validate_all();
        assert!(errors.iter().any(|e| e.contains("UVs")));
    }

    #[test]
    fn test_dimensions() {
        let mesh = simple_triangle();
        let v = MeshValidator::new(&mesh);
        assert!(v.assert_dimensions_approx([1.0, 1.0, 0.0], 0.001));
        assert!(!v.assert_dimensions_approx([2.0, 1.0, 0.0], 0.01));
    }

    #[test]
    fn test_validate_all_ok() {
        let mesh = simple_triangle();
        let errors = MeshValidator::new(&mesh).validate_all();
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_validate_all_catches_bad_indices() {
        let bad = MeshData {
            vertices: vec![0.0; VERTEX_STRIDE],
            indices: vec![0, 5, 2],
        };
        let errors = MeshValidator::new(&bad).validate_all();
        assert!(errors.iter().any(|e| e.contains("out of range")));
    }
}
