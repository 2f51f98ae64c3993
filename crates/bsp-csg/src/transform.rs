//! Affine transforms applied to operands during ingestion.

use nalgebra::{Matrix4, Point3};

/// A 4×4 affine transform.
///
/// Solids keep their polygons in local space; the transform is applied to
/// each vertex only while the solid is being ingested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f64>,
}

impl Transform {
    #[inline]
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    #[inline]
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Builds a transform from 16 values in row-major order.
    pub fn from_row_major(values: &[f64; 16]) -> Self {
        Self {
            matrix: Matrix4::from_row_slice(values),
        }
    }

    /// Returns the 16 matrix values in row-major order.
    pub fn to_row_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = self.matrix[(row, col)];
            }
        }
        out
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Exact comparison against the identity matrix.
    ///
    /// Only used to skip the per-vertex multiply, so it must never report a
    /// near-identity matrix as the identity.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// Returns `true` if every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// Returns `true` if the bottom row is exactly `[0, 0, 0, 1]`.
    pub fn is_affine(&self) -> bool {
        let m = &self.matrix;
        m[(3, 0)] == 0.0 && m[(3, 1)] == 0.0 && m[(3, 2)] == 0.0 && m[(3, 3)] == 1.0
    }

    /// Maps a point through the upper 3×4 block. The bottom row is ignored;
    /// callers check [`Transform::is_affine`] first.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let m = &self.matrix;
        let (x, y, z) = (point.x, point.y, point.z);
        Point3::new(
            m[(0, 0)] * x + m[(0, 1)] * y + m[(0, 2)] * z + m[(0, 3)],
            m[(1, 0)] * x + m[(1, 1)] * y + m[(1, 2)] * z + m[(1, 3)],
            m[(2, 0)] * x + m[(2, 1)] * y + m[(2, 2)] * z + m[(2, 3)],
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix4<f64>> for Transform {
    fn from(matrix: Matrix4<f64>) -> Self {
        Self::from_matrix(matrix)
    }
}
