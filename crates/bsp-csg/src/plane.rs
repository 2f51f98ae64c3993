//! Plane representation and point classification.

use nalgebra::{Point3, Vector3};

use crate::exact::{self, DoubleDouble};

/// Which side of a plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Point is in front of the plane (positive side of normal)
    Front,
    /// Point is behind the plane (negative side of normal)
    Back,
    /// Point lies on the plane (within epsilon tolerance)
    OnPlane,
}

/// A plane in 3D space, represented as `normal · point = offset` with a
/// unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane3D {
    normal: Vector3<f64>,
    offset: f64,
}

impl Plane3D {
    /// Creates a new plane from a normal vector and offset.
    /// The normal will be normalized automatically.
    ///
    /// # Panics
    /// Panics if the normal vector has zero length.
    pub fn new(normal: Vector3<f64>, offset: f64) -> Self {
        Self::try_new(normal, offset).expect("Plane normal cannot be zero")
    }

    /// Like [`Plane3D::new`], returning `None` for a zero or non-finite normal.
    pub fn try_new(normal: Vector3<f64>, offset: f64) -> Option<Self> {
        let norm = normal.norm();
        if !(norm > f64::MIN_POSITIVE) || !norm.is_finite() || !offset.is_finite() {
            return None;
        }
        Some(Self {
            normal: normal / norm,
            offset: offset / norm,
        })
    }

    /// Creates a plane from a point on the plane and a normal vector.
    pub fn from_point_and_normal(point: Point3<f64>, normal: Vector3<f64>) -> Option<Self> {
        let norm = normal.norm();
        if !(norm > f64::MIN_POSITIVE) || !norm.is_finite() {
            return None;
        }
        let unit_normal = normal / norm;
        Some(Self {
            normal: unit_normal,
            offset: unit_normal.dot(&point.coords),
        })
    }

    /// Fits a plane to a vertex loop using Newell's method.
    ///
    /// The normal follows the loop's winding (right-hand rule). Returns
    /// `None` if the loop has no area.
    pub fn from_loop(vertices: &[Point3<f64>]) -> Option<Self> {
        let normal = newell_normal(vertices);
        if normal.norm() <= f64::EPSILON * f64::EPSILON {
            return None;
        }
        let centroid: Vector3<f64> =
            vertices.iter().map(|p| p.coords).sum::<Vector3<f64>>() / vertices.len() as f64;
        Self::from_point_and_normal(Point3::from(centroid), normal)
    }

    /// Returns the unit normal vector of the plane.
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Returns the signed distance from the origin to the plane along the normal.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The plane as `[nx, ny, nz, d]` with `n · p = d`.
    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.offset]
    }

    /// Computes the signed distance from a point to the plane.
    /// - Positive: point is in front (same side as normal)
    /// - Negative: point is behind (opposite side from normal)
    /// - Zero: point is on the plane
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Signed distance in double-double precision.
    #[inline]
    pub fn exact_distance(&self, point: &Point3<f64>) -> DoubleDouble {
        exact::plane_distance(&self.normal, self.offset, point)
    }

    /// Classifies which side of the plane a point lies on, with a custom epsilon.
    pub fn classify_point_with_epsilon(&self, point: &Point3<f64>, epsilon: f64) -> PlaneSide {
        side_of_distance(self.exact_distance(point).to_f64(), epsilon)
    }

    /// Returns a new plane with the normal flipped (facing the opposite direction).
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Returns `true` if both normals point into the same half-space.
    #[inline]
    pub fn faces_same_direction(&self, other: &Plane3D) -> bool {
        self.normal.dot(&other.normal) > 0.0
    }
}

#[inline]
pub(crate) fn side_of_distance(distance: f64, epsilon: f64) -> PlaneSide {
    if distance > epsilon {
        PlaneSide::Front
    } else if distance < -epsilon {
        PlaneSide::Back
    } else {
        PlaneSide::OnPlane
    }
}

/// Area-weighted normal of a closed loop (twice the vector area).
pub fn newell_normal(vertices: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = vertices.len();
    for i in 0..n {
        let a = &vertices[i];
        let b = &vertices[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}
