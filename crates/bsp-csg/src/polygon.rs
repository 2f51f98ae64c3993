//! Solids and polygons as callers hand them to the engine.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::plane::{Plane3D, newell_normal};
use crate::transform::Transform;

/// A planar polygon: a closed loop of at least three vertices.
///
/// Vertices are in counter-clockwise winding order when viewed from the
/// front (the direction the outward normal points). `plane` is
/// `[nx, ny, nz, d]` with `n · p = d`; it is optional on input and always
/// present on polygons the engine returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PolygonRepr")]
pub struct Polygon {
    pub vertices: Vec<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<[f64; 4]>,
}

/// Accepted wire shapes: `{vertices, plane?}` or a bare vertex array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PolygonRepr {
    Full {
        vertices: Vec<[f64; 3]>,
        #[serde(default)]
        plane: Option<[f64; 4]>,
    },
    Loop(Vec<[f64; 3]>),
}

impl From<PolygonRepr> for Polygon {
    fn from(repr: PolygonRepr) -> Self {
        match repr {
            PolygonRepr::Full { vertices, plane } => Self { vertices, plane },
            PolygonRepr::Loop(vertices) => Self {
                vertices,
                plane: None,
            },
        }
    }
}

impl Polygon {
    /// Creates a polygon without a plane equation.
    pub fn new(vertices: Vec<[f64; 3]>) -> Self {
        Self {
            vertices,
            plane: None,
        }
    }

    /// Creates a polygon with an explicit plane equation.
    pub fn with_plane(vertices: Vec<[f64; 3]>, plane: [f64; 4]) -> Self {
        Self {
            vertices,
            plane: Some(plane),
        }
    }

    /// Returns the number of vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the polygon has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The vertices as nalgebra points.
    pub fn points(&self) -> impl Iterator<Item = Point3<f64>> + '_ {
        self.vertices.iter().map(|v| Point3::from(*v))
    }

    /// The plane through the vertices, following their winding.
    ///
    /// Returns `None` if the loop has no area.
    pub fn plane(&self) -> Option<Plane3D> {
        let points: Vec<Point3<f64>> = self.points().collect();
        Plane3D::from_loop(&points)
    }

    /// Unsigned area of the (planar) polygon.
    pub fn area(&self) -> f64 {
        let points: Vec<Point3<f64>> = self.points().collect();
        newell_normal(&points).norm() / 2.0
    }

    /// Computes the centroid (vertex average) of the polygon.
    pub fn centroid(&self) -> Point3<f64> {
        let sum: Vector3<f64> = self.points().map(|p| p.coords).sum();
        Point3::from(sum / self.vertices.len() as f64)
    }

    /// Returns the polygon with reversed winding and negated plane.
    pub fn flipped(&self) -> Self {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        Self {
            vertices,
            plane: self.plane.map(|[a, b, c, d]| [-a, -b, -c, -d]),
        }
    }
}

/// A polyhedral solid: boundary polygons plus a local-to-world transform.
///
/// The transform is stored as 16 row-major values. Engines never mutate a
/// solid; the transform is applied while the solid is ingested. The RGBA
/// `color` is not used by the geometry and passes from the first operand to
/// the result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Solid {
    pub polygons: Vec<Polygon>,
    #[serde(
        default,
        alias = "transforms",
        skip_serializing_if = "Option::is_none"
    )]
    pub transform: Option<[f64; 16]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f64; 4]>,
}

impl Solid {
    /// Creates a solid with no transform and no color.
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self {
            polygons,
            transform: None,
            color: None,
        }
    }

    /// The empty solid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the solid with `transform` set.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform.to_row_major());
        self
    }

    /// Returns the solid with `color` set.
    pub fn with_color(mut self, color: Option<[f64; 4]>) -> Self {
        self.color = color;
        self
    }

    /// The effective transform (identity when absent).
    pub fn transform(&self) -> Transform {
        self.transform
            .as_ref()
            .map(Transform::from_row_major)
            .unwrap_or_default()
    }

    /// Returns true if the solid has no polygons.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Total number of vertices across all polygons.
    pub fn vertex_count(&self) -> usize {
        self.polygons.iter().map(Polygon::len).sum()
    }

    /// Signed volume via the divergence theorem, in local space.
    ///
    /// Positive for closed solids with outward-facing polygons.
    pub fn volume(&self) -> f64 {
        self.polygons
            .iter()
            .map(|polygon| {
                let points: Vec<Point3<f64>> = polygon.points().collect();
                let n = newell_normal(&points);
                points
                    .first()
                    .map_or(0.0, |p| n.dot(&p.coords) / 6.0)
            })
            .sum()
    }
}
