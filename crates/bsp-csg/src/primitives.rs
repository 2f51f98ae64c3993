//! Axis-aligned box solids.

use nalgebra::{Point3, Vector3};

use crate::polygon::{Polygon, Solid};

/// Faces of a box as corner indices, counter-clockwise viewed from outside.
const BOX_FACES: [[usize; 4]; 6] = [
    [4, 5, 6, 7], // front (+Z)
    [1, 0, 3, 2], // back (-Z)
    [0, 4, 7, 3], // left (-X)
    [5, 1, 2, 6], // right (+X)
    [7, 6, 2, 3], // top (+Y)
    [0, 1, 5, 4], // bottom (-Y)
];

/// Generates the 6 outward-facing quads of the box spanning `min..max`.
pub fn cuboid(min: [f64; 3], max: [f64; 3]) -> Solid {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;

    // 8 corners of the box
    let corners = [
        [x0, y0, z0], // 0: left-bottom-back
        [x1, y0, z0], // 1: right-bottom-back
        [x1, y1, z0], // 2: right-top-back
        [x0, y1, z0], // 3: left-top-back
        [x0, y0, z1], // 4: left-bottom-front
        [x1, y0, z1], // 5: right-bottom-front
        [x1, y1, z1], // 6: right-top-front
        [x0, y1, z1], // 7: left-top-front
    ];

    let polygons = BOX_FACES
        .iter()
        .map(|face| Polygon::new(face.iter().map(|&i| corners[i]).collect()))
        .collect();
    Solid::new(polygons)
}

/// Generates an axis-aligned cube of edge length `size` around `center`.
pub fn cube(center: Point3<f64>, size: f64) -> Solid {
    let half = Vector3::repeat(size / 2.0);
    let min = center - half;
    let max = center + half;
    cuboid([min.x, min.y, min.z], [max.x, max.y, max.z])
}
