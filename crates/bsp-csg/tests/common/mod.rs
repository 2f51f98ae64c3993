//! Shared checks for boolean results.

#![allow(dead_code)]

use std::collections::HashMap;

use bsp_csg::Solid;
use bsp_csg::primitives::cuboid;

const SCALE: f64 = 1e6;
const TOL: f64 = 1e-9;

type Key = [i64; 3];

fn key(p: [f64; 3]) -> Key {
    p.map(|c| (c * SCALE).round() as i64)
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn unit_cube() -> Solid {
    cuboid([0.0; 3], [1.0; 3])
}

pub fn offset_cube() -> Solid {
    cuboid([0.5; 3], [1.5; 3])
}

/// Checks that every boundary edge is matched by an edge running the other
/// way.
///
/// Edges are first broken at every mesh vertex lying on them, so a vertex
/// of one polygon sitting in the middle of a neighbour's edge (a
/// T-junction) does not count as a hole.
pub fn is_closed(solid: &Solid) -> bool {
    let vertices: Vec<[f64; 3]> = solid
        .polygons
        .iter()
        .flat_map(|p| p.vertices.iter().copied())
        .collect();

    let mut counts: HashMap<(Key, Key), i64> = HashMap::new();
    for polygon in &solid.polygons {
        let n = polygon.vertices.len();
        for i in 0..n {
            let a = polygon.vertices[i];
            let b = polygon.vertices[(i + 1) % n];
            let ab = sub(b, a);
            let len2 = dot(ab, ab);
            if len2 == 0.0 {
                continue;
            }

            let mut stops: Vec<(f64, [f64; 3])> = vec![(0.0, a), (1.0, b)];
            for &v in &vertices {
                let t = dot(sub(v, a), ab) / len2;
                if t <= TOL || t >= 1.0 - TOL {
                    continue;
                }
                let closest = [a[0] + ab[0] * t, a[1] + ab[1] * t, a[2] + ab[2] * t];
                let off = sub(v, closest);
                if dot(off, off).sqrt() < TOL {
                    stops.push((t, v));
                }
            }
            stops.sort_by(|x, y| x.0.total_cmp(&y.0));
            stops.dedup_by_key(|s| key(s.1));

            for pair in stops.windows(2) {
                *counts.entry((key(pair[0].1), key(pair[1].1))).or_default() += 1;
            }
        }
    }

    counts
        .iter()
        .all(|(&(a, b), &c)| counts.get(&(b, a)).copied().unwrap_or(0) == c)
}

/// Total polygon area per oriented plane, for comparing results that are
/// fragmented differently.
pub fn area_by_plane(solid: &Solid) -> HashMap<[i64; 4], f64> {
    let mut areas = HashMap::new();
    for polygon in &solid.polygons {
        let plane = polygon.plane.expect("result polygons carry their plane");
        let k = plane.map(|c| (c * SCALE).round() as i64);
        *areas.entry(k).or_insert(0.0) += polygon.area();
    }
    areas.retain(|_, a| *a > TOL);
    areas
}

/// Whether two results cover the same oriented area on every plane.
pub fn same_surface(a: &Solid, b: &Solid) -> bool {
    let a = area_by_plane(a);
    let b = area_by_plane(b);
    a.len() == b.len()
        && a.iter()
            .all(|(k, area)| b.get(k).is_some_and(|other| (area - other).abs() < 1e-6))
}

/// Axis-aligned bounds of all result vertices.
pub fn bounds(solid: &Solid) -> Option<([f64; 3], [f64; 3])> {
    let mut vertices = solid.polygons.iter().flat_map(|p| p.vertices.iter());
    let first = *vertices.next()?;
    Some(vertices.fold((first, first), |(lo, hi), v| {
        (
            [lo[0].min(v[0]), lo[1].min(v[1]), lo[2].min(v[2])],
            [hi[0].max(v[0]), hi[1].max(v[1]), hi[2].max(v[2])],
        )
    }))
}

/// Whether any polygon lies on the plane `axis = value`.
pub fn has_face_on(solid: &Solid, axis: usize, value: f64) -> bool {
    solid
        .polygons
        .iter()
        .any(|p| p.vertices.iter().all(|v| (v[axis] - value).abs() < TOL))
}
