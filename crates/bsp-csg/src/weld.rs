//! Welding the vertices of a finished result.
//!
//! Pieces that meet along an edge can reach extraction with slightly
//! different copies of the same vertex, or with a vertex of one piece lying
//! inside an edge of its neighbour. Both are closed up here at the
//! precision of the call.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::cuttable::canonical_order;

/// Spatial hash of welded vertices; a grid cell is one epsilon wide.
#[derive(Debug)]
pub struct Welder {
    epsilon: f64,
    vertices: Vec<Point3<f64>>,
    grid: HashMap<[i64; 3], Vec<usize>>,
}

impl Welder {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            vertices: Vec::new(),
            grid: HashMap::new(),
        }
    }

    /// Index of the vertex `point` welds to.
    ///
    /// The first vertex within epsilon wins; if there is none, `point`
    /// itself becomes a new vertex. Welded vertices are therefore always
    /// more than epsilon apart.
    pub fn insert(&mut self, point: &Point3<f64>) -> usize {
        let cell = self.cell_of(point);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbour = [
                        cell[0].saturating_add(dx),
                        cell[1].saturating_add(dy),
                        cell[2].saturating_add(dz),
                    ];
                    if let Some(indices) = self.grid.get(&neighbour) {
                        for &index in indices {
                            if (self.vertices[index] - point).norm() <= self.epsilon {
                                found = Some(index);
                                break 'search;
                            }
                        }
                    }
                }
            }
        }

        found.unwrap_or_else(|| {
            let index = self.vertices.len();
            self.vertices.push(*point);
            self.grid.entry(cell).or_default().push(index);
            index
        })
    }

    fn cell_of(&self, point: &Point3<f64>) -> [i64; 3] {
        let cell = |c: f64| (c / self.epsilon).floor() as i64;
        [cell(point.x), cell(point.y), cell(point.z)]
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Point3<f64> {
        self.vertices[index]
    }

    /// Number of distinct welded vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Welds a loop, dropping repeated consecutive and closing vertices.
    ///
    /// Returns `None` when fewer than three vertices remain.
    pub fn weld_loop(&mut self, points: &[Point3<f64>]) -> Option<Vec<usize>> {
        let mut indices: Vec<usize> = Vec::with_capacity(points.len());
        for point in points {
            let index = self.insert(point);
            if indices.last() != Some(&index) {
                indices.push(index);
            }
        }
        while indices.len() > 1 && indices.last() == indices.first() {
            indices.pop();
        }
        (indices.len() >= 3).then_some(indices)
    }

    /// Inserts into every loop edge the welded vertices lying within
    /// epsilon of its interior, in order along the edge.
    ///
    /// Only vertices used by `loops` are considered. An edge and its
    /// reverse always receive the same vertices.
    pub fn split_t_junctions(&self, loops: &mut [Vec<usize>]) {
        let mut used: Vec<usize> = loops.iter().flatten().copied().collect();
        used.sort_unstable();
        used.dedup();
        used.sort_by(|&a, &b| {
            let (a, b) = (self.vertices[a], self.vertices[b]);
            a.x.total_cmp(&b.x)
                .then(a.y.total_cmp(&b.y))
                .then(a.z.total_cmp(&b.z))
        });

        let mut stops: Vec<(f64, usize)> = Vec::new();
        for indices in loops.iter_mut() {
            let n = indices.len();
            let mut split = Vec::with_capacity(n);
            for i in 0..n {
                let (a, b) = (indices[i], indices[(i + 1) % n]);
                split.push(a);
                self.stops_on_edge(a, b, &used, &mut stops);
                split.extend(stops.iter().map(|&(_, index)| index));
            }
            *indices = split;
        }
    }

    fn stops_on_edge(&self, a: usize, b: usize, used: &[usize], stops: &mut Vec<(f64, usize)>) {
        stops.clear();
        let (pa, pb) = (self.vertices[a], self.vertices[b]);
        let forward = canonical_order(&pa, &pb);
        let (start, end) = if forward { (pa, pb) } else { (pb, pa) };
        let edge = end - start;
        let length_squared = edge.norm_squared();
        if length_squared == 0.0 {
            return;
        }

        let low = start.x.min(end.x) - self.epsilon;
        let high = start.x.max(end.x) + self.epsilon;
        let first = used.partition_point(|&v| self.vertices[v].x < low);
        for &v in &used[first..] {
            let point = self.vertices[v];
            if point.x > high {
                break;
            }
            if v == a || v == b {
                continue;
            }
            let t = (point - start).dot(&edge) / length_squared;
            if t <= 0.0 || t >= 1.0 {
                continue;
            }
            if (point - (start + edge * t)).norm() <= self.epsilon {
                stops.push((t, v));
            }
        }

        stops.sort_by(|x, y| x.0.total_cmp(&y.0));
        if !forward {
            stops.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn nearby_points_share_the_first_vertex() {
        let mut welder = Welder::new(1e-3);
        let a = welder.insert(&p(1.0, 1.0, 1.0));
        let b = welder.insert(&p(1.0 + 4e-4, 1.0, 1.0 - 4e-4));
        let c = welder.insert(&p(1.0 + 2e-3, 1.0, 1.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(welder.vertex(b), p(1.0, 1.0, 1.0));
        assert_eq!(welder.len(), 2);
    }

    #[test]
    fn points_across_a_cell_boundary_weld() {
        let mut welder = Welder::new(0.5);
        let a = welder.insert(&p(0.49, 0.0, 0.0));
        let b = welder.insert(&p(0.51, 0.0, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn collapsed_loop_is_dropped() {
        let mut welder = Welder::new(1e-3);
        let sliver = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 5e-4, 0.0), p(0.0, 0.0, 0.0)];
        assert_eq!(welder.weld_loop(&sliver), None);

        let square = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)];
        assert_eq!(welder.weld_loop(&square).map(|l| l.len()), Some(4));
    }

    #[test]
    fn t_junction_is_split_on_both_sides() {
        let mut welder = Welder::new(1e-3);
        // One wide quad above two narrow ones sharing the y = 0 line.
        let wide = welder
            .weld_loop(&[p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 1.0, 0.0), p(0.0, 1.0, 0.0)])
            .unwrap();
        let left = welder
            .weld_loop(&[p(0.0, 0.0, 0.0), p(0.0, -1.0, 0.0), p(1.0, -1.0, 0.0), p(1.0, 2e-4, 0.0)])
            .unwrap();
        let right = welder
            .weld_loop(&[p(1.0, 0.0, 0.0), p(1.0, -1.0, 0.0), p(2.0, -1.0, 0.0), p(2.0, 0.0, 0.0)])
            .unwrap();

        let mut loops = vec![wide, left, right];
        welder.split_t_junctions(&mut loops);

        let middle = welder.insert(&p(1.0, 0.0, 0.0));
        assert_eq!(loops[0].len(), 5);
        assert_eq!(loops[0][1], middle);
        // The narrow quads already end at the middle vertex.
        assert_eq!(loops[1].len(), 4);
        assert_eq!(loops[2].len(), 4);
        assert_eq!(welder.vertex(middle), p(1.0, 2e-4, 0.0));
    }

    #[test]
    fn far_vertices_are_not_inserted() {
        let mut welder = Welder::new(1e-3);
        let square = welder
            .weld_loop(&[p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)])
            .unwrap();
        let apart = welder
            .weld_loop(&[p(0.5, 0.1, 0.0), p(0.6, 0.1, 0.0), p(0.6, 0.2, 0.0)])
            .unwrap();
        let mut loops = vec![square, apart];
        welder.split_t_junctions(&mut loops);
        assert_eq!(loops[0].len(), 4);
        assert_eq!(loops[1].len(), 3);
    }
}
