//! Building the output solid from surviving pieces.

use nalgebra::Point3;
use tracing::{debug, trace};

use crate::arena::Arena;
use crate::boolean::Kept;
use crate::error::{CsgError, Result};
use crate::polygon::{Polygon, Solid};
use crate::transform::Transform;
use crate::weld::Welder;

/// Serializes `kept` into a world-space solid and releases their buffers.
///
/// Vertices are welded within `epsilon` and vertices lying on a
/// neighbour's edge are inserted into it, so pieces meeting along an edge
/// share it exactly. A piece collapsing below three vertices under the weld
/// is dropped.
///
/// A piece with fewer than three vertices cannot come out of the tree; one
/// that does aborts the call rather than emitting it.
pub fn extract(arena: &mut Arena, kept: Vec<Kept>, epsilon: f64) -> Result<Solid> {
    let mut welder = Welder::new(epsilon);
    let mut loops = Vec::with_capacity(kept.len());
    let mut planes = Vec::with_capacity(kept.len());
    let mut points: Vec<Point3<f64>> = Vec::new();

    for piece in kept {
        arena.read_points(piece.vertices, &mut points)?;
        if points.len() < 3 {
            return Err(CsgError::invariant(format!(
                "fragment of operand {} reached extraction with {} vertices",
                piece.operand,
                points.len()
            )));
        }
        if piece.reversed {
            points.reverse();
        }
        arena.release(piece.vertices)?;

        match welder.weld_loop(&points) {
            Some(indices) => {
                loops.push(indices);
                planes.push(piece.plane.to_array());
            }
            None => trace!(operand = piece.operand, "piece collapsed under the weld"),
        }
    }
    welder.split_t_junctions(&mut loops);

    let polygons: Vec<Polygon> = loops
        .iter()
        .zip(planes)
        .map(|(indices, plane)| {
            let vertices = indices
                .iter()
                .map(|&i| {
                    let p = welder.vertex(i);
                    [p.x, p.y, p.z]
                })
                .collect();
            Polygon::with_plane(vertices, plane)
        })
        .collect();

    debug!(polygons = polygons.len(), vertices = welder.len(), "result extracted");
    Ok(Solid::new(polygons).with_transform(Transform::identity()))
}
