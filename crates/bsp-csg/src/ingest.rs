//! Turning caller solids into tagged tree fragments.
//!
//! Validation runs over every operand before anything is inserted, so a
//! rejected call never builds a partial tree. Ingestion then maps each
//! polygon to world space, snaps it to the precision grid and inserts it.

use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument, trace};

use crate::arena::{Arena, BufferId, BufferKind};
use crate::bsp::{BspTree, Fragment, OperandId};
use crate::config::Precision;
use crate::cuttable::Cutter;
use crate::error::{DegenerateInput, Result};
use crate::plane::Plane3D;
use crate::polygon::{Polygon, Solid};

/// Checks one operand for input the engine cannot work with.
pub fn validate(operand: OperandId, solid: &Solid, precision: Precision) -> Result<(), DegenerateInput> {
    let transform = solid.transform();
    if !transform.is_finite() || !transform.is_affine() {
        return Err(DegenerateInput::InvalidTransform { operand });
    }
    let transform = (!transform.is_identity()).then_some(transform);
    for (index, polygon) in solid.polygons.iter().enumerate() {
        validate_polygon(operand, index, polygon, precision.epsilon())?;
        // Snapping must stay on the grid, after the transform.
        let off_grid = polygon
            .points()
            .map(|p| transform.map_or(p, |t| t.transform_point(&p)))
            .any(|p| p.coords.iter().any(|&c| !precision.quantize(c).is_finite()));
        if off_grid {
            return Err(DegenerateInput::CoordinateOutOfRange {
                operand,
                polygon: index,
            });
        }
    }
    Ok(())
}

fn validate_polygon(
    operand: OperandId,
    polygon_index: usize,
    polygon: &Polygon,
    epsilon: f64,
) -> Result<(), DegenerateInput> {
    if polygon.len() < 3 {
        return Err(DegenerateInput::TooFewVertices {
            operand,
            polygon: polygon_index,
            count: polygon.len(),
        });
    }
    if polygon.vertices.iter().flatten().any(|c| !c.is_finite()) {
        return Err(DegenerateInput::NonFiniteCoordinate {
            operand,
            polygon: polygon_index,
        });
    }

    // A loop without area has no plane to violate; it is dropped later.
    let fitted = polygon.plane();
    let plane = match polygon.plane {
        Some(equation) => {
            let supplied = plane_from_equation(equation).ok_or(DegenerateInput::InvalidPlane {
                operand,
                polygon: polygon_index,
            })?;
            if fitted.is_some_and(|fitted| !supplied.faces_same_direction(&fitted)) {
                return Err(DegenerateInput::PlaneOpposesWinding {
                    operand,
                    polygon: polygon_index,
                });
            }
            Some(supplied)
        }
        None => fitted,
    };
    if let Some(plane) = plane {
        for (vertex, point) in polygon.points().enumerate() {
            let distance = plane.signed_distance(&point);
            if distance.abs() > epsilon {
                return Err(DegenerateInput::NonPlanarPolygon {
                    operand,
                    polygon: polygon_index,
                    vertex,
                    distance,
                });
            }
        }
    }
    Ok(())
}

fn plane_from_equation([a, b, c, d]: [f64; 4]) -> Option<Plane3D> {
    Plane3D::try_new(Vector3::new(a, b, c), d)
}

/// Streams operands into a tree through one staging buffer.
#[derive(Debug)]
pub struct Ingestor {
    precision: Precision,
    staging: BufferId,
    points: Vec<Point3<f64>>,
}

impl Ingestor {
    /// Allocates the staging buffer with room for `capacity` vertices.
    pub fn new(arena: &mut Arena, precision: Precision, capacity: usize) -> Result<Self> {
        Ok(Self {
            precision,
            staging: arena.allocate(BufferKind::Coords, capacity)?,
            points: Vec::new(),
        })
    }

    /// Releases the staging buffer.
    pub fn release(self, arena: &mut Arena) -> Result<()> {
        arena.release(self.staging)
    }

    /// Inserts every polygon of `solid` into `tree`, tagged `(operand, flip)`.
    ///
    /// Returns the number of polygons inserted; polygons that collapse on the
    /// precision grid are skipped, but an operand losing every polygon that
    /// way is rejected. Vertex order is preserved.
    #[instrument(skip_all, fields(operand = operand, flip = flip, polygons = solid.polygons.len()))]
    pub fn ingest(
        &mut self,
        arena: &mut Arena,
        tree: &mut BspTree,
        cutter: &mut Cutter,
        operand: OperandId,
        flip: bool,
        solid: &Solid,
    ) -> Result<usize> {
        let transform = solid.transform();
        let identity = transform.is_identity();
        let mut inserted = 0;

        for (index, polygon) in solid.polygons.iter().enumerate() {
            arena.clear(self.staging)?;
            for vertex in polygon.points() {
                let world = if identity {
                    vertex
                } else {
                    transform.transform_point(&vertex)
                };
                let snapped = world.map(|c| self.precision.quantize(c));
                if self.points_tail(arena)? != Some(snapped) {
                    self.staging = arena.push_point(self.staging, &snapped)?;
                }
            }

            // Closing duplicates of the first vertex.
            let mut len = arena.len(self.staging)?;
            while len > 1 && arena.point(self.staging, len - 1)? == arena.point(self.staging, 0)? {
                len -= 1;
            }
            arena.truncate(self.staging, len)?;
            arena.read_points(self.staging, &mut self.points)?;

            let Some(fitted) = (len >= 3).then(|| Plane3D::from_loop(&self.points)).flatten() else {
                trace!(polygon = index, "polygon collapsed on the precision grid");
                continue;
            };
            let plane = polygon
                .plane
                .filter(|_| identity)
                .and_then(plane_from_equation)
                .filter(|supplied| supplied.faces_same_direction(&fitted))
                .unwrap_or(fitted);

            let vertices = arena.duplicate(self.staging)?;
            tree.insert(
                arena,
                cutter,
                Fragment {
                    operand,
                    flip,
                    plane,
                    vertices,
                },
            )?;
            inserted += 1;
        }

        if inserted == 0 && !solid.polygons.is_empty() {
            return Err(DegenerateInput::CollapsedOperand { operand }.into());
        }
        debug!(inserted, "operand ingested");
        Ok(inserted)
    }

    fn points_tail(&self, arena: &Arena) -> Result<Option<Point3<f64>>> {
        let len = arena.len(self.staging)?;
        if len == 0 {
            return Ok(None);
        }
        arena.point(self.staging, len - 1).map(Some)
    }
}
