//! Cutting arena-resident vertex loops by a plane.

use std::cmp::Ordering;

use nalgebra::Point3;
use tracing::trace;

use crate::arena::{Arena, BufferId, BufferKind};
use crate::error::Result;
use crate::exact::{DoubleDouble, Ratio};
use crate::plane::{Plane3D, PlaneSide, side_of_distance};

/// Outcome of cutting a loop by a plane.
///
/// Every variant hands back ownership of buffers: the input loop itself for
/// the non-spanning cases, fresh pieces for `Spanning` (the input loop is
/// released). A side of a spanning cut that degenerates to fewer than three
/// vertices or zero area is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cut {
    Coplanar(BufferId),
    Front(BufferId),
    Back(BufferId),
    Spanning {
        front: Option<BufferId>,
        back: Option<BufferId>,
    },
}

/// Reusable state for cutting loops: vertex and distance scratch plus the
/// arena ratio buffer holding the exact crossing fractions of the current
/// cut.
#[derive(Debug)]
pub struct Cutter {
    epsilon: f64,
    ratios: BufferId,
    points: Vec<Point3<f64>>,
    distances: Vec<DoubleDouble>,
    sides: Vec<PlaneSide>,
}

impl Cutter {
    pub fn new(arena: &mut Arena, epsilon: f64) -> Result<Self> {
        Ok(Self {
            epsilon,
            ratios: arena.allocate(BufferKind::Ratios, 8)?,
            points: Vec::new(),
            distances: Vec::new(),
            sides: Vec::new(),
        })
    }

    #[inline]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Releases the ratio buffer.
    pub fn release(self, arena: &mut Arena) -> Result<()> {
        arena.release(self.ratios)
    }

    /// Cuts the loop in `polygon` by `plane`.
    ///
    /// Uses a variant of the Sutherland-Hodgman algorithm: walks the loop
    /// edges and builds two vertex lists, adding a crossing vertex whenever
    /// an edge goes strictly from one side to the other. Vertices on the
    /// plane go to both lists.
    pub fn cut(&mut self, arena: &mut Arena, polygon: BufferId, plane: &Plane3D) -> Result<Cut> {
        arena.read_points(polygon, &mut self.points)?;
        self.distances.clear();
        self.sides.clear();

        let mut front = 0;
        let mut back = 0;
        for point in &self.points {
            let distance = plane.exact_distance(point);
            let side = side_of_distance(distance.to_f64(), self.epsilon);
            match side {
                PlaneSide::Front => front += 1,
                PlaneSide::Back => back += 1,
                PlaneSide::OnPlane => {}
            }
            self.distances.push(distance);
            self.sides.push(side);
        }

        match (front, back) {
            (0, 0) => Ok(Cut::Coplanar(polygon)),
            (_, 0) => Ok(Cut::Front(polygon)),
            (0, _) => Ok(Cut::Back(polygon)),
            _ => self.split(arena, polygon),
        }
    }

    fn split(&mut self, arena: &mut Arena, polygon: BufferId) -> Result<Cut> {
        let n = self.points.len();

        // Pass 1: exact crossing fractions, one per crossing edge, in loop order.
        arena.clear(self.ratios)?;
        for i in 0..n {
            let j = (i + 1) % n;
            if crosses(self.sides[i], self.sides[j]) {
                let ratio = if canonical_order(&self.points[i], &self.points[j]) {
                    Ratio::new(self.distances[i], self.distances[j])
                } else {
                    Ratio::new(self.distances[j], self.distances[i])
                };
                self.ratios = arena.push_ratio(self.ratios, &ratio)?;
            }
        }

        // Pass 2: materialize both pieces, growing them as needed.
        let mut front = arena.allocate(BufferKind::Coords, n)?;
        let mut back = arena.allocate(BufferKind::Coords, n)?;
        let mut crossing = 0;
        for i in 0..n {
            let j = (i + 1) % n;
            let current = &self.points[i];
            match self.sides[i] {
                PlaneSide::Front => front = arena.push_point(front, current)?,
                PlaneSide::Back => back = arena.push_point(back, current)?,
                PlaneSide::OnPlane => {
                    front = arena.push_point(front, current)?;
                    back = arena.push_point(back, current)?;
                }
            }

            if crosses(self.sides[i], self.sides[j]) {
                let ratio = arena.ratio(self.ratios, crossing)?;
                crossing += 1;
                let next = &self.points[j];
                let point = if canonical_order(current, next) {
                    ratio.interpolate(current, next)
                } else {
                    ratio.interpolate(next, current)
                };
                front = arena.push_point(front, &point)?;
                back = arena.push_point(back, &point)?;
            }
        }
        arena.release(polygon)?;

        let front = self.keep_if_solid(arena, front)?;
        let back = self.keep_if_solid(arena, back)?;
        trace!(
            vertices = n,
            crossings = crossing,
            front = front.is_some(),
            back = back.is_some(),
            "split polygon"
        );
        Ok(Cut::Spanning { front, back })
    }

    fn keep_if_solid(&mut self, arena: &mut Arena, piece: BufferId) -> Result<Option<BufferId>> {
        arena.read_points(piece, &mut self.points)?;
        if self.points.len() >= 3 && Plane3D::from_loop(&self.points).is_some() {
            Ok(Some(piece))
        } else {
            arena.release(piece)?;
            Ok(None)
        }
    }
}

#[inline]
fn crosses(a: PlaneSide, b: PlaneSide) -> bool {
    matches!(
        (a, b),
        (PlaneSide::Front, PlaneSide::Back) | (PlaneSide::Back, PlaneSide::Front)
    )
}

/// Orders edge endpoints lexicographically so the two loops sharing an
/// edge compute the same crossing vertex bit for bit.
#[inline]
pub(crate) fn canonical_order(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    let key = |p: &Point3<f64>| [p.x, p.y, p.z];
    key(a)
        .iter()
        .zip(key(b).iter())
        .map(|(x, y)| x.partial_cmp(y).unwrap_or(Ordering::Equal))
        .find(|o| *o != Ordering::Equal)
        .is_none_or(|o| o == Ordering::Less)
}
