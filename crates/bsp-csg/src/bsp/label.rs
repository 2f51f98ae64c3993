//! Inside/outside labels for the leaf cells of a finished tree.
//!
//! A leaf cell is an empty child slot: `(node, side)`. No fragment of any
//! operand crosses a cell, so every cell is entirely inside or entirely
//! outside each operand. The label of a cell for operand `j` is read off the
//! nearest `j` boundary:
//!
//! * If the cell's node holds a `j` fragment, the fragment's facing decides:
//!   the side its normal points to is outside `j`.
//! * Otherwise, if the node's other subtree contains `j` fragments, the label
//!   equals that of the cell across the node's plane, found by descending
//!   the other subtree with a point of one of the node's own fragments.
//! * Otherwise the whole node region holds no `j` boundary and shares the
//!   label of the enclosing region one level up.
//!
//! A region with no `j` boundary anywhere above it is outside `j`.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::arena::Arena;
use crate::error::{CsgError, Result};
use crate::plane::PlaneSide;

use super::node::{BspNode, OperandId, OperandSet, Side};
use super::tree::BspTree;

/// An empty child slot of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub node: usize,
    pub side: Side,
}

impl Cell {
    #[inline]
    pub fn new(node: usize, side: Side) -> Self {
        Self { node, side }
    }
}

/// Labels cells of one tree, caching per-cell inside sets.
#[derive(Debug)]
pub struct RegionLabeler<'t> {
    epsilon: f64,
    operands: OperandSet,
    nodes: Vec<&'t BspNode>,
    parents: Vec<Option<Cell>>,
    samples: Vec<Point3<f64>>,
    memo: HashMap<Cell, OperandSet>,
}

impl<'t> RegionLabeler<'t> {
    /// Indexes `tree`, whose operand sets must be current.
    pub fn new(tree: &'t BspTree, arena: &Arena, epsilon: f64) -> Result<Self> {
        let count = tree.node_count();
        let mut nodes = vec![None; count];
        let mut parents = vec![None; count];
        let mut samples = vec![Point3::origin(); count];

        let mut stack: Vec<(&'t BspNode, Option<Cell>)> = tree.root().map(|r| (r, None)).into_iter().collect();
        let mut scratch = Vec::new();
        while let Some((node, parent)) = stack.pop() {
            let id = node.id();
            let slot = nodes
                .get_mut(id)
                .ok_or_else(|| CsgError::invariant(format!("node id {id} out of range {count}")))?;
            *slot = Some(node);
            parents[id] = parent;
            samples[id] = sample_point(node, arena, &mut scratch)?;
            for side in [Side::Front, Side::Back] {
                if let Some(child) = node.child(side) {
                    stack.push((child, Some(Cell::new(id, side))));
                }
            }
        }

        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(id, node)| node.ok_or_else(|| CsgError::invariant(format!("node id {id} missing from tree"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            epsilon,
            operands: tree.operands(),
            nodes,
            parents,
            samples,
            memo: HashMap::new(),
        })
    }

    /// Operands the cell lies inside of.
    pub fn inside(&mut self, cell: Cell) -> Result<OperandSet> {
        if let Some(&inside) = self.memo.get(&cell) {
            return Ok(inside);
        }
        let mut inside = OperandSet::EMPTY;
        for operand in self.operands.iter() {
            if self.is_inside(cell, operand)? {
                inside.insert(operand);
            }
        }
        self.memo.insert(cell, inside);
        Ok(inside)
    }

    fn is_inside(&self, cell: Cell, operand: OperandId) -> Result<bool> {
        let mut cell = cell;
        // Every step either moves up or jumps into a strictly smaller subtree
        // that it can never leave again, so the walk is bounded.
        let limit = 2 * self.nodes.len() * self.nodes.len().max(1) + 2;
        for _ in 0..limit {
            let node = self.nodes[cell.node];

            if let Some(same_facing) = node.facing_of(operand) {
                let front_is_outside = same_facing;
                return Ok(match cell.side {
                    Side::Front => !front_is_outside,
                    Side::Back => front_is_outside,
                });
            }

            let across = cell.side.opposite();
            if let Some(other) = node.child(across).filter(|c| c.operands().contains(operand)) {
                cell = self.locate(other, &self.samples[cell.node]);
                continue;
            }

            match self.parents[cell.node] {
                Some(parent) => cell = parent,
                None => return Ok(false),
            }
        }
        Err(CsgError::invariant(format!(
            "labelling operand {operand} did not terminate"
        )))
    }

    /// The cell below `node` containing `point`; on-plane counts as front.
    fn locate(&self, node: &BspNode, point: &Point3<f64>) -> Cell {
        let mut node = node;
        loop {
            let side = match node.plane().classify_point_with_epsilon(point, self.epsilon) {
                PlaneSide::Back => Side::Back,
                PlaneSide::Front | PlaneSide::OnPlane => Side::Front,
            };
            match node.child(side) {
                Some(child) => node = child,
                None => return Cell::new(node.id(), side),
            }
        }
    }
}

/// A point on the node's plane inside the node's region: the vertex average
/// of its first fragment.
fn sample_point(node: &BspNode, arena: &Arena, scratch: &mut Vec<Point3<f64>>) -> Result<Point3<f64>> {
    let fragment = node
        .all_coplanar()
        .next()
        .ok_or_else(|| CsgError::invariant(format!("node {} holds no fragment", node.id())))?;
    arena.read_points(fragment.vertices, scratch)?;
    if scratch.is_empty() {
        return Err(CsgError::invariant(format!("empty fragment at node {}", node.id())));
    }
    let sum: Vector3<f64> = scratch.iter().map(|p| p.coords).sum();
    Ok(Point3::from(sum / scratch.len() as f64))
}
