//! Boolean evaluation over a finished shared tree.
//!
//! Each stored fragment is pushed through the front and the back subtree of
//! its node. The pieces that come out border exactly one empty cell on each
//! side, and the two cells' labels tell, for every other operand, whether
//! the piece is inside it, outside it, or on its boundary.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::arena::{Arena, BufferId};
use crate::bsp::{BspNode, BspTree, Cell, Fragment, OperandId, OperandSet, RegionLabeler, Side};
use crate::cuttable::{Cut, Cutter};
use crate::error::Result;
use crate::plane::Plane3D;

/// The boolean operation applied to all operands of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    Intersection,
    Union,
    /// The first operand minus every other operand.
    Difference,
}

impl BoolOp {
    /// Whether `operand` enters the operation complemented.
    #[inline]
    pub fn flips(self, operand: OperandId) -> bool {
        matches!(self, BoolOp::Difference) && operand > 0
    }

    /// Decides whether a piece owned by `owner` survives with respect to
    /// `other`.
    ///
    /// A piece on a boundary shared with the same facing is kept only from
    /// the lower operand id.
    fn keeps(self, relation: Relation, owner: OperandId, other: OperandId) -> bool {
        let target = match self {
            BoolOp::Intersection | BoolOp::Difference => Relation::Inside,
            BoolOp::Union => Relation::Outside,
        };
        relation == target || (relation == Relation::Same && owner < other)
    }
}

/// Where a piece lies relative to another operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Inside,
    Outside,
    /// On the operand's boundary, both outward normals agreeing.
    Same,
    /// On the operand's boundary, outward normals opposed.
    Opposite,
}

impl Relation {
    /// Relation to the complement of the operand.
    #[inline]
    pub fn complemented(self) -> Self {
        match self {
            Relation::Inside => Relation::Outside,
            Relation::Outside => Relation::Inside,
            Relation::Same => Relation::Opposite,
            Relation::Opposite => Relation::Same,
        }
    }

    /// Relation seen from a piece whose own orientation is reversed.
    #[inline]
    pub fn reoriented(self) -> Self {
        match self {
            Relation::Same => Relation::Opposite,
            Relation::Opposite => Relation::Same,
            other => other,
        }
    }

    /// Relation from the inside states of the cells in front of and behind
    /// a piece. `faces_front` tells whether the piece's outward normal
    /// points to the front cell.
    pub fn from_cells(front_inside: bool, back_inside: bool, faces_front: bool) -> Self {
        match (front_inside, back_inside) {
            (true, true) => Relation::Inside,
            (false, false) => Relation::Outside,
            // Interior behind: the boundary's outward normal points to the front.
            (false, true) if faces_front => Relation::Same,
            (false, true) => Relation::Opposite,
            (true, false) if faces_front => Relation::Opposite,
            (true, false) => Relation::Same,
        }
    }
}

/// A surviving piece, ready for extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kept {
    pub operand: OperandId,
    pub vertices: BufferId,
    /// Outward plane of the piece in the result.
    pub plane: Plane3D,
    /// The vertex loop must be emitted in reverse.
    pub reversed: bool,
}

/// Evaluates `op` over every fragment of `tree`.
///
/// `operands` is the number of operands of the call; `flipped` holds the
/// operands entering complemented. The tree's operand sets must be current.
/// Every returned piece lives in a fresh buffer owned by the caller; the
/// tree's own fragments are left untouched.
#[instrument(skip_all, fields(op = ?op, operands = operands, fragments = tree.fragment_count()))]
pub fn evaluate(
    tree: &BspTree,
    arena: &mut Arena,
    cutter: &mut Cutter,
    op: BoolOp,
    operands: usize,
    flipped: OperandSet,
) -> Result<Vec<Kept>> {
    let mut labeler = RegionLabeler::new(tree, arena, cutter.epsilon())?;
    let mut evaluator = Evaluator {
        arena,
        cutter,
        op,
        operands,
        flipped,
        kept: Vec::new(),
        front_pieces: Vec::new(),
        back_pieces: Vec::new(),
    };
    if let Some(root) = tree.root() {
        evaluator.visit(root, &mut labeler)?;
    }
    debug!(kept = evaluator.kept.len(), "evaluation finished");
    Ok(evaluator.kept)
}

struct Evaluator<'a> {
    arena: &'a mut Arena,
    cutter: &'a mut Cutter,
    op: BoolOp,
    operands: usize,
    flipped: OperandSet,
    kept: Vec<Kept>,
    front_pieces: Vec<(BufferId, Cell)>,
    back_pieces: Vec<(BufferId, Cell)>,
}

impl Evaluator<'_> {
    /// Pre-order walk: a node's own fragments, then front, then back.
    fn visit(&mut self, node: &BspNode, labeler: &mut RegionLabeler) -> Result<()> {
        for fragment in node.coplanar_front() {
            self.classify(node, fragment, true, labeler)?;
        }
        for fragment in node.coplanar_back() {
            self.classify(node, fragment, false, labeler)?;
        }
        if let Some(front) = node.front() {
            self.visit(front, labeler)?;
        }
        if let Some(back) = node.back() {
            self.visit(back, labeler)?;
        }
        Ok(())
    }

    fn classify(
        &mut self,
        node: &BspNode,
        fragment: &Fragment,
        faces_front: bool,
        labeler: &mut RegionLabeler,
    ) -> Result<()> {
        let copy = self.arena.duplicate(fragment.vertices)?;
        let mut front_pieces = std::mem::take(&mut self.front_pieces);
        let mut back_pieces = std::mem::take(&mut self.back_pieces);
        front_pieces.clear();

        self.descend(
            node.front(),
            Cell::new(node.id(), Side::Front),
            copy,
            Side::Front,
            node.plane(),
            &mut front_pieces,
        )?;

        for &(piece, front_cell) in &front_pieces {
            back_pieces.clear();
            self.descend(
                node.back(),
                Cell::new(node.id(), Side::Back),
                piece,
                Side::Back,
                node.plane(),
                &mut back_pieces,
            )?;
            let front_inside = labeler.inside(front_cell)?;
            for &(piece, back_cell) in &back_pieces {
                let back_inside = labeler.inside(back_cell)?;
                if self.survives(fragment, faces_front, front_inside, back_inside) {
                    self.kept.push(Kept {
                        operand: fragment.operand,
                        vertices: piece,
                        plane: if fragment.flip {
                            fragment.plane.flipped()
                        } else {
                            fragment.plane
                        },
                        reversed: fragment.flip,
                    });
                } else {
                    self.arena.release(piece)?;
                }
            }
        }

        self.front_pieces = front_pieces;
        self.back_pieces = back_pieces;
        Ok(())
    }

    fn survives(
        &self,
        fragment: &Fragment,
        faces_front: bool,
        front_inside: OperandSet,
        back_inside: OperandSet,
    ) -> bool {
        let owner = fragment.operand;
        (0..self.operands).filter(|&j| j != owner).all(|other| {
            let mut relation = Relation::from_cells(
                front_inside.contains(other),
                back_inside.contains(other),
                faces_front,
            );
            if self.flipped.contains(other) {
                relation = relation.complemented();
            }
            if fragment.flip {
                relation = relation.reoriented();
            }
            self.op.keeps(relation, owner, other)
        })
    }

    /// Pushes `piece` down the subtree `node` on side `toward` of the plane
    /// `reference`, collecting each resulting piece with its cell.
    ///
    /// A piece lying on a subtree plane continues on the side that faces the
    /// same way as `toward` does relative to `reference`.
    fn descend(
        &mut self,
        node: Option<&BspNode>,
        cell: Cell,
        piece: BufferId,
        toward: Side,
        reference: &Plane3D,
        out: &mut Vec<(BufferId, Cell)>,
    ) -> Result<()> {
        let Some(node) = node else {
            out.push((piece, cell));
            return Ok(());
        };

        let mut go = |this: &mut Self, side: Side, piece: BufferId| {
            this.descend(
                node.child(side),
                Cell::new(node.id(), side),
                piece,
                toward,
                reference,
                out,
            )
        };
        match self.cutter.cut(self.arena, piece, node.plane())? {
            Cut::Front(piece) => go(self, Side::Front, piece),
            Cut::Back(piece) => go(self, Side::Back, piece),
            Cut::Coplanar(piece) => {
                let side = if node.plane().faces_same_direction(reference) {
                    toward
                } else {
                    toward.opposite()
                };
                go(self, side, piece)
            }
            Cut::Spanning { front, back } => {
                if let Some(piece) = front {
                    go(self, Side::Front, piece)?;
                }
                if let Some(piece) = back {
                    go(self, Side::Back, piece)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_from_cells() {
        assert_eq!(Relation::from_cells(true, true, true), Relation::Inside);
        assert_eq!(Relation::from_cells(false, false, false), Relation::Outside);
        assert_eq!(Relation::from_cells(false, true, true), Relation::Same);
        assert_eq!(Relation::from_cells(false, true, false), Relation::Opposite);
        assert_eq!(Relation::from_cells(true, false, true), Relation::Opposite);
        assert_eq!(Relation::from_cells(true, false, false), Relation::Same);
    }

    #[test]
    fn complement_and_reorient() {
        assert_eq!(Relation::Inside.complemented(), Relation::Outside);
        assert_eq!(Relation::Same.complemented(), Relation::Opposite);
        assert_eq!(Relation::Inside.reoriented(), Relation::Inside);
        assert_eq!(Relation::Opposite.reoriented(), Relation::Same);
    }

    #[test]
    fn coplanar_same_facing_kept_once() {
        for op in [BoolOp::Intersection, BoolOp::Union, BoolOp::Difference] {
            assert!(op.keeps(Relation::Same, 0, 1));
            assert!(!op.keeps(Relation::Same, 1, 0));
            assert!(!op.keeps(Relation::Opposite, 0, 1));
        }
    }

    #[test]
    fn inclusion_rules() {
        assert!(BoolOp::Intersection.keeps(Relation::Inside, 1, 0));
        assert!(!BoolOp::Intersection.keeps(Relation::Outside, 0, 1));
        assert!(BoolOp::Union.keeps(Relation::Outside, 1, 0));
        assert!(!BoolOp::Union.keeps(Relation::Inside, 0, 1));
    }

    #[test]
    fn difference_flips_all_but_first() {
        assert!(!BoolOp::Difference.flips(0));
        assert!(BoolOp::Difference.flips(1));
        assert!(BoolOp::Difference.flips(7));
        assert!(!BoolOp::Union.flips(3));
    }
}
