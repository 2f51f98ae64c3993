//! Shared BSP tree container and incremental construction.

use tracing::trace;

use crate::arena::Arena;
use crate::cuttable::{Cut, Cutter};
use crate::error::Result;

use super::node::{BspNode, Fragment, OperandSet, Side};

/// A Binary Space Partitioning tree shared by every operand of one call.
///
/// Fragments are inserted one at a time, in operand order. A fragment
/// landing in an empty slot becomes a new node whose splitting plane is the
/// fragment's own plane; a fragment lying on an existing node's plane is
/// recorded at that node; a fragment spanning a plane is split and both
/// parts continue downwards.
///
/// The tree owns the vertex buffers of its fragments. They live in the
/// call's [`Arena`] and are handed back with [`BspTree::release`].
#[derive(Debug, Default)]
pub struct BspTree {
    root: Option<BspNode>,
    nodes: usize,
}

impl BspTree {
    /// Creates an empty BSP tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the tree contains no fragments.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns a reference to the root node, if any.
    #[inline]
    pub fn root(&self) -> Option<&BspNode> {
        self.root.as_ref()
    }

    /// Number of nodes; node ids run from 0 up to this count.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Returns the total number of fragments in the tree.
    pub fn fragment_count(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.fragment_count())
    }

    /// Returns the maximum depth of the tree (0 for empty tree).
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.depth())
    }

    /// Operands owning at least one fragment.
    pub fn operands(&self) -> OperandSet {
        self.root.as_ref().map_or(OperandSet::EMPTY, |n| n.operands())
    }

    /// Inserts a fragment, splitting it against existing planes as needed.
    ///
    /// Ownership of `fragment.vertices` passes to the tree, even when every
    /// piece of it ends up degenerate and is dropped.
    pub fn insert(&mut self, arena: &mut Arena, cutter: &mut Cutter, fragment: Fragment) -> Result<()> {
        match self.root.as_mut() {
            None => {
                self.root = Some(BspNode::from_fragment(self.nodes, fragment));
                self.nodes += 1;
                Ok(())
            }
            Some(root) => insert_into(root, fragment, arena, cutter, &mut self.nodes),
        }
    }

    /// Recomputes every node's operand set. Call once after the last insert.
    pub fn refresh_operands(&mut self) -> OperandSet {
        self.root
            .as_mut()
            .map_or(OperandSet::EMPTY, |n| n.refresh_operands())
    }

    /// Releases every fragment buffer back to the arena.
    pub fn release(self, arena: &mut Arena) -> Result<()> {
        let mut outcome = Ok(());
        if let Some(root) = self.root {
            root.drain_fragments(&mut |fragment| {
                if outcome.is_ok() {
                    outcome = arena.release(fragment.vertices);
                }
            });
        }
        outcome
    }
}

/// Recursively inserts a fragment below `node`.
fn insert_into(
    node: &mut BspNode,
    fragment: Fragment,
    arena: &mut Arena,
    cutter: &mut Cutter,
    next_id: &mut usize,
) -> Result<()> {
    match cutter.cut(arena, fragment.vertices, node.plane())? {
        Cut::Coplanar(vertices) => {
            node.add_coplanar(fragment.with_vertices(vertices));
            Ok(())
        }
        Cut::Front(vertices) => insert_child(
            node,
            Side::Front,
            fragment.with_vertices(vertices),
            arena,
            cutter,
            next_id,
        ),
        Cut::Back(vertices) => insert_child(
            node,
            Side::Back,
            fragment.with_vertices(vertices),
            arena,
            cutter,
            next_id,
        ),
        Cut::Spanning { front, back } => {
            trace!(node = node.id(), operand = fragment.operand, "fragment split");
            if let Some(vertices) = front {
                let part = fragment.with_vertices(vertices);
                insert_child(node, Side::Front, part, arena, cutter, next_id)?;
            }
            if let Some(vertices) = back {
                let part = fragment.with_vertices(vertices);
                insert_child(node, Side::Back, part, arena, cutter, next_id)?;
            }
            Ok(())
        }
    }
}

fn insert_child(
    node: &mut BspNode,
    side: Side,
    fragment: Fragment,
    arena: &mut Arena,
    cutter: &mut Cutter,
    next_id: &mut usize,
) -> Result<()> {
    let slot = node.child_slot_mut(side);
    match slot {
        Some(child) => insert_into(child, fragment, arena, cutter, next_id),
        None => {
            *slot = Some(Box::new(BspNode::from_fragment(*next_id, fragment)));
            *next_id += 1;
            Ok(())
        }
    }
}
