//! Shared Binary Space Partitioning tree for boolean evaluation.
//!
//! All operands of one call are inserted into a single tree, one after the
//! other. Every fragment keeps its operand id and flip flag, so after
//! construction the tree answers, for any empty cell, which operands the
//! cell lies inside of.
//!
//! # Architecture
//!
//! - [`BspTree`]: The container holding the root node
//! - [`BspNode`]: Nodes storing a splitting plane and coplanar fragments
//! - [`RegionLabeler`]: Inside/outside labels of the empty cells

mod label;
mod node;
mod tree;

pub use label::{Cell, RegionLabeler};
pub use node::{BspNode, Fragment, MAX_OPERANDS, OperandId, OperandSet, Side};
pub use tree::BspTree;
