//! Boolean operations on polygonal solids using a shared BSP tree.
//!
//! Intersection, union and difference of any number of solids. All operands
//! of a call are inserted into one BSP (Binary Space Partitioning) tree,
//! each fragment tagged with the operand it came from; the tree then tells
//! for every fragment which operands it lies inside of, and each operation
//! keeps the fragments its inclusion rule accepts.
//!
//! ```no_run
//! use bsp_csg::primitives::cuboid;
//!
//! bsp_csg::init(None)?;
//! let a = cuboid([0.0; 3], [1.0; 3]);
//! let b = cuboid([0.5; 3], [1.5; 3]);
//! let overlap = bsp_csg::intersect(None, &[a, b])?;
//! assert_eq!(overlap.polygons.len(), 6);
//! # Ok::<(), bsp_csg::CsgError>(())
//! ```

pub mod arena;
pub mod boolean;
pub mod bsp;
pub mod config;
mod cuttable;
mod engine;
mod error;
pub mod exact;
mod extract;
mod ingest;
mod plane;
mod polygon;
pub mod primitives;
mod runtime;
mod transform;
mod weld;

pub use arena::{ArenaStats, BufferId};
pub use boolean::BoolOp;
pub use config::{DEFAULT_PRECISION, EngineConfig, Precision};
pub use cuttable::{Cut, Cutter};
pub use engine::Engine;
pub use error::{CsgError, DegenerateInput, InitError, Result};
pub use ingest::{Ingestor, validate};
pub use plane::{Plane3D, PlaneSide, newell_normal};
pub use polygon::{Polygon, Solid};
pub use runtime::{Runtime, init, intersect, load_config, runtime, subtract, union};
pub use transform::Transform;
