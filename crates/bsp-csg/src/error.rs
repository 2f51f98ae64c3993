//! Error types for the boolean engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a boolean call.
///
/// Input problems and resource exhaustion are returned without partial
/// output. `InvariantViolation` means the engine itself produced something
/// it must never produce; the call is aborted instead of emitting corrupt
/// geometry.
#[derive(Debug, Error)]
pub enum CsgError {
    #[error("engine runtime unavailable: {0}")]
    Initialization(#[from] InitError),

    #[error(
        "arena allocation of {requested_bytes} bytes failed ({live_bytes} bytes live, limit {limit:?})"
    )]
    AllocationFailure {
        requested_bytes: usize,
        live_bytes: usize,
        limit: Option<usize>,
    },

    #[error("degenerate input: {0}")]
    DegenerateInput(#[from] DegenerateInput),

    #[error("internal invariant violated: {context}")]
    InvariantViolation { context: String },
}

impl CsgError {
    pub(crate) fn invariant(context: impl Into<String>) -> Self {
        CsgError::InvariantViolation {
            context: context.into(),
        }
    }
}

/// Reasons an operand is rejected before tree insertion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegenerateInput {
    #[error("no operands given")]
    NoOperands,

    #[error("{count} operands given, at most {max} are supported")]
    TooManyOperands { count: usize, max: usize },

    #[error("polygon {polygon} of operand {operand} has {count} vertices, at least 3 are required")]
    TooFewVertices {
        operand: usize,
        polygon: usize,
        count: usize,
    },

    #[error("polygon {polygon} of operand {operand} has a non-finite coordinate")]
    NonFiniteCoordinate { operand: usize, polygon: usize },

    #[error(
        "polygon {polygon} of operand {operand} is not planar (vertex {vertex} is {distance} from its plane)"
    )]
    NonPlanarPolygon {
        operand: usize,
        polygon: usize,
        vertex: usize,
        distance: f64,
    },

    #[error("polygon {polygon} of operand {operand} has an unusable plane equation")]
    InvalidPlane { operand: usize, polygon: usize },

    #[error("operand {operand} has a non-finite or projective transform")]
    InvalidTransform { operand: usize },

    #[error("polygon {polygon} of operand {operand} has a plane equation opposing its winding")]
    PlaneOpposesWinding { operand: usize, polygon: usize },

    #[error("precision exponent {exponent} is outside {min}..={max}")]
    InvalidPrecision { exponent: i32, min: i32, max: i32 },

    #[error("polygon {polygon} of operand {operand} leaves the precision grid")]
    CoordinateOutOfRange { operand: usize, polygon: usize },

    #[error("every polygon of operand {operand} collapsed on the precision grid")]
    CollapsedOperand { operand: usize },
}

/// Failure to bring up the process-wide engine runtime.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("engine runtime has not been initialized")]
    NotInitialized,

    #[error("cannot read engine resource {path:?}: {source}")]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid engine configuration in {path:?}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("precision exponent {exponent} in {path:?} is out of range")]
    InvalidPrecision { path: PathBuf, exponent: i32 },
}

pub type Result<T, E = CsgError> = std::result::Result<T, E>;
