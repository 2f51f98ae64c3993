//! Engine configuration and the precision model.

use serde::{Deserialize, Serialize};

/// Default precision exponent: coordinates closer than `2^-10` are equal.
pub const DEFAULT_PRECISION: i32 = -10;

/// A power-of-two tolerance, stored as its exponent.
///
/// Two coordinates, or a point and a plane, closer than `2^exponent` are
/// treated as coincident. Ingested coordinates are snapped to the grid of
/// multiples of the same epsilon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precision(i32);

impl Precision {
    /// Smallest exponent whose epsilon is a normal `f64`.
    pub const MIN_EXPONENT: i32 = f64::MIN_EXP - 1;
    /// Largest exponent whose epsilon is finite.
    pub const MAX_EXPONENT: i32 = f64::MAX_EXP - 1;

    #[inline]
    pub const fn new(exponent: i32) -> Self {
        Self(exponent)
    }

    #[inline]
    pub const fn exponent(self) -> i32 {
        self.0
    }

    /// Returns `true` if the epsilon is a finite, normal, positive number.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= Self::MIN_EXPONENT && self.0 <= Self::MAX_EXPONENT
    }

    /// The tolerance `2^exponent`.
    #[inline]
    pub fn epsilon(self) -> f64 {
        2f64.powi(self.0)
    }

    /// Snaps a coordinate to the nearest multiple of the epsilon.
    ///
    /// Ties go to the even multiple, so a value exactly half a grid step
    /// away from two grid points always lands on the same one.
    #[inline]
    pub fn quantize(self, value: f64) -> f64 {
        let eps = self.epsilon();
        (value / eps).round_ties_even() * eps
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self(DEFAULT_PRECISION)
    }
}

impl From<i32> for Precision {
    fn from(exponent: i32) -> Self {
        Self(exponent)
    }
}

/// Settings shared by every call made through one [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Precision used when a call does not pass its own.
    pub precision: Precision,
    /// Upper bound on live arena bytes within a single call.
    pub arena_limit_bytes: Option<usize>,
    /// Initial vertex capacity of the per-operand staging buffer.
    pub staging_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precision: Precision::default(),
            arena_limit_bytes: None,
            staging_capacity: 64,
        }
    }
}
