//! The boolean engine: one call in, one solid out.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::arena::{Arena, ArenaCounters, ArenaStats, BufferKind};
use crate::boolean::{self, BoolOp};
use crate::bsp::{BspTree, MAX_OPERANDS, OperandSet};
use crate::config::{EngineConfig, Precision};
use crate::cuttable::Cutter;
use crate::error::{DegenerateInput, Result};
use crate::extract;
use crate::ingest::{self, Ingestor};
use crate::polygon::Solid;

/// Evaluates boolean operations on solids.
///
/// An engine holds only its configuration and shared counters. Every call
/// builds its tree and buffers in a fresh arena and releases all of it
/// before returning, so one engine can serve any number of threads.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    counters: Arc<ArenaCounters>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            counters: Arc::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The space inside every solid.
    pub fn intersect(&self, precision: Option<Precision>, solids: &[Solid]) -> Result<Solid> {
        self.evaluate(BoolOp::Intersection, precision, solids)
    }

    /// The space inside any solid.
    pub fn union(&self, precision: Option<Precision>, solids: &[Solid]) -> Result<Solid> {
        self.evaluate(BoolOp::Union, precision, solids)
    }

    /// The space inside the first solid and outside all the others.
    pub fn subtract(&self, precision: Option<Precision>, solids: &[Solid]) -> Result<Solid> {
        self.evaluate(BoolOp::Difference, precision, solids)
    }

    /// Runs `op` over `solids`, falling back to the configured precision.
    #[instrument(skip(self, solids), fields(operands = solids.len()))]
    pub fn evaluate(&self, op: BoolOp, precision: Option<Precision>, solids: &[Solid]) -> Result<Solid> {
        if solids.is_empty() {
            return Err(DegenerateInput::NoOperands.into());
        }
        if solids.len() > MAX_OPERANDS {
            return Err(DegenerateInput::TooManyOperands {
                count: solids.len(),
                max: MAX_OPERANDS,
            }
            .into());
        }
        let precision = precision.unwrap_or(self.config.precision);
        if !precision.is_valid() {
            return Err(DegenerateInput::InvalidPrecision {
                exponent: precision.exponent(),
                min: Precision::MIN_EXPONENT,
                max: Precision::MAX_EXPONENT,
            }
            .into());
        }
        for (operand, solid) in solids.iter().enumerate() {
            ingest::validate(operand, solid, precision)?;
        }

        let mut arena = Arena::new(self.config.arena_limit_bytes, Arc::clone(&self.counters));
        let result = self.run(&mut arena, op, precision, solids);
        if result.is_ok() && arena.live_buffers() > 0 {
            debug!(buffers = arena.live_buffers(), "buffers left for the arena to release");
        }
        drop(arena);

        match &result {
            Ok(solid) => debug!(polygons = solid.polygons.len(), "boolean finished"),
            Err(error) => debug!(%error, "boolean failed"),
        }
        result
    }

    /// Counters accumulated over every call made through this engine.
    pub fn arena_stats(&self) -> ArenaStats {
        self.counters.snapshot()
    }

    fn run(&self, arena: &mut Arena, op: BoolOp, precision: Precision, solids: &[Solid]) -> Result<Solid> {
        let mut flips = arena.allocate(BufferKind::Ids, solids.len())?;
        for operand in 0..solids.len() {
            flips = arena.push_id(flips, u32::from(op.flips(operand)))?;
        }

        let mut cutter = Cutter::new(arena, precision.epsilon())?;
        let mut ingestor = Ingestor::new(arena, precision, self.config.staging_capacity)?;
        let mut tree = BspTree::new();
        for (operand, solid) in solids.iter().enumerate() {
            let flip = arena.ids(flips)?[operand] != 0;
            ingestor.ingest(arena, &mut tree, &mut cutter, operand, flip, solid)?;
        }
        ingestor.release(arena)?;

        tree.refresh_operands();
        debug!(
            fragments = tree.fragment_count(),
            nodes = tree.node_count(),
            depth = tree.depth(),
            live_bytes = arena.live_bytes(),
            "tree built"
        );

        let flipped: OperandSet = arena
            .ids(flips)?
            .iter()
            .enumerate()
            .filter(|&(_, &flip)| flip != 0)
            .map(|(operand, _)| operand)
            .collect();
        let kept = boolean::evaluate(&tree, arena, &mut cutter, op, solids.len(), flipped)?;
        let solid = extract::extract(arena, kept, precision.epsilon())?.with_color(solids[0].color);

        tree.release(arena)?;
        cutter.release(arena)?;
        arena.release(flips)?;
        Ok(solid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use crate::primitives::cuboid;
    use approx::assert_relative_eq;

    fn make_engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    #[test]
    fn rejects_empty_operand_list() {
        let err = make_engine().union(None, &[]).unwrap_err();
        assert!(matches!(err, CsgError::DegenerateInput(DegenerateInput::NoOperands)));
    }

    #[test]
    fn rejects_too_many_operands() {
        let solids = vec![Solid::empty(); MAX_OPERANDS + 1];
        let err = make_engine().union(None, &solids).unwrap_err();
        assert!(matches!(
            err,
            CsgError::DegenerateInput(DegenerateInput::TooManyOperands { count: 65, max: 64 })
        ));
    }

    #[test]
    fn rejects_precision_out_of_range() {
        let cube = [cuboid([0.0; 3], [1.0; 3])];
        for exponent in [-1100, 1100] {
            let err = make_engine().union(Some(Precision::new(exponent)), &cube).unwrap_err();
            assert!(matches!(
                err,
                CsgError::DegenerateInput(DegenerateInput::InvalidPrecision { exponent: e, .. }) if e == exponent
            ));
        }
        let coarse = make_engine().union(Some(Precision::new(60)), &cube).unwrap_err();
        assert!(matches!(
            coarse,
            CsgError::DegenerateInput(DegenerateInput::CollapsedOperand { operand: 0 })
        ));
    }

    #[test]
    fn result_takes_the_first_color() {
        let red = Some([1.0, 0.0, 0.0, 1.0]);
        let solids = [
            cuboid([0.0; 3], [1.0; 3]).with_color(red),
            cuboid([0.5; 3], [1.5; 3]).with_color(Some([0.0, 0.0, 1.0, 1.0])),
        ];
        let engine = make_engine();
        assert_eq!(engine.intersect(None, &solids).unwrap().color, red);
        assert_eq!(engine.subtract(None, &solids).unwrap().color, red);

        let uncolored = [cuboid([0.0; 3], [1.0; 3]), solids[1].clone()];
        assert_eq!(engine.union(None, &uncolored).unwrap().color, None);
    }

    #[test]
    fn single_operand_intersection_is_identity() {
        let engine = make_engine();
        let cube = cuboid([0.0; 3], [1.0; 3]);
        let result = engine.intersect(None, std::slice::from_ref(&cube)).unwrap();
        assert_eq!(result.polygons.len(), 6);
        assert_relative_eq!(result.volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn overlapping_cubes_volumes() {
        let engine = make_engine();
        let a = cuboid([0.0; 3], [1.0; 3]);
        let b = cuboid([0.5; 3], [1.5; 3]);
        let solids = [a, b];
        assert_relative_eq!(engine.intersect(None, &solids).unwrap().volume(), 0.125, epsilon = 1e-9);
        assert_relative_eq!(engine.union(None, &solids).unwrap().volume(), 1.875, epsilon = 1e-9);
        assert_relative_eq!(engine.subtract(None, &solids).unwrap().volume(), 0.875, epsilon = 1e-9);
    }

    #[test]
    fn counters_balance_after_each_call() {
        let engine = make_engine();
        let solids = [cuboid([0.0; 3], [1.0; 3]), cuboid([0.5; 3], [1.5; 3])];
        engine.union(None, &solids).unwrap();
        let stats = engine.arena_stats();
        assert!(stats.allocated_bytes > 0);
        assert_eq!(stats.outstanding_bytes(), 0);
        assert_eq!(stats.allocations, stats.releases);
    }

    #[test]
    fn arena_limit_aborts_cleanly() {
        let engine = Engine::new(EngineConfig {
            arena_limit_bytes: Some(2048),
            ..EngineConfig::default()
        });
        let solids = [cuboid([0.0; 3], [1.0; 3]), cuboid([0.5; 3], [1.5; 3])];
        let err = engine.intersect(None, &solids).unwrap_err();
        assert!(matches!(err, CsgError::AllocationFailure { limit: Some(2048), .. }));
        assert_eq!(engine.arena_stats().outstanding_bytes(), 0);
    }
}
