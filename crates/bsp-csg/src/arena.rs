//! Growable numeric buffers addressed by generational handles.
//!
//! Every boolean call owns one [`Arena`]. Vertex loops, the per-split
//! ratio scratch and id tables all live here, so the call's memory is
//! accounted in one place and released as a unit when the arena drops,
//! on success and on every error path alike.
//!
//! Resizing moves a buffer to a new handle and retires the old one. A
//! retired handle is detected (not silently aliased), which is why callers
//! must always continue with the handle a growing operation returns.

use std::mem::size_of;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Point3;
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace};

use crate::error::{CsgError, Result};
use crate::exact::{DoubleDouble, Ratio};

new_key_type! {
    /// Handle to one buffer in an [`Arena`].
    pub struct BufferId;
}

/// Capacities are rounded up to a multiple of this many elements.
const BLOCK_ELEMENTS: usize = 16;

/// What a buffer holds, which fixes its element stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// `x, y, z` vertex coordinates.
    Coords,
    /// Crossing ratios: numerator and denominator as double-doubles.
    Ratios,
    /// Integer ids.
    Ids,
}

impl BufferKind {
    #[inline]
    const fn stride(self) -> usize {
        match self {
            BufferKind::Coords => 3,
            BufferKind::Ratios => 4,
            BufferKind::Ids => 1,
        }
    }

    #[inline]
    const fn scalar_bytes(self) -> usize {
        match self {
            BufferKind::Coords | BufferKind::Ratios => size_of::<f64>(),
            BufferKind::Ids => size_of::<u32>(),
        }
    }

    #[inline]
    const fn element_bytes(self) -> usize {
        self.stride() * self.scalar_bytes()
    }
}

#[derive(Debug)]
enum Storage {
    Float(Vec<f64>),
    Int(Vec<u32>),
}

#[derive(Debug)]
struct Buffer {
    kind: BufferKind,
    storage: Storage,
    /// Capacity in elements; the storage is always fully allocated.
    capacity: usize,
    /// Logical length in elements.
    len: usize,
}

impl Buffer {
    #[inline]
    fn bytes(&self) -> usize {
        self.capacity * self.kind.element_bytes()
    }
}

/// Byte and buffer counters shared by every arena of one engine.
#[derive(Debug, Default)]
pub struct ArenaCounters {
    allocated_bytes: AtomicU64,
    released_bytes: AtomicU64,
    allocations: AtomicU64,
    releases: AtomicU64,
    resizes: AtomicU64,
    peak_live_bytes: AtomicU64,
}

impl ArenaCounters {
    pub fn snapshot(&self) -> ArenaStats {
        ArenaStats {
            allocated_bytes: self.allocated_bytes.load(Ordering::Acquire),
            released_bytes: self.released_bytes.load(Ordering::Acquire),
            allocations: self.allocations.load(Ordering::Acquire),
            releases: self.releases.load(Ordering::Acquire),
            resizes: self.resizes.load(Ordering::Acquire),
            peak_live_bytes: self.peak_live_bytes.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy of [`ArenaCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub allocated_bytes: u64,
    pub released_bytes: u64,
    pub allocations: u64,
    pub releases: u64,
    pub resizes: u64,
    /// Largest live byte count seen by a single arena.
    pub peak_live_bytes: u64,
}

impl ArenaStats {
    /// Bytes allocated but not yet released.
    pub fn outstanding_bytes(&self) -> u64 {
        self.allocated_bytes - self.released_bytes
    }
}

/// A per-call pool of typed, growable buffers.
#[derive(Debug)]
pub struct Arena {
    buffers: SlotMap<BufferId, Buffer>,
    limit: Option<usize>,
    live_bytes: usize,
    counters: Arc<ArenaCounters>,
}

impl Arena {
    /// Creates an arena that reports into `counters` and refuses to hold
    /// more than `limit` live bytes.
    pub fn new(limit: Option<usize>, counters: Arc<ArenaCounters>) -> Self {
        Self {
            buffers: SlotMap::with_key(),
            limit,
            live_bytes: 0,
            counters,
        }
    }

    /// Creates an arena with no limit and private counters.
    pub fn unbounded() -> Self {
        Self::new(None, Arc::default())
    }

    /// Bytes currently held by live buffers.
    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Number of live buffers.
    #[inline]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Allocates an empty buffer able to hold at least `capacity` elements.
    pub fn allocate(&mut self, kind: BufferKind, capacity: usize) -> Result<BufferId> {
        let buffer = self.reserve(kind, round_capacity(capacity))?;
        Ok(self.buffers.insert(buffer))
    }

    /// Grows a buffer to hold at least `capacity` elements.
    ///
    /// The contents move to a new allocation under a new handle; the old
    /// handle is retired. When the buffer is already large enough the same
    /// handle is returned.
    pub fn resize(&mut self, id: BufferId, capacity: usize) -> Result<BufferId> {
        let (kind, current, len) = {
            let buffer = self.buffer(id)?;
            (buffer.kind, buffer.capacity, buffer.len)
        };
        if capacity <= current {
            return Ok(id);
        }

        let new_capacity = round_capacity(capacity.max(current * 2));
        let mut grown = self.reserve(kind, new_capacity)?;
        let old = self
            .buffers
            .remove(id)
            .ok_or_else(|| CsgError::invariant("buffer vanished during resize"))?;
        let used = len * kind.stride();
        match (&mut grown.storage, &old.storage) {
            (Storage::Float(dst), Storage::Float(src)) => dst[..used].copy_from_slice(&src[..used]),
            (Storage::Int(dst), Storage::Int(src)) => dst[..used].copy_from_slice(&src[..used]),
            _ => return Err(CsgError::invariant("buffer storage does not match its kind")),
        }
        grown.len = len;
        self.retire(old);
        self.counters.resizes.fetch_add(1, Ordering::Relaxed);
        trace!(?kind, from = current, to = new_capacity, "buffer resized");
        Ok(self.buffers.insert(grown))
    }

    /// Releases a buffer. Releasing a retired handle is an invariant violation.
    pub fn release(&mut self, id: BufferId) -> Result<()> {
        let buffer = self
            .buffers
            .remove(id)
            .ok_or_else(|| CsgError::invariant("release of a stale buffer handle"))?;
        self.retire(buffer);
        Ok(())
    }

    /// Logical length of a buffer, in elements.
    pub fn len(&self, id: BufferId) -> Result<usize> {
        Ok(self.buffer(id)?.len)
    }

    /// Capacity of a buffer, in elements.
    pub fn capacity(&self, id: BufferId) -> Result<usize> {
        Ok(self.buffer(id)?.capacity)
    }

    /// Resets a buffer's logical length without releasing its storage.
    pub fn clear(&mut self, id: BufferId) -> Result<()> {
        self.buffer_mut(id)?.len = 0;
        Ok(())
    }

    /// Shortens a buffer's logical length; longer lengths are ignored.
    pub fn truncate(&mut self, id: BufferId, len: usize) -> Result<()> {
        let buffer = self.buffer_mut(id)?;
        buffer.len = buffer.len.min(len);
        Ok(())
    }

    /// Appends a vertex, growing the buffer when full.
    ///
    /// Returns the handle to keep using, which differs from `id` whenever
    /// the buffer had to grow.
    pub fn push_point(&mut self, id: BufferId, point: &Point3<f64>) -> Result<BufferId> {
        let id = self.ensure_room(id, BufferKind::Coords)?;
        self.push_floats(id, &[point.x, point.y, point.z])?;
        Ok(id)
    }

    /// Appends a crossing ratio, growing the buffer when full.
    pub fn push_ratio(&mut self, id: BufferId, ratio: &Ratio) -> Result<BufferId> {
        let id = self.ensure_room(id, BufferKind::Ratios)?;
        self.push_floats(
            id,
            &[ratio.num.hi(), ratio.num.lo(), ratio.den.hi(), ratio.den.lo()],
        )?;
        Ok(id)
    }

    /// Appends an id, growing the buffer when full.
    pub fn push_id(&mut self, id: BufferId, value: u32) -> Result<BufferId> {
        let id = self.ensure_room(id, BufferKind::Ids)?;
        let buffer = self.buffer_mut(id)?;
        let at = buffer.len;
        match &mut buffer.storage {
            Storage::Int(data) => data[at] = value,
            Storage::Float(_) => return Err(CsgError::invariant("id pushed into a float buffer")),
        }
        buffer.len += 1;
        Ok(id)
    }

    /// Reads vertex `index` of a coordinate buffer.
    pub fn point(&self, id: BufferId, index: usize) -> Result<Point3<f64>> {
        let c = self.element(id, BufferKind::Coords, index)?;
        Ok(Point3::new(c[0], c[1], c[2]))
    }

    /// Copies every vertex of a coordinate buffer into `out`.
    pub fn read_points(&self, id: BufferId, out: &mut Vec<Point3<f64>>) -> Result<()> {
        out.clear();
        out.extend(
            self.floats(id, BufferKind::Coords)?
                .chunks_exact(3)
                .map(|c| Point3::new(c[0], c[1], c[2])),
        );
        Ok(())
    }

    /// Reads ratio `index` of a ratio buffer.
    pub fn ratio(&self, id: BufferId, index: usize) -> Result<Ratio> {
        let r = self.element(id, BufferKind::Ratios, index)?;
        Ok(Ratio {
            num: DoubleDouble::from_parts(r[0], r[1]),
            den: DoubleDouble::from_parts(r[2], r[3]),
        })
    }

    /// The live ids of an id buffer.
    pub fn ids(&self, id: BufferId) -> Result<&[u32]> {
        let buffer = self.typed(id, BufferKind::Ids)?;
        match &buffer.storage {
            Storage::Int(data) => Ok(&data[..buffer.len]),
            Storage::Float(_) => Err(CsgError::invariant("id buffer backed by float storage")),
        }
    }

    /// Copies a coordinate buffer into a new, exactly-sized buffer.
    pub fn duplicate(&mut self, id: BufferId) -> Result<BufferId> {
        let (kind, len) = {
            let buffer = self.buffer(id)?;
            (buffer.kind, buffer.len)
        };
        let copy = self.allocate(kind, len)?;
        let used = len * kind.stride();
        let src = match &self.buffer(id)?.storage {
            Storage::Float(data) => Storage::Float(data[..used].to_vec()),
            Storage::Int(data) => Storage::Int(data[..used].to_vec()),
        };
        let target = self.buffer_mut(copy)?;
        match (&mut target.storage, src) {
            (Storage::Float(dst), Storage::Float(src)) => dst[..used].copy_from_slice(&src),
            (Storage::Int(dst), Storage::Int(src)) => dst[..used].copy_from_slice(&src),
            _ => return Err(CsgError::invariant("buffer storage does not match its kind")),
        }
        target.len = len;
        Ok(copy)
    }

    fn reserve(&mut self, kind: BufferKind, capacity: usize) -> Result<Buffer> {
        let bytes = capacity * kind.element_bytes();
        let failure = |live_bytes| CsgError::AllocationFailure {
            requested_bytes: bytes,
            live_bytes,
            limit: self.limit,
        };
        if let Some(limit) = self.limit {
            if self.live_bytes + bytes > limit {
                return Err(failure(self.live_bytes));
            }
        }

        let scalars = capacity * kind.stride();
        let storage = match kind {
            BufferKind::Coords | BufferKind::Ratios => {
                let mut data = Vec::new();
                data.try_reserve_exact(scalars)
                    .map_err(|_| failure(self.live_bytes))?;
                data.resize(scalars, 0.0);
                Storage::Float(data)
            }
            BufferKind::Ids => {
                let mut data = Vec::new();
                data.try_reserve_exact(scalars)
                    .map_err(|_| failure(self.live_bytes))?;
                data.resize(scalars, 0);
                Storage::Int(data)
            }
        };

        self.live_bytes += bytes;
        self.counters
            .allocated_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        self.counters
            .peak_live_bytes
            .fetch_max(self.live_bytes as u64, Ordering::Relaxed);

        Ok(Buffer {
            kind,
            storage,
            capacity,
            len: 0,
        })
    }

    fn retire(&mut self, buffer: Buffer) {
        let bytes = buffer.bytes();
        self.live_bytes -= bytes;
        self.counters
            .released_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.counters.releases.fetch_add(1, Ordering::Relaxed);
    }

    fn ensure_room(&mut self, id: BufferId, kind: BufferKind) -> Result<BufferId> {
        let buffer = self.typed(id, kind)?;
        if buffer.len < buffer.capacity {
            return Ok(id);
        }
        let wanted = buffer.len + 1;
        self.resize(id, wanted)
    }

    fn push_floats(&mut self, id: BufferId, values: &[f64]) -> Result<()> {
        let buffer = self.buffer_mut(id)?;
        let start = buffer.len * buffer.kind.stride();
        match &mut buffer.storage {
            Storage::Float(data) => data[start..start + values.len()].copy_from_slice(values),
            Storage::Int(_) => return Err(CsgError::invariant("floats pushed into an id buffer")),
        }
        buffer.len += 1;
        Ok(())
    }

    fn floats(&self, id: BufferId, kind: BufferKind) -> Result<&[f64]> {
        let buffer = self.typed(id, kind)?;
        match &buffer.storage {
            Storage::Float(data) => Ok(&data[..buffer.len * kind.stride()]),
            Storage::Int(_) => Err(CsgError::invariant("float buffer backed by id storage")),
        }
    }

    fn element(&self, id: BufferId, kind: BufferKind, index: usize) -> Result<&[f64]> {
        let stride = kind.stride();
        let data = self.floats(id, kind)?;
        data.get(index * stride..(index + 1) * stride)
            .ok_or_else(|| CsgError::invariant(format!("buffer read past its length at {index}")))
    }

    fn typed(&self, id: BufferId, kind: BufferKind) -> Result<&Buffer> {
        let buffer = self.buffer(id)?;
        if buffer.kind != kind {
            return Err(CsgError::invariant(format!(
                "expected a {kind:?} buffer, found {:?}",
                buffer.kind
            )));
        }
        Ok(buffer)
    }

    fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id)
            .ok_or_else(|| CsgError::invariant("use of a stale buffer handle"))
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut Buffer> {
        self.buffers
            .get_mut(id)
            .ok_or_else(|| CsgError::invariant("use of a stale buffer handle"))
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let remaining = self.buffers.len();
        let bytes = self.live_bytes;
        for (_, buffer) in self.buffers.drain() {
            let bytes = buffer.bytes();
            self.counters
                .released_bytes
                .fetch_add(bytes as u64, Ordering::Relaxed);
            self.counters.releases.fetch_add(1, Ordering::Relaxed);
        }
        self.live_bytes = 0;
        if remaining > 0 {
            debug!(buffers = remaining, bytes, "arena released outstanding buffers");
        }
    }
}

#[inline]
fn round_capacity(capacity: usize) -> usize {
    capacity.max(1).div_ceil(BLOCK_ELEMENTS) * BLOCK_ELEMENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_rounds_to_block() {
        let mut arena = Arena::unbounded();
        let id = arena.allocate(BufferKind::Coords, 5).unwrap();
        assert_eq!(arena.capacity(id).unwrap(), 16);
        assert_eq!(arena.len(id).unwrap(), 0);
        assert_eq!(arena.live_bytes(), 16 * 3 * 8);
    }

    #[test]
    fn push_grows_and_retires_old_handle() {
        let mut arena = Arena::unbounded();
        let first = arena.allocate(BufferKind::Coords, 1).unwrap();
        let mut id = first;
        for i in 0..40 {
            id = arena.push_point(id, &Point3::new(i as f64, 0.0, 0.0)).unwrap();
        }
        assert_ne!(id, first);
        assert!(arena.len(first).is_err());
        assert_eq!(arena.len(id).unwrap(), 40);
        assert_eq!(arena.point(id, 39).unwrap(), Point3::new(39.0, 0.0, 0.0));
        // 16 -> 32 -> 64: growth at least doubles.
        assert_eq!(arena.capacity(id).unwrap(), 64);
        assert_eq!(arena.live_buffers(), 1);
    }

    #[test]
    fn resize_within_capacity_keeps_handle() {
        let mut arena = Arena::unbounded();
        let id = arena.allocate(BufferKind::Ids, 8).unwrap();
        assert_eq!(arena.resize(id, 10).unwrap(), id);
    }

    #[test]
    fn stale_handle_is_an_invariant_violation() {
        let mut arena = Arena::unbounded();
        let id = arena.allocate(BufferKind::Ids, 4).unwrap();
        arena.release(id).unwrap();
        assert!(matches!(
            arena.release(id),
            Err(CsgError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut arena = Arena::unbounded();
        let id = arena.allocate(BufferKind::Ids, 4).unwrap();
        assert!(arena.push_point(id, &Point3::origin()).is_err());
    }

    #[test]
    fn ratios_round_trip_both_halves() {
        let mut arena = Arena::unbounded();
        let id = arena.allocate(BufferKind::Ratios, 2).unwrap();
        let ratio = Ratio {
            num: DoubleDouble::from_parts(1.0, 1e-20),
            den: DoubleDouble::from_parts(3.0, -2e-19),
        };
        let id = arena.push_ratio(id, &ratio).unwrap();
        assert_eq!(arena.ratio(id, 0).unwrap(), ratio);
    }

    #[test]
    fn limit_produces_allocation_failure() {
        let mut arena = Arena::new(Some(1024), Arc::default());
        let id = arena.allocate(BufferKind::Coords, 16).unwrap();
        let err = arena.allocate(BufferKind::Coords, 64).unwrap_err();
        assert!(matches!(err, CsgError::AllocationFailure { limit: Some(1024), .. }));
        arena.release(id).unwrap();
        assert_eq!(arena.live_bytes(), 0);
    }

    #[test]
    fn drop_releases_everything() {
        let counters = Arc::new(ArenaCounters::default());
        {
            let mut arena = Arena::new(None, counters.clone());
            let mut id = arena.allocate(BufferKind::Coords, 1).unwrap();
            for _ in 0..20 {
                id = arena.push_point(id, &Point3::origin()).unwrap();
            }
            let ids = arena.allocate(BufferKind::Ids, 3).unwrap();
            arena.push_id(ids, 7).unwrap();
        }
        let stats = counters.snapshot();
        assert!(stats.allocated_bytes > 0);
        assert_eq!(stats.allocated_bytes, stats.released_bytes);
        assert_eq!(stats.allocations, stats.releases);
        assert_eq!(stats.resizes, 1);
    }

    #[test]
    fn duplicate_copies_contents() {
        let mut arena = Arena::unbounded();
        let mut id = arena.allocate(BufferKind::Coords, 3).unwrap();
        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            id = arena.push_point(id, &Point3::from(p)).unwrap();
        }
        let copy = arena.duplicate(id).unwrap();
        arena.clear(id).unwrap();
        let mut points = Vec::new();
        arena.read_points(copy, &mut points).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], Point3::new(1.0, 0.0, 0.0));
    }
}
