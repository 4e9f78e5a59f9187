//! Per-tile publication of aggregates, and the backward lookback over them

use crate::{
    op::{AssociativeOp, TileValue},
    scheduler::TileClaim,
};
use atomic::{Atomic, Ordering};
use crossbeam_utils::CachePadded;
use std::sync::atomic::AtomicU32;

/// Publication state of a tile
///
/// A tile's status only ever increases, and only the worker that claimed the
/// tile may change it.
///
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum TileStatus {
    /// Nothing has been published yet
    Unavailable = 0,

    /// The aggregate of the tile's own elements is available
    LocalOnly = 1,

    /// The aggregate of all elements up to the end of the tile is available
    Cumulative = 2,

    /// The worker processing this tile panicked before finishing it
    Abandoned = 3,
}
//
impl TileStatus {
    /// Decode the content of a descriptor's status word
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Unavailable,
            1 => Self::LocalOnly,
            2 => Self::Cumulative,
            3 => Self::Abandoned,
            _ => unreachable!("invalid tile status {raw}"),
        }
    }
}

/// Shared state of one tile
struct TileDescriptor<T: TileValue> {
    /// Aggregate of the tile's own elements
    ///
    /// Written before `status` becomes `LocalOnly` or `Cumulative`, so readers
    /// that observe either with Acquire ordering also observe this.
    ///
    local: Atomic<T>,

    /// Aggregate of every element up to the end of the tile
    ///
    /// Written before `status` becomes `Cumulative`.
    ///
    cumulative: Atomic<T>,

    /// `TileStatus` as a futex word, so that resolvers can block on it
    status: AtomicU32,
}

/// Status descriptors of every tile of one engine invocation
///
/// The table is created before scheduling, filled in by the tile workers and
/// becomes immutable once every tile is `Cumulative`. It cannot be reused for
/// another invocation.
///
pub struct TileStatusTable<T: TileValue> {
    /// Descriptors in tile order, padded so that neighbouring tiles' status
    /// words do not share a cache line
    descriptors: Box<[CachePadded<TileDescriptor<T>>]>,
}
//
impl<T: TileValue> TileStatusTable<T> {
    /// Set up a table where every tile is `Unavailable`
    ///
    /// `placeholder` fills value slots until they are published, it is never
    /// observable through the public API.
    ///
    pub fn new(tile_count: u32, placeholder: T) -> Self {
        let descriptors = (0..tile_count)
            .map(|_| {
                CachePadded::new(TileDescriptor {
                    local: Atomic::new(placeholder),
                    cumulative: Atomic::new(placeholder),
                    status: AtomicU32::new(TileStatus::Unavailable as u32),
                })
            })
            .collect();
        Self { descriptors }
    }

    /// Number of tiles
    pub fn len(&self) -> u32 {
        self.descriptors.len() as u32
    }

    /// Truth that this table tracks no tile at all
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Current status of a tile
    pub fn status(&self, tile: u32) -> TileStatus {
        TileStatus::from_raw(self.descriptor(tile).status.load(Ordering::Acquire))
    }

    /// Local aggregate of a tile, if published
    pub fn local(&self, tile: u32) -> Option<T> {
        match self.status(tile) {
            TileStatus::LocalOnly | TileStatus::Cumulative => {
                Some(self.descriptor(tile).local.load(Ordering::Relaxed))
            }
            TileStatus::Unavailable | TileStatus::Abandoned => None,
        }
    }

    /// Cumulative aggregate of a tile, if published
    pub fn cumulative(&self, tile: u32) -> Option<T> {
        match self.status(tile) {
            TileStatus::Cumulative => Some(self.descriptor(tile).cumulative.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    /// Aggregate of the whole input, once the last tile is `Cumulative`
    pub fn aggregate(&self) -> Option<T> {
        let last = self.len().checked_sub(1)?;
        self.cumulative(last)
    }

    /// Publish the aggregate of a claimed tile's own elements
    ///
    /// Tile 0 has no predecessor, so its local aggregate is also its
    /// cumulative aggregate and it becomes `Cumulative` right away. Other
    /// tiles become `LocalOnly`.
    ///
    /// Consumes the claim, so a tile can only be published once.
    ///
    pub fn set_local_prefix(&self, claim: TileClaim, local: T) -> LocalPrefix<T> {
        let tile = claim.index();
        let descriptor = self.descriptor(tile);
        descriptor.local.store(local, Ordering::Relaxed);
        if tile == 0 {
            descriptor.cumulative.store(local, Ordering::Relaxed);
            self.publish(tile, TileStatus::Cumulative);
        } else {
            self.publish(tile, TileStatus::LocalOnly);
        }
        LocalPrefix { tile, local }
    }

    /// Compute the aggregate of every tile before this one, then publish this
    /// tile's cumulative aggregate
    ///
    /// Walks backward from the previous tile, blocking on tiles that have not
    /// published anything yet and accumulating `LocalOnly` aggregates, until a
    /// `Cumulative` tile is reached. Returns `None` for tile 0, which has no
    /// predecessor and was made `Cumulative` by `set_local_prefix`.
    ///
    /// # Panics
    ///
    /// If a predecessor was abandoned by a panicking worker.
    ///
    pub fn resolve_predecessor_prefix(
        &self,
        prefix: LocalPrefix<T>,
        op: &impl AssociativeOp<T>,
    ) -> Option<T> {
        let LocalPrefix { tile, local } = prefix;
        if tile == 0 {
            return None;
        }

        // Predecessors are visited from newest to oldest, so each of them is
        // the left operand of the accumulation.
        let mut predecessor = op.identity();
        for p in (0..tile).rev() {
            let descriptor = self.descriptor(p);
            match self.wait_for_publication(p) {
                TileStatus::LocalOnly => {
                    predecessor = op.combine(descriptor.local.load(Ordering::Relaxed), predecessor);
                }
                TileStatus::Cumulative => {
                    predecessor =
                        op.combine(descriptor.cumulative.load(Ordering::Relaxed), predecessor);
                    log::trace!("Tile {tile} resolved after looking back {} tile(s)", tile - p);
                    break;
                }
                TileStatus::Abandoned => {
                    panic!("Tile {tile} cannot be resolved, predecessor tile {p} was abandoned")
                }
                TileStatus::Unavailable => unreachable!("waited for publication"),
            }
        }

        let descriptor = self.descriptor(tile);
        descriptor
            .cumulative
            .store(op.combine(predecessor, local), Ordering::Relaxed);
        self.publish(tile, TileStatus::Cumulative);
        Some(predecessor)
    }

    /// Mark a tile as never going to be finished
    ///
    /// Meant to be called by the worker owning the tile when it panics, so
    /// that successors unwind instead of waiting forever. Tiles that are
    /// already `Cumulative` are left alone, successors do not need them anymore.
    ///
    pub(crate) fn abandon(&self, tile: u32) {
        if self.status(tile) < TileStatus::Cumulative {
            log::debug!("Abandoning tile {tile}");
            self.publish(tile, TileStatus::Abandoned);
        }
    }

    /// Shared access to a tile descriptor
    fn descriptor(&self, tile: u32) -> &TileDescriptor<T> {
        &self.descriptors[tile as usize]
    }

    /// Update a tile's status, with Release ordering, and wake up the
    /// resolvers that are blocked on it
    fn publish(&self, tile: u32, status: TileStatus) {
        let word = &self.descriptor(tile).status;
        let previous = word.swap(status as u32, Ordering::Release);
        debug_assert!(
            previous < status as u32,
            "tile {tile} status regressed from {:?} to {status:?}",
            TileStatus::from_raw(previous)
        );
        log::trace!("Tile {tile} is now {status:?}");
        atomic_wait::wake_all(word);
    }

    /// Wait until a tile's status leaves `Unavailable`, with Acquire ordering
    fn wait_for_publication(&self, tile: u32) -> TileStatus {
        let word = &self.descriptor(tile).status;
        let unavailable = TileStatus::Unavailable as u32;
        loop {
            let status = word.load(Ordering::Acquire);
            if status != unavailable {
                return TileStatus::from_raw(status);
            }
            if !spin_while_unavailable(word) {
                log::trace!("Blocking until tile {tile} is published");
                atomic_wait::wait(word, unavailable);
            }
        }
    }
}

/// Proof that a tile's local aggregate was published, needed to resolve its
/// predecessors
#[derive(Debug)]
#[must_use = "tiles must be resolved for their successors to make progress"]
pub struct LocalPrefix<T> {
    /// Tile index
    tile: u32,

    /// Published local aggregate
    local: T,
}

/// Spin until a status word leaves `Unavailable`
///
/// Start with busy waiting in userspace with exponential backoff. For longer
/// waits, burn less CPU cycles by yielding to the OS. Give up after a while
/// and return `false` to let the caller block on the futex.
///
fn spin_while_unavailable(word: &AtomicU32) -> bool {
    // Tuning parameters, predecessors usually publish within microseconds
    use std::time::{Duration, Instant};
    const SPIN_ITERS: usize = 300;
    const MAX_BACKOFF: usize = 1 << 2;
    const OS_SPIN_DELAY: Duration = Duration::from_nanos(1);
    const OS_SPIN_BOUND: Duration = Duration::from_micros(20);

    let published = || word.load(Ordering::Relaxed) != TileStatus::Unavailable as u32;

    let mut backoff = 1;
    for _ in 0..SPIN_ITERS {
        if published() {
            return true;
        }
        for _ in 0..backoff {
            std::hint::spin_loop();
        }
        backoff = (2 * backoff).min(MAX_BACKOFF);
    }

    // yield_now() would be semantically more correct here but is broken on
    // Linux, where the CFS scheduler just reschedules us.
    let start = Instant::now();
    while start.elapsed() < OS_SPIN_BOUND {
        if published() {
            return true;
        }
        std::thread::sleep(OS_SPIN_DELAY);
    }
    published()
}
