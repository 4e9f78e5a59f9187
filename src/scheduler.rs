//! Dynamic assignment of tiles to workers
//!
//! Workers do not get a fixed share of the tiles. Instead, whenever a worker
//! is ready, it claims the next unclaimed tile index from a shared counter.
//! Tiles are thus claimed in increasing order, even though the order in which
//! they are processed and finished is unpredictable. Claiming in order is what
//! makes the lookback deadlock-free: by the time a worker waits on a
//! predecessor, that predecessor is owned by a worker that is running.

use crate::thread::ForkJoin;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared source of tile indices
#[derive(Debug)]
pub struct TileCounter {
    /// Next tile index to be handed out
    ///
    /// This is 64-bit so that workers polling past the end cannot wrap it
    /// around, while tile indices themselves are 32-bit.
    ///
    next: CachePadded<AtomicU64>,

    /// Number of tiles to be handed out
    tile_count: u32,
}
//
impl TileCounter {
    /// Prepare to hand out tiles `0..tile_count`
    pub fn new(tile_count: u32) -> Self {
        Self {
            next: CachePadded::new(AtomicU64::new(0)),
            tile_count,
        }
    }

    /// Claim the next tile, if any is left
    ///
    /// Every index is handed out at most once per counter.
    ///
    pub fn claim(&self) -> Option<TileClaim> {
        // Claiming does not publish anything, synchronization goes through
        // the tile status table.
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < u64::from(self.tile_count)).then(|| TileClaim {
            index: index as u32,
        })
    }

    /// Number of tiles handed out so far
    pub fn claimed(&self) -> u32 {
        self.next
            .load(Ordering::Relaxed)
            .min(u64::from(self.tile_count)) as u32
    }

    /// Number of tiles to be handed out in total
    pub fn tile_count(&self) -> u32 {
        self.tile_count
    }
}

/// Exclusive right to process one tile
///
/// Only the `TileCounter` can create claims, and they cannot be cloned, so the
/// holder of a claim is the only one who can publish that tile's status.
///
#[derive(Debug, Eq, PartialEq)]
pub struct TileClaim {
    index: u32,
}
//
impl TileClaim {
    /// Index of the claimed tile
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Process tiles `0..tile_count` on an executor
///
/// Workers keep claiming tiles until none is left, so the executor may use
/// any number of workers between 1 and `tile_count`. Returns once every tile
/// has been processed.
///
pub fn for_each_tile(
    executor: &(impl ForkJoin + ?Sized),
    tile_count: u32,
    process: impl Fn(TileClaim) + Sync,
) {
    let counter = TileCounter::new(tile_count);
    executor.fork_join(tile_count, &|| {
        while let Some(claim) = counter.claim() {
            log::trace!(
                "{:?} claimed tile {}",
                std::thread::current().id(),
                claim.index()
            );
            process(claim);
        }
    });
    debug_assert_eq!(counter.claimed(), tile_count);
}
