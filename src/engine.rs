//! Single-pass decoupled-lookback driver, and the `Engine` front-end that
//! every algorithm of this crate goes through

use crate::{
    baseline,
    error::{Error, Result},
    op::{AssociativeOp, TileValue},
    scheduler::for_each_tile,
    status::TileStatusTable,
    thread::{ForkJoin, Rayon},
    tiling::{effective_tile_count, range_for_tile},
};
use serde::Deserialize;
use std::{num::NonZeroU32, ops::Range};

/// Tile-local part of an algorithm built on a prefix aggregate
///
/// Each tile goes through two phases:
///
/// - `reduce` computes the aggregate of the tile's own elements, along with
///   any tile-local state that the second phase needs.
/// - `apply` receives the aggregate of every element before the tile, which
///   is `None` for tile 0, and produces the tile's final output.
///
/// Between the two phases, the driving strategy figures out the predecessor
/// aggregate. `apply` is called exactly once per tile, after `reduce`, on the
/// same tile range, but possibly on a different thread.
///
pub trait TileKernel: Sync {
    /// Aggregate type
    type Value: TileValue;

    /// Operator combining aggregates
    type Op: AssociativeOp<Self::Value>;

    /// State carried over from `reduce` to `apply`
    type Local: Send;

    /// Number of input elements
    fn len(&self) -> usize;

    /// Operator combining aggregates
    fn op(&self) -> &Self::Op;

    /// First phase: aggregate the tile's elements
    fn reduce(&self, tile: u32, range: Range<usize>) -> (Self::Value, Self::Local);

    /// Second phase: finish the tile given the aggregate of its predecessors
    fn apply(
        &self,
        tile: u32,
        range: Range<usize>,
        predecessor: Option<Self::Value>,
        local: Self::Local,
    );
}

/// Run a kernel over every tile of `table` using decoupled lookback
///
/// `table` must be freshly created, with one descriptor per tile. On return,
/// every tile is `Cumulative` and `table.aggregate()` is the aggregate of the
/// whole input. If any tile panics, other tiles unwind as well and the panic
/// propagates to the caller through the executor.
///
pub fn decoupled_lookback<K: TileKernel>(
    kernel: &K,
    table: &TileStatusTable<K::Value>,
    executor: &(impl ForkJoin + ?Sized),
) {
    let tile_count = table.len();
    let len = kernel.len();
    for_each_tile(executor, tile_count, |claim| {
        let tile = claim.index();
        let range = range_for_tile(len, tile, tile_count);
        let _guard = AbandonOnPanic { table, tile };

        let (local, state) = kernel.reduce(tile, range.clone());
        let prefix = table.set_local_prefix(claim, local);
        let predecessor = table.resolve_predecessor_prefix(prefix, kernel.op());
        kernel.apply(tile, range, predecessor, state);
    });
}

/// Marks a tile as abandoned if the worker processing it panics
struct AbandonOnPanic<'table, T: TileValue> {
    table: &'table TileStatusTable<T>,
    tile: u32,
}
//
impl<T: TileValue> Drop for AbandonOnPanic<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::debug!(
                "{:?} is panicking while processing tile {}",
                std::thread::current().id(),
                self.tile
            );
            self.table.abandon(self.tile);
        }
    }
}

/// Way of propagating aggregates across tiles
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Single pass, each tile looks back at its predecessors' status
    #[default]
    DecoupledLookback,

    /// Reduce every tile, scan the tile aggregates sequentially, then apply
    /// every tile, with a barrier between each phase
    UpsweepDownsweep,
}

/// Tiled prefix aggregate engine
///
/// Bundles the tile count, the aggregate propagation strategy and the
/// fork-join substrate that the algorithms of this crate run with.
///
#[derive(Clone, Debug)]
pub struct Engine<E = Rayon> {
    tile_count: NonZeroU32,
    strategy: Strategy,
    executor: E,
}
//
impl Engine {
    /// Decoupled lookback on the global rayon thread pool
    pub fn new(tile_count: u32) -> Result<Self> {
        Self::with_executor(tile_count, Rayon)
    }
}
//
impl<E: ForkJoin> Engine<E> {
    /// Decoupled lookback on a custom executor
    pub fn with_executor(tile_count: u32, executor: E) -> Result<Self> {
        let tile_count = NonZeroU32::new(tile_count).ok_or(Error::ZeroTiles)?;
        Ok(Self {
            tile_count,
            strategy: Strategy::default(),
            executor,
        })
    }

    /// Switch to another propagation strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Number of tiles the input is split into
    pub fn tile_count(&self) -> u32 {
        self.tile_count.get()
    }

    /// Aggregate propagation strategy
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Underlying fork-join substrate
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run a kernel over every tile, return the aggregate of the whole input
    ///
    /// Tiles that would lie past the end of the input are not scheduled.
    ///
    pub fn run<K: TileKernel>(&self, kernel: &K) -> K::Value {
        let tile_count = effective_tile_count(kernel.len(), self.tile_count());
        log::debug!(
            "Running {:?} over {} elements in {tile_count} tiles",
            self.strategy,
            kernel.len()
        );
        let aggregate = match self.strategy {
            Strategy::DecoupledLookback => {
                let table = TileStatusTable::new(tile_count, kernel.op().identity());
                decoupled_lookback(kernel, &table, &self.executor);
                table
                    .aggregate()
                    .unwrap_or_else(|| unreachable!("last tile was not resolved"))
            }
            Strategy::UpsweepDownsweep => {
                baseline::upsweep_downsweep(kernel, tile_count, &self.executor)
            }
        };
        log::debug!("Done running {:?}", self.strategy);
        aggregate
    }
}
