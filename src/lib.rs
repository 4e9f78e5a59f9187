//! Tile-based prefix aggregates with decoupled lookback
//!
//! The input is split into tiles. Each tile reduces its own elements, then
//! looks back at the status its predecessors published to find the aggregate
//! of everything before it, then finishes its part of the output. No global
//! barrier is needed, so fast tiles never wait for slow unrelated ones.
//!
//! This one engine is instantiated as an inclusive scan, a stable stream
//! compaction and a run segmentation. Barrier-based baselines are provided
//! for comparison.
//!
//! ```
//! let mut output = [0; 4];
//! tilescan::scan(&[1, 2, 3, 4], 2, tilescan::Sum, &mut output).unwrap();
//! assert_eq!(output, [1, 3, 6, 10]);
//! ```

pub mod algo;
pub mod baseline;
pub mod config;
pub mod engine;
pub mod error;
pub mod interval;
pub mod op;
pub mod scatter;
pub mod scheduler;
pub mod status;
pub mod thread;
pub mod tiling;

pub use crate::{
    config::{Backend, Config},
    engine::{Engine, Strategy, TileKernel},
    error::{Error, Result},
    interval::{Interval, IntervalMerge},
    op::{AssociativeOp, FnOp, Sum, TileValue},
    thread::{ForkJoin, Rayon, ScopedThreads, Sequential},
};
use std::ops::Range;

/// Inclusive scan of `input` into `output` on the rayon thread pool
pub fn scan<T: TileValue>(
    input: &[T],
    tile_count: u32,
    op: impl AssociativeOp<T>,
    output: &mut [T],
) -> Result<()> {
    Engine::new(tile_count)?.scan(input, output, op)
}

/// Inclusive scan of `data` on the rayon thread pool, overwriting it
pub fn scan_in_place<T: TileValue>(
    data: &mut [T],
    tile_count: u32,
    op: impl AssociativeOp<T>,
) -> Result<()> {
    Engine::new(tile_count)?.scan_in_place(data, op);
    Ok(())
}

/// Stable stream compaction on the rayon thread pool, see `Engine::compact()`
pub fn compact<T: Clone + Send + Sync>(
    input: &[T],
    predicate: impl Fn(&T) -> bool + Sync,
    tile_count: u32,
    output: &mut [T],
) -> Result<usize> {
    Engine::new(tile_count)?.compact(input, predicate, output)
}

/// Run segmentation on the rayon thread pool, see `Engine::segment()`
pub fn segment<T: Sync>(
    input: &[T],
    adjacent: impl Fn(&T, &T) -> bool + Sync,
    tile_count: u32,
    output: &mut [Range<usize>],
) -> Result<usize> {
    Engine::new(tile_count)?.segment(input, adjacent, output)
}
