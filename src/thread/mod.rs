//! Fork-join substrates the engine can run on
//!
//! The engine does not manage threads itself. All it needs is a way to run a
//! worker closure on several threads at once and to wait for all of them,
//! which is what `ForkJoin` abstracts.

pub mod basic;
pub mod rayon;

pub use self::{basic::ScopedThreads, rayon::Rayon};

/// Mechanism to run a worker on several threads and join them
///
/// Implementations must run every worker they start to completion, without
/// suspending one worker until another finishes: workers may block waiting
/// for each other's progress.
///
pub trait ForkJoin {
    /// Run `worker` on up to `max_workers` concurrent threads, possibly
    /// including the calling thread, and return once all of them returned
    ///
    /// `max_workers` is at least 1. Running fewer workers is always correct,
    /// since each worker keeps pulling work until none is left.
    ///
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync));
}

impl<F: ForkJoin + ?Sized> ForkJoin for &F {
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync)) {
        (**self).fork_join(max_workers, worker)
    }
}

impl<F: ForkJoin + ?Sized> ForkJoin for Box<F> {
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync)) {
        (**self).fork_join(max_workers, worker)
    }
}

/// Run the single worker on the calling thread
///
/// Tiles are then processed in order and the lookback never has to wait,
/// which makes every algorithm degenerate into its sequential form.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sequential;
//
impl ForkJoin for Sequential {
    fn fork_join(&self, _max_workers: u32, worker: &(dyn Fn() + Sync)) {
        worker()
    }
}

/// Number of hardware threads, used when no thread count is specified
pub(crate) fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(2)
}
