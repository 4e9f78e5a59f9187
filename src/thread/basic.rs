use super::ForkJoin;
use std::num::NonZeroUsize;

/// Spawn fresh scoped OS threads for every invocation
///
/// The calling thread acts as one of the workers.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScopedThreads {
    num_threads: NonZeroUsize,
}
//
impl ScopedThreads {
    /// Use up to `num_threads` threads, calling thread included
    ///
    /// A thread count of 0 is treated as 1.
    ///
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: NonZeroUsize::new(num_threads).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Maximal number of threads used per invocation
    pub fn num_threads(&self) -> usize {
        self.num_threads.get()
    }
}
//
impl Default for ScopedThreads {
    /// Use one thread per hardware thread
    fn default() -> Self {
        Self::new(super::default_num_threads())
    }
}
//
impl ForkJoin for ScopedThreads {
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync)) {
        let num_workers = self.num_threads().min(max_workers.max(1) as usize);
        std::thread::scope(|s| {
            for _ in 1..num_workers {
                s.spawn(worker);
            }
            worker();
        })
    }
}
