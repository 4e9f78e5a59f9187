use super::ForkJoin;

/// Run workers as jobs of the global rayon thread pool
///
/// Workers that wait on a predecessor tile block their rayon thread. This is
/// fine because a tile is only ever claimed by a worker that is already
/// running, so the oldest unfinished tile can always make progress.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Rayon;
//
impl ForkJoin for Rayon {
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync)) {
        let num_workers = rayon::current_num_threads().min(max_workers.max(1) as usize);
        rayon::scope(|s| {
            for _ in 0..num_workers {
                s.spawn(move |_| worker());
            }
        })
    }
}

/// Run workers as jobs of a dedicated rayon thread pool
impl ForkJoin for rayon::ThreadPool {
    fn fork_join(&self, max_workers: u32, worker: &(dyn Fn() + Sync)) {
        let num_workers = self.current_num_threads().min(max_workers.max(1) as usize);
        self.scope(|s| {
            for _ in 0..num_workers {
                s.spawn(move |_| worker());
            }
        })
    }
}
