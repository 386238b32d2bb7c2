/// Trait for running per-step jobs (linking batches, island solves) on worker threads
pub trait IslandScheduler: Send + Sync {
    /// Runs `job(index)` exactly once for every index in `0..num_jobs` and returns when all
    /// jobs are done. Lower indices are started first.
    fn run(&self, num_jobs: u32, job: &(dyn Fn(u32) + Sync));

    /// Number of threads jobs are spread over
    fn num_threads(&self) -> usize {
        1
    }
}

/// A single-threaded scheduler that runs jobs in order on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

impl IslandScheduler for SequentialScheduler {
    fn run(&self, num_jobs: u32, job: &(dyn Fn(u32) + Sync)) {
        for index in 0..num_jobs {
            job(index);
        }
    }
}

#[cfg(feature = "parallel")]
pub mod parallel {
    use super::*;
    use crate::error::PhysicsError;
    use crate::Result;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A scheduler that spreads jobs over a persistent rayon thread pool.
    ///
    /// Workers claim job indices from a shared cursor, so jobs start in ascending order.
    /// Combined with islands sorted largest first this starts the longest jobs first.
    #[derive(Debug)]
    pub struct ParallelScheduler {
        pool: rayon::ThreadPool,
    }

    impl ParallelScheduler {
        /// Creates a new parallel scheduler with the specified number of threads,
        /// 0 for one per available core
        pub fn new(threads: usize) -> Result<Self> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|index| format!("island-worker-{}", index))
                .build()
                .map_err(|e| PhysicsError::ThreadPool(e.to_string()))?;

            Ok(Self { pool })
        }
    }

    impl IslandScheduler for ParallelScheduler {
        fn run(&self, num_jobs: u32, job: &(dyn Fn(u32) + Sync)) {
            let threads = self.pool.current_num_threads().min(num_jobs as usize);
            if threads <= 1 {
                SequentialScheduler.run(num_jobs, job);
                return;
            }

            let cursor = AtomicU32::new(0);
            let worker = || loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                if index >= num_jobs {
                    break;
                }
                job(index);
            };

            // The scope body already runs on a pool thread and takes jobs as well.
            self.pool.scope(|scope| {
                for _ in 1..threads {
                    scope.spawn(|_| worker());
                }
                worker();
            });
        }

        fn num_threads(&self) -> usize {
            self.pool.current_num_threads()
        }
    }
}
