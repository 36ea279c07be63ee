use crate::{error::SolutionResult, settings::KernelSettings};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};
use serde::Serialize;
use std::num::NonZeroUsize;

/// Worker-thread split across the two tiling levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadCounts {
    /// `region * block`.
    pub total: usize,
    /// Top-level threads, one per concurrently processed block.
    pub region: usize,
    /// Nested threads inside each block.
    pub block: usize,
}

impl ThreadCounts {
    /// Split `max_threads / thread_divisor` into region and block threads.
    #[must_use]
    pub fn from_settings(settings: &KernelSettings) -> Self {
        let max = match settings.max_threads {
            0 => default_threads(),
            n => n,
        };
        let mt = (max / settings.thread_divisor.max(1)).max(1);
        let block = settings.block_threads.clamp(1, mt);
        let region = (mt / block).max(1);
        Self {
            total: region * block,
            region,
            block,
        }
    }
}

/// Threads the process would use without any limit.
#[must_use]
pub fn default_threads() -> usize {
    rayon::current_num_threads()
}

/// Processors visible to the process.
#[must_use]
pub fn available_procs() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// The region pool of one preparation cycle.
///
/// Its size is fixed at construction and must stay fixed while the compute
/// engine runs; a new `prepare()` builds a new plan. Block-level work nests
/// inside the pool through rayon's work stealing.
#[must_use]
#[derive(Debug)]
pub struct ThreadPlan {
    counts: ThreadCounts,
    pool: ThreadPool,
}

impl ThreadPlan {
    /// Build a pool with `counts.region` threads.
    ///
    /// # Errors
    /// If the pool cannot be spawned.
    pub fn build(counts: ThreadCounts) -> SolutionResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(counts.region)
            .thread_name(|i| format!("soln-region-{i}"))
            .build()?;
        Ok(Self { counts, pool })
    }

    /// Run an empty parallel loop so every worker is spawned and parked
    /// before real work arrives.
    pub fn warm_up(&self) {
        let n = self.counts.region * 100;
        self.pool.install(|| (0..n).into_par_iter().for_each(|_| {}));
    }

    /// Run `f` inside the pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }

    /// Thread split of this plan.
    pub fn counts(&self) -> ThreadCounts {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::Dims;

    fn settings(max_threads: usize, thread_divisor: usize, block_threads: usize) -> KernelSettings {
        KernelSettings {
            max_threads,
            thread_divisor,
            block_threads,
            ..KernelSettings::new(&Dims::default())
        }
    }

    #[test]
    fn splits_threads_across_levels() {
        let c = ThreadCounts::from_settings(&settings(16, 2, 2));
        assert_eq!((c.total, c.region, c.block), (8, 4, 2));
    }

    #[test]
    fn block_threads_clamped_to_available() {
        let c = ThreadCounts::from_settings(&settings(4, 1, 9));
        assert_eq!((c.total, c.region, c.block), (4, 1, 4));
        let c = ThreadCounts::from_settings(&settings(3, 8, 0));
        assert_eq!((c.total, c.region, c.block), (1, 1, 1));
    }

    #[test]
    fn plan_runs_inside_its_pool() {
        let plan = ThreadPlan::build(ThreadCounts::from_settings(&settings(2, 1, 1))).unwrap();
        plan.warm_up();
        assert_eq!(plan.install(rayon::current_num_threads), 2);
    }
}
