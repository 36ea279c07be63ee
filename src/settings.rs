use crate::{dims::Dims, types::IdxTuple};
use serde::{Deserialize, Serialize};

/// Default block edge used when no block size is given.
pub const DEFAULT_BLOCK_SIZE: i64 = 32;

/// Default rank-domain edge for a freshly declared solution.
pub const DEFAULT_RANK_SIZE: i64 = 128;

/// All sizing and threading knobs of a solution.
///
/// The global copy lives in the parameter store; each work pack holds a
/// snapshot taken at `prepare()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSettings {
    /// Ranks per domain dimension.
    pub num_ranks: IdxTuple,
    /// This rank's position per domain dimension.
    pub rank_indices: IdxTuple,
    /// Points per rank per domain dimension.
    pub rank_sizes: IdxTuple,
    /// Region sizes over the step and domain dimensions.
    pub region_sizes: IdxTuple,
    /// Block sizes over the step and domain dimensions.
    pub block_sizes: IdxTuple,
    /// Mini-block sizes over the step and domain dimensions.
    pub mini_block_sizes: IdxTuple,
    /// Sub-block sizes over the step and domain dimensions.
    pub sub_block_sizes: IdxTuple,
    /// Minimum padding per domain dimension.
    pub min_pad_sizes: IdxTuple,
    /// Extra padding per domain dimension.
    pub extra_pad_sizes: IdxTuple,
    /// Upper bound on worker threads; `0` means the process default.
    pub max_threads: usize,
    /// Divides `max_threads` before it is split across tiling levels.
    pub thread_divisor: usize,
    /// Threads per block (inner tiling level).
    pub block_threads: usize,
    /// Overlap halo exchange with interior computation.
    pub overlap_comms: bool,
}

impl KernelSettings {
    /// Defaults for the given dimensions: one rank, cubic rank domain, region
    /// and block sizes left for normalization to fill in.
    pub fn new(dims: &Dims) -> Self {
        Self {
            num_ranks: dims.domain_tuple(1),
            rank_indices: dims.domain_tuple(0),
            rank_sizes: dims.domain_tuple(DEFAULT_RANK_SIZE),
            region_sizes: dims.stencil_tuple(0, 0),
            block_sizes: dims.stencil_tuple(0, 0),
            mini_block_sizes: dims.stencil_tuple(0, 0),
            sub_block_sizes: dims.stencil_tuple(0, 0),
            min_pad_sizes: dims.domain_tuple(0),
            extra_pad_sizes: dims.domain_tuple(0),
            max_threads: 0,
            thread_divisor: 1,
            block_threads: 1,
            overlap_comms: true,
        }
    }

    /// Overall problem size per domain dimension: rank size times rank count.
    pub fn overall_domain_sizes(&self) -> IdxTuple {
        self.rank_sizes
            .map_with(&self.num_ranks, |size, n| size.saturating_mul(n))
    }

    /// Total ranks implied by `num_ranks`, saturating at `i64::MAX`.
    #[must_use]
    pub fn total_ranks(&self) -> i64 {
        self.num_ranks.try_product().unwrap_or(i64::MAX)
    }
}
