mod host;

pub use crate::collab::host::{HostAllocator, HostGrid, QuietTuner, SingleRank, UniformTiling};
use crate::{
    dims::Dims,
    error::SolutionResult,
    geometry::RankGeometry,
    grid::Grid,
    registry::GridRegistry,
    settings::KernelSettings,
    timer::TimerSample,
    types::IdxTuple,
};
use core::fmt::Debug;

/// Distributed coordination across ranks.
///
/// Collectives block until every rank arrives; there is no timeout.
pub trait Coordination: Debug + Send + Sync {
    /// Wait until all ranks reach this point.
    fn global_barrier(&self);
    /// Number of ranks.
    fn num_ranks(&self) -> usize;
    /// Index of this rank.
    fn rank_index(&self) -> usize;
    /// Sum of `value` over all ranks.
    fn sum_over_ranks(&self, value: i64) -> i64;
}

/// Vector folding and memory facts of the compiled kernel, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelInfo {
    /// Points per vector per domain dimension.
    pub fold_pts: IdxTuple,
    /// Points per cluster of vectors per domain dimension.
    pub cluster_pts: IdxTuple,
    /// Elements per vector.
    pub vector_len: usize,
    /// Bytes per element.
    pub element_bytes: usize,
    /// L1 prefetch distance.
    pub l1_prefetch: usize,
    /// L2 prefetch distance.
    pub l2_prefetch: usize,
}

/// Settings normalization plus rank placement and tiling geometry.
pub trait TilingEngine: Debug + Send {
    /// Clamp and round `settings` into a runnable configuration. Must be
    /// idempotent. Returns diagnostic lines describing what changed.
    ///
    /// # Errors
    /// If the settings cannot be made valid.
    fn adjust_settings<E: Coordination>(
        &mut self,
        settings: &mut KernelSettings,
        dims: &Dims,
        env: &E,
    ) -> SolutionResult<Vec<String>>;

    /// Place this rank and derive its geometry from normalized settings.
    ///
    /// # Errors
    /// If the rank layout is inconsistent.
    fn setup_rank<E: Coordination>(
        &mut self,
        settings: &KernelSettings,
        dims: &Dims,
        env: &E,
    ) -> SolutionResult<RankGeometry>;

    /// Kernel facts for the diagnostic summary.
    fn kernel_info(&self, dims: &Dims) -> KernelInfo;
}

/// Tiling-size auto-tuner.
pub trait AutoTuner: Debug + Send {
    /// Restart the search. `silent` suppresses the tuner's own output.
    fn reset(&mut self, silent: bool, aggressive: bool);
}

/// Inputs to scratch and communication-buffer allocation.
#[derive(Debug, Clone, Copy)]
pub struct AllocPlan<'a> {
    /// Declared dimensions.
    pub dims: &'a Dims,
    /// Normalized settings.
    pub settings: &'a KernelSettings,
    /// This rank's prepared geometry.
    pub geometry: &'a RankGeometry,
    /// Threads per region; one scratch set is needed per region thread.
    pub region_threads: usize,
}

/// Owner of grid, scratch and inter-rank buffer memory.
///
/// `free_*` must be safe to call when nothing is allocated. Allocation
/// failures are returned as-is; the caller does not retry.
pub trait StorageAllocator<G: Grid>: Debug + Send {
    /// Allocate storage for every registered grid.
    ///
    /// # Errors
    /// If any grid cannot be allocated.
    fn alloc_grids(&mut self, grids: &GridRegistry<G>) -> SolutionResult<()>;

    /// Allocate per-thread scratch buffers.
    ///
    /// # Errors
    /// If the buffers cannot be allocated.
    fn alloc_scratch(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()>;

    /// Allocate inter-rank communication buffers.
    ///
    /// # Errors
    /// If the buffers cannot be allocated.
    fn alloc_comm_buffers(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()>;

    /// Release scratch buffers.
    fn free_scratch(&mut self);

    /// Release communication buffers.
    fn free_comm_buffers(&mut self);

    /// Exchange halos with neighboring ranks, timing blocking waits into
    /// `wait`. A no-op when no communication buffers exist.
    ///
    /// # Errors
    /// If a transfer fails.
    fn exchange_halos(
        &mut self,
        grids: &GridRegistry<G>,
        wait: &mut TimerSample,
    ) -> SolutionResult<()>;

    /// Bytes held in scratch and communication buffers.
    fn num_bytes(&self) -> usize;
}
