//! In-process collaborators: a single rank, uniform rank placement, a tuner
//! that only records resets, and heap-backed storage.

use crate::{
    collab::{AllocPlan, AutoTuner, Coordination, KernelInfo, StorageAllocator, TilingEngine},
    dims::Dims,
    error::{SolutionError, SolutionResult},
    geometry::{BoundingBox, RankGeometry},
    grid::{Grid, GridLayout},
    registry::GridRegistry,
    settings::{DEFAULT_BLOCK_SIZE, KernelSettings},
    timer::TimerSample,
    types::{Idx, IdxTuple, try_product},
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Coordination for a run with exactly one rank.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRank;

impl Coordination for SingleRank {
    fn global_barrier(&self) {}

    fn num_ranks(&self) -> usize {
        1
    }

    fn rank_index(&self) -> usize {
        0
    }

    fn sum_over_ranks(&self, value: i64) -> i64 {
        value
    }
}

/// Places ranks on a regular lattice of equally sized rank domains and
/// performs no temporal tiling.
#[derive(Debug, Clone, Copy)]
pub struct UniformTiling {
    /// Halo width assumed for every grid and domain dimension.
    pub halo: Idx,
}

impl Default for UniformTiling {
    fn default() -> Self {
        Self { halo: 1 }
    }
}

/// Replace a non-positive `tuple[dim]` by `default` and cap it at `limit`,
/// noting any change.
fn fit(
    label: &str,
    tuple: &mut IdxTuple,
    dim: &str,
    default: Idx,
    limit: Idx,
    notes: &mut Vec<String>,
) {
    let old = tuple.val(dim);
    let new = if old <= 0 { default } else { old.min(limit) };
    if new != old {
        notes.push(format!("{label} in '{dim}' adjusted from {old} to {new}"));
        tuple.set_val(dim, new);
    }
}

/// Step-dimension variant of [`fit`]: `0` is a legal "off" value and a
/// parent of `0` forces `0`.
fn fit_steps(label: &str, tuple: &mut IdxTuple, dim: &str, limit: Idx, notes: &mut Vec<String>) {
    let old = tuple.val(dim);
    let new = if limit <= 0 {
        0
    } else if old <= 0 {
        limit
    } else {
        old.min(limit)
    };
    if new != old {
        notes.push(format!("{label} in '{dim}' adjusted from {old} to {new}"));
        tuple.set_val(dim, new);
    }
}

impl TilingEngine for UniformTiling {
    fn adjust_settings<E: Coordination>(
        &mut self,
        settings: &mut KernelSettings,
        dims: &Dims,
        env: &E,
    ) -> SolutionResult<Vec<String>> {
        let requested = settings.total_ranks();
        if usize::try_from(requested).ok() != Some(env.num_ranks()) {
            return Err(SolutionError::invalid_setting(format!(
                "num-ranks {} gives {requested} rank(s) but {} are running",
                settings.num_ranks.dim_val_str(),
                env.num_ranks()
            )));
        }

        let mut notes = Vec::new();
        let KernelSettings {
            num_ranks,
            rank_indices,
            rank_sizes,
            region_sizes,
            block_sizes,
            mini_block_sizes,
            sub_block_sizes,
            min_pad_sizes,
            extra_pad_sizes,
            thread_divisor,
            ..
        } = settings;

        for dim in dims.domain_dims() {
            let nr = num_ranks.val(dim);
            let ri = rank_indices.val(dim);
            if !(0..nr).contains(&ri) {
                return Err(SolutionError::invalid_setting(format!(
                    "rank index {ri} in '{dim}' is outside 0..{nr}"
                )));
            }
            let rank = rank_sizes.val(dim);
            if rank <= 0 {
                return Err(SolutionError::invalid_setting(format!(
                    "rank-domain size in '{dim}' must be positive, got {rank}"
                )));
            }
            fit("region-size", region_sizes, dim, rank, rank, &mut notes);
            let region = region_sizes.val(dim);
            fit("block-size", block_sizes, dim, DEFAULT_BLOCK_SIZE.min(region), region, &mut notes);
            let block = block_sizes.val(dim);
            fit("mini-block-size", mini_block_sizes, dim, block, block, &mut notes);
            let mini = mini_block_sizes.val(dim);
            fit("sub-block-size", sub_block_sizes, dim, mini, mini, &mut notes);
            for (label, pads) in [("min-pad", &mut *min_pad_sizes), ("extra-pad", &mut *extra_pad_sizes)] {
                let pad = pads.val(dim);
                if pad < 0 {
                    notes.push(format!("{label} in '{dim}' adjusted from {pad} to 0"));
                    pads.set_val(dim, 0);
                }
            }
        }

        let step = dims.step_dim();
        let region_steps = region_sizes.val(step).max(0);
        region_sizes.set_val(step, region_steps);
        fit_steps("block-size", block_sizes, step, region_steps, &mut notes);
        let block_steps = block_sizes.val(step);
        fit_steps("mini-block-size", mini_block_sizes, step, block_steps, &mut notes);
        let mini_steps = mini_block_sizes.val(step);
        fit_steps("sub-block-size", sub_block_sizes, step, mini_steps, &mut notes);

        if *thread_divisor == 0 {
            notes.push("thread-divisor adjusted from 0 to 1".to_owned());
            *thread_divisor = 1;
        }
        Ok(notes)
    }

    fn setup_rank<E: Coordination>(
        &mut self,
        settings: &KernelSettings,
        dims: &Dims,
        _env: &E,
    ) -> SolutionResult<RankGeometry> {
        let mut begin = IdxTuple::new();
        let mut end = IdxTuple::new();
        let mut interior_begin = IdxTuple::new();
        let mut interior_end = IdxTuple::new();
        for dim in dims.domain_dims() {
            let size = settings.rank_sizes.val(dim);
            let nr = settings.num_ranks.val(dim);
            let ri = settings.rank_indices.val(dim);
            let (Some(first), Some(last)) = (
                ri.checked_mul(size),
                ri.checked_add(1).and_then(|n| n.checked_mul(size)),
            ) else {
                return Err(SolutionError::invalid_setting(format!(
                    "rank offset {ri} * {size} along '{dim}' overflows"
                )));
            };
            begin.set_val(dim, first);
            end.set_val(dim, last);

            // Only edges facing a neighbor lose their halo.
            let lo = if ri > 0 { self.halo } else { 0 };
            let hi = if ri + 1 < nr { self.halo } else { 0 };
            interior_begin.set_val(dim, first.saturating_add(lo));
            interior_end.set_val(dim, (last - hi).max(first.saturating_add(lo)));
        }

        let rank_bb = BoundingBox::new(begin.clone(), end)?;
        let mpi_interior = (settings.total_ranks() > 1 && settings.overlap_comms)
            .then(|| BoundingBox::new(interior_begin, interior_end))
            .transpose()?;
        Ok(RankGeometry {
            ext_bb: rank_bb.clone(),
            rank_bb,
            rank_domain_offsets: begin,
            mpi_interior,
            max_halos: dims.domain_tuple(self.halo),
            temporal: Default::default(),
        })
    }

    fn kernel_info(&self, dims: &Dims) -> KernelInfo {
        KernelInfo {
            fold_pts: dims.domain_tuple(1),
            cluster_pts: dims.domain_tuple(1),
            vector_len: 1,
            element_bytes: size_of::<f64>(),
            l1_prefetch: 1,
            l2_prefetch: 2,
        }
    }
}

/// Tuner that only remembers how it was last reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuietTuner {
    silent: bool,
    aggressive: bool,
    resets: usize,
}

impl QuietTuner {
    /// Whether the last reset asked for silence.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Whether the last reset asked for an aggressive search.
    #[must_use]
    pub fn is_aggressive(&self) -> bool {
        self.aggressive
    }

    /// Number of resets so far.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl AutoTuner for QuietTuner {
    fn reset(&mut self, silent: bool, aggressive: bool) {
        self.silent = silent;
        self.aggressive = aggressive;
        self.resets += 1;
    }
}

fn alloc_zeroed(op: &str, len: usize) -> SolutionResult<Box<[f64]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| SolutionError::storage(op, format!("cannot allocate {len} elements: {e}")))?;
    buf.resize(len, 0.0);
    Ok(buf.into_boxed_slice())
}

fn product_len(op: &str, values: impl IntoIterator<Item = Idx>) -> SolutionResult<usize> {
    let n = try_product(values)
        .ok_or_else(|| SolutionError::storage(op, "element count overflows"))?;
    Ok(usize::try_from(n).unwrap_or(0))
}

/// Heap-backed scratch and loop-back communication buffers.
#[derive(Debug, Default)]
pub struct HostAllocator {
    scratch: Vec<Box<[f64]>>,
    // Send/receive pairs, adjacent.
    comm: Vec<Box<[f64]>>,
    exchanges: usize,
}

impl HostAllocator {
    /// Number of scratch buffers held.
    #[must_use]
    pub fn num_scratch_buffers(&self) -> usize {
        self.scratch.len()
    }

    /// Number of communication buffers held.
    #[must_use]
    pub fn num_comm_buffers(&self) -> usize {
        self.comm.len()
    }

    /// Exchanges that actually moved data.
    #[must_use]
    pub fn exchanges(&self) -> usize {
        self.exchanges
    }
}

impl<G: Grid> StorageAllocator<G> for HostAllocator {
    fn alloc_grids(&mut self, grids: &GridRegistry<G>) -> SolutionResult<()> {
        for (_, grid) in grids.iter() {
            grid.alloc_storage()?;
        }
        Ok(())
    }

    fn alloc_scratch(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()> {
        let AllocPlan {
            dims,
            settings,
            geometry,
            region_threads,
        } = *plan;
        let len = product_len(
            "alloc_scratch",
            dims.domain_dims().map(|d| {
                settings
                    .block_sizes
                    .val(d)
                    .saturating_add(geometry.max_halos.val(d).saturating_mul(2))
            }),
        )?;
        self.scratch = (0..region_threads)
            .map(|_| alloc_zeroed("alloc_scratch", len))
            .collect::<SolutionResult<_>>()?;
        Ok(())
    }

    fn alloc_comm_buffers(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()> {
        let AllocPlan {
            dims,
            settings,
            geometry,
            ..
        } = *plan;
        if settings.total_ranks() <= 1 {
            return Ok(());
        }
        for dim in dims.domain_dims() {
            let nr = settings.num_ranks.val(dim);
            let ri = settings.rank_indices.val(dim);
            let len = product_len(
                "alloc_comm_buffers",
                dims.domain_dims()
                    .filter(|&other| other != dim)
                    .map(|other| settings.rank_sizes.val(other))
                    .chain([geometry.max_halos.val(dim)]),
            )?;
            let neighbors = usize::from(ri > 0) + usize::from(ri + 1 < nr);
            for _ in 0..neighbors * 2 {
                self.comm.push(alloc_zeroed("alloc_comm_buffers", len)?);
            }
        }
        Ok(())
    }

    fn free_scratch(&mut self) {
        self.scratch = Vec::new();
    }

    fn free_comm_buffers(&mut self) {
        self.comm = Vec::new();
    }

    fn exchange_halos(
        &mut self,
        _grids: &GridRegistry<G>,
        wait: &mut TimerSample,
    ) -> SolutionResult<()> {
        if self.comm.is_empty() {
            return Ok(());
        }
        let _wait = wait.scoped();
        for pair in self.comm.chunks_exact_mut(2) {
            let (send, recv) = pair.split_at_mut(1);
            recv[0].copy_from_slice(&send[0]);
        }
        self.exchanges += 1;
        Ok(())
    }

    fn num_bytes(&self) -> usize {
        self.scratch
            .iter()
            .chain(&self.comm)
            .map(|buf| buf.len() * size_of::<f64>())
            .sum()
    }
}

/// Storage of a [`HostGrid`]; aliased grids hold clones of the same `Arc`.
pub type SharedData = Arc<RwLock<Box<[f64]>>>;

/// Heap-backed grid of `f64` elements.
#[derive(Debug)]
pub struct HostGrid {
    name: String,
    layout: Mutex<GridLayout>,
    data: Mutex<Option<SharedData>>,
}

impl HostGrid {
    /// Grid with an empty layout and no storage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout: Mutex::new(GridLayout::default()),
            data: Mutex::new(None),
        }
    }

    /// Current storage, if any.
    #[must_use]
    pub fn data(&self) -> Option<SharedData> {
        self.data.lock().clone()
    }

    /// Current layout.
    #[must_use]
    pub fn layout(&self) -> GridLayout {
        self.layout.lock().clone()
    }

    /// Whether both grids use the very same storage.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        match (self.data(), other.data()) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }
}

impl Grid for HostGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn update_layout(&self, layout: &GridLayout) {
        *self.layout.lock() = layout.clone();
    }

    fn alloc_storage(&self) -> SolutionResult<()> {
        let len = self.layout.lock().num_elements().ok_or_else(|| {
            SolutionError::storage(
                "alloc_storage",
                format!("element count of grid '{}' overflows", self.name),
            )
        })?;
        let buf = alloc_zeroed("alloc_storage", len)?;
        *self.data.lock() = Some(Arc::new(RwLock::new(buf)));
        Ok(())
    }

    fn release_storage(&self) -> bool {
        self.data.lock().take().is_some()
    }

    fn share_storage(&self, source: &Self) -> SolutionResult<()> {
        if std::ptr::eq(self, source) {
            return Ok(());
        }
        let Some(data) = source.data() else {
            return Err(SolutionError::storage(
                "share_storage",
                format!("source grid '{}' has no storage", source.name),
            ));
        };
        let source_layout = source.layout();
        if *self.layout.lock() != source_layout {
            return Err(SolutionError::storage(
                "share_storage",
                format!("grid '{}' and its source differ in layout", self.name),
            ));
        }
        *self.data.lock() = Some(data);
        Ok(())
    }

    fn num_bytes(&self) -> usize {
        self.data
            .lock()
            .as_ref()
            .map_or(0, |data| data.read().len() * size_of::<f64>())
    }

    fn has_storage(&self) -> bool {
        self.data.lock().is_some()
    }
}
