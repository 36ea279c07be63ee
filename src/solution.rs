mod api;
mod info;
mod prepare;

use crate::{
    config::Config,
    dims::Dims,
    error::{SolutionError, SolutionResult},
    geometry::RankGeometry,
    pack::WorkPack,
    params::ParamStore,
    registry::GridRegistry,
    settings::KernelSettings,
    stats::{Report, ReportContext, TimingAccountant},
    threads::{ThreadCounts, ThreadPlan},
    timer::{TimerKind, TimerSample, Timers},
};
use derive_more::{Debug, Display};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a [`Solution`].
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Created, or settings changed since the last successful `prepare()`.
    #[display("unprepared")]
    Unprepared,
    /// Geometry, threads and storage are ready for execution.
    #[display("prepared")]
    Prepared,
    /// Resources released; terminal.
    #[display("ended")]
    Ended,
}

/// The external collaborators of a solution.
#[derive(Debug)]
pub struct Parts<C: Config> {
    /// Distributed coordination.
    pub env: C::Env,
    /// Settings normalization and rank geometry.
    pub tiling: C::Tiling,
    /// Auto-tuner.
    pub tuner: C::Tuner,
    /// Storage allocator.
    pub storage: C::Storage,
}

impl<C: Config> Default for Parts<C>
where
    C::Env: Default,
    C::Tiling: Default,
    C::Tuner: Default,
    C::Storage: Default,
{
    fn default() -> Self {
        Self {
            env: Default::default(),
            tiling: Default::default(),
            tuner: Default::default(),
            storage: Default::default(),
        }
    }
}

/// Memory and domain totals computed by the last diagnostic summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footprint {
    /// Bytes allocated in this rank.
    pub rank_nbytes: i64,
    /// Bytes allocated over all ranks.
    pub tot_nbytes: i64,
    /// Domain points in this rank.
    pub rank_domain_pts: i64,
    /// Domain points over all ranks.
    pub tot_domain_pts: i64,
}

/// One stencil solution: its parameters, grids, packs, timers and
/// collaborators.
///
/// All mutation happens on the control thread before or after an execution
/// window; the compute engine only touches what [`RunContext`] hands it.
#[must_use]
#[derive(Debug)]
pub struct Solution<C: Config> {
    name: String,
    phase: Phase,
    params: ParamStore,
    grids: GridRegistry<C::Grid>,
    packs: Vec<WorkPack>,
    accountant: TimingAccountant,
    threads: Option<ThreadPlan>,
    footprint: Footprint,
    env: C::Env,
    tiling: C::Tiling,
    tuner: C::Tuner,
    storage: C::Storage,
}

impl<C: Config> Solution<C>
where
    Parts<C>: Default,
{
    /// Solution with default collaborators.
    pub fn new(name: impl Into<String>, dims: Dims) -> Self {
        Self::with_parts(name, dims, Parts::default())
    }
}

impl<C: Config> Solution<C> {
    /// Solution driving the given collaborators.
    pub fn with_parts(name: impl Into<String>, dims: Dims, parts: Parts<C>) -> Self {
        let Parts {
            env,
            tiling,
            tuner,
            storage,
        } = parts;
        Self {
            name: name.into(),
            phase: Phase::Unprepared,
            params: ParamStore::new(dims),
            grids: GridRegistry::new(),
            packs: Vec::new(),
            accountant: TimingAccountant::new(),
            threads: None,
            footprint: Footprint::default(),
            env,
            tiling,
            tuner,
            storage,
        }
    }

    /// Solution name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Declared dimensions.
    pub fn dims(&self) -> &Dims {
        self.params.dims()
    }

    /// Current global settings.
    pub fn settings(&self) -> &KernelSettings {
        self.params.settings()
    }

    /// Parameter store.
    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Whether geometry reflects the current settings.
    #[must_use]
    pub fn is_geometry_valid(&self) -> bool {
        self.params.geometry().is_valid()
    }

    /// Geometry from the last `prepare()`.
    ///
    /// # Errors
    /// [`SolutionError::PreparationRequired`] if stale.
    pub fn geometry(&self) -> SolutionResult<&RankGeometry> {
        self.params.geometry().prepared("geometry")
    }

    /// Register `grid` under `name`, adopting the current layout.
    ///
    /// # Errors
    /// [`SolutionError::DuplicateGrid`] if `name` is taken.
    pub fn register_grid(
        &mut self,
        name: impl Into<String>,
        grid: Arc<C::Grid>,
        is_output: bool,
    ) -> SolutionResult<()> {
        use crate::grid::Grid as _;
        grid.update_layout(&self.params.grid_layout());
        self.grids.register(name, grid, is_output)
    }

    /// Registered grids.
    pub fn grids(&self) -> &GridRegistry<C::Grid> {
        &self.grids
    }

    /// Alias every grid whose name `source` also has to the source's storage.
    ///
    /// Returns the number of aliased grids; names only one side has are
    /// skipped silently.
    ///
    /// # Errors
    /// Whatever the grid reports for a matched pair.
    pub fn share_storage(&self, source: &Self) -> SolutionResult<usize> {
        self.grids.share_storage(&source.grids)
    }

    /// Add a work pack.
    pub fn add_pack(&mut self, pack: WorkPack) {
        self.packs.push(pack);
    }

    /// Work packs in insertion order.
    pub fn packs(&self) -> &[WorkPack] {
        &self.packs
    }

    /// Execution timers.
    pub fn timers(&self) -> &Timers {
        self.accountant.timers()
    }

    /// Steps since the last report.
    #[must_use]
    pub fn steps_done(&self) -> i64 {
        self.accountant.steps_done()
    }

    /// Thread split of the current preparation cycle, if prepared.
    #[must_use]
    pub fn thread_counts(&self) -> Option<ThreadCounts> {
        self.threads.as_ref().map(ThreadPlan::counts)
    }

    /// Totals from the last diagnostic summary.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Coordination collaborator.
    pub fn env(&self) -> &C::Env {
        &self.env
    }

    /// Tiling collaborator.
    pub fn tiling(&self) -> &C::Tiling {
        &self.tiling
    }

    /// Auto-tuner collaborator.
    pub fn tuner(&self) -> &C::Tuner {
        &self.tuner
    }

    /// Storage collaborator.
    pub fn storage(&self) -> &C::Storage {
        &self.storage
    }

    /// Zero every timer and step counter.
    pub fn clear_timers(&mut self) {
        self.accountant.clear(&mut self.packs);
    }

    /// Give the compute engine one execution window.
    ///
    /// `f` runs inside the region pool while the `run` timer is open.
    ///
    /// # Errors
    /// [`SolutionError::PreparationRequired`] unless prepared,
    /// [`SolutionError::Ended`] after `end()`, or whatever `f` returns.
    pub fn run<R: Send>(
        &mut self,
        f: impl FnOnce(&mut RunContext<'_, C>) -> SolutionResult<R> + Send,
    ) -> SolutionResult<R> {
        match self.phase {
            Phase::Ended => return Err(SolutionError::ended("run")),
            Phase::Unprepared => return Err(SolutionError::preparation_required("run")),
            Phase::Prepared => {}
        }
        let Self {
            params,
            grids,
            packs,
            accountant,
            threads,
            storage,
            ..
        } = self;
        let geometry = params.geometry().prepared("run")?;
        let plan = threads
            .as_ref()
            .ok_or_else(|| SolutionError::preparation_required("run"))?;
        let (timers, steps_done) = accountant.parts_mut();

        timers.get_mut(TimerKind::Run).start();
        let mut ctx = RunContext {
            timers,
            steps_done,
            packs,
            geometry,
            settings: params.settings(),
            counts: plan.counts(),
            grids,
            storage,
        };
        let result = plan.install(|| f(&mut ctx));
        ctx.timers.get_mut(TimerKind::Run).stop();
        result
    }

    /// Reconcile the timers into a report, then clear them.
    pub fn report_stats(&mut self) -> Report {
        use crate::collab::Coordination as _;
        let counts = self
            .thread_counts()
            .unwrap_or_else(|| ThreadCounts::from_settings(self.params.settings()));
        let ctx = ReportContext {
            tot_domain_pts: self.footprint.tot_domain_pts,
            region_threads: counts.region,
            multi_rank: self.env.num_ranks() > 1,
        };
        self.accountant.report(&mut self.packs, &ctx)
    }

    /// Release everything and enter [`Phase::Ended`].
    ///
    /// Safe in any state, including before any `prepare()`. Returns the
    /// number of grids whose storage was released.
    ///
    /// # Errors
    /// Whatever the final halo exchange reports. Everything is released and
    /// the phase is [`Phase::Ended`] even then.
    pub fn end(&mut self) -> SolutionResult<usize> {
        use crate::collab::{Coordination as _, StorageAllocator as _};
        let exchanged = {
            let (halo, wait) = self.accountant.timers_mut().halo_and_wait();
            let _halo = halo.scoped();
            self.storage.exchange_halos(&self.grids, wait)
        };

        self.env.global_barrier();
        self.storage.free_comm_buffers();
        self.storage.free_scratch();
        let released = self.grids.release_all();

        // Back to the process-wide pool.
        self.threads = None;
        self.phase = Phase::Ended;
        debug!(solution = %self.name, released, "solution ended");
        exchanged.map(|()| released)
    }
}

/// What the compute engine may touch during [`Solution::run`].
#[derive(Debug)]
pub struct RunContext<'a, C: Config> {
    timers: &'a mut Timers,
    steps_done: &'a mut i64,
    packs: &'a mut [WorkPack],
    geometry: &'a RankGeometry,
    settings: &'a KernelSettings,
    counts: ThreadCounts,
    grids: &'a GridRegistry<C::Grid>,
    storage: &'a mut C::Storage,
}

impl<C: Config> RunContext<'_, C> {
    /// Timer for `kind`.
    pub fn timer_mut(&mut self, kind: TimerKind) -> &mut TimerSample {
        self.timers.get_mut(kind)
    }

    /// Count `n` more steps for the whole solution.
    pub fn add_steps(&mut self, n: i64) {
        *self.steps_done += n;
    }

    /// Work packs.
    pub fn packs_mut(&mut self) -> &mut [WorkPack] {
        self.packs
    }

    /// Prepared geometry of this rank.
    pub fn geometry(&self) -> &RankGeometry {
        self.geometry
    }

    /// Normalized settings.
    pub fn settings(&self) -> &KernelSettings {
        self.settings
    }

    /// Thread split fixed for this cycle.
    pub fn thread_counts(&self) -> ThreadCounts {
        self.counts
    }

    /// Registered grids.
    pub fn grids(&self) -> &GridRegistry<C::Grid> {
        self.grids
    }

    /// Exchange halos under the `halo` timer; the storage collaborator
    /// records its blocking waits into `wait`.
    ///
    /// # Errors
    /// Whatever the storage collaborator reports.
    pub fn exchange_halos(&mut self) -> SolutionResult<()> {
        use crate::collab::StorageAllocator as _;
        let (halo, wait) = self.timers.halo_and_wait();
        let _halo = halo.scoped();
        self.storage.exchange_halos(self.grids, wait)
    }
}
