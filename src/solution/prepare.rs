use crate::{
    collab::{AllocPlan, AutoTuner as _, Coordination as _, StorageAllocator as _},
    config::Config,
    error::{SolutionError, SolutionResult},
    solution::{Phase, Solution},
    threads::{ThreadCounts, ThreadPlan, available_procs},
};
use std::time::Instant;
use tracing::{debug, info, info_span};

impl<C: Config> Solution<C> {
    /// Validate settings, fix the thread split, compute geometry and
    /// allocate storage, in that order.
    ///
    /// May be called again to pick up changed settings; every call redoes
    /// the whole sequence. On failure the solution stays
    /// [`Phase::Unprepared`] with geometry invalidated and must not run.
    ///
    /// # Errors
    /// [`SolutionError::Ended`] after `end()`, otherwise whatever a
    /// collaborator reports.
    pub fn prepare(&mut self) -> SolutionResult<()> {
        if self.phase == Phase::Ended {
            return Err(SolutionError::ended("prepare"));
        }
        let span = info_span!("prepare", solution = %self.name);
        let _enter = span.enter();

        self.env.global_barrier();
        self.accountant.clear(&mut self.packs);
        self.phase = Phase::Unprepared;

        match self.prepare_steps() {
            Ok(()) => {
                self.phase = Phase::Prepared;
                Ok(())
            }
            Err(e) => {
                self.params.invalidate_geometry();
                self.threads = None;
                Err(e)
            }
        }
    }

    fn prepare_steps(&mut self) -> SolutionResult<()> {
        for note in self.params.adjust_settings(&mut self.tiling, &self.env)? {
            debug!("{note}");
        }
        self.update_grid_info();

        let settings = self.params.settings();
        for pack in &mut self.packs {
            pack.reset_local_settings(settings);
        }
        self.tuner.reset(true, false);

        info!(
            num_ranks = self.env.num_ranks(),
            rank_index = self.env.rank_index(),
            "ranks"
        );
        let counts = ThreadCounts::from_settings(settings);
        info!(
            available_procs = available_procs(),
            total = counts.total,
            region = counts.region,
            block = counts.block,
            "compute threads"
        );
        // Previous pool goes first so the two never coexist.
        self.threads = None;
        let plan = ThreadPlan::build(counts)?;
        plan.warm_up();
        self.threads = Some(plan);

        info!(
            grids = self.grids.len(),
            outputs = self.grids.num_outputs(),
            packs = self.packs.len(),
            "solution contents"
        );

        let Self {
            params,
            grids,
            env,
            tiling,
            storage,
            ..
        } = self;
        params.ensure_geometry(tiling, &*env)?;
        let geometry = params.geometry().prepared("prepare")?;

        let started = Instant::now();
        storage.free_scratch();
        storage.free_comm_buffers();
        storage.alloc_grids(grids)?;
        let plan = AllocPlan {
            dims: params.dims(),
            settings: params.settings(),
            geometry,
            region_threads: counts.region,
        };
        storage.alloc_scratch(&plan)?;
        storage.alloc_comm_buffers(&plan)?;
        info!(
            secs = started.elapsed().as_secs_f64(),
            bytes = grids.num_bytes() + storage.num_bytes(),
            "storage allocated"
        );

        self.print_info()?;
        Ok(())
    }

    /// Push the layout implied by the current settings to every grid.
    pub(crate) fn update_grid_info(&self) {
        self.grids.update_layouts(&self.params.grid_layout());
    }
}
