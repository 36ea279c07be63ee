#![allow(missing_docs)]

use soln::{
    Config, Dims, HostConfig, Phase, Solution, SolutionError, SolutionResult,
    collab::{
        AllocPlan, Coordination, HostAllocator, HostGrid, QuietTuner, SingleRank,
        StorageAllocator, UniformTiling,
    },
    grid::Grid as _,
    pack::WorkPack,
    registry::GridRegistry,
    timer::{TimerKind, TimerSample},
};
use std::{sync::Arc, time::Duration};

fn solution(name: &str) -> Solution<HostConfig> {
    let mut soln = Solution::new(name, Dims::default());
    soln.apply_command_line_options("-d 8 -max_threads 2").unwrap();
    soln
}

fn with_grids(name: &str, grids: &[&str]) -> (Solution<HostConfig>, Vec<Arc<HostGrid>>) {
    let mut soln = solution(name);
    let handles = grids
        .iter()
        .map(|&g| {
            let grid = Arc::new(HostGrid::new(g));
            soln.register_grid(g, grid.clone(), false).unwrap();
            grid
        })
        .collect();
    (soln, handles)
}

/// Two ranks along `x`; this process is the second one.
#[derive(Debug, Clone, Copy, Default)]
struct SecondOfTwo;

impl Coordination for SecondOfTwo {
    fn global_barrier(&self) {}

    fn num_ranks(&self) -> usize {
        2
    }

    fn rank_index(&self) -> usize {
        1
    }

    fn sum_over_ranks(&self, value: i64) -> i64 {
        value * 2
    }
}

#[derive(Debug)]
struct TwoRankConfig;

impl Config for TwoRankConfig {
    type Grid = HostGrid;
    type Env = SecondOfTwo;
    type Tiling = UniformTiling;
    type Tuner = QuietTuner;
    type Storage = HostAllocator;
}

type Host = HostAllocator;

/// Heap storage whose halo exchange always fails.
#[derive(Debug, Default)]
struct BrokenLink(Host);

impl StorageAllocator<HostGrid> for BrokenLink {
    fn alloc_grids(&mut self, grids: &GridRegistry<HostGrid>) -> SolutionResult<()> {
        self.0.alloc_grids(grids)
    }

    fn alloc_scratch(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()> {
        <Host as StorageAllocator<HostGrid>>::alloc_scratch(&mut self.0, plan)
    }

    fn alloc_comm_buffers(&mut self, plan: &AllocPlan<'_>) -> SolutionResult<()> {
        <Host as StorageAllocator<HostGrid>>::alloc_comm_buffers(&mut self.0, plan)
    }

    fn free_scratch(&mut self) {
        <Host as StorageAllocator<HostGrid>>::free_scratch(&mut self.0);
    }

    fn free_comm_buffers(&mut self) {
        <Host as StorageAllocator<HostGrid>>::free_comm_buffers(&mut self.0);
    }

    fn exchange_halos(
        &mut self,
        _grids: &GridRegistry<HostGrid>,
        _wait: &mut TimerSample,
    ) -> SolutionResult<()> {
        Err(SolutionError::Storage {
            op: "exchange_halos".to_owned(),
            message: "link down".to_owned(),
        })
    }

    fn num_bytes(&self) -> usize {
        <Host as StorageAllocator<HostGrid>>::num_bytes(&self.0)
    }
}

#[derive(Debug)]
struct BrokenLinkConfig;

impl Config for BrokenLinkConfig {
    type Grid = HostGrid;
    type Env = SingleRank;
    type Tiling = UniformTiling;
    type Tuner = QuietTuner;
    type Storage = BrokenLink;
}

#[test]
fn end_without_prepare_releases_nothing() {
    let (mut soln, _) = with_grids("heat", &["temperature"]);
    assert_eq!(soln.end().unwrap(), 0);
    assert_eq!(soln.phase(), Phase::Ended);
}

#[test]
fn prepare_allocates_and_end_releases() {
    let (mut soln, grids) = with_grids("heat", &["temperature", "pressure"]);
    soln.prepare().unwrap();
    assert_eq!(soln.phase(), Phase::Prepared);
    for grid in &grids {
        assert!(grid.has_storage());
        assert_eq!(grid.num_bytes(), 8 * 8 * 8 * size_of::<f64>());
    }
    assert!(soln.storage().num_scratch_buffers() > 0);
    assert_eq!(soln.storage().num_comm_buffers(), 0);

    assert_eq!(soln.end().unwrap(), 2);
    assert!(grids.iter().all(|g| !g.has_storage()));
    assert_eq!(soln.storage().num_scratch_buffers(), 0);
    assert!(soln.thread_counts().is_none());
}

#[test]
fn ended_solution_cannot_be_prepared() {
    let mut soln = solution("heat");
    soln.end().unwrap();
    assert!(matches!(soln.prepare(), Err(SolutionError::Ended { .. })));
    assert!(matches!(soln.run(|_| Ok(())), Err(SolutionError::Ended { .. })));
}

#[test]
fn run_needs_preparation() {
    let mut soln = solution("heat");
    assert!(matches!(
        soln.run(|_| Ok(())),
        Err(SolutionError::PreparationRequired { .. })
    ));
}

#[test]
fn duplicate_grid_leaves_registry_unchanged() {
    let (mut soln, _) = with_grids("heat", &["temperature"]);
    let err = soln
        .register_grid("temperature", Arc::new(HostGrid::new("temperature")), true)
        .unwrap_err();
    assert!(matches!(err, SolutionError::DuplicateGrid { ref name } if name == "temperature"));
    assert_eq!(soln.grids().len(), 1);
    assert_eq!(soln.grids().num_outputs(), 0);
}

#[test]
fn share_storage_aliases_matching_names() {
    let (mut source, source_grids) = with_grids("a", &["temperature", "pressure"]);
    source.prepare().unwrap();
    let (target, target_grids) = with_grids("b", &["temperature", "velocity"]);

    assert_eq!(target.share_storage(&source).unwrap(), 1);
    assert!(target_grids[0].shares_storage_with(&source_grids[0]));
    assert!(!target_grids[1].has_storage());
}

#[test]
fn share_storage_from_unallocated_source_fails() {
    let (source, _) = with_grids("a", &["temperature"]);
    let (target, _) = with_grids("b", &["temperature"]);
    assert!(matches!(
        target.share_storage(&source),
        Err(SolutionError::Storage { .. })
    ));
}

#[test]
fn failed_prepare_stays_unprepared() {
    let mut soln = solution("heat");
    soln.set_num_ranks("x", 2).unwrap();
    assert!(matches!(
        soln.prepare(),
        Err(SolutionError::InvalidSetting { .. })
    ));
    assert_eq!(soln.phase(), Phase::Unprepared);
    assert!(!soln.is_geometry_valid());
    assert!(matches!(
        soln.run(|_| Ok(())),
        Err(SolutionError::PreparationRequired { .. })
    ));

    soln.set_num_ranks("x", 1).unwrap();
    soln.prepare().unwrap();
    assert_eq!(soln.phase(), Phase::Prepared);
}

#[test]
fn prepare_resets_packs_and_tuner() {
    let mut soln = solution("heat");
    soln.add_pack(WorkPack::new("main", 7, 1, 12));
    soln.prepare().unwrap();
    soln.set_block_size("x", 4).unwrap();
    soln.prepare().unwrap();

    let local = soln.packs()[0].local_settings().unwrap();
    assert_eq!(local.block_sizes.val("x"), 4);
    assert_eq!(local, soln.settings());
    assert!(soln.tuner().is_silent());
    assert!(!soln.tuner().is_aggressive());
    assert_eq!(soln.tuner().resets(), 2);
}

#[test]
fn thread_split_is_fixed_at_prepare() {
    let mut soln = solution("heat");
    soln.apply_command_line_options("-max_threads 4 -block_threads 2")
        .unwrap();
    soln.prepare().unwrap();
    let counts = soln.thread_counts().unwrap();
    assert_eq!((counts.total, counts.region, counts.block), (4, 2, 2));

    let in_pool = soln
        .run(|ctx| {
            assert_eq!(ctx.thread_counts(), counts);
            Ok(rayon::current_num_threads())
        })
        .unwrap();
    assert_eq!(in_pool, 2);
}

#[test]
fn run_accumulates_timers_and_steps() {
    let mut soln = solution("heat");
    soln.add_pack(WorkPack::new("main", 7, 1, 12));
    soln.prepare().unwrap();
    assert_eq!(soln.steps_done(), 0);

    soln.run(|ctx| {
        ctx.timer_mut(TimerKind::Exterior)
            .record(Duration::from_micros(10));
        ctx.add_steps(3);
        ctx.packs_mut()[0].add_steps(3);
        ctx.exchange_halos()
    })
    .unwrap();

    assert_eq!(soln.steps_done(), 3);
    assert!(soln.timers().get(TimerKind::Run).elapsed() > Duration::ZERO);
    assert!(!soln.timers().get(TimerKind::Run).is_running());

    let report = soln.report_stats();
    assert_eq!(report.stats.work.nsteps, 3);
    assert_eq!(report.stats.work.nreads, 21);
    assert_eq!(report.stats.work.npts, 512);
    assert!(report.text.contains("num-steps-done"));
    assert!(!report.text.contains("Work breakdown by stencil pack"));
    assert!(!report.text.contains("halo exchange time"));

    let second = soln.report_stats();
    assert_eq!(second.stats.work.nsteps, 0);
    assert_eq!(second.stats.breakdown.run, 0.0);
    assert!(second.text.is_empty());
}

#[test]
fn print_info_records_footprint() {
    let (mut soln, _) = with_grids("heat", &["temperature"]);
    assert!(matches!(
        soln.print_info(),
        Err(SolutionError::PreparationRequired { .. })
    ));
    soln.prepare().unwrap();

    let footprint = soln.footprint();
    assert_eq!(footprint.rank_domain_pts, 512);
    assert_eq!(footprint.tot_domain_pts, 512);
    assert!(footprint.rank_nbytes >= 512 * 8);
    assert_eq!(footprint.tot_nbytes, footprint.rank_nbytes);

    let text = soln.print_info().unwrap();
    assert!(text.contains("stencil-name:          heat"));
    assert!(text.contains("block-size:"));
    assert!(!text.contains("wave-front"));
}

#[test]
fn second_rank_is_offset_and_exchanges() {
    let mut soln = Solution::<TwoRankConfig>::new("heat", Dims::default());
    soln.apply_command_line_options("-d 8 -nrx 2 -rix 1 -max_threads 2")
        .unwrap();
    let temperature = Arc::new(HostGrid::new("temperature"));
    soln.register_grid("temperature", temperature, true).unwrap();
    soln.add_pack(WorkPack::new("main", 4, 1, 6));
    soln.prepare().unwrap();

    assert_eq!(soln.get_first_rank_domain_index("x").unwrap(), 8);
    assert_eq!(soln.get_last_rank_domain_index("x").unwrap(), 15);
    assert_eq!(soln.get_first_rank_domain_index("y").unwrap(), 0);
    assert_eq!(soln.get_overall_domain_size("x").unwrap(), 16);
    assert_eq!(soln.footprint().tot_domain_pts, 1024);
    assert_eq!(soln.storage().num_comm_buffers(), 2);

    let interior = soln.geometry().unwrap().mpi_interior.clone().unwrap();
    assert_eq!(interior.begin.val("x"), 9);
    assert_eq!(interior.end.val("x"), 16);

    soln.run(|ctx| {
        ctx.add_steps(1);
        ctx.exchange_halos()
    })
    .unwrap();
    assert_eq!(soln.storage().exchanges(), 1);
    assert!(soln.timers().get(TimerKind::Halo).elapsed() > Duration::ZERO);

    let report = soln.report_stats();
    assert!(report.text.contains("halo exchange time"));
    assert!(report.text.contains("Halo-time breakdown"));

    soln.end().unwrap();
    assert_eq!(soln.storage().exchanges(), 2);
    assert_eq!(soln.storage().num_comm_buffers(), 0);
}

#[test]
fn failed_final_exchange_still_releases() {
    let mut soln = Solution::<BrokenLinkConfig>::new("heat", Dims::default());
    soln.apply_command_line_options("-d 8 -max_threads 2").unwrap();
    let temperature = Arc::new(HostGrid::new("temperature"));
    soln.register_grid("temperature", temperature.clone(), true)
        .unwrap();
    soln.prepare().unwrap();
    assert!(temperature.has_storage());
    assert!(soln.storage().0.num_scratch_buffers() > 0);

    let err = soln.end().unwrap_err();
    assert!(matches!(err, SolutionError::Storage { ref op, .. } if op == "exchange_halos"));
    assert_eq!(soln.phase(), Phase::Ended);
    assert!(!temperature.has_storage());
    assert_eq!(soln.storage().0.num_scratch_buffers(), 0);
    assert_eq!(soln.storage().num_bytes(), 0);
    assert!(soln.thread_counts().is_none());
    assert!(matches!(soln.prepare(), Err(SolutionError::Ended { .. })));
}

#[test]
fn oversized_domain_fails_prepare_cleanly() {
    let mut soln = Solution::<HostConfig>::new("heat", Dims::default());
    soln.apply_command_line_options("-d 3000000 -max_threads 1")
        .unwrap();
    let err = soln.prepare().unwrap_err();
    assert!(matches!(err, SolutionError::InvalidSetting { .. }));
    assert!(err.to_string().contains("overflows"));
    assert_eq!(soln.phase(), Phase::Unprepared);
    assert!(!soln.is_geometry_valid());
    assert!(soln.thread_counts().is_none());
}

#[test]
fn unallocatable_grid_fails_prepare_cleanly() {
    let (mut soln, grids) = with_grids("heat", &["temperature"]);
    soln.apply_command_line_options("-d 2000000 -max_threads 1")
        .unwrap();
    let err = soln.prepare().unwrap_err();
    assert!(matches!(err, SolutionError::Storage { ref op, .. } if op == "alloc_storage"));
    assert_eq!(soln.phase(), Phase::Unprepared);
    assert!(!grids[0].has_storage());

    soln.apply_command_line_options("-d 8").unwrap();
    soln.prepare().unwrap();
    assert!(grids[0].has_storage());
}
