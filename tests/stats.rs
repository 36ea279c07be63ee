#![allow(missing_docs)]

use approx::{abs_diff_eq, assert_abs_diff_eq};
use proptest::prelude::*;
use soln::{
    pack::WorkPack,
    stats::{RawTimes, ReportContext, TimingAccountant, reconcile},
    timer::TimerKind,
};
use std::time::Duration;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

fn accountant(samples: &[(TimerKind, f64)], steps: i64) -> TimingAccountant {
    let mut acc = TimingAccountant::new();
    for &(kind, s) in samples {
        acc.timers_mut().get_mut(kind).record(secs(s));
    }
    acc.add_steps(steps);
    acc
}

fn pack(name: &str, steps: i64, time: f64) -> WorkPack {
    let mut pack = WorkPack::new(name, 10, 2, 30);
    pack.add_steps(steps);
    pack.timer_mut().record(secs(time));
    pack
}

const CTX: ReportContext = ReportContext {
    tot_domain_pts: 1000,
    region_threads: 2,
    multi_rank: false,
};

proptest! {
    #[test]
    fn breakdown_partitions_run(
        run in 0.0f64..100.0,
        halo_frac in 0.0f64..=1.0,
        wait_frac in 0.0f64..=1.0,
        ext_frac in 0.0f64..=1.0,
        int_frac in 0.0f64..=1.0,
        test in 0.0f64..50.0,
        threads in 0usize..16,
    ) {
        let halo = run * halo_frac;
        let exterior = run * ext_frac;
        let raw = RawTimes {
            run,
            halo,
            wait: halo * wait_frac,
            test,
            exterior,
            interior: (run - exterior) * int_frac,
        };
        let b = reconcile(&raw, threads);
        prop_assert!(abs_diff_eq!(b.compute + b.halo_total + b.other, run, epsilon = 1e-9));
        for v in [b.halo, b.wait, b.test_avg, b.exterior, b.interior, b.compute, b.halo_total, b.other] {
            prop_assert!(v >= -1e-9, "negative category in {b:?}");
        }
        prop_assert!(b.wait <= b.halo);
        prop_assert!(b.compute <= run - b.halo + 1e-9);
    }

    #[test]
    fn inconsistent_samples_still_partition_run(
        run in 0.0f64..10.0,
        halo in 0.0f64..20.0,
        wait in 0.0f64..20.0,
        test in 0.0f64..20.0,
        exterior in 0.0f64..20.0,
        interior in 0.0f64..20.0,
        threads in 1usize..8,
    ) {
        let b = reconcile(&RawTimes { run, halo, wait, test, exterior, interior }, threads);
        prop_assert!(abs_diff_eq!(b.compute + b.halo_total + b.other, run, epsilon = 1e-9));
        prop_assert!(b.interior >= 0.0);
        prop_assert!(b.other >= 0.0);
    }
}

#[test]
fn report_clears_what_it_reads() {
    let mut acc = accountant(&[(TimerKind::Run, 2.0), (TimerKind::Interior, 1.0)], 4);
    let mut packs = vec![pack("main", 4, 1.0)];

    let first = acc.report(&mut packs, &CTX);
    assert_eq!(first.stats.work.nsteps, 4);
    assert_abs_diff_eq!(first.stats.breakdown.run, 2.0, epsilon = 1e-9);
    assert!(!first.text.is_empty());

    let second = acc.report(&mut packs, &CTX);
    assert_eq!(second.stats.work.nsteps, 0);
    assert_eq!(second.stats.breakdown.run, 0.0);
    assert_eq!(second.stats.breakdown.compute, 0.0);
    assert_eq!(second.stats.packs[0].work.nsteps, 0);
    assert_eq!(second.stats.packs[0].work.run_time, 0.0);
    assert!(second.text.is_empty());
    assert_eq!(packs[0].steps_done(), 0);
}

#[test]
fn pack_times_never_exceed_compute() {
    let mut acc = accountant(
        &[
            (TimerKind::Run, 10.0),
            (TimerKind::Exterior, 1.0),
            (TimerKind::Interior, 2.0),
        ],
        5,
    );
    let mut packs = vec![pack("a", 5, 2.0), pack("b", 5, 2.0), pack("c", 5, 0.5)];
    let stats = acc.report(&mut packs, &CTX).stats;

    assert_abs_diff_eq!(stats.breakdown.compute, 3.0, epsilon = 1e-9);
    let times: Vec<f64> = stats.packs.iter().map(|p| p.work.run_time).collect();
    assert_abs_diff_eq!(times[0], 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(times[1], 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(times[2], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(stats.unattributed_compute, 0.0, epsilon = 1e-9);
    assert_eq!(packs[0].stats().run_time, stats.packs[0].work.run_time);
}

#[test]
fn leftover_compute_is_unattributed() {
    let mut acc = accountant(&[(TimerKind::Run, 10.0), (TimerKind::Interior, 4.0)], 2);
    let mut packs = vec![pack("a", 2, 1.5)];
    let stats = acc.report(&mut packs, &CTX).stats;
    assert_abs_diff_eq!(stats.unattributed_compute, 2.5, epsilon = 1e-9);
}

#[test]
fn rates_use_positive_durations_only() {
    let mut acc = accountant(&[(TimerKind::Run, 4.0), (TimerKind::Interior, 2.0)], 8);
    let mut packs = vec![pack("busy", 8, 2.0), pack("idle", 8, 0.0)];
    let stats = acc.report(&mut packs, &CTX).stats;

    // Aggregate rates divide by run.
    assert_abs_diff_eq!(stats.work.pts_ps, 1000.0 * 8.0 / 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(stats.work.reads_ps, (10.0 * 8.0 * 2.0) / 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(stats.packs[0].work.flops, 30.0 * 8.0 / 2.0, epsilon = 1e-6);
    assert_eq!(stats.packs[1].work.flops, 0.0);
    assert_eq!(stats.packs[1].work.pts_ps, 0.0);

    let mut empty = TimingAccountant::new();
    let stats = empty.report(&mut [], &CTX).stats;
    assert_eq!(stats.work.pts_ps, 0.0);
    assert_eq!(stats.work.flops, 0.0);
}

#[test]
fn pack_breakdown_only_when_steps_differ() {
    let samples = [(TimerKind::Run, 1.0), (TimerKind::Interior, 0.5)];

    let mut same = vec![pack("a", 3, 0.2)];
    let text = accountant(&samples, 3).report(&mut same, &CTX).text;
    assert!(!text.contains("by stencil pack"));

    let mut split = vec![pack("a", 3, 0.2), pack("b", 3, 0.2)];
    let text = accountant(&samples, 3).report(&mut split, &CTX).text;
    assert!(text.contains("Work breakdown by stencil pack(s)"));
    assert!(text.contains("'b' time (sec)"));
}

#[test]
fn halo_sections_need_several_ranks() {
    let samples = [
        (TimerKind::Run, 1.0),
        (TimerKind::Halo, 0.25),
        (TimerKind::Wait, 0.1),
    ];
    let single = accountant(&samples, 1).report(&mut [], &CTX).text;
    assert!(!single.contains("halo exchange time"));

    let ctx = ReportContext {
        multi_rank: true,
        ..CTX
    };
    let multi = accountant(&samples, 1).report(&mut [], &ctx).text;
    assert!(multi.contains("halo exchange time (sec):          250m (25%)"));
    assert!(multi.contains("waits (sec):"));
}

#[test]
fn halo_breakdown_shows_only_counted_tests() {
    let samples = [
        (TimerKind::Run, 10.0),
        (TimerKind::Halo, 5.0),
        (TimerKind::Interior, 10.0),
        (TimerKind::Test, 2.0),
    ];
    let ctx = ReportContext {
        region_threads: 1,
        multi_rank: true,
        ..CTX
    };
    let report = accountant(&samples, 1).report(&mut [], &ctx);
    let b = &report.stats.breakdown;
    assert_eq!(b.test_avg, 2.0);
    assert_eq!(b.halo_total, 5.0);
    assert!(report.text.contains("  tests (sec):                       0 (0%)"));
    assert!(report.text.contains("  packing, unpacking, etc. (sec):    5 (100%)"));
}

#[test]
fn stats_serialize_flat() {
    let mut acc = accountant(&[(TimerKind::Run, 1.0), (TimerKind::Exterior, 0.5)], 2);
    let mut packs = vec![pack("main", 2, 0.5)];
    let stats = acc.report(&mut packs, &CTX).stats;

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["nsteps"], 2);
    assert_eq!(json["npts"], 1000);
    assert_eq!(json["breakdown"]["run"], 1.0);
    assert_eq!(json["packs"][0]["name"], "main");
    assert_eq!(json["packs"][0]["nreads"], 20);
}
