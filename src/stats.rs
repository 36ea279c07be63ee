use crate::{
    pack::WorkPack,
    timer::{TimerKind, Timers},
    utils::{count_str, num_str, pct_str},
};
use core::fmt::Write as _;
use serde::Serialize;
use tracing::info;

/// Raw timer readings in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RawTimes {
    /// Umbrella time of all execution calls.
    pub run: f64,
    /// Inter-rank exchange time.
    pub halo: f64,
    /// Blocking time inside the exchange.
    pub wait: f64,
    /// Completion polling time summed on region thread 0.
    pub test: f64,
    /// Compute outside the interior.
    pub exterior: f64,
    /// Compute inside the interior, polling included.
    pub interior: f64,
}

impl RawTimes {
    /// Read the current timer set.
    #[must_use]
    pub fn from_timers(timers: &Timers) -> Self {
        let secs = |kind| timers.get(kind).elapsed_secs();
        Self {
            run: secs(TimerKind::Run),
            halo: secs(TimerKind::Halo),
            wait: secs(TimerKind::Wait),
            test: secs(TimerKind::Test),
            exterior: secs(TimerKind::Exterior),
            interior: secs(TimerKind::Interior),
        }
    }
}

/// Disjoint partition of `run` derived from overlapping raw samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeBreakdown {
    /// Umbrella time.
    pub run: f64,
    /// Exchange time, at most `run`.
    pub halo: f64,
    /// Blocking time, at most `halo`.
    pub wait: f64,
    /// Per-thread average polling time. Only the part that fits in what
    /// `halo` and `compute` leave of `run` counts toward `halo_total`.
    pub test_avg: f64,
    /// Exterior compute, within what `halo` leaves of `run`.
    pub exterior: f64,
    /// Interior compute net of polling, within what `halo` and `exterior`
    /// leave of `run`.
    pub interior: f64,
    /// `exterior + interior`.
    pub compute: f64,
    /// Exchange plus polling time.
    pub halo_total: f64,
    /// Remainder of `run`.
    pub other: f64,
}

/// Resolve overlapping raw samples into a disjoint breakdown.
///
/// Each category is clamped to the budget its parent leaves, so
/// `compute + halo_total + other == run` and nothing is negative for any
/// non-negative input. `region_threads` of zero counts as one.
#[must_use]
pub fn reconcile(raw: &RawTimes, region_threads: usize) -> TimeBreakdown {
    let RawTimes {
        run,
        halo,
        wait,
        test,
        exterior,
        interior,
    } = *raw;
    let halo = halo.min(run);
    let wait = wait.min(halo);
    let exterior = exterior.min(run - halo);
    let test_avg = test / region_threads.max(1) as f64;
    let interior = (interior - test_avg).min(run - halo - exterior).max(0.0);
    let compute = exterior + interior;
    let halo_total = halo + test_avg.min(run - halo - compute);
    let other = (run - compute - halo_total).max(0.0);
    TimeBreakdown {
        run,
        halo,
        wait,
        test_avg,
        exterior,
        interior,
        compute,
        halo_total,
        other,
    }
}

/// Work and throughput of one pack or of the whole rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkStats {
    /// Domain points over all ranks, not summed over steps.
    pub npts: i64,
    /// Steps done.
    pub nsteps: i64,
    /// Estimated reads.
    pub nreads: i64,
    /// Estimated writes.
    pub nwrites: i64,
    /// Estimated floating-point operations.
    pub nfpops: i64,
    /// Elapsed seconds.
    pub run_time: f64,
    /// Seconds spent in halo exchange.
    pub halo_time: f64,
    /// Reads per second.
    pub reads_ps: f64,
    /// Writes per second.
    pub writes_ps: f64,
    /// Floating-point operations per second.
    pub flops: f64,
    /// Points per second.
    pub pts_ps: f64,
}

impl WorkStats {
    fn set_rates(&mut self, secs: f64) {
        let rate = |n: i64| if secs > 0.0 { n as f64 / secs } else { 0.0 };
        self.reads_ps = rate(self.nreads);
        self.writes_ps = rate(self.nwrites);
        self.flops = rate(self.nfpops);
        self.pts_ps = if secs > 0.0 {
            self.npts as f64 * self.nsteps as f64 / secs
        } else {
            0.0
        };
    }
}

/// Statistics of one pack in a [`Stats`] report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackStats {
    /// Pack name.
    pub name: String,
    /// Its work and throughput.
    #[serde(flatten)]
    pub work: WorkStats,
}

/// Aggregate statistics for the execution since the last report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Rank-wide work and throughput; rates use `run` as the denominator.
    #[serde(flatten)]
    pub work: WorkStats,
    /// Reconciled time categories.
    pub breakdown: TimeBreakdown,
    /// Compute time no pack accounts for.
    pub unattributed_compute: f64,
    /// Per-pack figures in pack order.
    pub packs: Vec<PackStats>,
}

/// A report: the statistics plus the rendered diagnostic text.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Machine-readable figures.
    pub stats: Stats,
    /// Human-readable breakdown; empty when no step was done.
    pub text: String,
}

/// Facts about the solution the accountant cannot know itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportContext {
    /// Domain points over all ranks.
    pub tot_domain_pts: i64,
    /// Threads per region, to average polling time.
    pub region_threads: usize,
    /// Whether halo figures are meaningful.
    pub multi_rank: bool,
}

/// Owns the execution timers and the aggregate step counter and turns them
/// into [`Report`]s.
#[must_use]
#[derive(Debug, Default)]
pub struct TimingAccountant {
    timers: Timers,
    steps_done: i64,
}

impl TimingAccountant {
    /// Zeroed accountant.
    pub fn new() -> Self {
        Self::default()
    }

    /// The timer set.
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// The timer set, mutably.
    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    /// Count `n` more steps for the whole solution.
    pub fn add_steps(&mut self, n: i64) {
        self.steps_done += n;
    }

    /// Steps since the last clear.
    #[must_use]
    pub fn steps_done(&self) -> i64 {
        self.steps_done
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Timers, &mut i64) {
        (&mut self.timers, &mut self.steps_done)
    }

    /// Zero every timer and step counter, the packs' included.
    pub fn clear(&mut self, packs: &mut [WorkPack]) {
        self.timers.clear();
        self.steps_done = 0;
        for pack in packs {
            pack.clear();
        }
    }

    /// Reconcile, roll up per pack, render, log, then clear.
    ///
    /// A second call without intervening execution reports zeros.
    pub fn report(&mut self, packs: &mut [WorkPack], ctx: &ReportContext) -> Report {
        let breakdown = reconcile(&RawTimes::from_timers(&self.timers), ctx.region_threads);
        let steps_done = self.steps_done;

        let mut total = WorkStats {
            npts: ctx.tot_domain_pts,
            nsteps: steps_done,
            run_time: breakdown.run,
            halo_time: breakdown.halo_total,
            ..WorkStats::default()
        };

        // Pack times are clamped so their running sum never exceeds compute.
        let mut attributed = 0.0;
        let mut pack_steps = 0;
        for pack in packs.iter_mut() {
            let ns = pack.steps_done;
            let ptime = pack
                .timer
                .elapsed_secs()
                .min(breakdown.compute - attributed)
                .max(0.0);
            attributed += ptime;
            pack_steps += ns;

            let mut ps = WorkStats {
                npts: ctx.tot_domain_pts,
                nsteps: ns,
                nreads: pack.reads_per_step().saturating_mul(ns),
                nwrites: pack.writes_per_step().saturating_mul(ns),
                nfpops: pack.fpops_per_step().saturating_mul(ns),
                run_time: ptime,
                halo_time: 0.0,
                ..WorkStats::default()
            };
            ps.set_rates(ptime);

            total.nreads = total.nreads.saturating_add(ps.nreads);
            total.nwrites = total.nwrites.saturating_add(ps.nwrites);
            total.nfpops = total.nfpops.saturating_add(ps.nfpops);
            pack.stats = ps;
        }
        total.set_rates(breakdown.run);

        let stats = Stats {
            work: total,
            breakdown,
            unattributed_compute: (breakdown.compute - attributed).max(0.0),
            packs: packs
                .iter()
                .map(|p| PackStats {
                    name: p.name().to_owned(),
                    work: p.stats.clone(),
                })
                .collect(),
        };

        let text = if steps_done > 0 {
            let text = render(&stats, packs, pack_steps != steps_done, ctx.multi_rank);
            info!(target: "soln::stats", "{text}");
            text
        } else {
            String::new()
        };

        self.clear(packs);
        Report { stats, text }
    }
}

fn render(stats: &Stats, packs: &[WorkPack], by_pack: bool, multi_rank: bool) -> String {
    let Stats {
        work,
        breakdown: b,
        unattributed_compute,
        packs: pack_stats,
    } = stats;
    let nsteps = work.nsteps as f64;
    let mut s = String::new();

    // `write!` into a `String` cannot fail.
    let _ = writeln!(s, "Work stats:");
    let _ = writeln!(s, " num-steps-done:                   {}", count_str(work.nsteps));
    let _ = writeln!(s, " num-reads-per-step:               {}", num_str(work.nreads as f64 / nsteps));
    let _ = writeln!(s, " num-writes-per-step:              {}", num_str(work.nwrites as f64 / nsteps));
    let _ = writeln!(s, " num-est-FP-ops-per-step:          {}", num_str(work.nfpops as f64 / nsteps));
    let _ = writeln!(s, " num-points-per-step:              {}", count_str(work.npts));
    if by_pack {
        let _ = writeln!(s, " Work breakdown by stencil pack(s):");
        for pack in packs {
            let pfx = format!("  '{}' ", pack.name());
            let _ = writeln!(s, "{pfx}num-steps-done:           {}", count_str(pack.stats.nsteps));
            let _ = writeln!(s, "{pfx}num-reads-per-step:       {}", count_str(pack.reads_per_step()));
            let _ = writeln!(s, "{pfx}num-writes-per-step:      {}", count_str(pack.writes_per_step()));
            let _ = writeln!(s, "{pfx}num-est-FP-ops-per-step:  {}", count_str(pack.fpops_per_step()));
        }
    }

    let _ = writeln!(s, "\nTime stats:");
    let _ = writeln!(s, " elapsed-time (sec):               {}", num_str(b.run));
    let _ = writeln!(s, " Time breakdown by activity type:");
    let _ = writeln!(s, "  compute time (sec):                {}{}", num_str(b.compute), pct_str(b.compute, b.run));
    if multi_rank {
        let _ = writeln!(s, "  halo exchange time (sec):          {}{}", num_str(b.halo_total), pct_str(b.halo_total, b.run));
    }
    let _ = writeln!(s, "  other time (sec):                  {}{}", num_str(b.other), pct_str(b.other, b.run));
    if by_pack {
        let _ = writeln!(s, " Compute-time breakdown by stencil pack(s):");
        for ps in pack_stats {
            let _ = writeln!(
                s,
                "  '{}' time (sec):       {}{}",
                ps.name,
                num_str(ps.work.run_time),
                pct_str(ps.work.run_time, b.compute)
            );
        }
        let _ = writeln!(
            s,
            "  other (sec):                       {}{}",
            num_str(*unattributed_compute),
            pct_str(*unattributed_compute, b.compute)
        );
    }
    if multi_rank {
        let tests = (b.halo_total - b.halo).max(0.0);
        let packing = (b.halo_total - b.wait - tests).max(0.0);
        let _ = writeln!(s, " Compute-time breakdown by halo area:");
        let _ = writeln!(s, "  rank-exterior compute (sec):       {}{}", num_str(b.exterior), pct_str(b.exterior, b.compute));
        let _ = writeln!(s, "  rank-interior compute (sec):       {}{}", num_str(b.interior), pct_str(b.interior, b.compute));
        let _ = writeln!(s, " Halo-time breakdown:");
        let _ = writeln!(s, "  waits (sec):                       {}{}", num_str(b.wait), pct_str(b.wait, b.halo_total));
        let _ = writeln!(s, "  tests (sec):                       {}{}", num_str(tests), pct_str(tests, b.halo_total));
        let _ = writeln!(s, "  packing, unpacking, etc. (sec):    {}{}", num_str(packing), pct_str(packing, b.halo_total));
    }

    let _ = writeln!(s, "\nRate stats:");
    let _ = writeln!(s, " throughput (num-reads/sec):       {}", num_str(work.reads_ps));
    let _ = writeln!(s, " throughput (num-writes/sec):      {}", num_str(work.writes_ps));
    let _ = writeln!(s, " throughput (est-FLOPS):           {}", num_str(work.flops));
    let _ = writeln!(s, " throughput (num-points/sec):      {}", num_str(work.pts_ps));
    if by_pack {
        let _ = writeln!(s, " Rate breakdown by stencil pack(s):");
        for ps in pack_stats {
            let pfx = format!("  '{}' ", ps.name);
            let _ = writeln!(s, "{pfx}throughput (num-reads/sec):   {}", num_str(ps.work.reads_ps));
            let _ = writeln!(s, "{pfx}throughput (num-writes/sec):  {}", num_str(ps.work.writes_ps));
            let _ = writeln!(s, "{pfx}throughput (est-FLOPS):       {}", num_str(ps.work.flops));
            let _ = writeln!(s, "{pfx}throughput (num-points/sec):  {}", num_str(ps.work.pts_ps));
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(run: f64, halo: f64, wait: f64, test: f64, exterior: f64, interior: f64) -> RawTimes {
        RawTimes {
            run,
            halo,
            wait,
            test,
            exterior,
            interior,
        }
    }

    #[test]
    fn consistent_samples_pass_through() {
        let b = reconcile(&raw(10.0, 2.0, 1.0, 0.8, 3.0, 4.0), 4);
        assert_eq!(b.halo, 2.0);
        assert_eq!(b.wait, 1.0);
        assert_eq!(b.test_avg, 0.2);
        assert_eq!(b.exterior, 3.0);
        assert!((b.interior - 3.8).abs() < 1e-12);
        assert!((b.compute - 6.8).abs() < 1e-12);
        assert!((b.halo_total - 2.2).abs() < 1e-12);
        assert!((b.other - 1.0).abs() < 1e-12);
    }

    #[test]
    fn halo_longer_than_run_is_capped() {
        let b = reconcile(&raw(1.0, 5.0, 4.0, 0.0, 1.0, 1.0), 1);
        assert_eq!(b.halo, 1.0);
        assert_eq!(b.wait, 1.0);
        assert_eq!(b.exterior, 0.0);
        assert_eq!(b.interior, 0.0);
        assert_eq!(b.other, 0.0);
    }

    #[test]
    fn polling_larger_than_interior_clamps_to_zero() {
        let b = reconcile(&raw(10.0, 1.0, 0.0, 8.0, 0.0, 1.0), 2);
        assert_eq!(b.test_avg, 4.0);
        assert_eq!(b.interior, 0.0);
    }

    #[test]
    fn zero_region_threads_counts_as_one() {
        let b = reconcile(&raw(10.0, 0.0, 0.0, 2.0, 0.0, 5.0), 0);
        assert_eq!(b.test_avg, 2.0);
        assert_eq!(b.interior, 3.0);
    }
}
