use derive_more::Display;
use std::time::{Duration, Instant};

/// Accumulating wall-clock timer.
///
/// Elapsed time is the sum of all completed `start`/`stop` intervals since
/// the last [`clear`](Self::clear). A sample has a single owner; it is not
/// meant to be started from several threads at once.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct TimerSample {
    elapsed: Duration,
    started: Option<Instant>,
}

impl TimerSample {
    /// Stopped timer with nothing accumulated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin an interval. Restarting a running timer discards the open
    /// interval.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// End the open interval and return its length. A stopped timer returns
    /// zero and accumulates nothing.
    pub fn stop(&mut self) -> Duration {
        let Some(started) = self.started.take() else {
            return Duration::ZERO;
        };
        let interval = started.elapsed();
        self.elapsed += interval;
        interval
    }

    /// Add an externally measured interval.
    pub fn record(&mut self, interval: Duration) {
        self.elapsed += interval;
    }

    /// Drop accumulated time and any open interval.
    pub fn clear(&mut self) {
        self.elapsed = Duration::ZERO;
        self.started = None;
    }

    /// Accumulated time of completed intervals.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// [`elapsed`](Self::elapsed) in seconds.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Whether an interval is open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Start now and stop when the guard drops.
    pub fn scoped(&mut self) -> TimerGuard<'_> {
        self.start();
        TimerGuard { timer: self }
    }
}

/// Stops its timer on drop.
#[must_use = "the interval ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TimerGuard<'a> {
    timer: &'a mut TimerSample,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop();
    }
}

/// The fixed set of overlapping execution timers.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Spans a whole execution call; contains every other timer.
    #[display("run")]
    Run,
    /// Inter-rank exchange.
    #[display("halo")]
    Halo,
    /// Blocking for message completion, inside `Halo`.
    #[display("wait")]
    Wait,
    /// Non-blocking completion polling, measured on region thread 0 only.
    #[display("test")]
    Test,
    /// Compute outside the halo-independent interior.
    #[display("exterior")]
    Exterior,
    /// Compute inside the halo-independent interior.
    #[display("interior")]
    Interior,
}

impl TimerKind {
    /// Every kind, umbrella first.
    pub const ALL: [Self; 6] = [
        Self::Run,
        Self::Halo,
        Self::Wait,
        Self::Test,
        Self::Exterior,
        Self::Interior,
    ];
}

/// One [`TimerSample`] per [`TimerKind`].
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct Timers {
    run: TimerSample,
    halo: TimerSample,
    wait: TimerSample,
    test: TimerSample,
    exterior: TimerSample,
    interior: TimerSample,
}

impl Timers {
    /// All timers stopped and zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer for `kind`.
    pub fn get(&self, kind: TimerKind) -> &TimerSample {
        match kind {
            TimerKind::Run => &self.run,
            TimerKind::Halo => &self.halo,
            TimerKind::Wait => &self.wait,
            TimerKind::Test => &self.test,
            TimerKind::Exterior => &self.exterior,
            TimerKind::Interior => &self.interior,
        }
    }

    /// Mutable timer for `kind`.
    pub fn get_mut(&mut self, kind: TimerKind) -> &mut TimerSample {
        match kind {
            TimerKind::Run => &mut self.run,
            TimerKind::Halo => &mut self.halo,
            TimerKind::Wait => &mut self.wait,
            TimerKind::Test => &mut self.test,
            TimerKind::Exterior => &mut self.exterior,
            TimerKind::Interior => &mut self.interior,
        }
    }

    /// Halo and wait timers borrowed together, for timing an exchange.
    pub(crate) fn halo_and_wait(&mut self) -> (&mut TimerSample, &mut TimerSample) {
        (&mut self.halo, &mut self.wait)
    }

    /// Zero every timer.
    pub fn clear(&mut self) {
        for kind in TimerKind::ALL {
            self.get_mut(kind).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_intervals_until_cleared() {
        let mut t = TimerSample::new();
        t.record(Duration::from_millis(5));
        t.record(Duration::from_millis(7));
        assert_eq!(t.elapsed(), Duration::from_millis(12));
        t.clear();
        assert_eq!(t.elapsed(), Duration::ZERO);
    }

    #[test]
    fn stop_without_start_is_zero() {
        let mut t = TimerSample::new();
        assert_eq!(t.stop(), Duration::ZERO);
        assert!(!t.is_running());
    }

    #[test]
    fn guard_stops_on_drop() {
        let mut t = TimerSample::new();
        {
            let _guard = t.scoped();
        }
        assert!(!t.is_running());
    }

    #[test]
    fn clear_resets_whole_set() {
        let mut timers = Timers::new();
        for kind in TimerKind::ALL {
            timers.get_mut(kind).record(Duration::from_secs(1));
        }
        timers.clear();
        assert!(
            TimerKind::ALL
                .iter()
                .all(|&k| timers.get(k).elapsed().is_zero())
        );
    }
}
