use crate::{settings::KernelSettings, stats::WorkStats, timer::TimerSample};

/// A named group of update formulas sharing one schedule.
///
/// The compute engine advances `steps_done` and the pack timer while it
/// runs; the accountant reads them when reporting and zeroes them after.
#[must_use]
#[derive(Debug, Clone)]
pub struct WorkPack {
    name: String,
    reads_per_step: i64,
    writes_per_step: i64,
    fpops_per_step: i64,
    local_settings: Option<KernelSettings>,
    pub(crate) steps_done: i64,
    pub(crate) timer: TimerSample,
    pub(crate) stats: WorkStats,
}

impl WorkPack {
    /// Pack with the given per-step work estimates, summed over the rank.
    pub fn new(
        name: impl Into<String>,
        reads_per_step: i64,
        writes_per_step: i64,
        fpops_per_step: i64,
    ) -> Self {
        Self {
            name: name.into(),
            reads_per_step,
            writes_per_step,
            fpops_per_step,
            local_settings: None,
            steps_done: 0,
            timer: TimerSample::new(),
            stats: WorkStats::default(),
        }
    }

    /// Pack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Estimated reads per step.
    #[must_use]
    pub fn reads_per_step(&self) -> i64 {
        self.reads_per_step
    }

    /// Estimated writes per step.
    #[must_use]
    pub fn writes_per_step(&self) -> i64 {
        self.writes_per_step
    }

    /// Estimated floating-point operations per step.
    #[must_use]
    pub fn fpops_per_step(&self) -> i64 {
        self.fpops_per_step
    }

    /// Settings snapshot taken at the last `prepare()`; may since have been
    /// tuned away from the global settings.
    #[must_use]
    pub fn local_settings(&self) -> Option<&KernelSettings> {
        self.local_settings.as_ref()
    }

    /// Mutable settings snapshot, for tuning.
    pub fn local_settings_mut(&mut self) -> Option<&mut KernelSettings> {
        self.local_settings.as_mut()
    }

    pub(crate) fn reset_local_settings(&mut self, settings: &KernelSettings) {
        self.local_settings = Some(settings.clone());
    }

    /// Count `n` more executed steps.
    pub fn add_steps(&mut self, n: i64) {
        self.steps_done += n;
    }

    /// Steps executed since the last report.
    #[must_use]
    pub fn steps_done(&self) -> i64 {
        self.steps_done
    }

    /// Compute timer of this pack.
    pub fn timer(&self) -> &TimerSample {
        &self.timer
    }

    /// Mutable compute timer of this pack.
    pub fn timer_mut(&mut self) -> &mut TimerSample {
        &mut self.timer
    }

    /// Statistics computed by the last report.
    pub fn stats(&self) -> &WorkStats {
        &self.stats
    }

    pub(crate) fn clear(&mut self) {
        self.timer.clear();
        self.steps_done = 0;
    }
}
