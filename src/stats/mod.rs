//! Statistics interfaces consumed by the engine
//!
//! The kernel does not implement estimators. It consumes two small traits:
//! [`Statistic`] is the opaque estimator surface (collect observations,
//! report an estimate), and [`AnalyzableStatistic`] adds the online-analysis
//! surface the run loop monitors: steady-state detection and
//! precision-driven termination. Concrete estimators (means, variances,
//! confidence intervals) live outside this crate.
//!
//! The engine owns a [`StatisticsRegistry`] pairing each registered
//! statistic with a steady-state latch bit; `monitor_statistics` advances
//! the latches after every dispatch cycle and ends the run once every
//! enabled statistic reports its target precision.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::time::Time;

/// Opaque estimator interface.
///
/// Implementations accumulate weighted observations and expose a point
/// estimate; everything else about them is invisible to the kernel.
pub trait Statistic {
    /// Informational name, used in diagnostics and error messages.
    fn name(&self) -> &str;

    /// Accumulate one weighted observation.
    fn collect(&mut self, observation: f64, weight: f64);

    /// Current point estimate.
    fn estimate(&self) -> f64;

    /// Number of observations collected since the last reset.
    fn num_observations(&self) -> u64;

    /// Discard all collected state.
    fn reset(&mut self);
}

/// Online-analyzable statistic: the surface the run loop monitors.
///
/// The engine only ever reads the boolean and precision accessors and
/// writes the steady-state enter time; it never mutates numeric estimator
/// state.
pub trait AnalyzableStatistic: Statistic {
    /// Disabled statistics are skipped by the precision check (but their
    /// steady-state latch still advances).
    fn enabled(&self) -> bool;

    /// Whether the transient warm-up phase is considered over.
    fn steady_state_entered(&self) -> bool;

    /// Simulated time at which steady state was entered; NaN until the
    /// engine records it.
    fn steady_state_enter_time(&self) -> Time;

    /// Recorded by the engine on the latch's rising edge.
    fn set_steady_state_enter_time(&mut self, time: Time);

    /// The relative-error bound the statistic is asked to reach.
    fn target_relative_precision(&self) -> f64;

    /// The relative error currently observed.
    fn relative_precision(&self) -> f64;

    /// Whether the observed precision meets the target.
    fn target_precision_reached(&self) -> bool;

    /// Per-experiment (re)initialization hook, invoked when the statistic
    /// is registered mid-run and at each replication boundary.
    fn initialize_for_experiment(&mut self);
}

/// Shared ownership handle for registered statistics.
pub type SharedStatistic = Rc<RefCell<dyn AnalyzableStatistic>>;

pub(crate) struct RegistryEntry {
    pub(crate) stat: SharedStatistic,
    /// Latched once `steady_state_entered` is first observed true.
    pub(crate) steady_latch: bool,
}

/// The engine-owned set of analyzable statistics.
///
/// Entries keep registration order; identity is by allocation
/// (`Rc::ptr_eq`), so the same statistic cannot be confused with another
/// that happens to share its name.
pub struct StatisticsRegistry {
    entries: Vec<RegistryEntry>,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub(crate) fn register(&mut self, stat: SharedStatistic, steady_latch: bool) {
        self.entries.push(RegistryEntry { stat, steady_latch });
    }

    /// Remove by identity. Returns `false` when the statistic was not
    /// registered.
    pub(crate) fn remove(&mut self, stat: &SharedStatistic) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !Rc::ptr_eq(&entry.stat, stat));
        self.entries.len() < before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [RegistryEntry] {
        &mut self.entries
    }
}

impl Default for StatisticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Default analyzable envelope around a raw estimator.
///
/// Enters steady state on the first observation and never reports its
/// target precision as reached, so a run using only passthrough envelopes
/// terminates via END_SIM or FEL exhaustion. Analysis-specific engines
/// supply richer envelopes through their
/// [`StatisticWrapper`](crate::strategy::StatisticWrapper).
pub struct PassthroughStatistic {
    inner: Box<dyn Statistic>,
    enabled: bool,
    steady_state_enter_time: Time,
}

impl PassthroughStatistic {
    pub fn new(inner: Box<dyn Statistic>) -> Self {
        Self {
            inner,
            enabled: true,
            steady_state_enter_time: Time::NAN,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl Statistic for PassthroughStatistic {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn collect(&mut self, observation: f64, weight: f64) {
        self.inner.collect(observation, weight);
    }

    fn estimate(&self) -> f64 {
        self.inner.estimate()
    }

    fn num_observations(&self) -> u64 {
        self.inner.num_observations()
    }

    fn reset(&mut self) {
        self.steady_state_enter_time = Time::NAN;
        self.inner.reset();
    }
}

impl AnalyzableStatistic for PassthroughStatistic {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn steady_state_entered(&self) -> bool {
        self.inner.num_observations() > 0
    }

    fn steady_state_enter_time(&self) -> Time {
        self.steady_state_enter_time
    }

    fn set_steady_state_enter_time(&mut self, time: Time) {
        self.steady_state_enter_time = time;
    }

    fn target_relative_precision(&self) -> f64 {
        f64::INFINITY
    }

    fn relative_precision(&self) -> f64 {
        f64::INFINITY
    }

    fn target_precision_reached(&self) -> bool {
        false
    }

    fn initialize_for_experiment(&mut self) {
        self.inner.reset();
    }
}
