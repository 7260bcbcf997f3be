//! The discrete-event simulation engine
//!
//! Owns the future-event list, the simulated clock, the six built-in
//! lifecycle event sources, and the statistics registry, and drives the
//! dispatch loop:
//!
//! ```text
//! run():
//! 1. end_of_simulation := false
//! 2. strategy.execute(engine)         (default: SingleRun)
//!      prepare_simulation             → reset + BEGIN_SIM
//!      initialize_simulated_system    → SYSTEM_INIT
//!      loop: advance()                → pop, BEFORE, fire, AFTER, monitor
//!      finalize_simulated_system      → SYSTEM_FINAL
//!      finalize_simulation            → clear FEL + END_SIM
//! 3. end_of_simulation := true, FEL cleared
//! ```
//!
//! # Determinism
//!
//! Events fire in nondecreasing fire-time order; ties break FIFO through
//! the FEL's monotonic sequence numbers, and each event's sinks fire in
//! connection order. Given the same sink set and the same seeding, two
//! runs produce identical traces.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use des_simulator_core_rs::{Engine, EventSource};
//!
//! let mut engine = Engine::new();
//! let arrivals = EventSource::new("arrival");
//!
//! let fired = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&fired);
//! arrivals.connect(move |event, _ctx| log.borrow_mut().push(event.fire_time()));
//!
//! // Seed the run from the SYSTEM_INIT hook: prepare_simulation clears the
//! // future-event list, so seeding earlier would be lost.
//! let src = Rc::clone(&arrivals);
//! engine.system_initialization_event_source().connect(move |_event, ctx| {
//!     ctx.schedule_event(&src, 4.0);
//!     ctx.schedule_event(&src, 2.0);
//! });
//!
//! engine.run();
//! assert_eq!(*fired.borrow(), vec![2.0, 4.0]);
//! assert_eq!(engine.simulated_time(), 4.0);
//! assert!(engine.end_of_simulation());
//! ```

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::core::time::{essentially_equal, Time, DEFAULT_TIME_TOLERANCE};
use crate::engine::context::EngineContext;
use crate::engine::diag::{DiagnosticSink, TracingSink};
use crate::models::event::{Event, EventHandle};
use crate::models::event_list::EventList;
use crate::models::source::EventSource;
use crate::stats::{SharedStatistic, Statistic, StatisticsRegistry};
use crate::strategy::{PassthroughWrapper, RunStrategy, SingleRun, StatisticWrapper};

// ============================================================================
// Configuration
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Relative tolerance under which a reschedule target counts as equal
    /// to the current fire time and is dropped as a no-op.
    pub time_tolerance: Time,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_tolerance: DEFAULT_TIME_TOLERANCE,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal engine errors. Soft contract violations are warnings on the
/// diagnostic channel instead; see the crate docs.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// `remove_statistic` was given a statistic that is not registered.
    #[error("statistic '{0}' is not registered for analysis")]
    StatisticNotRegistered(String),

    /// `stop_at_time` was given a time the clock has already passed.
    #[error("cannot stop the simulation at past time {requested} (clock: {current})")]
    StopTimeInPast { requested: Time, current: Time },
}

// ============================================================================
// Engine
// ============================================================================

/// The core discrete-event simulation engine.
///
/// One instance per simulation; `run` may be called repeatedly, each call
/// starting from a fully reset state. All mutation happens on the single
/// logical thread driving the dispatch loop; the engine imposes no
/// synchronization.
pub struct Engine {
    config: EngineConfig,

    /// The future-event list.
    fel: EventList,

    // The six built-in lifecycle sources.
    begin_src: Rc<EventSource>,
    end_src: Rc<EventSource>,
    before_src: Rc<EventSource>,
    after_src: Rc<EventSource>,
    init_src: Rc<EventSource>,
    final_src: Rc<EventSource>,

    /// The simulated clock. Monotonically nondecreasing within a run.
    sim_time: Time,

    /// Fire time of the most recently dispatched event.
    last_event_time: Time,

    /// True while no run is in progress and once a run has ended.
    end_of_sim: bool,

    /// All dispatched events, including lifecycle and wrapper fires.
    num_events: u64,

    /// Dispatched events whose source is not one of the six built-ins.
    num_user_events: u64,

    next_event_id: u64,

    stats: StatisticsRegistry,

    /// Taken out for the duration of `run`, restored afterwards.
    strategy: Option<Box<dyn RunStrategy>>,

    wrapper: Box<dyn StatisticWrapper>,

    diagnostics: Box<dyn DiagnosticSink>,
}

impl Engine {
    /// Create an engine with the default configuration, the [`SingleRun`]
    /// strategy, passthrough statistic wrapping, and `tracing` diagnostics.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            fel: EventList::new(),
            begin_src: EventSource::new("Begin of Simulation"),
            end_src: EventSource::new("End of Simulation"),
            before_src: EventSource::new("Before Event Firing"),
            after_src: EventSource::new("After Event Firing"),
            init_src: EventSource::new("System Initialization"),
            final_src: EventSource::new("System Finalization"),
            sim_time: 0.0,
            last_event_time: 0.0,
            // The engine starts idle; advance() is a no-op until run()
            // or prepare_simulation() opens a run.
            end_of_sim: true,
            num_events: 0,
            num_user_events: 0,
            next_event_id: 0,
            stats: StatisticsRegistry::new(),
            strategy: Some(Box::new(SingleRun)),
            wrapper: Box::new(PassthroughWrapper),
            diagnostics: Box::new(TracingSink),
        }
    }

    /// Replace the run strategy (default: [`SingleRun`]).
    pub fn set_strategy(&mut self, strategy: Box<dyn RunStrategy>) {
        self.strategy = Some(strategy);
    }

    /// Replace the statistic-wrapping capability (default:
    /// [`PassthroughWrapper`]).
    pub fn set_statistic_wrapper(&mut self, wrapper: Box<dyn StatisticWrapper>) {
        self.wrapper = wrapper;
    }

    /// Replace the diagnostic sink (default: [`crate::TracingSink`]).
    pub fn set_diagnostics(&mut self, diagnostics: Box<dyn DiagnosticSink>) {
        self.diagnostics = diagnostics;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Built-in event sources
    // ========================================================================

    /// Source of the BEGIN-OF-SIMULATION event, fired once just before a
    /// run starts. Attach sinks for preliminary work.
    pub fn begin_of_sim_event_source(&self) -> &Rc<EventSource> {
        &self.begin_src
    }

    /// Source of the END-OF-SIMULATION event. Fires when a scheduled stop
    /// elapses and again when the run finalizes.
    pub fn end_of_sim_event_source(&self) -> &Rc<EventSource> {
        &self.end_src
    }

    /// Source fired just before every event dispatch, wrapping the event
    /// about to fire. Skipped entirely while it has no sinks.
    pub fn before_of_event_firing_source(&self) -> &Rc<EventSource> {
        &self.before_src
    }

    /// Source fired just after every event dispatch, wrapping the event
    /// that fired. Skipped entirely while it has no sinks.
    pub fn after_of_event_firing_source(&self) -> &Rc<EventSource> {
        &self.after_src
    }

    /// Source of the SYSTEM-INITIALIZATION event. This is the seeding
    /// hook: `prepare_simulation` clears the future-event list, so initial
    /// events must be scheduled from here.
    pub fn system_initialization_event_source(&self) -> &Rc<EventSource> {
        &self.init_src
    }

    /// Source of the SYSTEM-FINALIZATION event, fired after the advance
    /// loop exits and before END-OF-SIMULATION.
    pub fn system_finalization_event_source(&self) -> &Rc<EventSource> {
        &self.final_src
    }

    // ========================================================================
    // Clock and counters
    // ========================================================================

    /// The simulated time to date.
    pub fn simulated_time(&self) -> Time {
        self.sim_time
    }

    /// Fire time of the last dispatched event.
    pub fn last_event_time(&self) -> Time {
        self.last_event_time
    }

    /// Whether the simulation has ended (or has not started yet).
    pub fn end_of_simulation(&self) -> bool {
        self.end_of_sim
    }

    /// Total dispatched events, lifecycle and wrapper fires included.
    pub fn num_events(&self) -> u64 {
        self.num_events
    }

    /// Dispatched events originating from user sources.
    pub fn num_user_events(&self) -> u64 {
        self.num_user_events
    }

    /// Whether the future-event list still holds pending events.
    pub fn has_pending_events(&self) -> bool {
        !self.fel.is_empty()
    }

    /// Number of pending events in the future-event list.
    pub fn pending_event_count(&self) -> usize {
        self.fel.len()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule an event on `source` at the given fire time.
    ///
    /// Returns `None` (with a warning) when the source is disabled. A fire
    /// time in the past is clamped to the current clock with a warning.
    /// The event's scheduled time is stamped with the current clock.
    pub fn schedule_event(&mut self, source: &Rc<EventSource>, time: Time) -> Option<EventHandle> {
        self.schedule_impl(source, time, None)
    }

    /// Like [`Engine::schedule_event`], attaching an opaque payload that
    /// sinks can recover with [`Event::payload_as`].
    pub fn schedule_event_with<P: Any>(
        &mut self,
        source: &Rc<EventSource>,
        time: Time,
        payload: P,
    ) -> Option<EventHandle> {
        self.schedule_impl(source, time, Some(Rc::new(payload) as Rc<dyn Any>))
    }

    fn schedule_impl(
        &mut self,
        source: &Rc<EventSource>,
        time: Time,
        payload: Option<Rc<dyn Any>>,
    ) -> Option<EventHandle> {
        if !source.enabled() {
            self.warn(format!(
                "tried to schedule an event from the disabled source '{}' at time {} (clock: {})",
                source.name(),
                time,
                self.sim_time
            ));
            return None;
        }

        let mut time = time;
        if time < self.sim_time {
            self.warn(format!(
                "fire time {} for source '{}' refers to the past: synched to current time ({})",
                time,
                source.name(),
                self.sim_time
            ));
            time = self.sim_time;
        }

        let handle = self.next_handle();
        let event = Event::new(handle, Rc::clone(source), self.sim_time, time, payload);
        self.fel.push(event);
        Some(handle)
    }

    /// Move a pending event to a new fire time.
    ///
    /// Soft-violation fallbacks, each with a warning:
    /// - unknown handle (already fired or cancelled): no-op;
    /// - source disabled: no-op;
    /// - new time in the past while the event is still in the future:
    ///   clamped to the current clock;
    /// - new time in the past and the event's fire time already passed:
    ///   no-op;
    /// - new time essentially equal to the current fire time: no-op, the
    ///   event keeps its queue position.
    ///
    /// A successful reschedule re-pushes the event, so it moves behind
    /// everything already queued for the new fire time.
    pub fn reschedule_event(&mut self, handle: EventHandle, new_time: Time) {
        let (source_enabled, source_name, current_fire_time) = match self.fel.get(handle) {
            Some(event) => (
                event.source().enabled(),
                event.source().name().to_string(),
                event.fire_time(),
            ),
            None => {
                self.warn(format!(
                    "cannot reschedule event #{}: it is not pending (already fired or cancelled)",
                    handle.raw()
                ));
                return;
            }
        };

        if !source_enabled {
            self.warn(format!(
                "tried to reschedule an event from the disabled source '{}' to time {} (clock: {})",
                source_name, new_time, self.sim_time
            ));
            return;
        }

        let mut new_time = new_time;
        if new_time < self.sim_time {
            if current_fire_time > self.sim_time {
                self.warn(format!(
                    "new fire time {} refers to the past and will be adjusted to current time ({})",
                    new_time, self.sim_time
                ));
                new_time = self.sim_time;
            } else {
                self.warn(format!(
                    "new fire time {} refers to the past and the event will not be rescheduled",
                    new_time
                ));
                return;
            }
        }

        if essentially_equal(new_time, current_fire_time, self.config.time_tolerance) {
            self.warn(format!(
                "new fire time {} is approximately equal to the old one and the event will not be rescheduled",
                new_time
            ));
            return;
        }

        if let Some(mut event) = self.fel.remove(handle) {
            event.set_fire_time(new_time);
            self.fel.push(event);
        }
    }

    /// Remove a pending event. Returns `false` without error when the
    /// handle does not resolve (already fired, cancelled, or never queued).
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.fel.erase(handle)
    }

    // ========================================================================
    // Run control
    // ========================================================================

    /// Run the simulation to completion under the installed strategy.
    ///
    /// The run ends when the strategy returns: on END-OF-SIMULATION, on an
    /// exhausted future-event list, or when every enabled analyzable
    /// statistic reports its target precision. The engine is fully reset
    /// at the start of each run, so `run` may be called again.
    pub fn run(&mut self) {
        let Some(mut strategy) = self.strategy.take() else {
            self.warn("run() invoked while a run is already in progress; ignored".to_string());
            return;
        };

        self.end_of_sim = false;
        strategy.execute(self);
        self.strategy = Some(strategy);

        self.end_of_sim = true;
        self.fel.clear();
    }

    /// Execute one dispatch cycle: fire the earliest pending event, then
    /// monitor statistics. No-op when the simulation has ended or the
    /// future-event list is empty.
    pub fn advance(&mut self) {
        if self.end_of_sim || self.fel.is_empty() {
            return;
        }
        self.fire_next_event();
        self.monitor_statistics();
    }

    /// Ask the run to stop at the next cycle boundary. The in-flight
    /// dispatch completes first; END-OF-SIMULATION fires during
    /// finalization, not here.
    pub fn stop_now(&mut self) {
        self.end_of_sim = true;
    }

    /// Schedule the run to stop at `time` by queueing an
    /// END-OF-SIMULATION event.
    ///
    /// # Errors
    ///
    /// [`EngineError::StopTimeInPast`] when the clock has already passed
    /// `time`; the engine state is unchanged.
    pub fn stop_at_time(&mut self, time: Time) -> Result<(), EngineError> {
        if time < self.sim_time {
            return Err(EngineError::StopTimeInPast {
                requested: time,
                current: self.sim_time,
            });
        }
        let source = Rc::clone(&self.end_src);
        self.schedule_event(&source, time);
        Ok(())
    }

    // ========================================================================
    // Lifecycle protocol
    // ========================================================================
    //
    // Public so run strategies can compose the pieces; SingleRun calls them
    // in the canonical order.

    /// Reset core state and statistics, then fire BEGIN-OF-SIMULATION
    /// immediately.
    pub fn prepare_simulation(&mut self) {
        self.reset_run_state();
        self.reset_statistics();
        let source = Rc::clone(&self.begin_src);
        self.fire_immediate_event(&source);
    }

    /// Fire SYSTEM-INITIALIZATION immediately. Models seed their initial
    /// events from sinks on this source.
    pub fn initialize_simulated_system(&mut self) {
        let source = Rc::clone(&self.init_src);
        self.fire_immediate_event(&source);
    }

    /// Fire SYSTEM-FINALIZATION immediately.
    pub fn finalize_simulated_system(&mut self) {
        let source = Rc::clone(&self.final_src);
        self.fire_immediate_event(&source);
    }

    /// Mark the run ended, clear the future-event list, and fire
    /// END-OF-SIMULATION immediately.
    ///
    /// The fire is unconditional: a run that already dispatched a
    /// *scheduled* END-OF-SIMULATION event (e.g. via
    /// [`Engine::stop_at_time`]) observes a second fire here.
    pub fn finalize_simulation(&mut self) {
        if !self.end_of_sim {
            self.end_of_sim = true;
        }
        self.fel.clear();
        let source = Rc::clone(&self.end_src);
        self.fire_immediate_event(&source);
    }

    /// Reset clock, counters, flag, and future-event list. Statistics are
    /// untouched: replication strategies reset core state between
    /// experiments while estimators keep accumulating.
    pub fn reset_run_state(&mut self) {
        self.sim_time = 0.0;
        self.last_event_time = 0.0;
        self.num_events = 0;
        self.num_user_events = 0;
        self.end_of_sim = false;
        self.fel.clear();
    }

    /// Invoke the per-experiment initialization hook of every registered
    /// statistic. Used by replication strategies at experiment boundaries.
    pub fn initialize_statistics_for_experiment(&mut self) {
        for entry in self.stats.entries_mut() {
            entry.stat.borrow_mut().initialize_for_experiment();
        }
    }

    fn reset_statistics(&mut self) {
        for entry in self.stats.entries_mut() {
            entry.stat.borrow_mut().reset();
            // Re-derive the latch so a second run starts from the
            // statistic's post-reset state.
            entry.steady_latch = entry.stat.borrow().steady_state_entered();
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Register a statistic for online analysis.
    ///
    /// The steady-state latch initializes from the statistic's current
    /// state: registering a statistic that already entered steady state
    /// latches immediately and no enter time is recorded retroactively.
    /// When a run is in progress the statistic's per-experiment hook is
    /// invoked.
    pub fn analyze_statistic(&mut self, stat: SharedStatistic) {
        let latch = stat.borrow().steady_state_entered();
        if !self.end_of_sim {
            stat.borrow_mut().initialize_for_experiment();
        }
        self.stats.register(stat, latch);
    }

    /// Deregister a statistic.
    ///
    /// # Errors
    ///
    /// [`EngineError::StatisticNotRegistered`] when the statistic is not in
    /// the registry; the registry is unchanged.
    pub fn remove_statistic(&mut self, stat: &SharedStatistic) -> Result<(), EngineError> {
        if self.stats.remove(stat) {
            Ok(())
        } else {
            Err(EngineError::StatisticNotRegistered(
                stat.borrow().name().to_string(),
            ))
        }
    }

    /// Deregister every statistic.
    pub fn remove_statistics(&mut self) {
        self.stats.clear();
    }

    /// Wrap a raw estimator in the installed analysis envelope and
    /// register the result. Returns the shared handle for later removal or
    /// inspection.
    pub fn make_analyzable_statistic(&mut self, raw: Box<dyn Statistic>) -> SharedStatistic {
        let stat = self.wrapper.wrap(raw);
        self.analyze_statistic(Rc::clone(&stat));
        stat
    }

    /// Number of registered statistics.
    pub fn num_statistics(&self) -> usize {
        self.stats.len()
    }

    /// Whether every enabled registered statistic reports its target
    /// precision. False when the registry is empty.
    pub fn statistics_precision_reached(&self) -> bool {
        if self.stats.is_empty() {
            return false;
        }
        self.stats.entries().iter().all(|entry| {
            let stat = entry.stat.borrow();
            !stat.enabled() || stat.target_precision_reached()
        })
    }

    /// The per-cycle monitoring pass.
    ///
    /// Every entry is visited, with no short-circuit, so steady-state latches
    /// advance even after some statistic has already reached precision.
    fn monitor_statistics(&mut self) {
        if self.stats.is_empty() {
            return;
        }

        let sim_time = self.sim_time;
        let mut all_reached = true;
        for entry in self.stats.entries_mut() {
            if !entry.steady_latch && entry.stat.borrow().steady_state_entered() {
                entry.steady_latch = true;
                entry.stat.borrow_mut().set_steady_state_enter_time(sim_time);
            }

            let stat = entry.stat.borrow();
            if stat.enabled() && !stat.target_precision_reached() {
                all_reached = false;
            }
        }

        if all_reached {
            self.end_of_sim = true;
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn fire_next_event(&mut self) {
        let Some(event) = self.fel.pop() else {
            return;
        };

        if !event.source().enabled() {
            let message = format!(
                "event from the disabled source '{}' (fire time {}) will not be fired",
                event.source().name(),
                event.fire_time()
            );
            self.warn(message);
            return;
        }

        debug_assert!(
            event.fire_time() >= self.sim_time,
            "popped an event whose fire time lies in the past"
        );

        self.sim_time = event.fire_time();
        self.dispatch(event);
    }

    /// Fire an event on `source` right now, bypassing the future-event
    /// list. Used for the lifecycle events; the clock does not move.
    fn fire_immediate_event(&mut self, source: &Rc<EventSource>) {
        if !source.enabled() {
            let message = format!(
                "immediate event from the disabled source '{}' will not be fired",
                source.name()
            );
            self.warn(message);
            return;
        }
        let handle = self.next_handle();
        let event = Event::new(handle, Rc::clone(source), self.sim_time, self.sim_time, None);
        self.dispatch(event);
    }

    /// The shared dispatch path: count, bracket with BEFORE/AFTER wrapper
    /// fires when those sources have sinks, fire the event's own sinks,
    /// record the fire time, and detect END-OF-SIMULATION.
    fn dispatch(&mut self, event: Event) {
        self.num_events += 1;
        if !self.is_internal_source(event.source_rc()) {
            self.num_user_events += 1;
        }

        let event = Rc::new(event);

        if !self.before_src.is_empty() {
            let wrapper = self.make_internal_event(Rc::clone(&self.before_src), Rc::clone(&event));
            self.fire_on_own_source(wrapper);
            self.num_events += 1;
        }

        let source = Rc::clone(event.source_rc());
        {
            let mut ctx = EngineContext::new(self);
            source.fire(&event, &mut ctx);
        }

        if !self.after_src.is_empty() {
            let wrapper = self.make_internal_event(Rc::clone(&self.after_src), Rc::clone(&event));
            self.fire_on_own_source(wrapper);
            self.num_events += 1;
        }

        self.last_event_time = self.sim_time;

        if Rc::ptr_eq(event.source_rc(), &self.end_src) {
            self.end_of_sim = true;
        }
    }

    fn fire_on_own_source(&mut self, event: Event) {
        let source = Rc::clone(event.source_rc());
        let mut ctx = EngineContext::new(self);
        source.fire(&event, &mut ctx);
    }

    fn make_internal_event(&mut self, source: Rc<EventSource>, embedded: Rc<Event>) -> Event {
        let handle = self.next_handle();
        Event::internal(handle, source, self.sim_time, embedded)
    }

    fn is_internal_source(&self, source: &Rc<EventSource>) -> bool {
        Rc::ptr_eq(source, &self.begin_src)
            || Rc::ptr_eq(source, &self.end_src)
            || Rc::ptr_eq(source, &self.before_src)
            || Rc::ptr_eq(source, &self.after_src)
            || Rc::ptr_eq(source, &self.init_src)
            || Rc::ptr_eq(source, &self.final_src)
    }

    fn next_handle(&mut self) -> EventHandle {
        let id = self.next_event_id;
        self.next_event_id += 1;
        EventHandle(id)
    }

    fn warn(&mut self, message: String) {
        self.diagnostics.warn(&message);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("sim_time", &self.sim_time)
            .field("last_event_time", &self.last_event_time)
            .field("end_of_sim", &self.end_of_sim)
            .field("num_events", &self.num_events)
            .field("num_user_events", &self.num_user_events)
            .field("pending_events", &self.fel.len())
            .field("statistics", &self.stats.len())
            .finish()
    }
}
