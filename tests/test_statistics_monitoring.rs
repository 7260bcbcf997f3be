//! Statistics monitoring tests
//!
//! Precision-driven termination, steady-state latching, mid-run
//! registration, removal round-trips, and the independent-replications
//! strategy, using a counting mock statistic.

use std::cell::RefCell;
use std::rc::Rc;

use des_simulator_core_rs::{
    AnalyzableStatistic, Engine, EngineError, EventSource, IndependentReplications,
    SharedStatistic, Statistic, Time,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Mock statistic: counts observations, enters steady state after
/// `steady_after` of them, reports target precision after `target_after`.
struct CountingStatistic {
    name: String,
    enabled: bool,
    observations: u64,
    steady_after: u64,
    target_after: u64,
    enter_time: Time,
    init_calls: u32,
    reset_calls: u32,
}

impl CountingStatistic {
    fn new(name: &str, steady_after: u64, target_after: u64) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            observations: 0,
            steady_after,
            target_after,
            enter_time: Time::NAN,
            init_calls: 0,
            reset_calls: 0,
        }
    }
}

impl Statistic for CountingStatistic {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&mut self, _observation: f64, _weight: f64) {
        self.observations += 1;
    }

    fn estimate(&self) -> f64 {
        self.observations as f64
    }

    fn num_observations(&self) -> u64 {
        self.observations
    }

    fn reset(&mut self) {
        self.observations = 0;
        self.enter_time = Time::NAN;
        self.reset_calls += 1;
    }
}

impl AnalyzableStatistic for CountingStatistic {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn steady_state_entered(&self) -> bool {
        self.observations >= self.steady_after
    }

    fn steady_state_enter_time(&self) -> Time {
        self.enter_time
    }

    fn set_steady_state_enter_time(&mut self, time: Time) {
        self.enter_time = time;
    }

    fn target_relative_precision(&self) -> f64 {
        0.05
    }

    fn relative_precision(&self) -> f64 {
        if self.target_precision_reached() {
            0.01
        } else {
            f64::INFINITY
        }
    }

    fn target_precision_reached(&self) -> bool {
        self.observations >= self.target_after
    }

    fn initialize_for_experiment(&mut self) {
        self.init_calls += 1;
    }
}

/// Seed `count` tick events at times 1..=count, each feeding one
/// observation into every statistic in `stats`.
fn seed_observing_ticks(
    engine: &mut Engine,
    ticks: &Rc<EventSource>,
    count: usize,
    stats: Vec<Rc<RefCell<CountingStatistic>>>,
) {
    {
        let stats = stats.clone();
        ticks.connect(move |event, _ctx| {
            for stat in &stats {
                stat.borrow_mut().collect(event.fire_time(), 1.0);
            }
        });
    }
    let src = Rc::clone(ticks);
    engine.system_initialization_event_source().connect(move |_event, ctx| {
        for t in 1..=count {
            ctx.schedule_event(&src, t as f64);
        }
    });
}

// ============================================================================
// Precision-Driven Termination
// ============================================================================

#[test]
fn test_run_ends_when_target_precision_is_reached() {
    let mut engine = Engine::new();
    let ticks = EventSource::new("tick");

    let stat = Rc::new(RefCell::new(CountingStatistic::new("mean delay", 10, 100)));
    let shared: SharedStatistic = stat.clone();
    engine.analyze_statistic(Rc::clone(&shared));

    seed_observing_ticks(&mut engine, &ticks, 200, vec![Rc::clone(&stat)]);

    engine.run();

    assert_eq!(
        stat.borrow().observations,
        100,
        "the run must end at the first monitor pass after the 100th observation"
    );
    assert_eq!(engine.simulated_time(), 100.0);
    assert!(engine.end_of_simulation());
    assert!(!engine.has_pending_events(), "remaining events are discarded");
    assert_eq!(
        stat.borrow().enter_time,
        10.0,
        "steady-state enter time is recorded on the latch's rising edge"
    );
}

#[test]
fn test_zero_statistics_terminate_by_event_exhaustion() {
    let mut engine = Engine::new();
    let ticks = EventSource::new("tick");
    ticks.connect(|_event, _ctx| {});

    let src = Rc::clone(&ticks);
    engine.system_initialization_event_source().connect(move |_event, ctx| {
        for t in 1..=5 {
            ctx.schedule_event(&src, t as f64);
        }
    });

    engine.run();

    assert_eq!(engine.simulated_time(), 5.0);
    assert!(!engine.statistics_precision_reached());
}

#[test]
fn test_disabled_statistic_does_not_block_termination_but_still_latches() {
    let mut engine = Engine::new();
    let ticks = EventSource::new("tick");

    let active = Rc::new(RefCell::new(CountingStatistic::new("active", 1, 10)));
    let passive = Rc::new(RefCell::new(CountingStatistic::new("passive", 3, u64::MAX)));
    passive.borrow_mut().enabled = false;

    let shared_active: SharedStatistic = active.clone();
    let shared_passive: SharedStatistic = passive.clone();
    engine.analyze_statistic(shared_active);
    engine.analyze_statistic(shared_passive);

    seed_observing_ticks(
        &mut engine,
        &ticks,
        50,
        vec![Rc::clone(&active), Rc::clone(&passive)],
    );

    engine.run();

    assert_eq!(
        engine.simulated_time(),
        10.0,
        "only enabled statistics gate the precision check"
    );
    assert_eq!(
        passive.borrow().enter_time,
        3.0,
        "the steady-state latch advances even for disabled statistics"
    );
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_remove_statistic_round_trip() {
    let mut engine = Engine::new();
    let stat = Rc::new(RefCell::new(CountingStatistic::new("mean", 1, 100)));
    let shared: SharedStatistic = stat.clone();

    engine.analyze_statistic(Rc::clone(&shared));
    assert_eq!(engine.num_statistics(), 1);

    engine
        .remove_statistic(&shared)
        .expect("registered statistic must be removable");
    assert_eq!(engine.num_statistics(), 0);

    assert_eq!(
        engine.remove_statistic(&shared),
        Err(EngineError::StatisticNotRegistered("mean".to_string()))
    );
}

#[test]
fn test_remove_unregistered_statistic_is_fatal_and_leaves_registry_unchanged() {
    let mut engine = Engine::new();
    let registered = Rc::new(RefCell::new(CountingStatistic::new("kept", 1, 100)));
    let stranger = Rc::new(RefCell::new(CountingStatistic::new("stranger", 1, 100)));
    let shared_registered: SharedStatistic = registered.clone();
    let shared_stranger: SharedStatistic = stranger.clone();

    engine.analyze_statistic(shared_registered);

    assert!(engine.remove_statistic(&shared_stranger).is_err());
    assert_eq!(engine.num_statistics(), 1);
}

#[test]
fn test_registration_before_run_skips_experiment_initialization() {
    let mut engine = Engine::new();
    let stat = Rc::new(RefCell::new(CountingStatistic::new("mean", 1, u64::MAX)));
    let shared: SharedStatistic = stat.clone();

    // The engine is idle here, so the per-experiment hook must not fire.
    engine.analyze_statistic(shared);
    assert_eq!(stat.borrow().init_calls, 0);

    engine.run();

    assert_eq!(stat.borrow().init_calls, 0);
    assert_eq!(
        stat.borrow().reset_calls,
        1,
        "prepare_simulation resets registered statistics"
    );
}

#[test]
fn test_mid_run_registration_latches_without_recording_enter_time() {
    let mut engine = Engine::new();
    let ticks = EventSource::new("tick");
    ticks.connect(|_event, _ctx| {});

    // steady_after = 0: already in steady state at registration.
    let stat = Rc::new(RefCell::new(CountingStatistic::new("late", 0, u64::MAX)));

    {
        let stat = Rc::clone(&stat);
        let registered = Rc::new(RefCell::new(false));
        ticks.connect(move |event, ctx| {
            if event.fire_time() >= 5.0 && !*registered.borrow() {
                *registered.borrow_mut() = true;
                let shared: SharedStatistic = stat.clone();
                ctx.analyze_statistic(shared);
            }
        });
    }

    let src = Rc::clone(&ticks);
    engine.system_initialization_event_source().connect(move |_event, ctx| {
        for t in 1..=10 {
            ctx.schedule_event(&src, t as f64);
        }
    });

    engine.run();

    assert_eq!(
        stat.borrow().init_calls,
        1,
        "mid-run registration invokes the per-experiment hook"
    );
    assert!(
        stat.borrow().enter_time.is_nan(),
        "an already-entered steady state is latched without a retroactive enter time"
    );
}

// ============================================================================
// Independent Replications
// ============================================================================

#[test]
fn test_independent_replications_rerun_the_experiment() {
    let mut engine = Engine::new();
    engine.set_strategy(Box::new(IndependentReplications::new(3)));

    let ticks = EventSource::new("tick");
    let stat = Rc::new(RefCell::new(CountingStatistic::new("mean", 1, u64::MAX)));
    let shared: SharedStatistic = stat.clone();
    engine.analyze_statistic(shared);

    let init_fires = Rc::new(RefCell::new(0u32));
    let final_fires = Rc::new(RefCell::new(0u32));
    let end_fires = Rc::new(RefCell::new(0u32));
    {
        let n = Rc::clone(&init_fires);
        engine.system_initialization_event_source().connect(move |_event, _ctx| {
            *n.borrow_mut() += 1;
        });
    }
    {
        let n = Rc::clone(&final_fires);
        engine.system_finalization_event_source().connect(move |_event, _ctx| {
            *n.borrow_mut() += 1;
        });
    }
    {
        let n = Rc::clone(&end_fires);
        engine.end_of_sim_event_source().connect(move |_event, _ctx| {
            *n.borrow_mut() += 1;
        });
    }

    seed_observing_ticks(&mut engine, &ticks, 2, vec![Rc::clone(&stat)]);

    engine.run();

    assert_eq!(*init_fires.borrow(), 3, "SYSTEM_INIT fires once per replication");
    assert_eq!(*final_fires.borrow(), 3, "SYSTEM_FINAL fires once per replication");
    assert_eq!(*end_fires.borrow(), 1, "END_SIM brackets the whole simulation");
    assert_eq!(
        stat.borrow().observations,
        6,
        "observations accumulate across replications"
    );
    assert_eq!(
        stat.borrow().init_calls,
        2,
        "the per-experiment hook runs at each replication boundary after the first"
    );
    assert_eq!(engine.simulated_time(), 2.0, "each replication restarts the clock");
}
