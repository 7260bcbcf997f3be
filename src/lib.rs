//! Discrete-Event Simulation Core - Rust Engine
//!
//! General-purpose discrete-event simulation kernel with deterministic
//! dispatch: simulated time advances by jumping from one scheduled event to
//! the next, drawn from a future-event list in nondecreasing fire-time
//! order.
//!
//! # Architecture
//!
//! - **core**: simulated-time scalar and float comparison helpers
//! - **models**: domain types (Event, EventSource, future-event list)
//! - **engine**: the dispatch kernel, context, and diagnostics
//! - **stats**: analyzable-statistic interfaces and registry
//! - **strategy**: run strategies (single run, independent replications)
//!
//! # Critical invariants
//!
//! 1. Events fire in nondecreasing fire-time order; same-time events fire
//!    FIFO via monotonic sequence numbers
//! 2. A dispatched sink runs to completion before the next event is
//!    considered; all engine mutation happens on one logical thread
//! 3. After `run()` returns, `end_of_simulation()` is true and the
//!    future-event list is empty
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use des_simulator_core_rs::{Engine, EventSource};
//!
//! let mut engine = Engine::new();
//! let ticks = EventSource::new("tick");
//!
//! let fired = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&fired);
//! ticks.connect(move |event, _ctx| log.borrow_mut().push(event.fire_time()));
//!
//! let src = Rc::clone(&ticks);
//! engine.system_initialization_event_source().connect(move |_event, ctx| {
//!     for t in [3.0, 1.0, 2.0] {
//!         ctx.schedule_event(&src, t);
//!     }
//! });
//!
//! engine.run();
//! assert_eq!(*fired.borrow(), vec![1.0, 2.0, 3.0]);
//! ```

// Module declarations
pub mod core;
pub mod engine;
pub mod models;
pub mod stats;
pub mod strategy;

// Re-exports for convenience
pub use crate::core::time::{
    approximately_equal, essentially_equal, Time, DEFAULT_TIME_TOLERANCE,
};
pub use engine::{
    context::EngineContext,
    core::{Engine, EngineConfig, EngineError},
    diag::{DiagnosticSink, MemorySink, TracingSink},
};
pub use models::{
    event::{Event, EventHandle},
    event_list::EventList,
    source::{EventSource, SinkId},
};
pub use stats::{
    AnalyzableStatistic, PassthroughStatistic, SharedStatistic, Statistic, StatisticsRegistry,
};
pub use strategy::{
    IndependentReplications, PassthroughWrapper, RunStrategy, SingleRun, StatisticWrapper,
};
