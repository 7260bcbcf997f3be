//! Dispatch context handed to sinks
//!
//! An [`EngineContext`] is constructed on the stack for each dispatch and
//! borrows the engine mutably for its duration, so release on every exit
//! path (including a panicking sink) is guaranteed by scope. It exposes
//! exactly the documented mutation surface: sinks read the clock and
//! schedule, reschedule, cancel, stop, and (de)register statistics; they
//! never touch the future-event list or the clock directly.

use std::any::Any;
use std::rc::Rc;

use crate::core::time::Time;
use crate::engine::core::{Engine, EngineError};
use crate::models::event::EventHandle;
use crate::models::source::EventSource;
use crate::stats::{SharedStatistic, Statistic};

/// Transient handle to the engine, valid only during a fire dispatch.
pub struct EngineContext<'a> {
    engine: &'a mut Engine,
}

impl<'a> EngineContext<'a> {
    pub(crate) fn new(engine: &'a mut Engine) -> Self {
        Self { engine }
    }

    /// The simulated time to date.
    pub fn simulated_time(&self) -> Time {
        self.engine.simulated_time()
    }

    /// Fire time of the last dispatched event.
    pub fn last_event_time(&self) -> Time {
        self.engine.last_event_time()
    }

    /// Whether the run has been asked to end.
    pub fn end_of_simulation(&self) -> bool {
        self.engine.end_of_simulation()
    }

    /// Schedule an event; see [`Engine::schedule_event`].
    pub fn schedule_event(&mut self, source: &Rc<EventSource>, time: Time) -> Option<EventHandle> {
        self.engine.schedule_event(source, time)
    }

    /// Schedule an event with a payload; see
    /// [`Engine::schedule_event_with`].
    pub fn schedule_event_with<P: Any>(
        &mut self,
        source: &Rc<EventSource>,
        time: Time,
        payload: P,
    ) -> Option<EventHandle> {
        self.engine.schedule_event_with(source, time, payload)
    }

    /// Move a pending event to a new fire time; see
    /// [`Engine::reschedule_event`].
    pub fn reschedule_event(&mut self, handle: EventHandle, new_time: Time) {
        self.engine.reschedule_event(handle, new_time)
    }

    /// Remove a pending event; see [`Engine::cancel`].
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.engine.cancel(handle)
    }

    /// Ask the run to stop at the next cycle boundary.
    pub fn stop_now(&mut self) {
        self.engine.stop_now()
    }

    /// Schedule the run to stop at `time`; see [`Engine::stop_at_time`].
    pub fn stop_at_time(&mut self, time: Time) -> Result<(), EngineError> {
        self.engine.stop_at_time(time)
    }

    /// Register a statistic for online analysis mid-run.
    pub fn analyze_statistic(&mut self, stat: SharedStatistic) {
        self.engine.analyze_statistic(stat)
    }

    /// Deregister a statistic; see [`Engine::remove_statistic`].
    pub fn remove_statistic(&mut self, stat: &SharedStatistic) -> Result<(), EngineError> {
        self.engine.remove_statistic(stat)
    }

    /// Deregister every statistic.
    pub fn remove_statistics(&mut self) {
        self.engine.remove_statistics()
    }

    /// Wrap and register a raw estimator; see
    /// [`Engine::make_analyzable_statistic`].
    pub fn make_analyzable_statistic(&mut self, raw: Box<dyn Statistic>) -> SharedStatistic {
        self.engine.make_analyzable_statistic(raw)
    }
}
