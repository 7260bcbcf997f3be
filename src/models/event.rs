//! Simulation events
//!
//! An [`Event`] is an immutable record of *what fires, when*: the source
//! that will dispatch it, the time it was scheduled, the time it fires, and
//! an optional payload the kernel never inspects. Events produced for the
//! BEFORE/AFTER auxiliary sources additionally embed the user event they
//! wrap, so observers can inspect the event being bracketed.
//!
//! Scheduling returns an [`EventHandle`], a copyable identity token used to
//! reschedule or cancel the event while it is still pending. A handle whose
//! event has already fired (or was cancelled) simply no longer resolves.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::core::time::Time;
use crate::models::source::EventSource;

/// Identity token for a scheduled event.
///
/// Handles are assigned monotonically by the engine and are never reused
/// within an engine instance. They are cheap to copy and remain valid to
/// *mention* after the event fires: resolution against the future-event
/// list just fails, which the engine turns into the documented warning
/// (reschedule) or `false` result (cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(pub(crate) u64);

impl EventHandle {
    /// The raw numeric identity, mainly useful for diagnostics.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// An immutable simulation event.
///
/// Constructed by the engine via `schedule_event` or an immediate fire;
/// user code only ever observes events by reference inside sink callbacks.
pub struct Event {
    handle: EventHandle,
    source: Rc<EventSource>,
    scheduled_time: Time,
    fire_time: Time,
    payload: Option<Rc<dyn Any>>,
    embedded: Option<Rc<Event>>,
}

impl Event {
    /// Build a user-facing event. `scheduled_time` is the clock value at
    /// scheduling; `fire_time` must not precede it.
    pub(crate) fn new(
        handle: EventHandle,
        source: Rc<EventSource>,
        scheduled_time: Time,
        fire_time: Time,
        payload: Option<Rc<dyn Any>>,
    ) -> Self {
        debug_assert!(fire_time >= scheduled_time);
        Self {
            handle,
            source,
            scheduled_time,
            fire_time,
            payload,
            embedded: None,
        }
    }

    /// Build an auxiliary wrapper event embedding the event being fired.
    /// Wrappers are stamped at the current clock on both time fields.
    pub(crate) fn internal(
        handle: EventHandle,
        source: Rc<EventSource>,
        time: Time,
        embedded: Rc<Event>,
    ) -> Self {
        Self {
            handle,
            source,
            scheduled_time: time,
            fire_time: time,
            payload: None,
            embedded: Some(embedded),
        }
    }

    /// The identity token assigned at creation.
    pub fn handle(&self) -> EventHandle {
        self.handle
    }

    /// The source that dispatches this event.
    pub fn source(&self) -> &EventSource {
        &self.source
    }

    /// The shared handle to the source, for identity comparisons.
    pub fn source_rc(&self) -> &Rc<EventSource> {
        &self.source
    }

    /// Clock value at the moment the event was scheduled.
    pub fn scheduled_time(&self) -> Time {
        self.scheduled_time
    }

    /// Clock value at which the event fires.
    pub fn fire_time(&self) -> Time {
        self.fire_time
    }

    pub(crate) fn set_fire_time(&mut self, time: Time) {
        self.fire_time = time;
    }

    /// The opaque payload, if any.
    pub fn payload(&self) -> Option<&Rc<dyn Any>> {
        self.payload.as_ref()
    }

    /// Downcast the payload to a concrete type.
    ///
    /// Returns `None` when the event carries no payload or the payload is
    /// of a different type.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// The event wrapped by this BEFORE/AFTER auxiliary event, if any.
    pub fn embedded(&self) -> Option<&Event> {
        self.embedded.as_deref()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handle", &self.handle.0)
            .field("source", &self.source.name())
            .field("scheduled_time", &self.scheduled_time)
            .field("fire_time", &self.fire_time)
            .field("has_payload", &self.payload.is_some())
            .field("is_wrapper", &self.embedded.is_some())
            .finish()
    }
}
