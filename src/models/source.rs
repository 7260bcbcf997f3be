//! Event sources: named publishers with ordered sink lists
//!
//! An [`EventSource`] is the publish side of the kernel's pub/sub layer.
//! Clients attach sink callbacks with [`EventSource::connect`]; the engine
//! invokes them in connection order when an event of that source fires.
//!
//! Sources are shared as `Rc<EventSource>`: the engine owns the six
//! built-in lifecycle sources, user sources are owned by the model code
//! that creates them, and every queued event keeps its source alive through
//! its own `Rc`. Identity is by allocation (`Rc::ptr_eq`), never by name.
//!
//! Sinks may mutate the engine through the dispatch context and may even
//! connect further sinks or request disconnects while a dispatch is in
//! progress; such mutations take effect for subsequent dispatches only.
//! A sink that needs a reference back to its own source must capture a
//! `Weak`, otherwise source → sink → source forms an ownership cycle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::engine::context::EngineContext;
use crate::models::event::Event;

/// Sink callback signature: observe the fired event, mutate the engine
/// through the context.
pub type SinkFn = Box<dyn FnMut(&Event, &mut EngineContext<'_>)>;

/// Identity token for a connected sink, returned by
/// [`EventSource::connect`] and consumed by [`EventSource::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkId(u64);

struct SinkEntry {
    id: SinkId,
    callback: SinkFn,
}

/// A named event publisher with an enable flag and an ordered sink list.
pub struct EventSource {
    name: String,
    enabled: Cell<bool>,
    sinks: RefCell<Vec<SinkEntry>>,
    /// Disconnects requested while a dispatch is running; applied when the
    /// dispatch completes.
    deferred_disconnects: RefCell<Vec<SinkId>>,
    dispatching: Cell<bool>,
    next_sink_id: Cell<u64>,
}

impl EventSource {
    /// Create a new enabled source with no sinks.
    ///
    /// The name is informational (it appears in diagnostics); two sources
    /// with the same name are still distinct.
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            enabled: Cell::new(true),
            sinks: RefCell::new(Vec::new()),
            deferred_disconnects: RefCell::new(Vec::new()),
            dispatching: Cell::new(false),
            next_sink_id: Cell::new(0),
        })
    }

    /// The informational name of this source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the source currently fires and accepts scheduling.
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Toggle the enable flag.
    ///
    /// A disabled source silently drops scheduling attempts (the engine
    /// warns) and its already-queued events are discarded when popped.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Attach a sink; sinks fire in connection order.
    pub fn connect<F>(&self, sink: F) -> SinkId
    where
        F: FnMut(&Event, &mut EngineContext<'_>) + 'static,
    {
        let id = SinkId(self.next_sink_id.get());
        self.next_sink_id.set(id.0 + 1);
        self.sinks.borrow_mut().push(SinkEntry {
            id,
            callback: Box::new(sink),
        });
        id
    }

    /// Detach a sink by identity; no-op if the id is not connected.
    ///
    /// When called from within a dispatch of this source, the removal is
    /// deferred until the dispatch completes.
    pub fn disconnect(&self, id: SinkId) {
        if self.dispatching.get() {
            self.deferred_disconnects.borrow_mut().push(id);
            return;
        }
        self.sinks.borrow_mut().retain(|entry| entry.id != id);
    }

    /// True iff no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.borrow().is_empty()
    }

    /// Number of attached sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.borrow().len()
    }

    /// Invoke every connected sink in connection order.
    ///
    /// Only the engine calls this. The sink list is swapped out for the
    /// duration of the dispatch: connects made by running sinks land in the
    /// fresh list and are appended afterwards, deferred disconnects are
    /// applied afterwards.
    pub(crate) fn fire(&self, event: &Event, ctx: &mut EngineContext<'_>) {
        self.dispatching.set(true);
        let mut active = self.sinks.take();
        for entry in active.iter_mut() {
            (entry.callback)(event, ctx);
        }
        let connected_during_dispatch = self.sinks.take();
        active.extend(connected_during_dispatch);
        let dropped = self.deferred_disconnects.take();
        if !dropped.is_empty() {
            active.retain(|entry| !dropped.contains(&entry.id));
        }
        *self.sinks.borrow_mut() = active;
        self.dispatching.set(false);
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("enabled", &self.enabled.get())
            .field("sinks", &self.sinks.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_is_enabled_and_empty() {
        let src = EventSource::new("arrivals");
        assert_eq!(src.name(), "arrivals");
        assert!(src.enabled());
        assert!(src.is_empty());
        assert_eq!(src.sink_count(), 0);
    }

    #[test]
    fn test_connect_assigns_distinct_ids() {
        let src = EventSource::new("arrivals");
        let a = src.connect(|_evt, _ctx| {});
        let b = src.connect(|_evt, _ctx| {});
        assert_ne!(a, b);
        assert_eq!(src.sink_count(), 2);
    }

    #[test]
    fn test_disconnect_removes_exactly_one() {
        let src = EventSource::new("arrivals");
        let a = src.connect(|_evt, _ctx| {});
        let _b = src.connect(|_evt, _ctx| {});
        src.disconnect(a);
        assert_eq!(src.sink_count(), 1);
        // Disconnecting an unknown id is a no-op.
        src.disconnect(a);
        assert_eq!(src.sink_count(), 1);
    }

    #[test]
    fn test_enable_toggle() {
        let src = EventSource::new("arrivals");
        src.set_enabled(false);
        assert!(!src.enabled());
        src.set_enabled(true);
        assert!(src.enabled());
    }

    #[test]
    fn test_identity_is_by_allocation_not_name() {
        let a = EventSource::new("same");
        let b = EventSource::new("same");
        assert!(!Rc::ptr_eq(&a, &b));
    }
}
