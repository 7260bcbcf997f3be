//! The future-event list (FEL)
//!
//! A mutable min-priority queue of pending events, ordered by
//! `(fire_time ascending, sequence ascending)`. Sequence numbers are
//! assigned monotonically at push time, so events scheduled for the same
//! instant pop in FIFO order and two identically seeded runs dispatch in
//! the same order.
//!
//! Erasure strategy: the heap itself is never edited in place. Each pushed
//! event records its sequence number in a live map keyed by handle; cancel
//! and reschedule mutate only the map, leaving a stale entry in the heap
//! that [`EventList::pop`] recognizes (sequence mismatch) and skips. Erase
//! is O(1), push and pop stay O(log n) amortized.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::core::time::Time;
use crate::models::event::{Event, EventHandle};

/// Heap entry: the ordering key plus the handle used to find the event in
/// the live map. Comparison is reversed so `BinaryHeap`'s max-heap pops
/// the smallest `(fire_time, seq)` pair first.
struct HeapEntry {
    fire_time: Time,
    seq: u64,
    handle: EventHandle,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_time
            .total_cmp(&self.fire_time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueuedEvent {
    event: Event,
    /// Sequence number of the *current* heap entry for this event. Heap
    /// entries carrying an older sequence are stale and skipped on pop.
    seq: u64,
}

/// The future-event list.
pub struct EventList {
    heap: BinaryHeap<HeapEntry>,
    live: HashMap<EventHandle, QueuedEvent>,
    next_seq: u64,
}

impl EventList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Queue an event, assigning it the next sequence number.
    ///
    /// Re-pushing after an erase (the reschedule path) therefore moves the
    /// event behind everything already queued for its new fire time.
    pub fn push(&mut self, event: Event) {
        debug_assert!(
            !self.live.contains_key(&event.handle()),
            "event handle already queued"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(HeapEntry {
            fire_time: event.fire_time(),
            seq,
            handle: event.handle(),
        });
        self.live.insert(event.handle(), QueuedEvent { event, seq });
    }

    /// Remove and return the earliest pending event, skipping stale heap
    /// entries left behind by cancels and reschedules.
    pub fn pop(&mut self) -> Option<Event> {
        while let Some(entry) = self.heap.pop() {
            let current = self
                .live
                .get(&entry.handle)
                .map(|queued| queued.seq == entry.seq)
                .unwrap_or(false);
            if current {
                return self.live.remove(&entry.handle).map(|queued| queued.event);
            }
        }
        None
    }

    /// Look at the earliest pending event without removing it. Stale
    /// entries encountered at the top of the heap are dropped on the way.
    pub fn peek(&mut self) -> Option<&Event> {
        loop {
            let handle = {
                let entry = self.heap.peek()?;
                let current = self
                    .live
                    .get(&entry.handle)
                    .map(|queued| queued.seq == entry.seq)
                    .unwrap_or(false);
                if current {
                    Some(entry.handle)
                } else {
                    None
                }
            };
            match handle {
                Some(handle) => return self.live.get(&handle).map(|queued| &queued.event),
                None => {
                    self.heap.pop();
                }
            }
        }
    }

    /// Look at a pending event by handle.
    pub fn get(&self, handle: EventHandle) -> Option<&Event> {
        self.live.get(&handle).map(|queued| &queued.event)
    }

    /// Remove a pending event by handle and hand it back, e.g. for a
    /// reschedule re-push.
    pub fn remove(&mut self, handle: EventHandle) -> Option<Event> {
        self.live.remove(&handle).map(|queued| queued.event)
    }

    /// Erase a pending event by handle. Returns `false` if the handle does
    /// not resolve (already fired, cancelled, or never queued).
    pub fn erase(&mut self, handle: EventHandle) -> bool {
        self.live.remove(&handle).is_some()
    }

    /// Whether the handle resolves to a pending event.
    pub fn contains(&self, handle: EventHandle) -> bool {
        self.live.contains_key(&handle)
    }

    /// Drop every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    /// True iff no events are pending (stale heap entries do not count).
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.live.len()
    }
}

impl Default for EventList {
    fn default() -> Self {
        Self::new()
    }
}
