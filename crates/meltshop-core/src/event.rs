//! Typed plant events with pre-allocated ring buffers.
//!
//! The engine emits events while tasks run and delivers them in batch when an
//! `advance` call returns. Each event kind has its own [`EventBuffer`] with a
//! fixed capacity; when a buffer is full the oldest events are dropped.
//!
//! Listeners are read-only. They run in `(priority, registration)` order and
//! may carry a filter predicate.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::crane::CraneState;
use crate::error::EquipmentFault;
use crate::fixed::SimTime;
use crate::grade::SteelGrade;
use crate::id::{CarId, CraneId, HeatId, UnitId};
use crate::ladle_car::CarStatus;
use crate::unit::UnitState;
use meltshop_spatial::CarType;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A plant event. Every event carries the clock value it happened at.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // -- Heats --
    HeatCreated {
        heat: HeatId,
        grade: SteelGrade,
        bay: String,
        at: SimTime,
    },
    HeatQueued {
        heat: HeatId,
        unit: UnitId,
        at: SimTime,
    },
    ProcessStarted {
        heat: HeatId,
        unit: UnitId,
        at: SimTime,
    },
    ProcessFinished {
        heat: HeatId,
        unit: UnitId,
        at: SimTime,
    },
    HeatCompleted {
        heat: HeatId,
        at: SimTime,
    },

    // -- Equipment state --
    UnitStateChanged {
        unit: UnitId,
        from: UnitState,
        to: UnitState,
        at: SimTime,
    },
    CraneStateChanged {
        crane: CraneId,
        from: CraneState,
        to: CraneState,
        at: SimTime,
    },
    CarStatusChanged {
        car: CarId,
        from: CarStatus,
        to: CarStatus,
        at: SimTime,
    },

    // -- Transport --
    TransportRequested {
        heat: HeatId,
        car_type: CarType,
        at: SimTime,
    },
    TransportAssigned {
        heat: HeatId,
        car: CarId,
        at: SimTime,
    },
    HeatDelivered {
        heat: HeatId,
        car: CarId,
        unit: UnitId,
        at: SimTime,
    },

    // -- Faults and shortages --
    Fault {
        equipment: String,
        fault: EquipmentFault,
        at: SimTime,
    },
    LadleShortage {
        at: SimTime,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    HeatCreated,
    HeatQueued,
    ProcessStarted,
    ProcessFinished,
    HeatCompleted,
    UnitStateChanged,
    CraneStateChanged,
    CarStatusChanged,
    TransportRequested,
    TransportAssigned,
    HeatDelivered,
    Fault,
    LadleShortage,
}

const EVENT_KIND_COUNT: usize = 13;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::HeatCreated { .. } => EventKind::HeatCreated,
            Event::HeatQueued { .. } => EventKind::HeatQueued,
            Event::ProcessStarted { .. } => EventKind::ProcessStarted,
            Event::ProcessFinished { .. } => EventKind::ProcessFinished,
            Event::HeatCompleted { .. } => EventKind::HeatCompleted,
            Event::UnitStateChanged { .. } => EventKind::UnitStateChanged,
            Event::CraneStateChanged { .. } => EventKind::CraneStateChanged,
            Event::CarStatusChanged { .. } => EventKind::CarStatusChanged,
            Event::TransportRequested { .. } => EventKind::TransportRequested,
            Event::TransportAssigned { .. } => EventKind::TransportAssigned,
            Event::HeatDelivered { .. } => EventKind::HeatDelivered,
            Event::Fault { .. } => EventKind::Fault,
            Event::LadleShortage { .. } => EventKind::LadleShortage,
        }
    }

    /// Clock value the event happened at.
    pub fn at(&self) -> SimTime {
        match self {
            Event::HeatCreated { at, .. }
            | Event::HeatQueued { at, .. }
            | Event::ProcessStarted { at, .. }
            | Event::ProcessFinished { at, .. }
            | Event::HeatCompleted { at, .. }
            | Event::UnitStateChanged { at, .. }
            | Event::CraneStateChanged { at, .. }
            | Event::CarStatusChanged { at, .. }
            | Event::TransportRequested { at, .. }
            | Event::TransportAssigned { at, .. }
            | Event::HeatDelivered { at, .. }
            | Event::Fault { at, .. }
            | Event::LadleShortage { at } => *at,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate over events from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head is the next write position, which holds the oldest entry
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

pub type Listener = Box<dyn FnMut(&Event) + Send>;

pub type EventFilter = Box<dyn Fn(&Event) -> bool + Send>;

/// Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

struct ListenerEntry {
    listener: Listener,
    priority: ListenerPriority,
    filter: Option<EventFilter>,
    order: u64,
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One ring buffer per event kind, listener lists and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    listeners: [Vec<ListenerEntry>; EVENT_KIND_COUNT],
    default_capacity: usize,
    next_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            listeners: Default::default(),
            default_capacity,
            next_order: 0,
        }
    }

    /// Stop recording a kind. Anything already buffered is dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event. No-op if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Listen with normal priority and no filter.
    pub fn on(&mut self, kind: EventKind, listener: Listener) {
        self.on_filtered(kind, ListenerPriority::Normal, None, listener);
    }

    pub fn on_filtered(
        &mut self,
        kind: EventKind,
        priority: ListenerPriority,
        filter: Option<EventFilter>,
        listener: Listener,
    ) {
        let order = self.next_order;
        self.next_order += 1;
        let list = &mut self.listeners[kind.index()];
        list.push(ListenerEntry {
            listener,
            priority,
            filter,
            order,
        });
        list.sort_by_key(|e| (e.priority, e.order));
    }

    /// Hand every buffered event to its listeners, oldest first, then clear
    /// the buffers.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let listeners = &mut self.listeners[idx];
            if !listeners.is_empty() {
                for entry in listeners.iter_mut() {
                    for event in buffer.iter() {
                        if let Some(filter) = &entry.filter
                            && !filter(event)
                        {
                            continue;
                        }
                        (entry.listener)(event);
                    }
                }
            }
            buffer.clear();
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()].as_ref().map_or(0, EventBuffer::len)
    }

    /// Events ever emitted for a kind, including dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, EventBuffer::total_written)
    }

    /// Clear all buffers. Listeners and suppression settings stay.
    pub fn clear_all(&mut self) {
        for b in self.buffers.iter_mut().flatten() {
            b.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
