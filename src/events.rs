//! Signal notification fan-out.
//!
//! Every [`Signal`](crate::data::signal::Signal) owns an [`EventHub`] that
//! observers (plot panels, value displays, loggers) subscribe to.  Each event
//! carries a set of [`EventKind`] flags (bitflags-style) so that a single
//! occurrence can match multiple categories — a push that also changed the
//! display precision is both `SAMPLE_ADDED` and `DIGITS_CHANGED`.
//!
//! Subscribers specify an [`EventFilter`] to receive only the kinds they care
//! about.  The filter is a simple OR mask: an event is delivered when
//! `(event.kinds & filter) != 0`.  Delivery is fire-and-forget over an mpsc
//! channel and never blocks or fails the mutating side; dispatch follows
//! subscriber registration order.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::data::signal::SignalId;

// ─────────────────────────────────────────────────────────────────────────────
// EventKind – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflags describing the *categories* a signal event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind(pub u32);

impl EventKind {
    /// A sample was appended to the signal's buffer.
    pub const SAMPLE_ADDED: Self = Self(1 << 0);
    /// The signal's buffer was cleared.  Subscribers must treat this as
    /// "this source has been reset", not merely "count is now zero".
    pub const SAMPLES_CLEARED: Self = Self(1 << 1);
    /// The signal's start timestamp (time-origin for relative display) changed.
    pub const START_TIMESTAMP_CHANGED: Self = Self(1 << 2);
    /// The significant-digits display hint changed.
    pub const DIGITS_CHANGED: Self = Self(1 << 3);
    /// The decimal-places display hint changed.
    pub const DECIMAL_PLACES_CHANGED: Self = Self(1 << 4);
    /// A derived-channel engine hit a zero divisor while producing into this
    /// signal; the pairing was consumed but no sample was emitted.
    pub const DERIVED_ERROR: Self = Self(1 << 5);

    /// Wildcard: matches *every* event kind.
    pub const ALL: Self = Self(u32::MAX);

    /// Combine two event kinds (bitwise OR).
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check whether `self` intersects with `other` (at least one bit in common).
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EventKind {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EventKind {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for EventKind {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::ops::Not for EventKind {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "EMPTY");
        }
        if *self == EventKind::ALL {
            return write!(f, "ALL");
        }
        let pairs: &[(EventKind, &str)] = &[
            (EventKind::SAMPLE_ADDED, "SAMPLE_ADDED"),
            (EventKind::SAMPLES_CLEARED, "SAMPLES_CLEARED"),
            (EventKind::START_TIMESTAMP_CHANGED, "START_TIMESTAMP_CHANGED"),
            (EventKind::DIGITS_CHANGED, "DIGITS_CHANGED"),
            (EventKind::DECIMAL_PLACES_CHANGED, "DECIMAL_PLACES_CHANGED"),
            (EventKind::DERIVED_ERROR, "DERIVED_ERROR"),
        ];
        let mut names = Vec::new();
        let mut known_bits: u32 = 0;
        for (kind, name) in pairs {
            known_bits |= kind.0;
            if self.contains(*kind) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known_bits;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join("|"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata – per-event-type payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata attached to `SAMPLE_ADDED` events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMeta {
    /// Absolute timestamp of the appended sample.
    pub timestamp: f64,
    /// Value of the appended sample.
    pub value: f64,
    /// Buffer count after the append.
    pub count: usize,
}

/// Metadata attached to precision-change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionMeta {
    pub digits: i32,
    pub decimal_places: i32,
}

/// Metadata attached to `START_TIMESTAMP_CHANGED` events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartTimestampMeta {
    pub start_timestamp: f64,
}

/// Metadata attached to `DERIVED_ERROR` events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedErrorMeta {
    /// Absolute timestamp of the dividend sample of the offending pairing.
    pub timestamp: f64,
    /// Total zero-divisor pairings seen by the emitting engine so far.
    pub zero_divisor_count: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// SignalEvent – the top-level event type
// ─────────────────────────────────────────────────────────────────────────────

/// An event emitted by a signal's notification hub.
///
/// `kinds` is a bitflag set of [`EventKind`] categories.  The `Option<…Meta>`
/// fields carry metadata relevant to the kinds that are set.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    /// Bitflag set of categories this event belongs to.
    pub kinds: EventKind,
    /// Id of the signal that emitted the event.
    pub signal: SignalId,

    pub sample: Option<SampleMeta>,
    pub precision: Option<PrecisionMeta>,
    pub start_timestamp: Option<StartTimestampMeta>,
    pub derived_error: Option<DerivedErrorMeta>,
}

impl SignalEvent {
    /// Create a new event with the given kinds and no metadata.
    pub fn new(kinds: EventKind, signal: SignalId) -> Self {
        Self {
            kinds,
            signal,
            sample: None,
            precision: None,
            start_timestamp: None,
            derived_error: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventFilter
// ─────────────────────────────────────────────────────────────────────────────

/// A filter that selects which event categories a subscriber receives.
///
/// The filter is an OR-mask: an event is delivered when
/// `event.kinds.intersects(filter.mask)`.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub mask: EventKind,
}

impl EventFilter {
    /// Accept all events.
    pub const fn all() -> Self {
        Self {
            mask: EventKind::ALL,
        }
    }

    /// Accept only the specified event kinds.
    pub const fn only(mask: EventKind) -> Self {
        Self { mask }
    }

    /// Check whether an event passes this filter.
    #[inline]
    pub fn matches(&self, event: &SignalEvent) -> bool {
        event.kinds.intersects(self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventHub
// ─────────────────────────────────────────────────────────────────────────────

struct Subscriber {
    filter: EventFilter,
    sender: Sender<SignalEvent>,
}

/// Per-signal subscriber list distributing [`SignalEvent`]s.
///
/// Cloning the hub yields another handle to the same subscriber list, so a
/// subscription handle can be passed out of the session while the owning
/// signal keeps emitting through its own clone.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subscribe to events matching the given filter.
    ///
    /// Returns a receiver that gets every matching [`SignalEvent`] from the
    /// moment of subscription on.  Dropped receivers are pruned lazily on the
    /// next emit.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<SignalEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut subs = self.inner.lock().unwrap();
        subs.push(Subscriber { filter, sender: tx });
        rx
    }

    /// Subscribe to *all* events (no filtering).
    pub fn subscribe_all(&self) -> Receiver<SignalEvent> {
        self.subscribe(EventFilter::all())
    }

    /// Emit an event to all matching subscribers, in registration order.
    ///
    /// Subscribers whose receiving end is gone are dropped from the list.
    /// Non-matching subscribers are kept untouched.
    pub fn emit(&self, event: &SignalEvent) {
        let mut subs = self.inner.lock().unwrap();
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    /// Number of live subscribers (for diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_union_and_intersection() {
        let added = EventKind::SAMPLE_ADDED;
        let cleared = EventKind::SAMPLES_CLEARED;
        let combined = added | cleared;
        assert!(combined.contains(added));
        assert!(combined.contains(cleared));
        assert!(combined.intersects(added));
        assert!(!EventKind::DIGITS_CHANGED.intersects(added));
    }

    #[test]
    fn event_kind_all_matches_everything() {
        assert!(EventKind::ALL.contains(EventKind::SAMPLE_ADDED));
        assert!(EventKind::ALL.contains(EventKind::DERIVED_ERROR));
    }

    #[test]
    fn event_filter_matches() {
        let filter = EventFilter::only(EventKind::SAMPLE_ADDED | EventKind::SAMPLES_CLEARED);
        let evt = SignalEvent::new(EventKind::SAMPLE_ADDED, 1);
        assert!(filter.matches(&evt));

        let evt2 = SignalEvent::new(EventKind::DIGITS_CHANGED, 1);
        assert!(!filter.matches(&evt2));

        // A combined push+precision event still matches a SAMPLE_ADDED filter.
        let evt3 = SignalEvent::new(EventKind::SAMPLE_ADDED | EventKind::DIGITS_CHANGED, 1);
        assert!(filter.matches(&evt3));
    }

    #[test]
    fn hub_subscribe_and_emit() {
        let hub = EventHub::new();
        let rx_all = hub.subscribe_all();
        let rx_added = hub.subscribe(EventFilter::only(EventKind::SAMPLE_ADDED));
        let rx_cleared = hub.subscribe(EventFilter::only(EventKind::SAMPLES_CLEARED));

        hub.emit(&SignalEvent::new(EventKind::SAMPLE_ADDED, 7));

        assert!(rx_all.try_recv().is_ok());
        assert!(rx_added.try_recv().is_ok());
        assert!(rx_cleared.try_recv().is_err());
    }

    #[test]
    fn hub_combined_kinds_reach_both_filters() {
        let hub = EventHub::new();
        let rx_added = hub.subscribe(EventFilter::only(EventKind::SAMPLE_ADDED));
        let rx_digits = hub.subscribe(EventFilter::only(EventKind::DIGITS_CHANGED));

        hub.emit(&SignalEvent::new(
            EventKind::SAMPLE_ADDED | EventKind::DIGITS_CHANGED,
            0,
        ));

        assert!(rx_added.try_recv().is_ok());
        assert!(rx_digits.try_recv().is_ok());
    }

    #[test]
    fn dropped_receiver_is_cleaned_up() {
        let hub = EventHub::new();
        let rx1 = hub.subscribe_all();
        let rx2 = hub.subscribe_all();
        drop(rx1);

        hub.emit(&SignalEvent::new(EventKind::SAMPLE_ADDED, 0));
        assert!(rx2.try_recv().is_ok());
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn event_kind_display() {
        assert_eq!(format!("{}", EventKind::SAMPLE_ADDED), "SAMPLE_ADDED");
        let combo = EventKind::SAMPLE_ADDED | EventKind::SAMPLES_CLEARED;
        assert_eq!(format!("{}", combo), "SAMPLE_ADDED|SAMPLES_CLEARED");
        assert_eq!(format!("{}", EventKind::ALL), "ALL");
        assert!(format!("{}", EventKind(1 << 31)).starts_with("0x"));
    }

    #[test]
    fn event_kinds_do_not_overlap() {
        let all_kinds = [
            EventKind::SAMPLE_ADDED,
            EventKind::SAMPLES_CLEARED,
            EventKind::START_TIMESTAMP_CHANGED,
            EventKind::DIGITS_CHANGED,
            EventKind::DECIMAL_PLACES_CHANGED,
            EventKind::DERIVED_ERROR,
        ];
        for (i, a) in all_kinds.iter().enumerate() {
            for (j, b) in all_kinds.iter().enumerate() {
                if i != j {
                    assert!(
                        !a.intersects(*b),
                        "EventKind bits {} and {} overlap: {:b} & {:b}",
                        i,
                        j,
                        a.0,
                        b.0
                    );
                }
            }
        }
    }
}
