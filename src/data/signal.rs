//! Analog signal: identity, buffer ownership and notification hub.
//!
//! A [`Signal`] is a named, unit-typed time series belonging to exactly one
//! parent channel (held as a back-reference key, not ownership).  It owns its
//! [`SampleBuffer`] exclusively; derived-channel engines and UI consumers get
//! read-only borrows through [`Signal::buffer`].

use log::debug;

use crate::data::buffer::SampleBuffer;
use crate::events::{
    EventFilter, EventHub, EventKind, PrecisionMeta, SampleMeta, SignalEvent, StartTimestampMeta,
};
use crate::persistence::SignalKey;
use crate::units::SignalMeta;

/// Numeric identifier for a signal, assigned by the session registry.
pub type SignalId = u32;

/// One acquired (or derived) analog signal.
pub struct Signal {
    id: SignalId,
    meta: SignalMeta,
    device_id: String,
    channel_id: String,
    buffer: SampleBuffer,
    hub: EventHub,
    /// Bumped on every clear; derived engines compare epochs to detect a
    /// source reset without relying on `count == 0`.
    epoch: u64,
    /// Precision of the most recent push ever, surviving clears (the buffer
    /// retains its precision metadata across a clear, so change detection
    /// must too).
    last_precision: Option<(i32, i32)>,
}

impl Signal {
    pub fn new(
        id: SignalId,
        meta: SignalMeta,
        device_id: impl Into<String>,
        channel_id: impl Into<String>,
        start_timestamp: f64,
    ) -> Self {
        Self {
            id,
            meta,
            device_id: device_id.into(),
            channel_id: channel_id.into(),
            buffer: SampleBuffer::new(start_timestamp),
            hub: EventHub::new(),
            epoch: 0,
            last_precision: None,
        }
    }

    #[inline]
    pub fn id(&self) -> SignalId {
        self.id
    }

    #[inline]
    pub fn meta(&self) -> &SignalMeta {
        &self.meta
    }

    #[inline]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    #[inline]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Read-only view of the owned sample buffer.
    #[inline]
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Session-stable identity key used by the settings persistence layer.
    pub fn key(&self) -> SignalKey {
        SignalKey {
            device_id: self.device_id.clone(),
            channel_id: self.channel_id.clone(),
            quantity: self.meta.quantity(),
            quantity_flags: self.meta.flags(),
        }
    }

    /// Display name composed from channel, unit and flags,
    /// e.g. `"CH1 [V DC]"`.
    pub fn display_name(&self) -> String {
        let unit = self.meta.unit().symbol();
        let flags = self.meta.flags();
        if flags.is_empty() {
            format!("{} [{}]", self.channel_id, unit)
        } else {
            format!("{} [{} {}]", self.channel_id, unit, flags)
        }
    }

    /// Subscribe to this signal's notifications.
    pub fn subscribe(&self, filter: EventFilter) -> std::sync::mpsc::Receiver<SignalEvent> {
        self.hub.subscribe(filter)
    }

    /// Append one sample and notify subscribers.
    ///
    /// Emits `SAMPLE_ADDED`, combined with `DIGITS_CHANGED` /
    /// `DECIMAL_PLACES_CHANGED` when the display precision actually changed
    /// relative to the previous push.
    pub fn push_sample(&mut self, value: f64, timestamp: f64, digits: i32, decimal_places: i32) {
        let (digits_changed, decimals_changed) = match self.last_precision {
            Some((prev_digits, prev_decimals)) => {
                (prev_digits != digits, prev_decimals != decimal_places)
            }
            None => (false, false),
        };
        self.last_precision = Some((digits, decimal_places));

        self.buffer.push(timestamp, value, digits, decimal_places);

        let mut kinds = EventKind::SAMPLE_ADDED;
        if digits_changed {
            kinds |= EventKind::DIGITS_CHANGED;
        }
        if decimals_changed {
            kinds |= EventKind::DECIMAL_PLACES_CHANGED;
        }
        let mut event = SignalEvent::new(kinds, self.id);
        event.sample = Some(SampleMeta {
            timestamp,
            value,
            count: self.buffer.count(),
        });
        if digits_changed || decimals_changed {
            event.precision = Some(PrecisionMeta {
                digits,
                decimal_places,
            });
        }
        self.hub.emit(&event);
    }

    /// Clear the buffer, bump the epoch and notify subscribers.
    ///
    /// Subscribers (including derived channels) must treat this as "this
    /// source has been reset", not merely "count is now zero".
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.epoch += 1;
        debug!(
            "signal {} ({}) cleared, epoch {}",
            self.id,
            self.display_name(),
            self.epoch
        );
        self.hub
            .emit(&SignalEvent::new(EventKind::SAMPLES_CLEARED, self.id));
    }

    /// Propagate a time-origin correction from the owning channel.
    ///
    /// Stored samples keep their absolute timestamps; only the relative
    /// display origin shifts.
    pub fn set_start_timestamp(&mut self, start_timestamp: f64) {
        self.buffer.set_start_timestamp(start_timestamp);
        let mut event = SignalEvent::new(EventKind::START_TIMESTAMP_CHANGED, self.id);
        event.start_timestamp = Some(StartTimestampMeta { start_timestamp });
        self.hub.emit(&event);
    }

    /// Emit a pre-built event through this signal's hub (used by derived
    /// engines to report zero-divisor occurrences on their output signal).
    pub(crate) fn emit(&self, event: &SignalEvent) {
        self.hub.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Quantity, QuantityFlags, Unit};

    fn volt_signal() -> Signal {
        let meta = SignalMeta::new(Quantity::Voltage, QuantityFlags::DC, Unit::Volt).unwrap();
        Signal::new(1, meta, "dev0", "CH1", 100.0)
    }

    #[test]
    fn push_emits_sample_added() {
        let mut sig = volt_signal();
        let rx = sig.subscribe(EventFilter::only(EventKind::SAMPLE_ADDED));
        sig.push_sample(1.5, 100.5, 6, 3);
        let evt = rx.try_recv().unwrap();
        assert!(evt.kinds.contains(EventKind::SAMPLE_ADDED));
        assert_eq!(evt.sample.unwrap().count, 1);
    }

    #[test]
    fn precision_change_sets_extra_kinds() {
        let mut sig = volt_signal();
        let rx = sig.subscribe(EventFilter::all());
        sig.push_sample(1.0, 100.0, 6, 3);
        sig.push_sample(2.0, 101.0, 5, 2);
        let first = rx.try_recv().unwrap();
        assert!(!first.kinds.contains(EventKind::DIGITS_CHANGED));
        let second = rx.try_recv().unwrap();
        assert!(second.kinds.contains(EventKind::DIGITS_CHANGED));
        assert!(second.kinds.contains(EventKind::DECIMAL_PLACES_CHANGED));
        assert_eq!(second.precision.unwrap().digits, 5);
    }

    #[test]
    fn precision_change_is_detected_across_clear() {
        // clear() retains the precision metadata, so the first push after a
        // clear still compares against the last push before it.
        let mut sig = volt_signal();
        sig.push_sample(1.0, 100.0, 4, 2);
        sig.clear();

        let rx = sig.subscribe(EventFilter::only(EventKind::DIGITS_CHANGED));
        sig.push_sample(2.0, 101.0, 6, 2);
        let evt = rx.try_recv().unwrap();
        assert!(evt.kinds.contains(EventKind::DIGITS_CHANGED));
        assert!(!evt.kinds.contains(EventKind::DECIMAL_PLACES_CHANGED));
        assert_eq!(evt.precision.unwrap().digits, 6);
    }

    #[test]
    fn clear_bumps_epoch_and_notifies() {
        let mut sig = volt_signal();
        let rx = sig.subscribe(EventFilter::only(EventKind::SAMPLES_CLEARED));
        sig.push_sample(1.0, 100.0, 6, 3);
        assert_eq!(sig.epoch(), 0);
        sig.clear();
        assert_eq!(sig.epoch(), 1);
        assert_eq!(sig.buffer().count(), 0);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn display_name_includes_unit_and_flags() {
        let sig = volt_signal();
        assert_eq!(sig.display_name(), "CH1 [V DC]");
    }
}
