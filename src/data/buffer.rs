//! Append-only sample storage with running aggregates.
//!
//! A [`SampleBuffer`] backs exactly one signal.  Timestamps and values are
//! kept in two parallel vectors so that range reads of values stay a plain
//! slice copy.  All aggregates (`min`, `max`, `last`) are maintained
//! incrementally on push — never recomputed by scanning — which keeps the
//! append path O(1).

use crate::error::{Result, SignalError};

/// One acquired data point: absolute timestamp (seconds) and value.
///
/// Timestamps are monotonically non-decreasing within one buffer but are not
/// required to be evenly spaced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub value: f64,
}

/// Append-only growable storage of [`Sample`]s for one signal.
///
/// `start_timestamp` is the acquisition epoch used for relative-time reads;
/// shifting it never rewrites stored samples, which keep absolute timestamps.
/// `digits` / `decimal_places` are the *last pushed* display-precision hints;
/// they may change over the buffer's life and consumers must tolerate that
/// without buffer rewrites.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    time: Vec<f64>,
    data: Vec<f64>,
    start_timestamp: f64,
    digits: i32,
    decimal_places: i32,
    min_value: Option<f64>,
    max_value: Option<f64>,
    last_value: Option<f64>,
    last_timestamp: Option<f64>,
}

impl SampleBuffer {
    /// Default display precision before the first push.
    pub const DEFAULT_DIGITS: i32 = 6;
    pub const DEFAULT_DECIMAL_PLACES: i32 = 3;

    pub fn new(start_timestamp: f64) -> Self {
        Self {
            time: Vec::new(),
            data: Vec::new(),
            start_timestamp,
            digits: Self::DEFAULT_DIGITS,
            decimal_places: Self::DEFAULT_DECIMAL_PLACES,
            min_value: None,
            max_value: None,
            last_value: None,
            last_timestamp: None,
        }
    }

    /// Append one sample. Constant time.
    ///
    /// `last_value` / `last_timestamp` are updated unconditionally; `min` /
    /// `max` only when the new value extends the current range (the first
    /// push initializes both).  NaN values are stored and become the last
    /// value, but are excluded from the min/max range.
    pub fn push(&mut self, timestamp: f64, value: f64, digits: i32, decimal_places: i32) {
        self.time.push(timestamp);
        self.data.push(value);
        self.last_timestamp = Some(timestamp);
        self.last_value = Some(value);
        self.digits = digits;
        self.decimal_places = decimal_places;
        if !value.is_nan() {
            self.min_value = Some(match self.min_value {
                Some(min) if min <= value => min,
                _ => value,
            });
            self.max_value = Some(match self.max_value {
                Some(max) if max >= value => max,
                _ => value,
            });
        }
    }

    /// Number of samples currently stored.
    #[inline]
    pub fn count(&self) -> usize {
        debug_assert_eq!(self.time.len(), self.data.len());
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values in the half-open position range `[start, end)`.
    pub fn samples(&self, start: usize, end: usize) -> Result<Vec<f64>> {
        if start > end || end > self.count() {
            return Err(SignalError::InvalidRange {
                start,
                end,
                count: self.count(),
            });
        }
        Ok(self.data[start..end].to_vec())
    }

    /// The sample at `pos`.
    ///
    /// With `relative_time` the returned timestamp is
    /// `absolute_timestamp - start_timestamp`.
    pub fn sample(&self, pos: usize, relative_time: bool) -> Result<Sample> {
        if pos >= self.count() {
            return Err(SignalError::PositionOutOfRange {
                pos,
                count: self.count(),
            });
        }
        let mut timestamp = self.time[pos];
        if relative_time {
            timestamp -= self.start_timestamp;
        }
        Ok(Sample {
            timestamp,
            value: self.data[pos],
        })
    }

    /// Reset count and aggregates to empty; the start timestamp and the
    /// precision metadata are retained.
    pub fn clear(&mut self) {
        self.time.clear();
        self.data.clear();
        self.min_value = None;
        self.max_value = None;
        self.last_value = None;
        self.last_timestamp = None;
    }

    pub fn first_timestamp(&self, relative_time: bool) -> Option<f64> {
        self.time.first().map(|&t| {
            if relative_time {
                t - self.start_timestamp
            } else {
                t
            }
        })
    }

    pub fn last_timestamp(&self, relative_time: bool) -> Option<f64> {
        self.last_timestamp.map(|t| {
            if relative_time {
                t - self.start_timestamp
            } else {
                t
            }
        })
    }

    #[inline]
    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    #[inline]
    pub fn min_value(&self) -> Option<f64> {
        self.min_value
    }

    #[inline]
    pub fn max_value(&self) -> Option<f64> {
        self.max_value
    }

    #[inline]
    pub fn digits(&self) -> i32 {
        self.digits
    }

    #[inline]
    pub fn decimal_places(&self) -> i32 {
        self.decimal_places
    }

    #[inline]
    pub fn start_timestamp(&self) -> f64 {
        self.start_timestamp
    }

    pub fn set_start_timestamp(&mut self, start_timestamp: f64) {
        self.start_timestamp = start_timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn push_updates_last_and_count() {
        let mut buf = SampleBuffer::new(0.0);
        buf.push(1.0, 10.0, 6, 3);
        buf.push(2.0, -4.0, 6, 3);
        assert_eq!(buf.count(), 2);
        assert_relative_eq!(buf.last_value().unwrap(), -4.0);
        assert_relative_eq!(buf.last_timestamp(false).unwrap(), 2.0);
    }

    #[test]
    fn nan_value_is_stored_but_excluded_from_range() {
        let mut buf = SampleBuffer::new(0.0);
        buf.push(1.0, 5.0, 6, 3);
        buf.push(2.0, f64::NAN, 6, 3);
        assert_eq!(buf.count(), 2);
        assert!(buf.last_value().unwrap().is_nan());
        assert_relative_eq!(buf.min_value().unwrap(), 5.0);
        assert_relative_eq!(buf.max_value().unwrap(), 5.0);
    }

    #[test]
    fn range_errors_are_reported_not_clamped() {
        let mut buf = SampleBuffer::new(0.0);
        buf.push(1.0, 1.0, 6, 3);
        assert!(matches!(
            buf.samples(1, 0),
            Err(SignalError::InvalidRange { .. })
        ));
        assert!(matches!(
            buf.samples(0, 2),
            Err(SignalError::InvalidRange { .. })
        ));
        assert!(matches!(
            buf.sample(1, false),
            Err(SignalError::PositionOutOfRange { pos: 1, count: 1 })
        ));
    }
}
