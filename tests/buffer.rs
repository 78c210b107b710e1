use approx::assert_relative_eq;
use livesignal::{SampleBuffer, SignalError};

#[test]
fn count_and_last_track_every_push() {
    let mut buf = SampleBuffer::new(0.0);
    let values = [3.0, -1.0, 7.5, 7.5, 0.25];
    for (i, &v) in values.iter().enumerate() {
        buf.push(i as f64, v, 6, 3);
        assert_eq!(buf.count(), i + 1);
        assert_relative_eq!(buf.last_value().unwrap(), v);
        assert_relative_eq!(buf.last_timestamp(false).unwrap(), i as f64);
    }
}

#[test]
fn min_max_match_scan_at_every_point() {
    let mut buf = SampleBuffer::new(0.0);
    let values = [5.0, -2.0, 9.0, 9.0, -2.0, 0.0, 12.5, -7.25];
    let mut pushed: Vec<f64> = Vec::new();
    for (i, &v) in values.iter().enumerate() {
        buf.push(i as f64, v, 6, 3);
        pushed.push(v);
        let min = pushed.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = pushed.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(buf.min_value().unwrap(), min);
        assert_relative_eq!(buf.max_value().unwrap(), max);
    }
}

#[test]
fn clear_resets_exactly() {
    let mut buf = SampleBuffer::new(50.0);
    buf.push(51.0, 1.0, 4, 2);
    buf.push(52.0, 2.0, 4, 2);
    buf.clear();

    assert_eq!(buf.count(), 0);
    assert!(buf.min_value().is_none());
    assert!(buf.max_value().is_none());
    assert!(buf.last_value().is_none());
    assert!(buf.last_timestamp(false).is_none());
    assert!(buf.first_timestamp(false).is_none());
    // Identity and metadata survive the clear.
    assert_relative_eq!(buf.start_timestamp(), 50.0);
    assert_eq!(buf.digits(), 4);
    assert_eq!(buf.decimal_places(), 2);

    assert!(matches!(
        buf.sample(0, false),
        Err(SignalError::PositionOutOfRange { pos: 0, count: 0 })
    ));
}

#[test]
fn relative_time_subtracts_start_timestamp() {
    let mut buf = SampleBuffer::new(1000.0);
    buf.push(1000.5, 1.0, 6, 3);
    buf.push(1002.0, 2.0, 6, 3);

    for pos in 0..buf.count() {
        let absolute = buf.sample(pos, false).unwrap();
        let relative = buf.sample(pos, true).unwrap();
        assert_relative_eq!(relative.timestamp, absolute.timestamp - 1000.0);
        assert_relative_eq!(relative.value, absolute.value);
    }
    assert_relative_eq!(buf.first_timestamp(true).unwrap(), 0.5);
    assert_relative_eq!(buf.last_timestamp(true).unwrap(), 2.0);
}

#[test]
fn samples_returns_half_open_range() {
    let mut buf = SampleBuffer::new(0.0);
    for i in 0..5 {
        buf.push(i as f64, (i * 10) as f64, 6, 3);
    }
    assert_eq!(buf.samples(1, 4).unwrap(), vec![10.0, 20.0, 30.0]);
    assert_eq!(buf.samples(0, 5).unwrap().len(), 5);
    assert!(buf.samples(2, 2).unwrap().is_empty());
}

#[test]
fn shifting_start_timestamp_does_not_rewrite_samples() {
    let mut buf = SampleBuffer::new(100.0);
    buf.push(101.0, 1.0, 6, 3);
    buf.set_start_timestamp(90.0);
    // Absolute timestamps are untouched; only the relative origin moved.
    assert_relative_eq!(buf.sample(0, false).unwrap().timestamp, 101.0);
    assert_relative_eq!(buf.sample(0, true).unwrap().timestamp, 11.0);
}

#[test]
fn precision_may_change_per_push() {
    let mut buf = SampleBuffer::new(0.0);
    buf.push(0.0, 1.0, 6, 3);
    assert_eq!((buf.digits(), buf.decimal_places()), (6, 3));
    buf.push(1.0, 2.0, 4, 1);
    assert_eq!((buf.digits(), buf.decimal_places()), (4, 1));
    // Earlier samples are still readable; no rewrite happened.
    assert_relative_eq!(buf.sample(0, false).unwrap().value, 1.0);
}
