//! Ingestion interface: commands and channels for feeding samples into a
//! session.
//!
//! Producer threads (one per device, typically) hold a cheaply-clonable
//! [`SignalSink`] and send [`AcquisitionCommand`]s; the session drains the
//! receiving end on its own processing thread, which keeps all buffer
//! mutation and derived-channel computation on one logical thread of
//! control.  Decoding the driver's wire sample format into an `f64` plus
//! display-precision hints happens before the sink and is not this crate's
//! concern.

use std::sync::mpsc::{Receiver, Sender};

use crate::data::signal::SignalId;

/// One decoded sample ready for ingestion.
#[derive(Debug, Clone, Copy)]
pub struct RawSample {
    /// Absolute timestamp in seconds.
    pub timestamp: f64,
    pub value: f64,
    /// Significant-digits display hint from the driver.
    pub digits: i32,
    /// Decimal-places display hint from the driver.
    pub decimal_places: i32,
}

/// Messages sent over the channel to drive the session.
#[derive(Debug, Clone)]
pub enum AcquisitionCommand {
    /// Append a single sample to the given signal.
    Sample {
        signal: SignalId,
        sample: RawSample,
    },
    /// Append a chunk of samples to the given signal (more efficient than
    /// sample-by-sample for high-rate devices).
    Samples {
        signal: SignalId,
        samples: Vec<RawSample>,
    },
    /// Clear the given signal's buffer ("this source has been reset").
    Clear { signal: SignalId },
    /// Shift the time-origin of every signal belonging to the given
    /// device/channel pair; stored samples keep absolute timestamps.
    SetChannelStartTimestamp {
        device_id: String,
        channel_id: String,
        start_timestamp: f64,
    },
}

/// Convenience sender for feeding samples into a session.
#[derive(Clone)]
pub struct SignalSink {
    tx: Sender<AcquisitionCommand>,
}

impl SignalSink {
    /// Send a single sample for a given signal id.
    pub fn push_sample(
        &self,
        signal: SignalId,
        sample: RawSample,
    ) -> Result<(), std::sync::mpsc::SendError<AcquisitionCommand>> {
        self.tx.send(AcquisitionCommand::Sample { signal, sample })
    }

    /// Send a chunk of samples for a given signal id.
    pub fn push_samples<I>(
        &self,
        signal: SignalId,
        samples: I,
    ) -> Result<(), std::sync::mpsc::SendError<AcquisitionCommand>>
    where
        I: Into<Vec<RawSample>>,
    {
        self.tx.send(AcquisitionCommand::Samples {
            signal,
            samples: samples.into(),
        })
    }

    /// Request a buffer clear for a given signal id.
    #[inline]
    pub fn clear(
        &self,
        signal: SignalId,
    ) -> Result<(), std::sync::mpsc::SendError<AcquisitionCommand>> {
        self.tx.send(AcquisitionCommand::Clear { signal })
    }

    /// Shift the time-origin of all signals of one channel.
    pub fn set_channel_start_timestamp(
        &self,
        device_id: impl Into<String>,
        channel_id: impl Into<String>,
        start_timestamp: f64,
    ) -> Result<(), std::sync::mpsc::SendError<AcquisitionCommand>> {
        self.tx.send(AcquisitionCommand::SetChannelStartTimestamp {
            device_id: device_id.into(),
            channel_id: channel_id.into(),
            start_timestamp,
        })
    }
}

/// Create a new channel pair for acquisition:
/// `(SignalSink, Receiver<AcquisitionCommand>)`.
///
/// Hand the receiver to [`Session::set_rx`](crate::session::Session::set_rx)
/// and clone the sink into producer threads.
pub fn channel_acquisition() -> (SignalSink, Receiver<AcquisitionCommand>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (SignalSink { tx }, rx)
}
