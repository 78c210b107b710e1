//! livesignal crate root: re-exports and module wiring.
//!
//! This crate provides the acquisition core of a measurement application:
//! - `data`: append-only sample buffers and the signals that own them
//! - `channels`: derived-channel engines (divide and friends) with
//!   positional cursors over their input signals
//! - `events`: per-signal notification fan-out with filtered subscriptions
//! - `sink`: command channel for feeding decoded samples into a session
//! - `session`: device/channel/signal registry and processing hub
//! - `persistence`: stable signal identity keys and state snapshots
//! - `units`: quantity/flag/unit metadata with construction-time validation
//!
//! UI rendering, the settings file format and device-driver communication
//! live in the surrounding application, not here.

pub mod channels;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod persistence;
pub mod session;
pub mod sink;
pub mod units;

// Public re-exports for a compact external API
pub use channels::{DerivedChannel, MathOp, ProcessOutcome};
pub use config::{SessionConfig, ZeroDivisorPolicy};
pub use data::buffer::{Sample, SampleBuffer};
pub use data::signal::{Signal, SignalId};
pub use error::{Result, SignalError};
pub use events::{EventFilter, EventHub, EventKind, SignalEvent};
pub use persistence::{SessionStateSerde, SignalKey};
pub use session::Session;
pub use sink::{channel_acquisition, AcquisitionCommand, RawSample, SignalSink};
pub use units::{Quantity, QuantityFlags, SignalMeta, Unit};
