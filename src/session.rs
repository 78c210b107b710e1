//! Session: device/channel/signal registry and processing hub.
//!
//! The [`Session`] owns every [`Signal`] and every [`DerivedChannel`] engine.
//! All mutation funnels through it, either by direct calls or by draining a
//! [`SignalSink`](crate::sink::SignalSink) command channel via [`poll`]
//! (Self::poll), so buffer writes and derived computation stay on one
//! logical thread of control and the engine cursor invariants hold without
//! locking.
//!
//! After every mutation the session runs its engines in registration order,
//! repeating until a fixpoint so that chained derived channels (an output
//! feeding a further engine) settle within the same dispatch cycle.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;

use log::{debug, warn};

use crate::channels::{DerivedChannel, MathOp};
use crate::config::SessionConfig;
use crate::data::signal::{Signal, SignalId};
use crate::error::{Result, SignalError};
use crate::persistence::{DerivedDefSerde, SessionStateSerde, SignalKey, SignalStateSerde};
use crate::sink::{AcquisitionCommand, RawSample};
use crate::units::SignalMeta;

pub struct Session {
    config: SessionConfig,
    signals: HashMap<SignalId, Signal>,
    by_key: HashMap<SignalKey, SignalId>,
    /// Registration order, for deterministic iteration.
    order: Vec<SignalId>,
    engines: Vec<DerivedChannel>,
    rx: Option<Receiver<AcquisitionCommand>>,
    next_id: SignalId,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            signals: HashMap::new(),
            by_key: HashMap::new(),
            order: Vec::new(),
            engines: Vec::new(),
            rx: None,
            next_id: 1,
        }
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Attach the receiving end of an acquisition channel.
    pub fn set_rx(&mut self, rx: Receiver<AcquisitionCommand>) {
        self.rx = Some(rx);
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Register a new signal. The `(device, channel, quantity, flags)` key
    /// must be unique within the session.
    pub fn add_signal(
        &mut self,
        meta: SignalMeta,
        device_id: impl Into<String>,
        channel_id: impl Into<String>,
        start_timestamp: f64,
    ) -> Result<SignalId> {
        let device_id = device_id.into();
        let channel_id = channel_id.into();
        let key = SignalKey {
            device_id: device_id.clone(),
            channel_id: channel_id.clone(),
            quantity: meta.quantity(),
            quantity_flags: meta.flags(),
        };
        if self.by_key.contains_key(&key) {
            return Err(SignalError::DuplicateSignal(format!(
                "{}/{} {:?} {}",
                key.device_id, key.channel_id, key.quantity, key.quantity_flags
            )));
        }
        let id = self.next_id;
        self.next_id += 1;
        let signal = Signal::new(id, meta, device_id, channel_id, start_timestamp);
        debug!("registered signal {} ({})", id, signal.display_name());
        self.by_key.insert(key, id);
        self.order.push(id);
        self.signals.insert(id, signal);
        Ok(id)
    }

    pub fn signal(&self, id: SignalId) -> Result<&Signal> {
        self.signals.get(&id).ok_or(SignalError::UnknownSignal(id))
    }

    /// Resolve a persisted identity key back to a live signal id.
    pub fn resolve(&self, key: &SignalKey) -> Option<SignalId> {
        self.by_key.get(key).copied()
    }

    /// Signal ids in registration order.
    pub fn signal_ids(&self) -> &[SignalId] {
        &self.order
    }

    /// Register a derived channel: creates the output signal and wires an
    /// engine over the two (already registered) inputs.
    ///
    /// Output metadata is validated by [`SignalMeta`] construction before
    /// this call; the engine itself never re-validates. The output signal's
    /// start timestamp is seeded from input `a` at construction and does not
    /// follow later origin shifts of the input's channel: the output belongs
    /// to its own channel, whose origin is shifted via
    /// [`set_channel_start_timestamp`](Self::set_channel_start_timestamp)
    /// like any other channel's.
    pub fn add_derived_channel(
        &mut self,
        op: MathOp,
        a: SignalId,
        b: SignalId,
        output_meta: SignalMeta,
        output_device_id: impl Into<String>,
        output_channel_id: impl Into<String>,
    ) -> Result<SignalId> {
        let start = self.signal(a)?.buffer().start_timestamp();
        self.signal(b)?;
        let output = self.add_signal(output_meta, output_device_id, output_channel_id, start)?;
        let engine =
            DerivedChannel::new(op, a, b, output, self.config.zero_divisor_policy, &self.signals)?;
        self.engines.push(engine);
        Ok(output)
    }

    pub fn derived_channels(&self) -> &[DerivedChannel] {
        &self.engines
    }

    // ── Mutation paths ──────────────────────────────────────────────────

    /// Append one sample and run the derived engines to a fixpoint.
    pub fn push_sample(&mut self, id: SignalId, sample: RawSample) -> Result<()> {
        let signal = self
            .signals
            .get_mut(&id)
            .ok_or(SignalError::UnknownSignal(id))?;
        signal.push_sample(
            sample.value,
            sample.timestamp,
            sample.digits,
            sample.decimal_places,
        );
        self.process_derived()
    }

    /// Clear one signal's buffer and run the derived engines so dependent
    /// outputs reset in the same cycle.
    pub fn clear_signal(&mut self, id: SignalId) -> Result<()> {
        let signal = self
            .signals
            .get_mut(&id)
            .ok_or(SignalError::UnknownSignal(id))?;
        signal.clear();
        self.process_derived()
    }

    /// Shift the time-origin of every signal of one device/channel pair.
    pub fn set_channel_start_timestamp(
        &mut self,
        device_id: &str,
        channel_id: &str,
        start_timestamp: f64,
    ) {
        for id in &self.order {
            if let Some(signal) = self.signals.get_mut(id) {
                if signal.device_id() == device_id && signal.channel_id() == channel_id {
                    signal.set_start_timestamp(start_timestamp);
                }
            }
        }
    }

    /// Drain all pending acquisition commands, returning how many were
    /// applied.
    ///
    /// Commands addressing an unknown signal id are logged and skipped so
    /// one stale producer cannot stall the whole acquisition stream.
    pub fn poll(&mut self) -> Result<usize> {
        let Some(rx) = self.rx.take() else {
            return Ok(0);
        };
        let mut applied = 0usize;
        while let Ok(cmd) = rx.try_recv() {
            match self.apply(cmd) {
                Ok(()) => applied += 1,
                Err(SignalError::UnknownSignal(id)) => {
                    warn!("dropping acquisition command for unknown signal {}", id);
                }
                Err(e) => {
                    self.rx = Some(rx);
                    return Err(e);
                }
            }
        }
        self.rx = Some(rx);
        Ok(applied)
    }

    fn apply(&mut self, cmd: AcquisitionCommand) -> Result<()> {
        match cmd {
            AcquisitionCommand::Sample { signal, sample } => self.push_sample(signal, sample),
            AcquisitionCommand::Samples { signal, samples } => {
                {
                    let sig = self
                        .signals
                        .get_mut(&signal)
                        .ok_or(SignalError::UnknownSignal(signal))?;
                    for s in samples {
                        sig.push_sample(s.value, s.timestamp, s.digits, s.decimal_places);
                    }
                }
                self.process_derived()
            }
            AcquisitionCommand::Clear { signal } => self.clear_signal(signal),
            AcquisitionCommand::SetChannelStartTimestamp {
                device_id,
                channel_id,
                start_timestamp,
            } => {
                self.set_channel_start_timestamp(&device_id, &channel_id, start_timestamp);
                Ok(())
            }
        }
    }

    /// Run every engine in registration order, repeating until a full round
    /// makes no progress so that derived chains settle.
    fn process_derived(&mut self) -> Result<()> {
        for round in 0.. {
            if round >= self.config.max_derived_rounds {
                warn!(
                    "derived channels did not settle after {} rounds; cyclic wiring?",
                    self.config.max_derived_rounds
                );
                break;
            }
            let mut progress = false;
            for engine in &mut self.engines {
                let outcome = engine.process(&mut self.signals)?;
                progress |= outcome.made_progress();
            }
            if !progress {
                break;
            }
        }
        Ok(())
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Snapshot the registered signals and derived-channel wiring.
    ///
    /// Output signals of derived channels are excluded from the plain
    /// signal list; they are recreated from their definitions on restore.
    pub fn snapshot(&self) -> SessionStateSerde {
        let derived_outputs: HashSet<SignalId> =
            self.engines.iter().map(|e| e.output_id()).collect();
        let mut state = SessionStateSerde::default();
        for id in &self.order {
            if derived_outputs.contains(id) {
                continue;
            }
            if let Some(signal) = self.signals.get(id) {
                state.signals.push(SignalStateSerde {
                    key: signal.key(),
                    meta: *signal.meta(),
                    start_timestamp: signal.buffer().start_timestamp(),
                });
            }
        }
        for engine in &self.engines {
            let (a, b) = engine.input_ids();
            let (Ok(a), Ok(b), Ok(out)) =
                (self.signal(a), self.signal(b), self.signal(engine.output_id()))
            else {
                continue;
            };
            state.derived.push(DerivedDefSerde {
                op: engine.op(),
                a: a.key(),
                b: b.key(),
                output: out.key(),
                output_meta: *out.meta(),
            });
        }
        state
    }

    /// Rebuild a session layout from a snapshot: plain signals first, then
    /// derived channels with their input keys resolved against the fresh
    /// registry.
    pub fn restore(config: SessionConfig, state: &SessionStateSerde) -> Result<Self> {
        let mut session = Session::new(config);
        for sig in &state.signals {
            session.add_signal(
                sig.meta,
                sig.key.device_id.clone(),
                sig.key.channel_id.clone(),
                sig.start_timestamp,
            )?;
        }
        for def in &state.derived {
            let a = session
                .resolve(&def.a)
                .ok_or_else(|| SignalError::UnresolvedKey(format!("{:?}", def.a)))?;
            let b = session
                .resolve(&def.b)
                .ok_or_else(|| SignalError::UnresolvedKey(format!("{:?}", def.b)))?;
            session.add_derived_channel(
                def.op,
                a,
                b,
                def.output_meta,
                def.output.device_id.clone(),
                def.output.channel_id.clone(),
            )?;
        }
        Ok(session)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
