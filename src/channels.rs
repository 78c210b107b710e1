//! Derived channels: math signals computed from other signals.
//!
//! A [`DerivedChannel`] observes two input signals through per-input read
//! cursors and produces into its own output signal.  Pairing is strictly
//! positional: the n-th unread sample of input A is combined with the n-th
//! unread sample of input B.  The two inputs are assumed to advance in
//! lockstep from the same acquisition cadence; sources running at different
//! rates with misaligned timestamps will produce semantically wrong pairs.
//! This is a known limitation and is deliberately not papered over with
//! timestamp interpolation.
//!
//! Cursor management and clear propagation are shared across all [`MathOp`]
//! variants; each variant only supplies its per-sample combination function.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::ZeroDivisorPolicy;
use crate::data::signal::{Signal, SignalId};
use crate::error::{Result, SignalError};
use crate::events::{DerivedErrorMeta, EventKind, SignalEvent};

/// Per-sample combination applied by a derived channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MathOp {
    /// `a / b`; a zero divisor is handled per [`ZeroDivisorPolicy`].
    Divide,
    Multiply,
    Add,
    /// `a - b`.
    Difference,
}

impl MathOp {
    /// Combine one positionally-paired sample.
    ///
    /// Returns `None` when the pairing produces no output sample (zero
    /// divisor under the skip policy); the pairing is still consumed.
    fn combine(self, a: f64, b: f64, policy: ZeroDivisorPolicy) -> Option<f64> {
        match self {
            MathOp::Divide => {
                if b == 0.0 {
                    match policy {
                        ZeroDivisorPolicy::SkipAndCount => None,
                        ZeroDivisorPolicy::Propagate => Some(a / b),
                    }
                } else {
                    Some(a / b)
                }
            }
            MathOp::Multiply => Some(a * b),
            MathOp::Add => Some(a + b),
            MathOp::Difference => Some(a - b),
        }
    }

    /// Human-readable formula, e.g. `"CH1 / CH2"`.
    pub fn describe(self, a: &str, b: &str) -> String {
        let op = match self {
            MathOp::Divide => "/",
            MathOp::Multiply => "*",
            MathOp::Add => "+",
            MathOp::Difference => "-",
        };
        format!("{a} {op} {b}")
    }
}

/// Engine state for one derived channel.
///
/// The engine never owns its signals; the session passes the signal map in
/// on every [`process`](Self::process) call, which keeps all derived
/// computation on the session's single logical processing thread.
pub struct DerivedChannel {
    op: MathOp,
    a: SignalId,
    b: SignalId,
    output: SignalId,
    next_a_pos: usize,
    next_b_pos: usize,
    seen_a_epoch: u64,
    seen_b_epoch: u64,
    zero_divisor_count: u64,
    policy: ZeroDivisorPolicy,
}

/// What one [`DerivedChannel::process`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Samples pushed into the output signal.
    pub produced: usize,
    /// Pairings consumed without output (zero divisor under the skip policy).
    pub skipped: usize,
    /// The engine detected a source epoch change and reset itself.
    pub reset: bool,
}

impl ProcessOutcome {
    /// True when the pass changed any state worth another fixpoint round.
    pub fn made_progress(&self) -> bool {
        self.produced > 0 || self.skipped > 0 || self.reset
    }
}

impl DerivedChannel {
    /// Build an engine over already-registered signals.
    ///
    /// The input and output metadata were validated when the signals were
    /// constructed; the engine never re-validates it.  `signals` is only
    /// used to adopt the inputs' current epochs so that pre-existing clears
    /// do not count as a reset.
    pub fn new(
        op: MathOp,
        a: SignalId,
        b: SignalId,
        output: SignalId,
        policy: ZeroDivisorPolicy,
        signals: &HashMap<SignalId, Signal>,
    ) -> Result<Self> {
        let a_epoch = signals.get(&a).ok_or(SignalError::UnknownSignal(a))?.epoch();
        let b_epoch = signals.get(&b).ok_or(SignalError::UnknownSignal(b))?.epoch();
        if !signals.contains_key(&output) {
            return Err(SignalError::UnknownSignal(output));
        }
        debug!("derived channel created: output {} = {:?}({}, {})", output, op, a, b);
        Ok(Self {
            op,
            a,
            b,
            output,
            next_a_pos: 0,
            next_b_pos: 0,
            seen_a_epoch: a_epoch,
            seen_b_epoch: b_epoch,
            zero_divisor_count: 0,
            policy,
        })
    }

    #[inline]
    pub fn op(&self) -> MathOp {
        self.op
    }

    #[inline]
    pub fn input_ids(&self) -> (SignalId, SignalId) {
        (self.a, self.b)
    }

    #[inline]
    pub fn output_id(&self) -> SignalId {
        self.output
    }

    /// Zero-divisor pairings consumed so far.
    #[inline]
    pub fn zero_divisor_count(&self) -> u64 {
        self.zero_divisor_count
    }

    /// Current read cursors `(next_a_pos, next_b_pos)`.
    #[inline]
    pub fn cursors(&self) -> (usize, usize) {
        (self.next_a_pos, self.next_b_pos)
    }

    /// One processing pass: handle source resets, then consume every
    /// positionally-paired unread sample available from *both* inputs.
    ///
    /// The output sample carries the timestamp of the A-side (dividend)
    /// sample and the A-side's display precision at read time.
    pub fn process(&mut self, signals: &mut HashMap<SignalId, Signal>) -> Result<ProcessOutcome> {
        let mut outcome = ProcessOutcome::default();

        let (a_epoch, b_epoch) = {
            let a = signals.get(&self.a).ok_or(SignalError::UnknownSignal(self.a))?;
            let b = signals.get(&self.b).ok_or(SignalError::UnknownSignal(self.b))?;
            (a.epoch(), b.epoch())
        };

        // A cleared source desynchronizes the positional pairing; the only
        // safe response is a full reset of both cursors and the output,
        // even when just one input changed.
        if a_epoch != self.seen_a_epoch || b_epoch != self.seen_b_epoch {
            warn!(
                "derived channel {}: source cleared, resetting cursors and output",
                self.output
            );
            self.next_a_pos = 0;
            self.next_b_pos = 0;
            self.seen_a_epoch = a_epoch;
            self.seen_b_epoch = b_epoch;
            let out = signals
                .get_mut(&self.output)
                .ok_or(SignalError::UnknownSignal(self.output))?;
            if out.buffer().count() > 0 {
                out.clear();
            }
            outcome.reset = true;
        }

        // Gather available pairings first so the immutable borrows of the
        // inputs end before the output is mutated.
        let pairs = {
            let a = signals.get(&self.a).ok_or(SignalError::UnknownSignal(self.a))?;
            let b = signals.get(&self.b).ok_or(SignalError::UnknownSignal(self.b))?;
            debug_assert!(self.next_a_pos <= a.buffer().count());
            debug_assert!(self.next_b_pos <= b.buffer().count());

            let available = (a.buffer().count() - self.next_a_pos)
                .min(b.buffer().count() - self.next_b_pos);
            let mut pairs = Vec::with_capacity(available);
            for i in 0..available {
                let sa = a.buffer().sample(self.next_a_pos + i, false)?;
                let sb = b.buffer().sample(self.next_b_pos + i, false)?;
                pairs.push((sa.timestamp, sa.value, sb.value));
            }
            self.next_a_pos += available;
            self.next_b_pos += available;
            (pairs, a.buffer().digits(), a.buffer().decimal_places())
        };
        let (pairs, digits, decimal_places) = pairs;

        if pairs.is_empty() {
            return Ok(outcome);
        }

        let out = signals
            .get_mut(&self.output)
            .ok_or(SignalError::UnknownSignal(self.output))?;
        for (timestamp, va, vb) in pairs {
            match self.op.combine(va, vb, self.policy) {
                Some(value) => {
                    out.push_sample(value, timestamp, digits, decimal_places);
                    outcome.produced += 1;
                }
                None => {
                    self.zero_divisor_count += 1;
                    outcome.skipped += 1;
                    warn!(
                        "derived channel {}: zero divisor at t={} (occurrence {})",
                        self.output, timestamp, self.zero_divisor_count
                    );
                    let mut event = SignalEvent::new(EventKind::DERIVED_ERROR, self.output);
                    event.derived_error = Some(DerivedErrorMeta {
                        timestamp,
                        zero_divisor_count: self.zero_divisor_count,
                    });
                    out.emit(&event);
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_divide_skips_zero_divisor() {
        assert_eq!(
            MathOp::Divide.combine(10.0, 2.0, ZeroDivisorPolicy::SkipAndCount),
            Some(5.0)
        );
        assert_eq!(
            MathOp::Divide.combine(10.0, 0.0, ZeroDivisorPolicy::SkipAndCount),
            None
        );
    }

    #[test]
    fn combine_divide_propagate_yields_ieee_result() {
        let v = MathOp::Divide
            .combine(10.0, 0.0, ZeroDivisorPolicy::Propagate)
            .unwrap();
        assert!(v.is_infinite() && v.is_sign_positive());
        let nan = MathOp::Divide
            .combine(0.0, 0.0, ZeroDivisorPolicy::Propagate)
            .unwrap();
        assert!(nan.is_nan());
    }

    #[test]
    fn combine_other_ops() {
        let p = ZeroDivisorPolicy::SkipAndCount;
        assert_eq!(MathOp::Multiply.combine(3.0, 4.0, p), Some(12.0));
        assert_eq!(MathOp::Add.combine(3.0, 4.0, p), Some(7.0));
        assert_eq!(MathOp::Difference.combine(3.0, 4.0, p), Some(-1.0));
    }

    #[test]
    fn describe_formats_formula() {
        assert_eq!(MathOp::Divide.describe("CH1", "CH2"), "CH1 / CH2");
        assert_eq!(MathOp::Difference.describe("a", "b"), "a - b");
    }
}
