//! Session configuration.

use serde::{Deserialize, Serialize};

/// How a derived divide channel handles a zero-valued divisor sample.
///
/// The policy is chosen once per session and applied consistently; either
/// way the pairing is consumed so the positional alignment of the two input
/// cursors is preserved, and the occurrence is counted and reported via a
/// `DERIVED_ERROR` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZeroDivisorPolicy {
    /// Consume the pairing without emitting an output sample (default).
    #[default]
    SkipAndCount,
    /// Emit the IEEE result (`inf` / `NaN`) as a regular sample.
    Propagate,
}

/// Knobs for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    pub zero_divisor_policy: ZeroDivisorPolicy,
    /// Upper bound on fixpoint rounds when settling chained derived
    /// channels within one dispatch cycle. Chains are acyclic in practice;
    /// the bound only guards against a miswired cyclic setup.
    pub max_derived_rounds: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            zero_divisor_policy: ZeroDivisorPolicy::default(),
            max_derived_rounds: 64,
        }
    }
}
