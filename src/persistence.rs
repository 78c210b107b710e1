//! Session state persistence: stable signal identities and JSON helpers.
//!
//! The settings layer of the surrounding application stores references to
//! signals across sessions.  A [`SignalKey`] is the stable identity it
//! stores: device, channel, quantity and the quantity-flags bitmask.  The
//! session registry resolves a key back to a live signal id on restore.
//!
//! [`SessionStateSerde`] additionally captures the registered signals and
//! derived-channel definitions so a whole session layout can be rebuilt.
//! The application settings file format itself is out of scope; these are
//! the mirror types it embeds.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::channels::MathOp;
use crate::error::Result;
use crate::units::{Quantity, QuantityFlags, SignalMeta};

/// Session-stable identity of one signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalKey {
    pub device_id: String,
    pub channel_id: String,
    pub quantity: Quantity,
    /// Serialized as the raw bitmask.
    pub quantity_flags: QuantityFlags,
}

/// Serializable description of one registered signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalStateSerde {
    pub key: SignalKey,
    pub meta: SignalMeta,
    pub start_timestamp: f64,
}

/// Serializable description of one derived channel.
///
/// Inputs and output are referenced by identity key, not by the volatile
/// numeric signal id, so the definition survives re-registration in a new
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedDefSerde {
    pub op: MathOp,
    pub a: SignalKey,
    pub b: SignalKey,
    pub output: SignalKey,
    pub output_meta: SignalMeta,
}

/// Serializable snapshot of a session's signal and derived-channel layout.
///
/// Sample data is deliberately not part of the snapshot; only identities and
/// wiring persist across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStateSerde {
    pub signals: Vec<SignalStateSerde>,
    pub derived: Vec<DerivedDefSerde>,
}

/// Serialize session state to a JSON string.
pub fn state_to_json(state: &SessionStateSerde) -> Result<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Deserialize session state from a JSON string.
pub fn state_from_json(json: &str) -> Result<SessionStateSerde> {
    Ok(serde_json::from_str(json)?)
}

/// Save session state to a JSON file.
pub fn save_state_to_path(state: &SessionStateSerde, path: &Path) -> Result<()> {
    let json = state_to_json(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load session state from a JSON file.
pub fn load_state_from_path(path: &Path) -> Result<SessionStateSerde> {
    let json = std::fs::read_to_string(path)?;
    state_from_json(&json)
}
