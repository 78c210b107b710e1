//! Measurement typing metadata: quantities, quantity flags and units.
//!
//! Every signal carries a `(quantity, flags, unit)` triple that is validated
//! once, when the [`SignalMeta`] is constructed. Everything downstream
//! (buffers, derived-channel engines, persistence keys) treats the triple as
//! already valid and never re-checks it.
//!
//! [`QuantityFlags`] is a bitflag set: a single signal can be e.g. both `AC`
//! and `RMS`. The flag bits are part of the persistence identity key, so they
//! must never be renumbered.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};

/// Physical quantity measured by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Voltage,
    Current,
    Power,
    Resistance,
    Energy,
    Charge,
    Frequency,
    Temperature,
    Time,
    Gain,
    PowerFactor,
}

/// Unit a signal's values are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Volt,
    Ampere,
    Watt,
    Ohm,
    WattHour,
    AmpereHour,
    Hertz,
    Celsius,
    Kelvin,
    Second,
    Decibel,
    Unitless,
}

impl Quantity {
    /// Units that are acceptable for this quantity.
    pub fn compatible_units(self) -> &'static [Unit] {
        use Quantity::*;
        match self {
            Voltage => &[Unit::Volt],
            Current => &[Unit::Ampere],
            Power => &[Unit::Watt],
            Resistance => &[Unit::Ohm],
            Energy => &[Unit::WattHour],
            Charge => &[Unit::AmpereHour],
            Frequency => &[Unit::Hertz],
            Temperature => &[Unit::Celsius, Unit::Kelvin],
            Time => &[Unit::Second],
            Gain => &[Unit::Decibel, Unit::Unitless],
            PowerFactor => &[Unit::Unitless],
        }
    }
}

impl Unit {
    /// Short symbol used in signal display names.
    pub fn symbol(self) -> &'static str {
        use Unit::*;
        match self {
            Volt => "V",
            Ampere => "A",
            Watt => "W",
            Ohm => "Ω",
            WattHour => "Wh",
            AmpereHour => "Ah",
            Hertz => "Hz",
            Celsius => "°C",
            Kelvin => "K",
            Second => "s",
            Decibel => "dB",
            Unitless => "",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// QuantityFlags – bitflags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitflag set qualifying a quantity (e.g. `AC | RMS`).
///
/// The raw bitmask is part of the serialized signal identity, so the bit
/// positions are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QuantityFlags(pub u64);

impl QuantityFlags {
    pub const AC: Self = Self(1 << 0);
    pub const DC: Self = Self(1 << 1);
    pub const RMS: Self = Self(1 << 2);
    pub const MIN: Self = Self(1 << 3);
    pub const MAX: Self = Self(1 << 4);
    pub const AVG: Self = Self(1 << 5);
    pub const RELATIVE: Self = Self(1 << 6);
    pub const DIODE: Self = Self(1 << 7);

    /// Empty flag set.
    pub const NONE: Self = Self(0);

    /// Combine two flag sets (bitwise OR).
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether `self` contains all bits in `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask, as stored in persistence keys.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl std::ops::BitOr for QuantityFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for QuantityFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for QuantityFlags {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::fmt::Display for QuantityFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let pairs: &[(QuantityFlags, &str)] = &[
            (QuantityFlags::AC, "AC"),
            (QuantityFlags::DC, "DC"),
            (QuantityFlags::RMS, "RMS"),
            (QuantityFlags::MIN, "MIN"),
            (QuantityFlags::MAX, "MAX"),
            (QuantityFlags::AVG, "AVG"),
            (QuantityFlags::RELATIVE, "REL"),
            (QuantityFlags::DIODE, "DIODE"),
        ];
        let mut names = Vec::new();
        let mut known: u64 = 0;
        for (flag, name) in pairs {
            known |= flag.0;
            if self.contains(*flag) {
                names.push((*name).to_string());
            }
        }
        let extra = self.0 & !known;
        if extra != 0 {
            names.push(format!("0x{:x}", extra));
        }
        write!(f, "{}", names.join(" "))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SignalMeta
// ─────────────────────────────────────────────────────────────────────────────

/// Validated `(quantity, flags, unit)` triple.
///
/// Construction is the single validation point: an incompatible quantity/unit
/// pairing aborts construction with [`SignalError::InvalidMetadata`]. Derived
/// channel engines are built from an already-constructed `SignalMeta` and
/// never re-validate.  Deserialization funnels through the same check, so a
/// hand-edited state file cannot inject an invalid pairing either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SignalMetaSerde")]
pub struct SignalMeta {
    quantity: Quantity,
    flags: QuantityFlags,
    unit: Unit,
}

/// Raw mirror of [`SignalMeta`] used as the deserialization gate.
#[derive(Deserialize)]
struct SignalMetaSerde {
    quantity: Quantity,
    flags: QuantityFlags,
    unit: Unit,
}

impl TryFrom<SignalMetaSerde> for SignalMeta {
    type Error = SignalError;

    fn try_from(raw: SignalMetaSerde) -> Result<Self> {
        SignalMeta::new(raw.quantity, raw.flags, raw.unit)
    }
}

impl SignalMeta {
    pub fn new(quantity: Quantity, flags: QuantityFlags, unit: Unit) -> Result<Self> {
        if !quantity.compatible_units().contains(&unit) {
            return Err(SignalError::InvalidMetadata(format!(
                "unit {:?} is not valid for quantity {:?}",
                unit, quantity
            )));
        }
        Ok(Self {
            quantity,
            flags,
            unit,
        })
    }

    #[inline]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    #[inline]
    pub fn flags(&self) -> QuantityFlags {
        self.flags
    }

    #[inline]
    pub fn unit(&self) -> Unit {
        self.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_accepts_compatible_unit() {
        let meta = SignalMeta::new(Quantity::Voltage, QuantityFlags::DC, Unit::Volt).unwrap();
        assert_eq!(meta.quantity(), Quantity::Voltage);
        assert_eq!(meta.unit(), Unit::Volt);
    }

    #[test]
    fn meta_rejects_incompatible_unit() {
        let err = SignalMeta::new(Quantity::Voltage, QuantityFlags::NONE, Unit::Ampere);
        assert!(matches!(err, Err(SignalError::InvalidMetadata(_))));
    }

    #[test]
    fn deserialization_rejects_incompatible_unit() {
        let meta = SignalMeta::new(Quantity::Voltage, QuantityFlags::DC, Unit::Volt).unwrap();
        let json = serde_json::to_string(&meta).unwrap();
        let round: SignalMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(round, meta);

        // A hand-edited pairing is refused by the same construction check.
        let bad = json.replace("\"unit\":\"Volt\"", "\"unit\":\"Ampere\"");
        assert_ne!(bad, json);
        assert!(serde_json::from_str::<SignalMeta>(&bad).is_err());
    }

    #[test]
    fn flags_union_and_contains() {
        let flags = QuantityFlags::AC | QuantityFlags::RMS;
        assert!(flags.contains(QuantityFlags::AC));
        assert!(flags.contains(QuantityFlags::RMS));
        assert!(!flags.contains(QuantityFlags::DC));
    }

    #[test]
    fn flags_display_joins_names() {
        let flags = QuantityFlags::AC | QuantityFlags::RMS;
        assert_eq!(format!("{flags}"), "AC RMS");
        assert_eq!(format!("{}", QuantityFlags::NONE), "");
        // Unknown bits still produce a hex representation.
        assert!(format!("{}", QuantityFlags(1 << 63)).starts_with("0x"));
    }

    #[test]
    fn flag_bits_do_not_overlap() {
        let all = [
            QuantityFlags::AC,
            QuantityFlags::DC,
            QuantityFlags::RMS,
            QuantityFlags::MIN,
            QuantityFlags::MAX,
            QuantityFlags::AVG,
            QuantityFlags::RELATIVE,
            QuantityFlags::DIODE,
        ];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_eq!(a.0 & b.0, 0, "flag bits {} and {} overlap", i, j);
                }
            }
        }
    }
}
