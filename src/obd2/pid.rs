//! Static formula registry for standard (mode 0x01) and enhanced (mode 0x22) PIDs.
//!
//! Formulas follow SAE J1979. Enhanced identifiers 0xF400 - 0xF4FF are the ISO 27145 mapping of
//! the mode 0x01 PIDs onto data identifiers and reuse their formulas.

use std::fmt;

use strum_macros::Display;

use crate::bitfield::get_bit_field;
use crate::obd2::Error;
use crate::uds::{DataIdentifier, ServiceIdentifier};

const CURRENT_DATA: u8 = ServiceIdentifier::ShowCurrentData as u8;
const READ_DATA_BY_IDENTIFIER: u8 = ServiceIdentifier::ReadDataByIdentifier as u8;

/// First data identifier of the ISO 27145 block mirroring mode 0x01.
const OBD_DID_BASE: u16 = 0xf400;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    #[strum(to_string = "%")]
    Percent,
    #[strum(to_string = "°C")]
    Celsius,
    #[strum(to_string = "kPa")]
    Kilopascal,
    #[strum(to_string = "rpm")]
    Rpm,
    #[strum(to_string = "km/h")]
    KilometersPerHour,
    #[strum(to_string = "°")]
    Degrees,
    #[strum(to_string = "g/s")]
    GramsPerSecond,
    #[strum(to_string = "s")]
    Seconds,
    #[strum(to_string = "km")]
    Kilometers,
    #[strum(to_string = "V")]
    Volts,
    #[strum(to_string = "L/h")]
    LitersPerHour,
    #[strum(to_string = "min")]
    Minutes,
}

/// A decoded PID value.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PhysicalValue {
    /// Scaled measurement
    Numeric { value: f32, unit: Unit },
    /// Bit field where each bit carries its own meaning, e.g. supported PIDs
    Bitmask(u32),
    Flag(bool),
    /// Enumerated value, meaning is defined per PID
    Raw(u32),
}

impl fmt::Display for PhysicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalValue::Numeric { value, unit } => write!(f, "{:.2} {}", value, unit),
            PhysicalValue::Bitmask(bits) => write!(f, "0x{:08x}", bits),
            PhysicalValue::Flag(flag) => write!(f, "{}", flag),
            PhysicalValue::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// How the payload of a PID turns into a [`PhysicalValue`]. The payload is read as a big-endian unsigned integer first.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Formula {
    /// `raw * scale + offset`
    Linear { scale: f32, offset: f32, unit: Unit },
    Bitmask,
    /// Bit `n` of the raw value, counted from the least significant bit
    Flag(u8),
    Raw,
}

/// One registry entry, keyed by mode and PID.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PidEntry {
    pub mode: u8,
    pub pid: u16,
    pub name: &'static str,
    /// Expected payload size in bytes
    pub width: usize,
    pub formula: Formula,
}

impl PidEntry {
    /// Apply the formula to a payload of exactly `width` bytes.
    pub fn apply(&self, payload: &[u8]) -> Result<PhysicalValue, Error> {
        let mismatch = Error::PayloadLengthMismatch {
            expected: self.width,
            received: payload.len(),
        };
        if payload.len() != self.width {
            return Err(mismatch);
        }

        let raw = get_bit_field(payload, 0, self.width * 8).map_err(|_| mismatch)? as u32;

        Ok(match self.formula {
            Formula::Linear { scale, offset, unit } => PhysicalValue::Numeric {
                value: raw as f32 * scale + offset,
                unit,
            },
            Formula::Bitmask => PhysicalValue::Bitmask(raw),
            Formula::Flag(bit) => PhysicalValue::Flag((raw >> bit) & 1 == 1),
            Formula::Raw => PhysicalValue::Raw(raw),
        })
    }
}

const fn linear(
    pid: u16,
    name: &'static str,
    width: usize,
    scale: f32,
    offset: f32,
    unit: Unit,
) -> PidEntry {
    PidEntry {
        mode: CURRENT_DATA,
        pid,
        name,
        width,
        formula: Formula::Linear { scale, offset, unit },
    }
}

const fn current(pid: u16, name: &'static str, width: usize, formula: Formula) -> PidEntry {
    PidEntry {
        mode: CURRENT_DATA,
        pid,
        name,
        width,
        formula,
    }
}

const fn enhanced(
    did: DataIdentifier,
    name: &'static str,
    width: usize,
    formula: Formula,
) -> PidEntry {
    PidEntry {
        mode: READ_DATA_BY_IDENTIFIER,
        pid: did as u16,
        name,
        width,
        formula,
    }
}

static REGISTRY: &[PidEntry] = &[
    current(0x00, "Supported PIDs 01-20", 4, Formula::Bitmask),
    current(0x01, "Monitor status since DTCs cleared", 4, Formula::Bitmask),
    current(0x03, "Fuel system status", 2, Formula::Raw),
    linear(0x04, "Calculated engine load", 1, 100.0 / 255.0, 0.0, Unit::Percent),
    linear(0x05, "Engine coolant temperature", 1, 1.0, -40.0, Unit::Celsius),
    linear(0x06, "Short term fuel trim, bank 1", 1, 100.0 / 128.0, -100.0, Unit::Percent),
    linear(0x07, "Long term fuel trim, bank 1", 1, 100.0 / 128.0, -100.0, Unit::Percent),
    linear(0x08, "Short term fuel trim, bank 2", 1, 100.0 / 128.0, -100.0, Unit::Percent),
    linear(0x09, "Long term fuel trim, bank 2", 1, 100.0 / 128.0, -100.0, Unit::Percent),
    linear(0x0a, "Fuel pressure", 1, 3.0, 0.0, Unit::Kilopascal),
    linear(0x0b, "Intake manifold absolute pressure", 1, 1.0, 0.0, Unit::Kilopascal),
    linear(0x0c, "Engine speed", 2, 0.25, 0.0, Unit::Rpm),
    linear(0x0d, "Vehicle speed", 1, 1.0, 0.0, Unit::KilometersPerHour),
    linear(0x0e, "Timing advance", 1, 0.5, -64.0, Unit::Degrees),
    linear(0x0f, "Intake air temperature", 1, 1.0, -40.0, Unit::Celsius),
    linear(0x10, "Mass air flow rate", 2, 0.01, 0.0, Unit::GramsPerSecond),
    linear(0x11, "Throttle position", 1, 100.0 / 255.0, 0.0, Unit::Percent),
    current(0x1c, "OBD standards this vehicle conforms to", 1, Formula::Raw),
    current(0x1e, "Power take off active", 1, Formula::Flag(0)),
    linear(0x1f, "Run time since engine start", 2, 1.0, 0.0, Unit::Seconds),
    current(0x20, "Supported PIDs 21-40", 4, Formula::Bitmask),
    linear(0x21, "Distance traveled with MIL on", 2, 1.0, 0.0, Unit::Kilometers),
    linear(0x2f, "Fuel tank level input", 1, 100.0 / 255.0, 0.0, Unit::Percent),
    linear(0x31, "Distance traveled since codes cleared", 2, 1.0, 0.0, Unit::Kilometers),
    linear(0x33, "Absolute barometric pressure", 1, 1.0, 0.0, Unit::Kilopascal),
    current(0x40, "Supported PIDs 41-60", 4, Formula::Bitmask),
    linear(0x42, "Control module voltage", 2, 0.001, 0.0, Unit::Volts),
    linear(0x46, "Ambient air temperature", 1, 1.0, -40.0, Unit::Celsius),
    linear(0x4d, "Time run with MIL on", 2, 1.0, 0.0, Unit::Minutes),
    current(0x51, "Fuel type", 1, Formula::Raw),
    linear(0x5c, "Engine oil temperature", 1, 1.0, -40.0, Unit::Celsius),
    linear(0x5e, "Engine fuel rate", 2, 0.05, 0.0, Unit::LitersPerHour),
    current(0x60, "Supported PIDs 61-80", 4, Formula::Bitmask),
    current(0x80, "Supported PIDs 81-A0", 4, Formula::Bitmask),
    current(0xa0, "Supported PIDs A1-C0", 4, Formula::Bitmask),
    current(0xc0, "Supported PIDs C1-E0", 4, Formula::Bitmask),
    enhanced(DataIdentifier::ActiveDiagnosticSession, "Active diagnostic session", 1, Formula::Raw),
];

/// Find the entry for `pid` in `mode`. Mode 0x22 identifiers in the ISO 27145 block fall back to the mode 0x01 entry.
pub fn lookup(mode: u8, pid: u16) -> Option<&'static PidEntry> {
    let entry = REGISTRY.iter().find(|entry| entry.mode == mode && entry.pid == pid);
    if entry.is_some() || mode != READ_DATA_BY_IDENTIFIER {
        return entry;
    }

    match pid.checked_sub(OBD_DID_BASE) {
        Some(offset) if offset <= 0xff => lookup(CURRENT_DATA, offset),
        _ => None,
    }
}

/// All entries, in registry order.
pub fn entries() -> impl Iterator<Item = &'static PidEntry> {
    REGISTRY.iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(mode: u8, pid: u16, payload: &[u8]) -> (f32, Unit) {
        match lookup(mode, pid).unwrap().apply(payload).unwrap() {
            PhysicalValue::Numeric { value, unit } => (value, unit),
            v => panic!("Expected numeric value, got {:?}", v),
        }
    }

    #[test]
    fn engine_speed() {
        assert_eq!(numeric(0x01, 0x0c, &[0x1a, 0xf8]), (1726.0, Unit::Rpm));
    }

    #[test]
    fn signed_offset_temperature() {
        assert_eq!(numeric(0x01, 0x05, &[0x00]), (-40.0, Unit::Celsius));
        assert_eq!(numeric(0x01, 0x05, &[0x7b]), (83.0, Unit::Celsius));
    }

    #[test]
    fn fuel_trim() {
        assert_eq!(numeric(0x01, 0x06, &[0x80]).0, 0.0);
        assert_eq!(numeric(0x01, 0x06, &[0x00]).0, -100.0);
    }

    #[test]
    fn bitmask_and_flag() {
        let supported = lookup(0x01, 0x00).unwrap().apply(&[0xbe, 0x1f, 0xa8, 0x13]);
        assert_eq!(supported, Ok(PhysicalValue::Bitmask(0xbe1fa813)));

        let pto = lookup(0x01, 0x1e).unwrap();
        assert_eq!(pto.apply(&[0x01]), Ok(PhysicalValue::Flag(true)));
        assert_eq!(pto.apply(&[0xfe]), Ok(PhysicalValue::Flag(false)));
    }

    #[test]
    fn enhanced_lookup() {
        assert_eq!(numeric(0x22, 0xf40c, &[0x1a, 0xf8]), (1726.0, Unit::Rpm));
        assert_eq!(
            lookup(0x22, DataIdentifier::ActiveDiagnosticSession as u16)
                .unwrap()
                .apply(&[0x03]),
            Ok(PhysicalValue::Raw(0x03))
        );
        assert!(lookup(0x22, 0xf190).is_none());
        assert!(lookup(0x22, 0x000c).is_none());
    }

    #[test]
    fn wrong_width() {
        let coolant = lookup(0x01, 0x05).unwrap();
        assert_eq!(
            coolant.apply(&[]),
            Err(Error::PayloadLengthMismatch {
                expected: 1,
                received: 0
            })
        );
        assert_eq!(
            lookup(0x01, 0x0c).unwrap().apply(&[0x1a]),
            Err(Error::PayloadLengthMismatch {
                expected: 2,
                received: 1
            })
        );
    }

    #[test]
    fn unknown_pid() {
        assert!(lookup(0x01, 0xff).is_none());
        assert!(lookup(0x02, 0x0c).is_none());
    }

    #[test]
    fn registry_is_consistent() {
        for entry in entries() {
            assert!(entry.width >= 1 && entry.width <= 4, "{}", entry.name);
            assert_eq!(lookup(entry.mode, entry.pid), Some(entry));
        }
    }

    #[test]
    fn unit_display() {
        assert_eq!(Unit::Celsius.to_string(), "°C");
        assert_eq!(Unit::KilometersPerHour.to_string(), "km/h");

        let value = lookup(0x01, 0x0c).unwrap().apply(&[0x1a, 0xf9]).unwrap();
        assert_eq!(value.to_string(), "1726.25 rpm");
        assert_eq!(PhysicalValue::Bitmask(0x80000000).to_string(), "0x80000000");
    }
}
