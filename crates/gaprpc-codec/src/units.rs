//! Conversion between real-world durations and controller time units.
//!
//! Rounding is half-up on encode and exact on decode, so a value survives
//! a round trip to within half a unit.

use std::time::Duration;

use crate::error::{CodecError, Result};

/// A controller time unit, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Advertising and scan intervals/windows.
    Us625,
    /// Connection intervals.
    Us1250,
    /// Supervision timeouts.
    Us10000,
}

impl Unit {
    pub const fn micros(self) -> u64 {
        match self {
            Unit::Us625 => 625,
            Unit::Us1250 => 1_250,
            Unit::Us10000 => 10_000,
        }
    }
}

/// Convert `value` to whole units, rejecting results outside `min..=max`.
pub fn to_units(value: Duration, unit: Unit, field: &'static str, min: u16, max: u16) -> Result<u16> {
    let unit_us = unit.micros() as u128;
    let units = (value.as_micros() + unit_us / 2) / unit_us;
    if units < min as u128 || units > max as u128 {
        return Err(CodecError::OutOfRange {
            field,
            value: units.min(u64::MAX as u128) as u64,
            min: min as u64,
            max: max as u64,
        });
    }
    Ok(units as u16)
}

/// Convert a unit count back to a duration.
pub fn from_units(units: u16, unit: Unit) -> Duration {
    Duration::from_micros(units as u64 * unit.micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any(value: Duration, unit: Unit) -> u16 {
        to_units(value, unit, "test", 0, u16::MAX).unwrap()
    }

    #[test]
    fn advertising_interval_in_625us_units() {
        assert_eq!(any(Duration::from_millis(100), Unit::Us625), 160);
        assert_eq!(from_units(160, Unit::Us625), Duration::from_millis(100));
    }

    #[test]
    fn connection_interval_in_1250us_units() {
        assert_eq!(any(Duration::from_millis(20), Unit::Us1250), 16);
        assert_eq!(any(Duration::from_micros(7_500), Unit::Us1250), 6);
        assert_eq!(from_units(6, Unit::Us1250), Duration::from_micros(7_500));
    }

    #[test]
    fn supervision_timeout_in_10ms_units() {
        assert_eq!(any(Duration::from_secs(4), Unit::Us10000), 400);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(any(Duration::from_micros(1_187), Unit::Us625), 2);
        assert_eq!(any(Duration::from_micros(1_562), Unit::Us625), 2);
        assert_eq!(any(Duration::from_micros(1_563), Unit::Us625), 3);
    }

    #[test]
    fn round_trip_within_half_unit() {
        for ms in [7u64, 11, 33, 101, 999, 4_000] {
            for unit in [Unit::Us625, Unit::Us1250, Unit::Us10000] {
                let value = Duration::from_millis(ms);
                let back = from_units(any(value, unit), unit);
                let diff = back.as_micros().abs_diff(value.as_micros());
                assert!(diff * 2 <= unit.micros() as u128, "{ms}ms {unit:?}");
            }
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = to_units(Duration::from_secs(60), Unit::Us625, "interval", 0x20, 0x4000).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { field: "interval", value: 96_000, .. }));

        let err = to_units(Duration::from_millis(1), Unit::Us625, "interval", 0x20, 0x4000).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { min: 0x20, .. }));
    }
}
