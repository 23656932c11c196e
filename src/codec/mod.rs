// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Characteristic codec.
//!
//! Pure conversions between raw characteristic bytes and typed values. The
//! codec performs no I/O and never suspends; lengths, UUIDs and access rules
//! come from the [`CHARACTERISTICS`] table.
//!
//! # Examples
//!
//! ```
//! use ensto_lib::codec::{self, CharacteristicId, CharacteristicValue};
//! use ensto_lib::types::Temperature;
//!
//! let value = CharacteristicValue::Temperature(Temperature::from_celsius(21.5).unwrap());
//! let bytes = codec::encode(&value).unwrap();
//! assert_eq!(bytes, [0xD7, 0x00]);
//! assert_eq!(codec::decode(CharacteristicId::TargetTemperature, &bytes).unwrap(), value);
//! ```

mod characteristic;
mod history;
mod monitoring;
mod realtime;
mod schedule;
pub mod segmented;
mod settings;

pub use characteristic::{CHARACTERISTICS, CharacteristicId, CharacteristicSpec, LengthRule};
pub use history::{PowerHistory, PowerSample};
pub use monitoring::{MonitoringData, RatioSample, TemperatureSample};
pub use realtime::{ActiveMode, RealTimeIndication};
pub use schedule::{RecordError, Schedule};
pub use settings::{
    CalendarDay, CalendarProgram, DaylightSaving, SensorType, TemperatureLimits, VacationSettings,
};

use chrono::NaiveDateTime;

use crate::error::{DecodeError, EncodeError};
use crate::types::{BoostOffset, BoostSettings, Mode, RawStatus, ScheduleEntry, Temperature};

// ============================================================================
// Values
// ============================================================================

/// A decoded characteristic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacteristicValue {
    /// Target temperature setpoint.
    Temperature(Temperature),
    /// Operating mode.
    Mode(Mode),
    /// One weekly schedule slot.
    ScheduleEntry(ScheduleEntry),
    /// Status bitfield, or the raw code of an unknown enumeration.
    RawStatus(RawStatus),
    /// The full weekly schedule.
    Schedule(Schedule),
    /// Boost override settings.
    Boost(BoostSettings),
    /// Live readings.
    RealTime(RealTimeIndication),
    /// Hourly heating ratios.
    PowerHistory(PowerHistory),
    /// Daily and monthly ratios with hourly temperatures.
    Monitoring(MonitoringData),
    /// Weekly calendar enabled.
    CalendarMode(bool),
    /// Programs of the selected calendar day.
    CalendarDay(CalendarDay),
    /// Vacation settings.
    Vacation(VacationSettings),
    /// Floor area in square metres.
    FloorArea(u16),
    /// Heating power in watts.
    HeatingPower(u16),
    /// Floor sensor type.
    SensorType(SensorType),
    /// Adaptive control enabled.
    AdaptiveControl(bool),
    /// Installer setpoint limits.
    TemperatureLimits(TemperatureLimits),
    /// Device clock, local time.
    DateTime(NaiveDateTime),
    /// Daylight-saving rules.
    DaylightSaving(DaylightSaving),
}

impl CharacteristicValue {
    /// Returns the characteristic this value is written to or read from.
    #[must_use]
    pub const fn characteristic(&self) -> CharacteristicId {
        match self {
            Self::Temperature(_) => CharacteristicId::TargetTemperature,
            Self::Mode(_) => CharacteristicId::Mode,
            Self::ScheduleEntry(_) => CharacteristicId::ScheduleEntry,
            Self::RawStatus(_) => CharacteristicId::Status,
            Self::Schedule(_) => CharacteristicId::Schedule,
            Self::Boost(_) => CharacteristicId::Boost,
            Self::RealTime(_) => CharacteristicId::RealTimeIndication,
            Self::PowerHistory(_) => CharacteristicId::PowerHistory,
            Self::Monitoring(_) => CharacteristicId::Monitoring,
            Self::CalendarMode(_) => CharacteristicId::CalendarMode,
            Self::CalendarDay(_) => CharacteristicId::CalendarDay,
            Self::Vacation(_) => CharacteristicId::Vacation,
            Self::FloorArea(_) => CharacteristicId::FloorArea,
            Self::HeatingPower(_) => CharacteristicId::HeatingPower,
            Self::SensorType(_) => CharacteristicId::SensorType,
            Self::AdaptiveControl(_) => CharacteristicId::AdaptiveControl,
            Self::TemperatureLimits(_) => CharacteristicId::TemperatureLimits,
            Self::DateTime(_) => CharacteristicId::DateTime,
            Self::DaylightSaving(_) => CharacteristicId::DaylightSaving,
        }
    }
}

impl From<Temperature> for CharacteristicValue {
    fn from(value: Temperature) -> Self {
        Self::Temperature(value)
    }
}

impl From<Mode> for CharacteristicValue {
    fn from(value: Mode) -> Self {
        Self::Mode(value)
    }
}

impl From<ScheduleEntry> for CharacteristicValue {
    fn from(value: ScheduleEntry) -> Self {
        Self::ScheduleEntry(value)
    }
}

impl From<BoostSettings> for CharacteristicValue {
    fn from(value: BoostSettings) -> Self {
        Self::Boost(value)
    }
}

// ============================================================================
// Encode / decode
// ============================================================================

/// Encodes a value into the bytes of its characteristic.
///
/// # Errors
///
/// Returns `EncodeError::OutOfRange` if a field is outside the range the
/// device accepts. Values are never clamped.
pub fn encode(value: &CharacteristicValue) -> Result<Vec<u8>, EncodeError> {
    use CharacteristicValue as V;

    match value {
        V::Temperature(t) => Ok(encode_setpoint(*t)?.tenths().to_le_bytes().to_vec()),
        V::Mode(mode) => Ok(vec![mode.code()]),
        V::ScheduleEntry(entry) => Ok(schedule::encode_record(entry)?.to_vec()),
        V::RawStatus(status) => Ok(status.bits().to_le_bytes().to_vec()),
        V::Schedule(s) => schedule::encode_schedule(s),
        V::Boost(boost) => encode_boost(boost),
        V::RealTime(rt) => realtime::encode(rt),
        V::PowerHistory(history) => history::encode(history),
        V::Monitoring(data) => monitoring::encode(data),
        V::CalendarMode(on) | V::AdaptiveControl(on) => Ok(vec![u8::from(*on)]),
        V::CalendarDay(day) => Ok(settings::encode_calendar(day)),
        V::Vacation(vacation) => settings::encode_vacation(vacation),
        V::FloorArea(n) | V::HeatingPower(n) => Ok(n.to_le_bytes().to_vec()),
        V::SensorType(sensor) => Ok(vec![sensor.code()]),
        V::TemperatureLimits(limits) => Ok(settings::encode_limits(*limits)),
        V::DateTime(clock) => settings::encode_clock(*clock),
        V::DaylightSaving(dst) => Ok(settings::encode_daylight_saving(dst)),
    }
}

/// Decodes the bytes read from a characteristic.
///
/// # Errors
///
/// - `DecodeError::LengthMismatch` if the byte count breaks the length rule
/// - `DecodeError::OutOfRange` if a field is outside its documented range
/// - `DecodeError::UnknownVariant` for an unrecognized mode or sensor code;
///   the raw code is available through [`DecodeError::fallback`]
/// - `DecodeError::Unsupported` for the authentication characteristic
pub fn decode(id: CharacteristicId, bytes: &[u8]) -> Result<CharacteristicValue, DecodeError> {
    let spec = id.spec();
    if !spec.length.accepts(bytes.len()) {
        return Err(DecodeError::LengthMismatch {
            characteristic: id,
            expected: spec.length,
            actual: bytes.len(),
        });
    }

    use CharacteristicId as C;
    use CharacteristicValue as V;

    match id {
        C::Authentication => Err(DecodeError::Unsupported(id)),
        C::TargetTemperature => {
            let tenths = i16::from_le_bytes(fixed(bytes));
            Ok(V::Temperature(decode_setpoint(tenths)?))
        }
        C::Mode => {
            let [code] = fixed(bytes);
            Mode::from_code(code)
                .map(V::Mode)
                .ok_or(DecodeError::UnknownVariant {
                    characteristic: id,
                    raw: code,
                    fallback: RawStatus::from(code),
                })
        }
        C::Status => Ok(V::RawStatus(RawStatus::from_bits(u16::from_le_bytes(
            fixed(bytes),
        )))),
        C::ScheduleEntry => schedule::decode_record(fixed(bytes)).map(V::ScheduleEntry),
        C::Schedule => schedule::decode_schedule(bytes).map(V::Schedule),
        C::Boost => decode_boost(fixed(bytes)).map(V::Boost),
        C::RealTimeIndication => realtime::decode(&fixed(bytes)).map(V::RealTime),
        C::PowerHistory => history::decode(bytes).map(V::PowerHistory),
        C::Monitoring => monitoring::decode(bytes).map(V::Monitoring),
        C::CalendarMode => Ok(V::CalendarMode(bytes[0] != 0)),
        C::CalendarDay => settings::decode_calendar(bytes).map(V::CalendarDay),
        C::Vacation => settings::decode_vacation(fixed(bytes)).map(V::Vacation),
        C::FloorArea => Ok(V::FloorArea(u16::from_le_bytes(fixed(bytes)))),
        C::HeatingPower => Ok(V::HeatingPower(u16::from_le_bytes(fixed(bytes)))),
        C::SensorType => settings::decode_sensor(bytes[0]).map(V::SensorType),
        C::AdaptiveControl => Ok(V::AdaptiveControl(bytes[0] != 0)),
        C::TemperatureLimits => Ok(V::TemperatureLimits(settings::decode_limits(fixed(bytes)))),
        C::DateTime => settings::decode_clock(bytes).map(V::DateTime),
        C::DaylightSaving => settings::decode_daylight_saving(bytes).map(V::DaylightSaving),
    }
}

/// Decodes a status read, as used to confirm writes.
///
/// # Errors
///
/// Returns `DecodeError::LengthMismatch` unless exactly two bytes are given.
pub fn decode_status(bytes: &[u8]) -> Result<RawStatus, DecodeError> {
    match decode(CharacteristicId::Status, bytes)? {
        CharacteristicValue::RawStatus(status) => Ok(status),
        _ => Err(DecodeError::Unsupported(CharacteristicId::Status)),
    }
}

/// Outcome of the reset-code exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAck {
    /// The device accepted the reset code.
    Accepted,
    /// The device answered with a refusal code.
    Refused(u8),
    /// The device answered with no bytes.
    Missing,
}

/// Interprets the acknowledgement read back from the authentication characteristic.
///
/// The first byte is the result code; `0x00` means accepted.
#[must_use]
pub fn decode_auth_ack(bytes: &[u8]) -> AuthAck {
    match bytes.first() {
        Some(0x00) => AuthAck::Accepted,
        Some(&code) => AuthAck::Refused(code),
        None => AuthAck::Missing,
    }
}

// ============================================================================
// Field helpers
// ============================================================================

/// Copies the leading bytes of a slice already checked against its length
/// rule, zero-padding if it is short.
fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = N.min(bytes.len());
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

pub(crate) fn decode_setpoint(tenths: i16) -> Result<Temperature, DecodeError> {
    let t = Temperature::from_tenths(tenths);
    if t.is_valid_setpoint() {
        Ok(t)
    } else {
        Err(DecodeError::OutOfRange {
            field: "target_temperature",
            value: i32::from(tenths),
            min: i32::from(Temperature::SETPOINT_MIN.tenths()),
            max: i32::from(Temperature::SETPOINT_MAX.tenths()),
        })
    }
}

pub(crate) fn encode_setpoint(t: Temperature) -> Result<Temperature, EncodeError> {
    if t.is_valid_setpoint() {
        Ok(t)
    } else {
        Err(EncodeError::OutOfRange {
            field: "target_temperature",
            value: i32::from(t.tenths()),
            min: i32::from(Temperature::SETPOINT_MIN.tenths()),
            max: i32::from(Temperature::SETPOINT_MAX.tenths()),
        })
    }
}

fn boost_offset_in_range(offset: BoostOffset) -> bool {
    (BoostOffset::MIN..=BoostOffset::MAX).contains(&offset)
}

fn decode_boost(b: [u8; 8]) -> Result<BoostSettings, DecodeError> {
    let offset = BoostOffset::from_hundredths(i16::from_le_bytes([b[1], b[2]]));
    if !boost_offset_in_range(offset) {
        return Err(DecodeError::OutOfRange {
            field: "boost_offset",
            value: i32::from(offset.hundredths()),
            min: i32::from(BoostOffset::MIN.hundredths()),
            max: i32::from(BoostOffset::MAX.hundredths()),
        });
    }
    BoostSettings::new(
        b[0] != 0,
        offset,
        b[3],
        u16::from_le_bytes([b[4], b[5]]),
        u16::from_le_bytes([b[6], b[7]]),
    )
    .map_err(|_| DecodeError::OutOfRange {
        field: "boost_percent",
        value: i32::from(b[3]),
        min: 0,
        max: i32::from(BoostSettings::MAX_PERCENT),
    })
}

fn encode_boost(boost: &BoostSettings) -> Result<Vec<u8>, EncodeError> {
    let offset = boost.offset();
    if !boost_offset_in_range(offset) {
        return Err(EncodeError::OutOfRange {
            field: "boost_offset",
            value: i32::from(offset.hundredths()),
            min: i32::from(BoostOffset::MIN.hundredths()),
            max: i32::from(BoostOffset::MAX.hundredths()),
        });
    }
    let mut out = Vec::with_capacity(8);
    out.push(u8::from(boost.enabled()));
    out.extend_from_slice(&offset.hundredths().to_le_bytes());
    out.push(boost.offset_percent());
    out.extend_from_slice(&boost.setpoint_minutes().to_le_bytes());
    out.extend_from_slice(&boost.remaining_minutes().to_le_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;
    use crate::types::TimeOfDay;

    #[test]
    fn twenty_one_and_a_half_degrees() {
        let value = CharacteristicValue::Temperature(Temperature::from_celsius(21.5).unwrap());
        assert_eq!(encode(&value).unwrap(), vec![0xD7, 0x00]);
        assert_eq!(
            decode(CharacteristicId::TargetTemperature, &[0xD7, 0x00]).unwrap(),
            value
        );
    }

    #[test]
    fn round_trip_every_valid_setpoint() {
        for tenths in 50..=350 {
            let value = CharacteristicValue::Temperature(Temperature::from_tenths(tenths));
            let bytes = encode(&value).unwrap();
            assert_eq!(
                decode(CharacteristicId::TargetTemperature, &bytes).unwrap(),
                value
            );
        }
    }

    #[test]
    fn round_trip_other_values() {
        let entry = ScheduleEntry::new(
            Weekday::Fri,
            TimeOfDay::new(17, 15).unwrap(),
            TimeOfDay::END_OF_DAY,
            Temperature::from_tenths(225),
        )
        .unwrap();
        let boost =
            BoostSettings::new(true, BoostOffset::from_hundredths(-150), 20, 90, 45).unwrap();
        let values = [
            CharacteristicValue::Mode(Mode::Schedule),
            CharacteristicValue::ScheduleEntry(entry),
            CharacteristicValue::RawStatus(RawStatus::from_bits(0x0086)),
            CharacteristicValue::Schedule(Schedule::new(vec![entry, entry])),
            CharacteristicValue::Boost(boost),
        ];
        for value in values {
            let bytes = encode(&value).unwrap();
            assert_eq!(decode(value.characteristic(), &bytes).unwrap(), value);
        }
    }

    #[test]
    fn setpoint_is_never_clamped() {
        assert_eq!(
            encode(&CharacteristicValue::Temperature(Temperature::from_tenths(351))),
            Err(EncodeError::OutOfRange {
                field: "target_temperature",
                value: 351,
                min: 50,
                max: 350,
            })
        );
        assert!(matches!(
            decode(CharacteristicId::TargetTemperature, &49i16.to_le_bytes()),
            Err(DecodeError::OutOfRange { value: 49, .. })
        ));
    }

    #[test]
    fn encoding_is_monotonic() {
        let mut previous = i16::MIN;
        for tenths in 50..=350i16 {
            let bytes = encode(&Temperature::from_tenths(tenths).into()).unwrap();
            let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
            assert!(raw > previous);
            previous = raw;
        }
    }

    #[test]
    fn wrong_lengths_never_panic() {
        for id in CharacteristicId::ALL {
            for len in 0..32 {
                let bytes = vec![0xA5; len];
                if !id.spec().length.accepts(len) {
                    assert!(matches!(
                        decode(id, &bytes),
                        Err(DecodeError::LengthMismatch { actual, .. }) if actual == len
                    ));
                } else {
                    // Either outcome is fine, it just must not panic
                    let _ = decode(id, &bytes);
                }
            }
        }
    }

    #[test]
    fn unknown_mode_falls_back_to_raw_status() {
        let err = decode(CharacteristicId::Mode, &[0x7F]).unwrap_err();
        assert_eq!(
            err.fallback(),
            Some(CharacteristicValue::RawStatus(RawStatus::from_bits(0x7F)))
        );
    }

    #[test]
    fn schedule_with_bad_middle_record() {
        let bytes = [
            3, //
            1, 6, 0, 8, 0, 0xD2, 0x00, //
            9, 6, 0, 8, 0, 0xD2, 0x00, //
            3, 17, 0, 22, 30, 0xDC, 0x00,
        ];
        let CharacteristicValue::Schedule(schedule) =
            decode(CharacteristicId::Schedule, &bytes).unwrap()
        else {
            panic!("expected a schedule");
        };
        assert_eq!(schedule.len(), 3);

        let days: Vec<_> = schedule.entries().map(ScheduleEntry::day).collect();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed]);

        let failed: Vec<_> = schedule.errors().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, 1);
        assert!(matches!(
            failed[0].error,
            DecodeError::UnknownVariant { raw: 9, .. }
        ));
    }

    #[test]
    fn boost_layout() {
        let boost = BoostSettings::enable(BoostOffset::from_hundredths(250), 120);
        assert_eq!(
            encode(&boost.into()).unwrap(),
            vec![1, 0xFA, 0x00, 0, 120, 0, 0, 0]
        );
    }

    #[test]
    fn boost_offset_is_bounded() {
        let boost = BoostSettings::enable(BoostOffset::from_hundredths(2001), 10);
        assert!(matches!(
            encode(&boost.into()),
            Err(EncodeError::OutOfRange {
                field: "boost_offset",
                ..
            })
        ));
        assert!(matches!(
            decode(CharacteristicId::Boost, &[1, 0, 0, 101, 0, 0, 0, 0]),
            Err(DecodeError::OutOfRange {
                field: "boost_percent",
                ..
            })
        ));
    }

    #[test]
    fn installation_settings() {
        assert_eq!(
            decode(CharacteristicId::FloorArea, &[12, 0]).unwrap(),
            CharacteristicValue::FloorArea(12)
        );
        assert_eq!(
            decode(CharacteristicId::HeatingPower, &[0xDC, 0x05, 0xFF]).unwrap(),
            CharacteristicValue::HeatingPower(1500)
        );
        assert_eq!(
            decode(CharacteristicId::AdaptiveControl, &[2]).unwrap(),
            CharacteristicValue::AdaptiveControl(true)
        );
        assert_eq!(
            decode(CharacteristicId::SensorType, &[2]).unwrap(),
            CharacteristicValue::SensorType(SensorType::Ntc10k)
        );
        let err = decode(CharacteristicId::SensorType, &[0]).unwrap_err();
        assert_eq!(
            err.fallback(),
            Some(CharacteristicValue::RawStatus(RawStatus::from_bits(0)))
        );
    }

    #[test]
    fn read_only_values_encode_to_their_layout() {
        let clock = decode(CharacteristicId::DateTime, &[0xE9, 0x07, 1, 31, 23, 59, 58]).unwrap();
        let values = [
            clock,
            CharacteristicValue::CalendarMode(false),
            CharacteristicValue::FloorArea(40),
            CharacteristicValue::SensorType(SensorType::Ntc33k),
            decode(CharacteristicId::TemperatureLimits, &[0xF4, 0x01, 0xAC, 0x0D]).unwrap(),
            decode(CharacteristicId::DaylightSaving, &[7, 0x3C, 0x00]).unwrap(),
        ];
        for value in values {
            let bytes = encode(&value).unwrap();
            assert_eq!(decode(value.characteristic(), &bytes).unwrap(), value);
        }
    }

    #[test]
    fn calendar_day_needs_whole_programs() {
        assert!(matches!(
            decode(CharacteristicId::CalendarDay, &[1, 0, 6, 0, 8, 0]),
            Err(DecodeError::LengthMismatch { actual: 6, .. })
        ));
        assert_eq!(
            decode(CharacteristicId::CalendarDay, &[1, 0]).unwrap(),
            CharacteristicValue::CalendarDay(CalendarDay {
                day: 1,
                flags: 0,
                programs: Vec::new(),
            })
        );
    }

    #[test]
    fn authentication_has_no_value() {
        assert_eq!(
            decode(CharacteristicId::Authentication, &[0]),
            Err(DecodeError::Unsupported(CharacteristicId::Authentication))
        );
    }

    #[test]
    fn auth_ack_codes() {
        assert_eq!(decode_auth_ack(&[0x00]), AuthAck::Accepted);
        assert_eq!(decode_auth_ack(&[0x00, 0x12]), AuthAck::Accepted);
        assert_eq!(decode_auth_ack(&[0xFF]), AuthAck::Refused(0xFF));
        assert_eq!(decode_auth_ack(&[]), AuthAck::Missing);
    }
}
