// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Installation settings, calendar, vacation and clock layouts.
//!
//! Temperatures in this module are `i16` hundredths of a degree, little
//! endian. Dates carry the year as an offset from 2000 unless noted.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::error::{DecodeError, EncodeError};
use crate::types::{RawStatus, TimeOfDay};

use super::CharacteristicId;

/// Length of a vacation record.
pub const VACATION_LEN: usize = 15;

/// Bytes before the first calendar program.
pub const CALENDAR_HEADER_LEN: usize = 2;

/// Length of one calendar program.
pub const PROGRAM_LEN: usize = 8;

fn out_of_range(field: &'static str, value: i32, min: i32, max: i32) -> DecodeError {
    DecodeError::OutOfRange {
        field,
        value,
        min,
        max,
    }
}

fn hundredths_to_celsius(hundredths: i16) -> f32 {
    f32::from(hundredths) / 100.0
}

// ============================================================================
// Sensor type
// ============================================================================

/// NTC floor sensor fitted to the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    /// 6.8 kΩ.
    Ntc6k8,
    /// 10 kΩ.
    Ntc10k,
    /// 12 kΩ.
    Ntc12k,
    /// 15 kΩ.
    Ntc15k,
    /// 20 kΩ.
    Ntc20k,
    /// 33 kΩ.
    Ntc33k,
    /// 47 kΩ.
    Ntc47k,
}

impl SensorType {
    /// Returns the wire code (1 to 7).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ntc6k8 => 1,
            Self::Ntc10k => 2,
            Self::Ntc12k => 3,
            Self::Ntc15k => 4,
            Self::Ntc20k => 5,
            Self::Ntc33k => 6,
            Self::Ntc47k => 7,
        }
    }

    /// Looks up a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Ntc6k8),
            2 => Some(Self::Ntc10k),
            3 => Some(Self::Ntc12k),
            4 => Some(Self::Ntc15k),
            5 => Some(Self::Ntc20k),
            6 => Some(Self::Ntc33k),
            7 => Some(Self::Ntc47k),
            _ => None,
        }
    }

    /// Returns the label shown by the vendor app, e.g. `10kOhm`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ntc6k8 => "6,8kOhm",
            Self::Ntc10k => "10kOhm",
            Self::Ntc12k => "12kOhm",
            Self::Ntc15k => "15kOhm",
            Self::Ntc20k => "20kOhm",
            Self::Ntc33k => "33kOhm",
            Self::Ntc47k => "47kOhm",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(super) fn decode_sensor(code: u8) -> Result<SensorType, DecodeError> {
    SensorType::from_code(code).ok_or(DecodeError::UnknownVariant {
        characteristic: CharacteristicId::SensorType,
        raw: code,
        fallback: RawStatus::from(code),
    })
}

// ============================================================================
// Temperature limits
// ============================================================================

/// Lowest and highest setpoint allowed by the installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemperatureLimits {
    /// Lower limit in hundredths of a degree.
    pub low: i16,
    /// Upper limit in hundredths of a degree.
    pub high: i16,
}

impl TemperatureLimits {
    /// Lower limit in degrees Celsius.
    #[must_use]
    pub fn low_celsius(&self) -> f32 {
        hundredths_to_celsius(self.low)
    }

    /// Upper limit in degrees Celsius.
    #[must_use]
    pub fn high_celsius(&self) -> f32 {
        hundredths_to_celsius(self.high)
    }
}

impl Serialize for TemperatureLimits {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Limits {
            low: f32,
            high: f32,
        }
        Limits {
            low: self.low_celsius(),
            high: self.high_celsius(),
        }
        .serialize(serializer)
    }
}

pub(super) fn decode_limits(b: [u8; 4]) -> TemperatureLimits {
    TemperatureLimits {
        low: i16::from_le_bytes([b[0], b[1]]),
        high: i16::from_le_bytes([b[2], b[3]]),
    }
}

pub(super) fn encode_limits(limits: TemperatureLimits) -> Vec<u8> {
    let mut out = limits.low.to_le_bytes().to_vec();
    out.extend_from_slice(&limits.high.to_le_bytes());
    out
}

// ============================================================================
// Calendar
// ============================================================================

/// One heating program of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarProgram {
    /// Start of the program.
    pub from: TimeOfDay,
    /// End of the program.
    pub to: TimeOfDay,
    /// Temperature offset in hundredths of a degree.
    pub offset: i16,
    /// Power offset, 0 to 255 for 0 to 100 %.
    pub offset_scale: u8,
    /// The program is active.
    pub enabled: bool,
}

impl CalendarProgram {
    /// Temperature offset in degrees Celsius.
    #[must_use]
    pub fn offset_celsius(&self) -> f32 {
        hundredths_to_celsius(self.offset)
    }

    /// Power offset in percent, rounded to two decimals.
    #[must_use]
    pub fn offset_percent(&self) -> f32 {
        let percent = f32::from(self.offset_scale) * 100.0 / 255.0;
        (percent * 100.0).round() / 100.0
    }
}

impl Serialize for CalendarProgram {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Program {
            from: String,
            to: String,
            offset_temperature: f32,
            offset_percent: f32,
            enabled: bool,
        }
        Program {
            from: self.from.to_string(),
            to: self.to.to_string(),
            offset_temperature: self.offset_celsius(),
            offset_percent: self.offset_percent(),
            enabled: self.enabled,
        }
        .serialize(serializer)
    }
}

/// The programs of the calendar day currently selected on the device.
///
/// Serializes as the list of its programs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarDay {
    /// Day code from the header.
    pub day: u8,
    /// Second header byte, passed through unchanged.
    pub flags: u8,
    /// Programs in device order.
    pub programs: Vec<CalendarProgram>,
}

impl Serialize for CalendarDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.programs.serialize(serializer)
    }
}

pub(super) fn decode_calendar(bytes: &[u8]) -> Result<CalendarDay, DecodeError> {
    let Some((&[day, flags], body)) = bytes.split_first_chunk::<CALENDAR_HEADER_LEN>() else {
        let spec = CharacteristicId::CalendarDay.spec();
        return Err(DecodeError::LengthMismatch {
            characteristic: spec.id,
            expected: spec.length,
            actual: bytes.len(),
        });
    };

    let time = |hour: u8, minute: u8| {
        TimeOfDay::new(hour, minute).map_err(|_| {
            out_of_range(
                "program_time",
                i32::from(hour) * 100 + i32::from(minute),
                0,
                2400,
            )
        })
    };
    let programs = body
        .chunks_exact(PROGRAM_LEN)
        .map(|p| -> Result<_, DecodeError> {
            Ok(CalendarProgram {
                from: time(p[0], p[1])?,
                to: time(p[2], p[3])?,
                offset: i16::from_le_bytes([p[4], p[5]]),
                offset_scale: p[6],
                enabled: p[7] != 0,
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(CalendarDay {
        day,
        flags,
        programs,
    })
}

pub(super) fn encode_calendar(day: &CalendarDay) -> Vec<u8> {
    let mut out = Vec::with_capacity(CALENDAR_HEADER_LEN + day.programs.len() * PROGRAM_LEN);
    out.extend_from_slice(&[day.day, day.flags]);
    for p in &day.programs {
        out.extend_from_slice(&[p.from.hour(), p.from.minute(), p.to.hour(), p.to.minute()]);
        out.extend_from_slice(&p.offset.to_le_bytes());
        out.push(p.offset_scale);
        out.push(u8::from(p.enabled));
    }
    out
}

// ============================================================================
// Vacation
// ============================================================================

/// Vacation period with its temperature offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VacationSettings {
    /// Start of the vacation, minute resolution.
    pub from: NaiveDateTime,
    /// End of the vacation, minute resolution.
    pub to: NaiveDateTime,
    /// Temperature offset in hundredths of a degree.
    pub offset: i16,
    /// Power offset byte, passed through unchanged.
    pub offset_scale: u8,
    /// Vacation mode is armed.
    pub enabled: bool,
    /// Mode code reported by the device while on vacation.
    pub current_mode: u8,
}

impl VacationSettings {
    /// Temperature offset in degrees Celsius.
    #[must_use]
    pub fn offset_celsius(&self) -> f32 {
        hundredths_to_celsius(self.offset)
    }
}

impl Serialize for VacationSettings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Vacation {
            date_from: NaiveDateTime,
            date_to: NaiveDateTime,
            offset_temperature: f32,
            enabled: bool,
            current_mode: u8,
        }
        Vacation {
            date_from: self.from,
            date_to: self.to,
            offset_temperature: self.offset_celsius(),
            enabled: self.enabled,
            current_mode: self.current_mode,
        }
        .serialize(serializer)
    }
}

/// Decodes year-since-2000, month, day, hour and minute.
fn short_stamp(b: [u8; 5]) -> Result<NaiveDateTime, DecodeError> {
    let [year, month, day, hour, minute] = b;
    if !(1..=12).contains(&month) {
        return Err(out_of_range("month", i32::from(month), 1, 12));
    }
    let date = NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .ok_or_else(|| out_of_range("day", i32::from(day), 1, 31))?;
    if hour > 23 {
        return Err(out_of_range("hour", i32::from(hour), 0, 23));
    }
    date.and_hms_opt(u32::from(hour), u32::from(minute), 0)
        .ok_or_else(|| out_of_range("minute", i32::from(minute), 0, 59))
}

fn year_since_2000(year: i32) -> Result<u8, EncodeError> {
    year.checked_sub(2000)
        .and_then(|y| u8::try_from(y).ok())
        .ok_or(EncodeError::OutOfRange {
            field: "year",
            value: year,
            min: 2000,
            max: 2255,
        })
}

// Safe: chrono keeps month, day, hour and minute within u8
#[allow(clippy::cast_possible_truncation)]
fn encode_short_stamp(stamp: NaiveDateTime) -> Result<[u8; 5], EncodeError> {
    Ok([
        year_since_2000(stamp.year())?,
        stamp.month() as u8,
        stamp.day() as u8,
        stamp.hour() as u8,
        stamp.minute() as u8,
    ])
}

pub(super) fn decode_vacation(b: [u8; VACATION_LEN]) -> Result<VacationSettings, DecodeError> {
    Ok(VacationSettings {
        from: short_stamp([b[0], b[1], b[2], b[3], b[4]])?,
        to: short_stamp([b[5], b[6], b[7], b[8], b[9]])?,
        offset: i16::from_le_bytes([b[10], b[11]]),
        offset_scale: b[12],
        enabled: b[13] != 0,
        current_mode: b[14],
    })
}

pub(super) fn encode_vacation(v: &VacationSettings) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(VACATION_LEN);
    out.extend_from_slice(&encode_short_stamp(v.from)?);
    out.extend_from_slice(&encode_short_stamp(v.to)?);
    out.extend_from_slice(&v.offset.to_le_bytes());
    out.push(v.offset_scale);
    out.push(u8::from(v.enabled));
    out.push(v.current_mode);
    Ok(out)
}

// ============================================================================
// Clock
// ============================================================================

/// Decodes the device clock: `u16` year, month, day, hour, minute and,
/// when present, second.
pub(super) fn decode_clock(b: &[u8]) -> Result<NaiveDateTime, DecodeError> {
    let field = |i: usize| b.get(i).copied().unwrap_or(0);
    let year = i32::from(u16::from_le_bytes([field(0), field(1)]));
    let (month, day, hour, minute, second) = (field(2), field(3), field(4), field(5), field(6));
    if !(1..=12).contains(&month) {
        return Err(out_of_range("month", i32::from(month), 1, 12));
    }
    let date = NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
        .ok_or_else(|| out_of_range("day", i32::from(day), 1, 31))?;
    if hour > 23 {
        return Err(out_of_range("hour", i32::from(hour), 0, 23));
    }
    if minute > 59 {
        return Err(out_of_range("minute", i32::from(minute), 0, 59));
    }
    date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        .ok_or_else(|| out_of_range("second", i32::from(second), 0, 59))
}

// Safe: chrono keeps every component within its byte
#[allow(clippy::cast_possible_truncation)]
pub(super) fn encode_clock(clock: NaiveDateTime) -> Result<Vec<u8>, EncodeError> {
    let year = u16::try_from(clock.year()).map_err(|_| EncodeError::OutOfRange {
        field: "year",
        value: clock.year(),
        min: 0,
        max: i32::from(u16::MAX),
    })?;
    let mut out = year.to_le_bytes().to_vec();
    out.extend_from_slice(&[
        clock.month() as u8,
        clock.day() as u8,
        clock.hour() as u8,
        clock.minute() as u8,
        clock.second() as u8,
    ]);
    Ok(out)
}

/// Daylight-saving configuration.
///
/// Only the trailing UTC offset is interpreted; the bytes before it are kept
/// as read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DaylightSaving {
    /// Uninterpreted leading bytes.
    pub rules: Vec<u8>,
    /// Offset of local time from UTC, in minutes.
    pub utc_offset_minutes: i16,
}

impl DaylightSaving {
    /// Returns the offset as a chrono time zone, if it is a valid one.
    #[must_use]
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(i32::from(self.utc_offset_minutes) * 60)
    }

    /// Attaches the offset to a device clock reading.
    #[must_use]
    pub fn localize(&self, clock: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        clock.and_local_timezone(self.offset()?).single()
    }
}

pub(super) fn decode_daylight_saving(bytes: &[u8]) -> Result<DaylightSaving, DecodeError> {
    let Some((rules, &[lo, hi])) = bytes.split_last_chunk::<2>() else {
        let spec = CharacteristicId::DaylightSaving.spec();
        return Err(DecodeError::LengthMismatch {
            characteristic: spec.id,
            expected: spec.length,
            actual: bytes.len(),
        });
    };
    Ok(DaylightSaving {
        rules: rules.to_vec(),
        utc_offset_minutes: i16::from_le_bytes([lo, hi]),
    })
}

pub(super) fn encode_daylight_saving(dst: &DaylightSaving) -> Vec<u8> {
    let mut out = dst.rules.clone();
    out.extend_from_slice(&dst.utc_offset_minutes.to_le_bytes());
    out
}
