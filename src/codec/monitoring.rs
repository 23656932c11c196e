// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monitoring data layout.
//!
//! Read as a segmented transfer. After reassembly:
//!
//! | Offset  | Content |
//! |---------|---------|
//! | `0..3`   | wall-clock date: day, month, year since 2000 |
//! | `3..19`  | 8 daily `(days_ago, ratio)` pairs |
//! | `19..21` | month, year since 2000 closing the monthly block |
//! | `21..47` | 13 monthly `(months_ago, ratio)` pairs |
//! | `47..51` | hour, day, month, year since 2000 of the newest hourly record |
//! | `51..`   | `(hours_ago, floor, room)` records, temperatures as `i16` tenths |

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::Serialize;
use serde::ser::SerializeMap;

use crate::error::{DecodeError, EncodeError};
use crate::types::Temperature;

use super::CharacteristicId;

/// Daily ratio pairs in the first block.
pub const DAYS: usize = 8;

/// Monthly ratio pairs in the second block.
pub const MONTHS: usize = 13;

/// Bytes before the first hourly record.
pub const FIXED_LEN: usize = 3 + DAYS * 2 + 2 + MONTHS * 2 + 4;

/// Length of one hourly temperature record.
pub const RECORD_LEN: usize = 5;

/// Heating on/off ratio of one day or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RatioSample {
    /// Days or months before the block's stamp.
    pub ago: u8,
    /// Share of the period the relay was on.
    pub ratio: u8,
}

/// Floor and room temperature of one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemperatureSample {
    /// Hours before the block's stamp.
    pub hours_ago: u8,
    /// Floor sensor reading.
    pub floor: Temperature,
    /// Room sensor reading.
    pub room: Temperature,
}

/// Long-term statistics kept by the thermostat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitoringData {
    wall_clock: NaiveDate,
    daily: [RatioSample; DAYS],
    month_end: NaiveDate,
    monthly: [RatioSample; MONTHS],
    hourly_stamp: NaiveDateTime,
    temperatures: Vec<TemperatureSample>,
}

impl MonitoringData {
    /// Creates monitoring data.
    ///
    /// `month_end` is moved to the last day of its month; minutes and seconds
    /// of `hourly_stamp` are dropped.
    #[must_use]
    pub fn new(
        wall_clock: NaiveDate,
        daily: [RatioSample; DAYS],
        month_end: NaiveDate,
        monthly: [RatioSample; MONTHS],
        hourly_stamp: NaiveDateTime,
        temperatures: Vec<TemperatureSample>,
    ) -> Self {
        let month_end =
            last_day_of_month(month_end.year(), month_end.month()).unwrap_or(month_end);
        let hourly_stamp = hourly_stamp
            .date()
            .and_hms_opt(hourly_stamp.hour(), 0, 0)
            .unwrap_or(hourly_stamp);
        Self {
            wall_clock,
            daily,
            month_end,
            monthly,
            hourly_stamp,
            temperatures,
        }
    }

    /// Date the daily block counts back from.
    #[must_use]
    pub const fn wall_clock(&self) -> NaiveDate {
        self.wall_clock
    }

    /// Last day of the month the monthly block counts back from.
    #[must_use]
    pub const fn month_end(&self) -> NaiveDate {
        self.month_end
    }

    /// Hour the newest temperature record belongs to.
    #[must_use]
    pub const fn hourly_stamp(&self) -> NaiveDateTime {
        self.hourly_stamp
    }

    /// Raw daily pairs.
    #[must_use]
    pub fn daily(&self) -> &[RatioSample] {
        &self.daily
    }

    /// Raw monthly pairs.
    #[must_use]
    pub fn monthly(&self) -> &[RatioSample] {
        &self.monthly
    }

    /// Raw hourly temperature records.
    #[must_use]
    pub fn temperatures(&self) -> &[TemperatureSample] {
        &self.temperatures
    }

    /// Daily ratios with their dates.
    pub fn daily_ratios(&self) -> impl Iterator<Item = (NaiveDate, u8)> + '_ {
        self.daily.iter().filter_map(|s| {
            let date = self
                .wall_clock
                .checked_sub_signed(TimeDelta::days(i64::from(s.ago)))?;
            Some((date, s.ratio))
        })
    }

    /// Monthly ratios, each dated on the last day of its month.
    pub fn monthly_ratios(&self) -> impl Iterator<Item = (NaiveDate, u8)> + '_ {
        self.monthly.iter().filter_map(|s| {
            let date = self
                .month_end
                .checked_sub_months(Months::new(u32::from(s.ago)))?;
            let date = last_day_of_month(date.year(), date.month())?;
            Some((date, s.ratio))
        })
    }

    /// Hourly temperatures with their timestamps.
    pub fn hourly_temperatures(
        &self,
    ) -> impl Iterator<Item = (NaiveDateTime, TemperatureSample)> + '_ {
        self.temperatures.iter().map(|s| {
            let hours = TimeDelta::hours(i64::from(s.hours_ago));
            (self.hourly_stamp - hours, *s)
        })
    }
}

impl Serialize for MonitoringData {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Ratio {
            timestamp: NaiveDateTime,
            ratio: u8,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Hourly {
            timestamp: NaiveDateTime,
            floor_temperature: f32,
            room_temperature: f32,
        }

        let daily: Vec<_> = self
            .daily_ratios()
            .map(|(date, ratio)| Ratio {
                timestamp: date.and_time(NaiveTime::MIN),
                ratio,
            })
            .collect();
        let monthly: Vec<_> = self
            .monthly_ratios()
            .map(|(date, ratio)| Ratio {
                timestamp: date.and_time(NaiveTime::MIN),
                ratio,
            })
            .collect();
        let hourly: Vec<_> = self
            .hourly_temperatures()
            .map(|(timestamp, s)| Hourly {
                timestamp,
                floor_temperature: s.floor.celsius(),
                room_temperature: s.room.celsius(),
            })
            .collect();

        let mut map = serializer.serialize_map(Some(4))?;
        let wall_clock = self.wall_clock.and_time(NaiveTime::MIN);
        map.serialize_entry("wallClockStamp", &wall_clock)?;
        map.serialize_entry("onOffRatio7Days", &daily)?;
        map.serialize_entry("onOffRatio12Months", &monthly)?;
        map.serialize_entry("temperature24Hours7Days", &hourly)?;
        map.end()
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

fn out_of_range(field: &'static str, value: u8, min: i32, max: i32) -> DecodeError {
    DecodeError::OutOfRange {
        field,
        value: i32::from(value),
        min,
        max,
    }
}

fn date(day: u8, month: u8, year: u8) -> Result<NaiveDate, DecodeError> {
    if !(1..=12).contains(&month) {
        return Err(out_of_range("month", month, 1, 12));
    }
    NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .ok_or_else(|| out_of_range("day", day, 1, 31))
}

fn pairs<const N: usize>(bytes: &[u8]) -> [RatioSample; N] {
    let mut out = [RatioSample::default(); N];
    for (sample, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *sample = RatioSample {
            ago: pair[0],
            ratio: pair[1],
        };
    }
    out
}

pub(super) fn decode(bytes: &[u8]) -> Result<MonitoringData, DecodeError> {
    let Some((fixed, records)) = bytes.split_first_chunk::<FIXED_LEN>() else {
        let spec = CharacteristicId::Monitoring.spec();
        return Err(DecodeError::LengthMismatch {
            characteristic: spec.id,
            expected: spec.length,
            actual: bytes.len(),
        });
    };
    let wall_clock = date(fixed[0], fixed[1], fixed[2])?;
    let daily = pairs::<DAYS>(&fixed[3..19]);

    let (block_month, block_year) = (fixed[19], fixed[20]);
    if !(1..=12).contains(&block_month) {
        return Err(out_of_range("month", block_month, 1, 12));
    }
    let month_end = last_day_of_month(2000 + i32::from(block_year), u32::from(block_month))
        .ok_or_else(|| out_of_range("month", block_month, 1, 12))?;
    let monthly = pairs::<MONTHS>(&fixed[21..47]);

    let (hour, day, month, year) = (fixed[47], fixed[48], fixed[49], fixed[50]);
    if hour > 23 {
        return Err(out_of_range("hour", hour, 0, 23));
    }
    let hourly_stamp = date(day, month, year)?
        .and_hms_opt(u32::from(hour), 0, 0)
        .ok_or_else(|| out_of_range("hour", hour, 0, 23))?;

    let temperatures = records
        .chunks_exact(RECORD_LEN)
        .map(|r| TemperatureSample {
            hours_ago: r[0],
            floor: Temperature::from_tenths(i16::from_le_bytes([r[1], r[2]])),
            room: Temperature::from_tenths(i16::from_le_bytes([r[3], r[4]])),
        })
        .collect();

    Ok(MonitoringData {
        wall_clock,
        daily,
        month_end,
        monthly,
        hourly_stamp,
        temperatures,
    })
}

fn year_byte(year: i32) -> Result<u8, EncodeError> {
    year.checked_sub(2000)
        .and_then(|y| u8::try_from(y).ok())
        .ok_or(EncodeError::OutOfRange {
            field: "year",
            value: year,
            min: 2000,
            max: 2255,
        })
}

// Safe: chrono keeps day, month and hour within u8
#[allow(clippy::cast_possible_truncation)]
pub(super) fn encode(data: &MonitoringData) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(FIXED_LEN + data.temperatures.len() * RECORD_LEN);

    let clock = data.wall_clock;
    out.extend_from_slice(&[clock.day() as u8, clock.month() as u8, year_byte(clock.year())?]);
    for s in &data.daily {
        out.extend_from_slice(&[s.ago, s.ratio]);
    }

    out.extend_from_slice(&[data.month_end.month() as u8, year_byte(data.month_end.year())?]);
    for s in &data.monthly {
        out.extend_from_slice(&[s.ago, s.ratio]);
    }

    let stamp = data.hourly_stamp;
    out.extend_from_slice(&[
        stamp.hour() as u8,
        stamp.day() as u8,
        stamp.month() as u8,
        year_byte(stamp.year())?,
    ]);
    for s in &data.temperatures {
        out.push(s.hours_ago);
        out.extend_from_slice(&s.floor.tenths().to_le_bytes());
        out.extend_from_slice(&s.room.tenths().to_le_bytes());
    }
    Ok(out)
}
