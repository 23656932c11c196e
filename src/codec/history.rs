// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hourly power history layout.
//!
//! A four-byte header (hour, day, month, year since 2000) stamps the most
//! recent sample; it is followed by `(hours_ago, ratio)` pairs.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::error::{DecodeError, EncodeError};

use super::CharacteristicId;

/// Header length in bytes.
pub const HEADER_LEN: usize = 4;

/// One hourly sample of the heating on/off ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSample {
    /// Hours before the header stamp.
    pub hours_ago: u8,
    /// Share of the hour the relay was on.
    pub ratio: u8,
}

/// Heating on/off ratios for the recent hours.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PowerHistory {
    stamp: NaiveDateTime,
    samples: Vec<PowerSample>,
}

impl PowerHistory {
    /// Creates a history. Minutes and seconds of `stamp` are dropped.
    #[must_use]
    pub fn new(stamp: NaiveDateTime, samples: Vec<PowerSample>) -> Self {
        let stamp = stamp
            .date()
            .and_hms_opt(stamp.hour(), 0, 0)
            .unwrap_or(stamp);
        Self { stamp, samples }
    }

    /// Returns the hour the most recent sample belongs to.
    #[must_use]
    pub const fn stamp(&self) -> NaiveDateTime {
        self.stamp
    }

    /// Returns the raw samples.
    #[must_use]
    pub fn samples(&self) -> &[PowerSample] {
        &self.samples
    }

    /// Iterates over `(timestamp, ratio)` pairs.
    pub fn timestamped(&self) -> impl Iterator<Item = (NaiveDateTime, u8)> + '_ {
        self.samples.iter().map(|s| {
            (
                self.stamp - TimeDelta::hours(i64::from(s.hours_ago)),
                s.ratio,
            )
        })
    }
}

impl Serialize for PowerHistory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry {
            timestamp: NaiveDateTime,
            ratio: u8,
        }
        serializer.collect_seq(
            self.timestamped()
                .map(|(timestamp, ratio)| Entry { timestamp, ratio }),
        )
    }
}

pub(super) fn decode(bytes: &[u8]) -> Result<PowerHistory, DecodeError> {
    let spec = CharacteristicId::PowerHistory.spec();
    let Some((&[hour, day, month, year], body)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(DecodeError::LengthMismatch {
            characteristic: spec.id,
            expected: spec.length,
            actual: bytes.len(),
        });
    };

    let out_of_range = |field, value: u8, min, max| DecodeError::OutOfRange {
        field,
        value: i32::from(value),
        min,
        max,
    };
    if hour > 23 {
        return Err(out_of_range("hour", hour, 0, 23));
    }
    if !(1..=12).contains(&month) {
        return Err(out_of_range("month", month, 1, 12));
    }
    let date = NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .ok_or_else(|| out_of_range("day", day, 1, 31))?;
    let stamp = date
        .and_hms_opt(u32::from(hour), 0, 0)
        .ok_or_else(|| out_of_range("hour", hour, 0, 23))?;

    let samples = body
        .chunks_exact(2)
        .map(|pair| PowerSample {
            hours_ago: pair[0],
            ratio: pair[1],
        })
        .collect();
    Ok(PowerHistory { stamp, samples })
}

pub(super) fn encode(history: &PowerHistory) -> Result<Vec<u8>, EncodeError> {
    let year = history.stamp.year();
    let year = year
        .checked_sub(2000)
        .and_then(|y| u8::try_from(y).ok())
        .ok_or(EncodeError::OutOfRange {
            field: "year",
            value: year,
            min: 2000,
            max: 2255,
        })?;

    // Safe: chrono keeps hour, day and month within u8
    #[allow(clippy::cast_possible_truncation)]
    let header = [
        history.stamp.hour() as u8,
        history.stamp.day() as u8,
        history.stamp.month() as u8,
        year,
    ];

    let mut out = Vec::with_capacity(HEADER_LEN + history.samples.len() * 2);
    out.extend_from_slice(&header);
    for sample in &history.samples {
        out.push(sample.hours_ago);
        out.push(sample.ratio);
    }
    Ok(out)
}
