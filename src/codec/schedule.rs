// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Schedule record layout.
//!
//! A record is seven bytes: day code, start hour, start minute, end hour,
//! end minute and the target temperature as a little-endian `i16` of 0.1 °C.
//! The full schedule prefixes the records with a one-byte record count.

use serde::Serialize;

use crate::error::{DecodeError, EncodeError};
use crate::types::{RawStatus, ScheduleEntry, TimeOfDay, day_code, weekday_from_code};

use super::CharacteristicId;

/// Length of one schedule record in bytes.
pub const RECORD_LEN: usize = 7;

/// A schedule record that could not be decoded.
///
/// The raw bytes are kept so the schedule re-encodes unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// Position of the record in the schedule, starting at 0.
    pub index: usize,
    /// The undecodable record bytes.
    pub raw: [u8; RECORD_LEN],
    /// Why the record was rejected.
    pub error: DecodeError,
}

/// A decoded weekly schedule.
///
/// Each record decodes independently: one bad record does not hide the
/// others.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    records: Vec<Result<ScheduleEntry, RecordError>>,
}

impl Schedule {
    /// Creates a schedule from valid entries.
    #[must_use]
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self {
            records: entries.into_iter().map(Ok).collect(),
        }
    }

    /// Returns every record, decoded or not.
    #[must_use]
    pub fn records(&self) -> &[Result<ScheduleEntry, RecordError>] {
        &self.records
    }

    /// Iterates over the records that decoded.
    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.records.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Iterates over the records that failed to decode.
    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.records.iter().filter_map(|r| r.as_ref().err())
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the schedule has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for Schedule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries())
    }
}

pub(super) fn decode_record(bytes: [u8; RECORD_LEN]) -> Result<ScheduleEntry, DecodeError> {
    let [day, start_h, start_m, end_h, end_m, t_lo, t_hi] = bytes;

    let day = weekday_from_code(day).ok_or(DecodeError::UnknownVariant {
        characteristic: CharacteristicId::ScheduleEntry,
        raw: day,
        fallback: RawStatus::from(day),
    })?;
    let start = decode_time("start", start_h, start_m)?;
    let end = decode_time("end", end_h, end_m)?;
    let target = super::decode_setpoint(i16::from_le_bytes([t_lo, t_hi]))?;

    // The only constructor failure left is an empty or reversed slot
    ScheduleEntry::new(day, start, end, target).map_err(|_| DecodeError::OutOfRange {
        field: "end",
        value: i32::from(end.minutes_since_midnight()),
        min: i32::from(start.minutes_since_midnight()) + 1,
        max: i32::from(TimeOfDay::END_OF_DAY.minutes_since_midnight()),
    })
}

fn decode_time(field: &'static str, hour: u8, minute: u8) -> Result<TimeOfDay, DecodeError> {
    if hour > 24 {
        return Err(DecodeError::OutOfRange {
            field,
            value: i32::from(hour),
            min: 0,
            max: 24,
        });
    }
    TimeOfDay::new(hour, minute).map_err(|_| DecodeError::OutOfRange {
        field,
        value: i32::from(minute),
        min: 0,
        max: if hour == 24 { 0 } else { 59 },
    })
}

pub(super) fn encode_record(entry: &ScheduleEntry) -> Result<[u8; RECORD_LEN], EncodeError> {
    let target = super::encode_setpoint(entry.target())?;
    let [t_lo, t_hi] = target.tenths().to_le_bytes();
    Ok([
        day_code(entry.day()),
        entry.start().hour(),
        entry.start().minute(),
        entry.end().hour(),
        entry.end().minute(),
        t_lo,
        t_hi,
    ])
}

pub(super) fn decode_schedule(bytes: &[u8]) -> Result<Schedule, DecodeError> {
    let length_mismatch = || DecodeError::LengthMismatch {
        characteristic: CharacteristicId::Schedule,
        expected: CharacteristicId::Schedule.spec().length,
        actual: bytes.len(),
    };

    let (&count, body) = bytes.split_first().ok_or_else(length_mismatch)?;
    if body.len() != usize::from(count) * RECORD_LEN {
        return Err(length_mismatch());
    }

    let records = body
        .chunks_exact(RECORD_LEN)
        .enumerate()
        .map(|(index, chunk)| {
            let mut raw = [0u8; RECORD_LEN];
            raw.copy_from_slice(chunk);
            decode_record(raw).map_err(|error| RecordError { index, raw, error })
        })
        .collect();
    Ok(Schedule { records })
}

pub(super) fn encode_schedule(schedule: &Schedule) -> Result<Vec<u8>, EncodeError> {
    let count = u8::try_from(schedule.len()).map_err(|_| EncodeError::OutOfRange {
        field: "schedule_records",
        value: i32::try_from(schedule.len()).unwrap_or(i32::MAX),
        min: 0,
        max: i32::from(u8::MAX),
    })?;

    let mut out = Vec::with_capacity(1 + schedule.len() * RECORD_LEN);
    out.push(count);
    for record in &schedule.records {
        match record {
            Ok(entry) => out.extend_from_slice(&encode_record(entry)?),
            Err(failed) => out.extend_from_slice(&failed.raw),
        }
    }
    Ok(out)
}
