// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Real-time indication layout.

use serde::Serialize;

use crate::error::{DecodeError, EncodeError};
use crate::types::Temperature;

/// Length of the real-time indication in bytes.
pub const LEN: usize = 21;

/// Mode the thermostat reports as currently active.
///
/// Unrecognized codes are kept as [`ActiveMode::Unknown`] so that the
/// indication still decodes and re-encodes unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveMode {
    /// Manual setpoint.
    Manual,
    /// Weekly calendar.
    Calendar,
    /// Vacation setback.
    Vacation,
    /// A code outside the documented set.
    Unknown(u8),
}

impl ActiveMode {
    /// Maps a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Manual,
            2 => Self::Calendar,
            3 => Self::Vacation,
            other => Self::Unknown(other),
        }
    }

    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Manual => 1,
            Self::Calendar => 2,
            Self::Vacation => 3,
            Self::Unknown(code) => code,
        }
    }
}

/// Snapshot of the thermostat's live readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeIndication {
    /// Leading header byte, kept verbatim.
    #[serde(skip)]
    pub header: u8,
    /// Active target temperature.
    pub target: Temperature,
    /// Target expressed as a percentage of the dial.
    pub target_percent: u8,
    /// Room sensor reading.
    pub room: Temperature,
    /// Floor sensor reading.
    pub floor: Temperature,
    /// Heating relay is closed.
    pub relay_on: bool,
    /// Alarm code, zero when no alarm is raised.
    pub alarm: u32,
    /// Active operating mode.
    pub active_mode: ActiveMode,
    /// Heating mode as reported by the device.
    pub heating_mode: u8,
    /// Boost is running.
    pub boost_enabled: bool,
    /// Configured boost duration in minutes.
    pub boost_setpoint_minutes: u16,
    /// Minutes left on a running boost.
    pub boost_remaining_minutes: u16,
    /// Potentiometer position in percent.
    pub potentiometer: u8,
}

pub(super) fn decode(b: &[u8; LEN]) -> Result<RealTimeIndication, DecodeError> {
    let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
    let i16_at = |i: usize| i16::from_le_bytes([b[i], b[i + 1]]);

    let target = u16_at(1);
    let target = i16::try_from(target).map_err(|_| DecodeError::OutOfRange {
        field: "target",
        value: i32::from(target),
        min: 0,
        max: i32::from(i16::MAX),
    })?;

    Ok(RealTimeIndication {
        header: b[0],
        target: Temperature::from_tenths(target),
        target_percent: b[3],
        room: Temperature::from_tenths(i16_at(4)),
        floor: Temperature::from_tenths(i16_at(6)),
        relay_on: b[8] != 0,
        alarm: u32::from_le_bytes([b[9], b[10], b[11], b[12]]),
        active_mode: ActiveMode::from_code(b[13]),
        heating_mode: b[14],
        boost_enabled: b[15] != 0,
        boost_setpoint_minutes: u16_at(16),
        boost_remaining_minutes: u16_at(18),
        potentiometer: b[20],
    })
}

pub(super) fn encode(value: &RealTimeIndication) -> Result<Vec<u8>, EncodeError> {
    let target = u16::try_from(value.target.tenths()).map_err(|_| EncodeError::OutOfRange {
        field: "target",
        value: i32::from(value.target.tenths()),
        min: 0,
        max: i32::from(i16::MAX),
    })?;

    let mut out = Vec::with_capacity(LEN);
    out.push(value.header);
    out.extend_from_slice(&target.to_le_bytes());
    out.push(value.target_percent);
    out.extend_from_slice(&value.room.tenths().to_le_bytes());
    out.extend_from_slice(&value.floor.tenths().to_le_bytes());
    out.push(u8::from(value.relay_on));
    out.extend_from_slice(&value.alarm.to_le_bytes());
    out.push(value.active_mode.code());
    out.push(value.heating_mode);
    out.push(u8::from(value.boost_enabled));
    out.extend_from_slice(&value.boost_setpoint_minutes.to_le_bytes());
    out.extend_from_slice(&value.boost_remaining_minutes.to_le_bytes());
    out.push(value.potentiometer);
    Ok(out)
}
