// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boost override settings.

use std::fmt;

use serde::Serialize;

use crate::error::ValueError;

/// Temperature offset applied during boost, in hundredths of a degree.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::BoostOffset;
///
/// let offset = BoostOffset::from_celsius(2.5).unwrap();
/// assert_eq!(offset.hundredths(), 250);
/// assert_eq!(offset.to_string(), "+2.50°C");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "f32")]
pub struct BoostOffset(i16);

impl BoostOffset {
    /// Largest downward offset the thermostat accepts (-20.00 °C).
    pub const MIN: Self = Self(-2000);

    /// Largest upward offset the thermostat accepts (+20.00 °C).
    pub const MAX: Self = Self(2000);

    /// Creates an offset from hundredths of a degree.
    #[must_use]
    pub const fn from_hundredths(hundredths: i16) -> Self {
        Self(hundredths)
    }

    /// Creates an offset from degrees Celsius, rounded to 0.01 °C.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotFinite` for NaN or infinity, and
    /// `ValueError::OutOfRange` if the value does not fit the wire format.
    pub fn from_celsius(celsius: f32) -> Result<Self, ValueError> {
        if !celsius.is_finite() {
            return Err(ValueError::NotFinite);
        }
        let hundredths = (f64::from(celsius) * 100.0).round();
        if hundredths < f64::from(i16::MIN) || hundredths > f64::from(i16::MAX) {
            return Err(ValueError::OutOfRange {
                min: i32::from(i16::MIN),
                max: i32::from(i16::MAX),
                #[allow(clippy::cast_possible_truncation)]
                actual: hundredths.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
            });
        }
        // Safe: range checked above
        #[allow(clippy::cast_possible_truncation)]
        let hundredths = hundredths as i16;
        Ok(Self(hundredths))
    }

    /// Returns the offset in hundredths of a degree.
    #[must_use]
    pub const fn hundredths(&self) -> i16 {
        self.0
    }

    /// Returns the offset in degrees Celsius.
    #[must_use]
    pub fn celsius(&self) -> f32 {
        f32::from(self.0) / 100.0
    }
}

impl fmt::Display for BoostOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "+" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}°C", abs / 100, abs % 100)
    }
}

impl From<BoostOffset> for f32 {
    fn from(value: BoostOffset) -> Self {
        value.celsius()
    }
}

/// Boost override configuration.
///
/// Field layout mirrors the boost characteristic: an enable flag, an offset
/// either in degrees or as a percentage, the configured duration and the time
/// remaining on a running boost.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::{BoostOffset, BoostSettings};
///
/// let boost = BoostSettings::enable(BoostOffset::from_celsius(2.0).unwrap(), 60);
/// assert!(boost.enabled());
/// assert_eq!(boost.setpoint_minutes(), 60);
/// assert_eq!(boost.remaining_minutes(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoostSettings {
    enabled: bool,
    offset: BoostOffset,
    offset_percent: u8,
    setpoint_minutes: u16,
    remaining_minutes: u16,
}

impl BoostSettings {
    /// Maximum offset percentage.
    pub const MAX_PERCENT: u8 = 100;

    /// Creates boost settings from all fields.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `offset_percent` exceeds 100.
    pub fn new(
        enabled: bool,
        offset: BoostOffset,
        offset_percent: u8,
        setpoint_minutes: u16,
        remaining_minutes: u16,
    ) -> Result<Self, ValueError> {
        if offset_percent > Self::MAX_PERCENT {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: i32::from(Self::MAX_PERCENT),
                actual: i32::from(offset_percent),
            });
        }
        Ok(Self {
            enabled,
            offset,
            offset_percent,
            setpoint_minutes,
            remaining_minutes,
        })
    }

    /// Settings that start a boost with a degree offset for a duration.
    #[must_use]
    pub const fn enable(offset: BoostOffset, setpoint_minutes: u16) -> Self {
        Self {
            enabled: true,
            offset,
            offset_percent: 0,
            setpoint_minutes,
            remaining_minutes: 0,
        }
    }

    /// Settings that stop a running boost.
    #[must_use]
    pub const fn disable() -> Self {
        Self {
            enabled: false,
            offset: BoostOffset::from_hundredths(0),
            offset_percent: 0,
            setpoint_minutes: 0,
            remaining_minutes: 0,
        }
    }

    /// Returns true if boost is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the temperature offset.
    #[must_use]
    pub const fn offset(&self) -> BoostOffset {
        self.offset
    }

    /// Returns the offset percentage (0-100).
    #[must_use]
    pub const fn offset_percent(&self) -> u8 {
        self.offset_percent
    }

    /// Returns the configured boost duration in minutes.
    #[must_use]
    pub const fn setpoint_minutes(&self) -> u16 {
        self.setpoint_minutes
    }

    /// Returns the minutes left on a running boost.
    #[must_use]
    pub const fn remaining_minutes(&self) -> u16 {
        self.remaining_minutes
    }
}
