// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temperature type with one decimal place of precision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A temperature in tenths of a degree Celsius.
///
/// The thermostat transmits temperatures as signed counts of 0.1 °C, so this
/// type stores exactly that count. It carries no device range of its own:
/// setpoints are checked against the characteristic's limits when encoded,
/// while sensor readings (room, floor) may legitimately fall outside them.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::Temperature;
///
/// let t = Temperature::from_celsius(21.5).unwrap();
/// assert_eq!(t.tenths(), 215);
/// assert_eq!(t.to_string(), "21.5°C");
///
/// // Values are rounded to one decimal place
/// let t = Temperature::from_celsius(19.96).unwrap();
/// assert_eq!(t.tenths(), 200);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "f32", into = "f32")]
pub struct Temperature(i16);

impl Temperature {
    /// Lowest setpoint the thermostat accepts (5.0 °C).
    pub const SETPOINT_MIN: Self = Self(50);

    /// Highest setpoint the thermostat accepts (35.0 °C).
    pub const SETPOINT_MAX: Self = Self(350);

    /// Creates a temperature from a count of tenths of a degree.
    #[must_use]
    pub const fn from_tenths(tenths: i16) -> Self {
        Self(tenths)
    }

    /// Creates a temperature from degrees Celsius, rounded to 0.1 °C.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotFinite` for NaN or infinity, and
    /// `ValueError::OutOfRange` if the value does not fit the wire format.
    pub fn from_celsius(celsius: f32) -> Result<Self, ValueError> {
        if !celsius.is_finite() {
            return Err(ValueError::NotFinite);
        }
        let tenths = (f64::from(celsius) * 10.0).round();
        if tenths < f64::from(i16::MIN) || tenths > f64::from(i16::MAX) {
            return Err(ValueError::OutOfRange {
                min: i32::from(i16::MIN),
                max: i32::from(i16::MAX),
                // Informational only, the value is already known to be out of range
                #[allow(clippy::cast_possible_truncation)]
                actual: tenths.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32,
            });
        }
        // Safe: range checked above
        #[allow(clippy::cast_possible_truncation)]
        let tenths = tenths as i16;
        Ok(Self(tenths))
    }

    /// Returns true if the value is a valid setpoint.
    #[must_use]
    pub const fn is_valid_setpoint(&self) -> bool {
        self.0 >= Self::SETPOINT_MIN.0 && self.0 <= Self::SETPOINT_MAX.0
    }

    /// Returns the temperature as a count of tenths of a degree.
    #[must_use]
    pub const fn tenths(&self) -> i16 {
        self.0
    }

    /// Returns the temperature in degrees Celsius.
    #[must_use]
    pub fn celsius(&self) -> f32 {
        f32::from(self.0) / 10.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{}°C", abs / 10, abs % 10)
    }
}

impl TryFrom<f32> for Temperature {
    type Error = ValueError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::from_celsius(value)
    }
}

impl From<Temperature> for f32 {
    fn from(value: Temperature) -> Self {
        value.celsius()
    }
}
