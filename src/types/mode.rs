// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermostat operating mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Operating mode of the thermostat.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::Mode;
///
/// assert_eq!(Mode::Heat.code(), 0x01);
/// assert_eq!(Mode::from_code(0x03), Some(Mode::Schedule));
/// assert_eq!(Mode::from_code(0x7F), None);
/// assert_eq!("boost".parse::<Mode>().unwrap(), Mode::Boost);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Heating disabled.
    Off,
    /// Heating to the target temperature.
    Heat,
    /// Temporary boost override.
    Boost,
    /// Following the weekly schedule.
    Schedule,
}

impl Mode {
    /// Wire codes, one entry per mode.
    pub const TABLE: [(u8, Self); 4] = [
        (0x00, Self::Off),
        (0x01, Self::Heat),
        (0x02, Self::Boost),
        (0x03, Self::Schedule),
    ];

    /// Returns the wire code of this mode.
    #[must_use]
    pub fn code(self) -> u8 {
        Self::TABLE
            .iter()
            .find_map(|&(code, mode)| (mode == self).then_some(code))
            .unwrap_or_default()
    }

    /// Looks up a mode by wire code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE
            .iter()
            .find_map(|&(c, mode)| (c == code).then_some(mode))
    }

    /// Returns the lowercase name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Boost => "boost",
            Self::Schedule => "schedule",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "heat" | "manual" => Ok(Self::Heat),
            "boost" => Ok(Self::Boost),
            "schedule" | "calendar" => Ok(Self::Schedule),
            _ => Err(ValueError::InvalidMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_codes_are_unique() {
        for (i, (code, _)) in Mode::TABLE.iter().enumerate() {
            assert!(Mode::TABLE[i + 1..].iter().all(|(c, _)| c != code));
        }
    }

    #[test]
    fn code_round_trip() {
        for (code, mode) in Mode::TABLE {
            assert_eq!(mode.code(), code);
            assert_eq!(Mode::from_code(code), Some(mode));
        }
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("HEAT".parse::<Mode>().unwrap(), Mode::Heat);
        assert_eq!("manual".parse::<Mode>().unwrap(), Mode::Heat);
        assert_eq!("calendar".parse::<Mode>().unwrap(), Mode::Schedule);
        assert!("vacation".parse::<Mode>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Schedule).unwrap(), "\"schedule\"");
    }
}
