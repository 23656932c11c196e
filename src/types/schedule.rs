// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Weekly schedule types.

use std::fmt;

use chrono::Weekday;
use serde::Serialize;

use crate::error::ValueError;

use super::Temperature;

/// Returns the wire code of a weekday (1 = Monday ... 7 = Sunday).
#[must_use]
pub fn day_code(day: Weekday) -> u8 {
    // Safe: number_from_monday is always 1..=7
    #[allow(clippy::cast_possible_truncation)]
    let code = day.number_from_monday() as u8;
    code
}

/// Looks up a weekday by wire code (1 = Monday ... 7 = Sunday).
#[must_use]
pub fn weekday_from_code(code: u8) -> Option<Weekday> {
    match code {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// A time of day with minute resolution.
///
/// Valid values run from `00:00` to `23:59`, plus `24:00` which marks the end
/// of the day for slots that run until midnight.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::TimeOfDay;
///
/// let t = TimeOfDay::new(6, 30).unwrap();
/// assert_eq!(t.to_string(), "06:30");
/// assert_eq!(t.minutes_since_midnight(), 390);
///
/// assert!(TimeOfDay::new(24, 0).is_ok());
/// assert!(TimeOfDay::new(24, 1).is_err());
/// assert!(TimeOfDay::new(7, 60).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Midnight at the start of the day.
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    /// Midnight at the end of the day.
    pub const END_OF_DAY: Self = Self {
        hour: 24,
        minute: 0,
    };

    /// Creates a time of day.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTime` if the hour or minute is out of range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValueError> {
        if Self::is_valid(hour, minute) {
            Ok(Self { hour, minute })
        } else {
            Err(ValueError::InvalidTime { hour, minute })
        }
    }

    /// Returns true if the pair is a valid time of day.
    #[must_use]
    pub const fn is_valid(hour: u8, minute: u8) -> bool {
        (hour < 24 && minute < 60) || (hour == 24 && minute == 0)
    }

    /// Returns the hour component.
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Returns the minute component.
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Returns the number of minutes since midnight.
    #[must_use]
    pub const fn minutes_since_midnight(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One slot of the weekly heating schedule.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use ensto_lib::types::{ScheduleEntry, Temperature, TimeOfDay};
///
/// let entry = ScheduleEntry::new(
///     Weekday::Mon,
///     TimeOfDay::new(6, 0).unwrap(),
///     TimeOfDay::new(8, 30).unwrap(),
///     Temperature::from_celsius(21.0).unwrap(),
/// )
/// .unwrap();
/// assert_eq!(entry.day(), Weekday::Mon);
///
/// // A slot must end after it starts
/// let empty = ScheduleEntry::new(
///     Weekday::Mon,
///     TimeOfDay::new(8, 0).unwrap(),
///     TimeOfDay::new(8, 0).unwrap(),
///     Temperature::from_celsius(21.0).unwrap(),
/// );
/// assert!(empty.is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScheduleEntry {
    day: Weekday,
    start: TimeOfDay,
    end: TimeOfDay,
    target: Temperature,
}

impl ScheduleEntry {
    /// Creates a schedule slot.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptySlot` if `end` is not after `start`.
    pub fn new(
        day: Weekday,
        start: TimeOfDay,
        end: TimeOfDay,
        target: Temperature,
    ) -> Result<Self, ValueError> {
        if end <= start {
            return Err(ValueError::EmptySlot);
        }
        Ok(Self {
            day,
            start,
            end,
            target,
        })
    }

    /// Returns the day of the week.
    #[must_use]
    pub const fn day(&self) -> Weekday {
        self.day
    }

    /// Returns the slot start.
    #[must_use]
    pub const fn start(&self) -> TimeOfDay {
        self.start
    }

    /// Returns the slot end.
    #[must_use]
    pub const fn end(&self) -> TimeOfDay {
        self.end
    }

    /// Returns the target temperature during the slot.
    #[must_use]
    pub const fn target(&self) -> Temperature {
        self.target
    }
}
