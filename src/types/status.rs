// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw status bitfield.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Uninterpreted 16-bit status word reported by the thermostat.
///
/// Also used to carry enumeration codes the codec does not recognize, so that
/// callers can log them without the decode pipeline failing.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::RawStatus;
///
/// let status = RawStatus::from_bits(RawStatus::HEATING | RawStatus::BOOST_ACTIVE);
/// assert!(status.contains(RawStatus::HEATING));
/// assert!(!status.contains(RawStatus::WRITE_REJECTED));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RawStatus(u16);

impl RawStatus {
    /// The last write was not accepted.
    pub const WRITE_REJECTED: u16 = 0x0001;
    /// The heating relay is on.
    pub const HEATING: u16 = 0x0002;
    /// A boost override is running.
    pub const BOOST_ACTIVE: u16 = 0x0004;
    /// The weekly schedule is in control.
    pub const SCHEDULE_ACTIVE: u16 = 0x0008;
    /// The device reports an alarm.
    pub const ALARM: u16 = 0x0080;

    /// Creates a status from its raw bits.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// Returns true if all bits of `flags` are set.
    #[must_use]
    pub const fn contains(&self, flags: u16) -> bool {
        self.0 & flags == flags
    }

    /// Returns true if the device refused the last write.
    #[must_use]
    pub const fn is_write_rejected(&self) -> bool {
        self.contains(Self::WRITE_REJECTED)
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u8> for RawStatus {
    fn from(code: u8) -> Self {
        Self(u16::from(code))
    }
}
