// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for thermostat control.
//!
//! These are the domain representations the codec translates to and from
//! characteristic bytes. Types with a hard domain (time of day, reset code,
//! Bluetooth address) validate at construction; device ranges that depend on
//! the characteristic (setpoint limits) are enforced by the codec.
//!
//! # Types
//!
//! - [`Temperature`] - Temperature in tenths of a degree Celsius
//! - [`Mode`] - Operating mode (Off/Heat/Boost/Schedule)
//! - [`ScheduleEntry`] - One weekly schedule slot
//! - [`TimeOfDay`] - Hour and minute, `00:00..=24:00`
//! - [`RawStatus`] - Status bitfield
//! - [`BoostSettings`] - Boost override configuration
//! - [`ResetCode`], [`BleAddress`], [`DeviceIdentity`] - Pairing inputs

mod boost;
mod identity;
mod mode;
mod schedule;
mod status;
mod temperature;

pub use boost::{BoostOffset, BoostSettings};
pub use identity::{BleAddress, DeviceIdentity, ResetCode, normalize_device_name};
pub use mode::Mode;
pub use schedule::{ScheduleEntry, TimeOfDay, day_code, weekday_from_code};
pub use status::RawStatus;
pub use temperature::Temperature;
