// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BLE transport seam.
//!
//! The session layer talks to the radio only through [`BleTransport`] and
//! [`BleLink`]. Enable the `ble` feature for a [`btleplug`]-backed
//! implementation; tests supply scripted fakes.
//!
//! Implementations report failures as [`TransportError`]. A dropped link
//! must surface as [`TransportError::Disconnected`] so the handshake can
//! distinguish it from other failures.

#[cfg(feature = "ble")]
mod btleplug;

#[cfg(feature = "ble")]
pub use self::btleplug::{BtleplugLink, BtleplugTransport};

use std::future::Future;

use uuid::Uuid;

use crate::error::TransportError;
use crate::types::BleAddress;

/// Opens links to thermostats.
pub trait BleTransport: Send + Sync + 'static {
    /// The link type produced by [`connect`](Self::connect).
    type Link: BleLink;

    /// Establishes a link to the device at `address`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the device cannot be reached.
    fn connect(
        &self,
        address: BleAddress,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// An established link to one thermostat.
pub trait BleLink: Send + Sync + 'static {
    /// Reads the current value of a characteristic.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the read fails.
    fn read(
        &self,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Writes a characteristic with response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the write fails.
    fn write(
        &self,
        characteristic: Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Enables notifications on a characteristic.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the subscription fails.
    fn subscribe(
        &self,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the link. Must be safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the stack reports a failure.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
