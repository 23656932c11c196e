// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic layout.
//!
//! ```text
//! <base>/<device>/set        inbound JSON commands
//! <base>/<device>/available  "online" heartbeat
//! <base>/<device>/boost      boost settings after a command
//! <base>/<device>/state      real-time readings
//! <base>/<device>            full device report
//! ```
//!
//! `<device>` is the normalized device name, see
//! [`normalize_device_name`](crate::types::normalize_device_name).

use crate::error::PayloadError;

/// Builds and parses the bridge's topics under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    /// Creates a topic layout under `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_matches('/').to_string(),
        }
    }

    /// Returns the prefix.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Command topic for a device.
    #[must_use]
    pub fn set(&self, device: &str) -> String {
        format!("{}/{device}/set", self.base)
    }

    /// Availability topic for a device.
    #[must_use]
    pub fn available(&self, device: &str) -> String {
        format!("{}/{device}/available", self.base)
    }

    /// Boost settings topic for a device.
    #[must_use]
    pub fn boost(&self, device: &str) -> String {
        format!("{}/{device}/boost", self.base)
    }

    /// Real-time readings topic for a device.
    #[must_use]
    pub fn state(&self, device: &str) -> String {
        format!("{}/{device}/state", self.base)
    }

    /// Full report topic for a device.
    #[must_use]
    pub fn report(&self, device: &str) -> String {
        format!("{}/{device}", self.base)
    }

    /// Extracts the device from a command topic.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::UnexpectedTopic` unless `topic` is exactly
    /// `<base>/<device>/set`.
    pub fn device_from_set<'t>(&self, topic: &'t str) -> Result<&'t str, PayloadError> {
        let unexpected = || PayloadError::UnexpectedTopic(topic.to_string());

        let rest = topic
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(unexpected)?;
        let device = rest.strip_suffix("/set").ok_or_else(unexpected)?;
        if device.is_empty() || device.contains('/') {
            return Err(unexpected());
        }
        Ok(device)
    }
}
