// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager configuration.

use std::time::Duration;

use crate::codec::CharacteristicId;
use crate::codec::segmented::DEFAULT_MAX_PACKETS;

/// Configuration for a [`SessionManager`](super::SessionManager).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ensto_lib::codec::CharacteristicId;
/// use ensto_lib::session::SessionConfig;
///
/// let config = SessionConfig::new()
///     .with_ack_timeout(Duration::from_secs(3))
///     .with_subscription(CharacteristicId::Status);
///
/// assert_eq!(config.subscriptions, vec![CharacteristicId::Status]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the reset-code acknowledgement.
    pub ack_timeout: Duration,
    /// Upper bound on releasing a link during teardown.
    pub disconnect_timeout: Duration,
    /// Characteristics to subscribe to before a session is ready.
    pub subscriptions: Vec<CharacteristicId>,
    /// Maximum number of packets in one segmented read.
    pub max_segments: usize,
}

impl SessionConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Sets the bound on releasing a link.
    #[must_use]
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Adds a notification subscription.
    #[must_use]
    pub fn with_subscription(mut self, id: CharacteristicId) -> Self {
        if !self.subscriptions.contains(&id) {
            self.subscriptions.push(id);
        }
        self
    }

    /// Replaces the subscription list.
    #[must_use]
    pub fn with_subscriptions(mut self, ids: impl IntoIterator<Item = CharacteristicId>) -> Self {
        self.subscriptions = Vec::new();
        for id in ids {
            self = self.with_subscription(id);
        }
        self
    }

    /// Sets the packet bound for segmented reads.
    #[must_use]
    pub fn with_max_segments(mut self, max: usize) -> Self {
        self.max_segments = max.max(1);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(5),
            disconnect_timeout: Duration::from_secs(2),
            subscriptions: Vec::new(),
            max_segments: DEFAULT_MAX_PACKETS,
        }
    }
}
