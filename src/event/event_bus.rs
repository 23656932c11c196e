// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel for session events.

use tokio::sync::broadcast::{self, error::RecvError};

use super::SessionEvent;
use crate::types::BleAddress;

/// Events buffered per subscriber before the slowest one starts lagging.
const CAPACITY: usize = 64;

/// Fan-out of [`SessionEvent`]s to any number of observers.
///
/// Publishing never blocks the session manager. A subscriber that falls
/// more than the channel capacity behind skips the oldest events.
///
/// # Examples
///
/// ```
/// use ensto_lib::event::{EventBus, SessionEvent, SessionId};
/// use ensto_lib::session::HandleState;
/// use ensto_lib::types::BleAddress;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SessionEvent::Disconnected {
///     session: SessionId::new(),
///     address: BleAddress::new([0; 6]),
///     reason: HandleState::Closed,
/// });
/// assert!(rx.try_recv().unwrap().is_disconnect());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    /// Creates a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receives every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Receives the events of one thermostat only.
    #[must_use]
    pub fn subscribe_device(&self, address: BleAddress) -> DeviceEvents {
        DeviceEvents {
            address,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends `event` to all subscribers. Without subscribers it is dropped.
    pub fn publish(&self, event: SessionEvent) {
        let address = event.address();
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(%address, receivers, "Session event published"),
            Err(_) => tracing::trace!(%address, "Session event dropped, no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription filtered to a single thermostat.
#[derive(Debug)]
pub struct DeviceEvents {
    address: BleAddress,
    receiver: broadcast::Receiver<SessionEvent>,
}

impl DeviceEvents {
    /// The thermostat this subscription follows.
    #[must_use]
    pub fn address(&self) -> BleAddress {
        self.address
    }

    /// Waits for the next event of this thermostat.
    ///
    /// Lagging skips ahead instead of failing. Returns `None` once the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.address() == self.address => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(address = %self.address, skipped, "Session events lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
