// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authenticated session state.

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::codec::CharacteristicId;
use crate::event::SessionId;
use crate::transport::BleLink;
use crate::types::DeviceIdentity;

/// State of an authenticated link.
///
/// Only a handshake that reached `Ready` can create one. It owns the link,
/// so dropping or [releasing](Self::release) the context is the only way the
/// link goes away. It is deliberately not serializable: a context never
/// outlives the process or the connection it describes.
#[derive(Debug)]
pub struct SessionContext<L: BleLink> {
    id: SessionId,
    identity: DeviceIdentity,
    link: L,
    subscriptions: Vec<CharacteristicId>,
    established: Instant,
}

impl<L: BleLink> SessionContext<L> {
    pub(super) fn new(
        identity: DeviceIdentity,
        link: L,
        subscriptions: Vec<CharacteristicId>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            identity,
            link,
            subscriptions,
            established: Instant::now(),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the device this session is connected to.
    #[must_use]
    pub const fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the characteristics with active notifications.
    #[must_use]
    pub fn subscriptions(&self) -> &[CharacteristicId] {
        &self.subscriptions
    }

    /// Returns how long the session has been established.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.established.elapsed()
    }

    pub(super) const fn link(&self) -> &L {
        &self.link
    }

    /// Disconnects the link, waiting at most `bound`.
    pub async fn release(self, bound: Duration) {
        let address = self.identity.address();
        match timeout(bound, self.link.disconnect()).await {
            Ok(Ok(())) => tracing::debug!(address = %address, session = %self.id, "Link released"),
            Ok(Err(e)) => {
                tracing::warn!(address = %address, error = %e, "Disconnect failed");
            }
            Err(_) => tracing::warn!(address = %address, "Disconnect timed out"),
        }
    }
}
