// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session event types.

use crate::session::HandleState;
use crate::types::BleAddress;

use super::SessionId;

/// Events emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The handshake reached `Ready` and a handle was issued.
    Connected {
        /// The new session.
        session: SessionId,
        /// The thermostat address.
        address: BleAddress,
    },

    /// The device refused the reset code.
    Rejected {
        /// The thermostat address.
        address: BleAddress,
        /// The refusal code, if the device sent one.
        code: Option<u8>,
    },

    /// A session's link was released.
    Disconnected {
        /// The session that ended.
        session: SessionId,
        /// The thermostat address.
        address: BleAddress,
        /// Why the session ended.
        reason: HandleState,
    },
}

impl SessionEvent {
    /// Returns the address of the thermostat the event concerns.
    #[must_use]
    pub fn address(&self) -> BleAddress {
        match self {
            Self::Connected { address, .. }
            | Self::Rejected { address, .. }
            | Self::Disconnected { address, .. } => *address,
        }
    }

    /// Returns the session id, if a session existed.
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Connected { session, .. } | Self::Disconnected { session, .. } => Some(*session),
            Self::Rejected { .. } => None,
        }
    }

    /// Returns `true` if this event ends a session.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
