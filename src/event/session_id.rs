// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session identifier type.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Unique identifier of one established session.
///
/// Every successful connect gets a fresh id, so log lines and events from a
/// reconnect are never confused with those of the session it replaces.
///
/// # Examples
///
/// ```
/// use ensto_lib::event::SessionId;
///
/// let id = SessionId::new();
/// assert_ne!(id, SessionId::new());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new unique session identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block of the UUID is enough to tell sessions apart in logs
        let simple = self.0.simple().to_string();
        write!(f, "SessionId({}...)", &simple[..8])
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
