// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session handles and the per-handle request queue.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::SessionContext;
use crate::event::SessionId;
use crate::transport::BleLink;
use crate::types::DeviceIdentity;

/// Lifecycle state of a [`SessionHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    /// The session is usable.
    Open,
    /// The session was closed by its owner.
    Closed,
    /// An operation timed out; the link was or will be released.
    TimedOut,
    /// An in-flight operation was cancelled; the link was or will be released.
    Cancelled,
    /// The transport reported a failure; the link was or will be released.
    LinkLost,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::LinkLost => "link_lost",
        };
        f.write_str(name)
    }
}

pub(super) struct Shared<L: BleLink> {
    id: SessionId,
    identity: DeviceIdentity,
    // tokio's mutex is fair, so waiters are served in arrival order
    slot: Mutex<Option<SessionContext<L>>>,
    state: parking_lot::Mutex<HandleState>,
}

/// Handle to one established session.
///
/// Cloning a handle shares the session. Requests on the same handle are
/// served one at a time, first come first served. Once the handle leaves
/// [`HandleState::Open`] every request fails with `NotConnected` until a
/// fresh connect.
pub struct SessionHandle<L: BleLink> {
    shared: Arc<Shared<L>>,
}

impl<L: BleLink> SessionHandle<L> {
    pub(super) fn new(context: SessionContext<L>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: context.id(),
                identity: context.identity().clone(),
                slot: Mutex::new(Some(context)),
                state: parking_lot::Mutex::new(HandleState::Open),
            }),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Returns the device this handle is connected to.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.shared.identity
    }

    /// Returns the current state without waiting for the queue.
    #[must_use]
    pub fn state(&self) -> HandleState {
        *self.shared.state.lock()
    }

    /// Returns true if the handle accepts requests.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == HandleState::Open
    }

    /// Moves an open handle to `state`. Returns the state in effect afterwards.
    pub(super) fn mark(&self, state: HandleState) -> HandleState {
        let mut current = self.shared.state.lock();
        if *current == HandleState::Open {
            *current = state;
        }
        *current
    }

    pub(super) fn force(&self, state: HandleState) {
        *self.shared.state.lock() = state;
    }

    pub(super) async fn lock(&self) -> Ticket<'_, L> {
        Ticket {
            guard: self.shared.slot.lock().await,
            state: &self.shared.state,
            in_flight: false,
        }
    }

    /// Takes the queue only if nobody holds or waits for it.
    pub(super) fn try_lock(&self) -> Option<Ticket<'_, L>> {
        let guard = self.shared.slot.try_lock().ok()?;
        Some(Ticket {
            guard,
            state: &self.shared.state,
            in_flight: false,
        })
    }
}

impl<L: BleLink> Clone for SessionHandle<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: BleLink> fmt::Debug for SessionHandle<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("address", &self.shared.identity.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a session for the duration of one request.
///
/// Dropping a ticket while its I/O is in flight (the request future was
/// dropped) poisons the handle: the device may have seen a partial
/// exchange, so the next request or `close` tears the link down.
pub(super) struct Ticket<'a, L: BleLink> {
    guard: MutexGuard<'a, Option<SessionContext<L>>>,
    state: &'a parking_lot::Mutex<HandleState>,
    pub(super) in_flight: bool,
}

impl<L: BleLink> Ticket<'_, L> {
    pub(super) fn context(&self) -> Option<&SessionContext<L>> {
        self.guard.as_ref()
    }

    pub(super) fn take(&mut self) -> Option<SessionContext<L>> {
        self.guard.take()
    }
}

impl<L: BleLink> Drop for Ticket<'_, L> {
    fn drop(&mut self) {
        if self.in_flight {
            let mut state = self.state.lock();
            if *state == HandleState::Open {
                *state = HandleState::Cancelled;
                tracing::debug!("Request dropped mid-flight, session poisoned");
            }
        }
    }
}
