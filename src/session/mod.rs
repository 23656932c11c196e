// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Authenticated sessions with thermostats.
//!
//! A session is created by [`SessionManager::connect`], which runs the
//! pairing [`handshake`] and returns a [`SessionHandle`]. All reads and
//! writes go through the manager, which serializes them per handle and
//! tears the link down on timeouts and transport failures.

mod config;
mod context;
mod handle;
pub mod handshake;
mod manager;

pub use config::SessionConfig;
pub use context::SessionContext;
pub use handle::{HandleState, SessionHandle};
pub use handshake::{Handshake, HandshakeState};
pub use manager::{Ack, SessionManager};
