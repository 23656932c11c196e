// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session lifecycle events.
//!
//! The [`SessionManager`](crate::session::SessionManager) publishes a
//! [`SessionEvent`] whenever a session is established, refused or torn down.
//! The [`EventBus`] uses tokio's broadcast channel so the bridge and any
//! other observer can follow along.
//!
//! # Examples
//!
//! ```
//! use ensto_lib::event::{EventBus, SessionEvent};
//! use ensto_lib::types::BleAddress;
//!
//! let bus = EventBus::new();
//! let _rx = bus.subscribe();
//!
//! bus.publish(SessionEvent::Rejected {
//!     address: BleAddress::new([0x90, 0xFD, 0x9F, 0, 0, 1]),
//!     code: Some(0xFF),
//! });
//! ```

mod event_bus;
mod session_event;
mod session_id;

pub use event_bus::{DeviceEvents, EventBus};
pub use session_event::SessionEvent;
pub use session_id::SessionId;
