// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT bridge.
//!
//! - [`BridgeConfig`]: broker settings, timeouts and the command [`RetryPolicy`]
//! - [`PairingRegistry`]: the paired thermostats, loaded from pairing files
//! - [`BridgeAdapter`]: turns command messages into session operations
//! - `MqttBridge` (feature `mqtt`): serves an adapter over a broker connection

mod adapter;
mod config;
#[cfg(feature = "mqtt")]
mod mqtt;
mod pairing;
pub mod payload;
mod topic;

pub use adapter::{BridgeAdapter, ONLINE, Publication};
pub use config::{BridgeConfig, DEFAULT_BASE_TOPIC, RetryPolicy};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBridge, mqtt_options};
pub use pairing::{PairingRecord, PairingRegistry, address_from_file_name};
pub use payload::{BridgeCommand, DeviceReport};
pub use topic::Topics;
