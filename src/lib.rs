// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ensto_lib` - Bridge Ensto ECO16BT Bluetooth LE thermostats to MQTT.
//!
//! The library pairs with thermostats using their 4-byte reset code, reads
//! and writes their characteristics through a typed codec, and exposes them
//! on an MQTT bus.
//!
//! # Layers
//!
//! - [`codec`]: pure conversions between characteristic bytes and values
//! - [`session`]: pairing handshake and the per-device session manager
//! - [`bridge`]: pairing files, MQTT topics and JSON commands
//! - [`transport`]: the BLE stack seam, with a `btleplug` backend behind the
//!   `ble` feature
//!
//! # Quick Start
//!
//! ## Reading a thermostat
//!
//! ```ignore
//! use std::time::Duration;
//! use ensto_lib::codec::{CharacteristicId, CharacteristicValue};
//! use ensto_lib::session::SessionManager;
//! use ensto_lib::transport::BtleplugTransport;
//! use ensto_lib::types::{DeviceIdentity, ResetCode, Temperature};
//!
//! #[tokio::main]
//! async fn main() -> ensto_lib::Result<()> {
//!     let manager = SessionManager::new(BtleplugTransport::new().await?);
//!     let identity = DeviceIdentity::new("90:FD:9F:01:02:03".parse()?, "Living Room");
//!     let code = ResetCode::new([0x12, 0x34, 0x56, 0x78]);
//!
//!     let handle = manager.connect(&identity, &code, Duration::from_secs(30)).await?;
//!     let reading = manager
//!         .read(&handle, CharacteristicId::RealTimeIndication, Duration::from_secs(5))
//!         .await?;
//!     println!("{reading:?}");
//!
//!     let target = CharacteristicValue::Temperature(Temperature::from_celsius(21.5)?);
//!     manager.write(&handle, &target, Duration::from_secs(5)).await?;
//!
//!     manager.close(&handle).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Running the MQTT bridge
//!
//! ```ignore
//! use ensto_lib::bridge::{BridgeAdapter, BridgeConfig, MqttBridge, PairingRegistry};
//! use ensto_lib::session::SessionManager;
//! use ensto_lib::transport::BtleplugTransport;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> ensto_lib::Result<()> {
//!     let config = BridgeConfig::from_env()?;
//!     let registry = PairingRegistry::load_dir(&config.pairing_dir)?;
//!     let manager = SessionManager::new(BtleplugTransport::new().await?);
//!
//!     let bridge = MqttBridge::new(BridgeAdapter::new(manager, registry, config));
//!     bridge.run(CancellationToken::new()).await
//! }
//! ```

pub mod bridge;
pub mod codec;
pub mod error;
pub mod event;
pub mod session;
pub mod transport;
pub mod types;

pub use codec::{CharacteristicId, CharacteristicValue};
pub use error::{
    AuthError, Cancelled, ConfigError, ConnectError, DecodeError, EncodeError, Error, PairingError,
    PayloadError, ReadError, Result, SegmentError, TimeoutError, TransportError, ValueError,
    WriteError,
};
pub use event::{DeviceEvents, EventBus, SessionEvent, SessionId};
pub use session::{Ack, HandleState, SessionConfig, SessionHandle, SessionManager};
pub use types::{BleAddress, DeviceIdentity, Mode, ResetCode, Temperature};
