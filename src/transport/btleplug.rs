// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`btleplug`] backend for the transport traits.

use std::future::Future;
use std::time::Duration;

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::Instant;
use uuid::Uuid;

use super::{BleLink, BleTransport};
use crate::error::TransportError;
use crate::types::BleAddress;

/// Default time spent looking for a known address before giving up.
const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between peripheral list checks while scanning.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

impl From<btleplug::Error> for TransportError {
    fn from(err: btleplug::Error) -> Self {
        match err {
            btleplug::Error::NotConnected => Self::Disconnected,
            btleplug::Error::DeviceNotFound => Self::Unreachable("device not found".to_string()),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Transport over the host's first Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct BtleplugTransport {
    adapter: Adapter,
    scan_timeout: Duration,
}

impl BtleplugTransport {
    /// Opens the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Failed` if no adapter is available.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Failed("no Bluetooth adapter found".to_string()))?;
        Ok(Self::with_adapter(adapter))
    }

    /// Uses the given adapter.
    #[must_use]
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }

    /// Sets how long to scan for a device before reporting it unreachable.
    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    async fn find(&self, address: BleAddress) -> Result<Peripheral, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        let scan = Cleanup::new(stop_scan(self.adapter.clone()));
        let deadline = Instant::now() + self.scan_timeout;

        let found = loop {
            let peripherals = self.adapter.peripherals().await?;
            if let Some(p) = peripherals
                .into_iter()
                .find(|p| p.address().into_inner() == address.bytes())
            {
                break Some(p);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        };

        scan.run().await;
        found.ok_or_else(|| TransportError::Unreachable(address.to_string()))
    }
}

async fn stop_scan(adapter: Adapter) {
    if let Err(e) = adapter.stop_scan().await {
        tracing::debug!(error = %e, "Failed to stop scan");
    }
}

async fn release(peripheral: Peripheral) {
    let link = BtleplugLink { peripheral };
    if let Err(e) = link.disconnect().await {
        tracing::debug!(error = %e, "Failed to release half-open link");
    }
}

/// Async cleanup that still happens when the owning future is dropped.
///
/// [`run`](Self::run) awaits it in place. Dropping the guard instead spawns
/// it on the current runtime; [`disarm`](Self::disarm) skips it.
struct Cleanup<F: Future<Output = ()> + Send + 'static> {
    task: Option<F>,
}

impl<F: Future<Output = ()> + Send + 'static> Cleanup<F> {
    fn new(task: F) -> Self {
        Self { task: Some(task) }
    }

    async fn run(mut self) {
        if let Some(task) = self.task.take() {
            task.await;
        }
    }

    fn disarm(mut self) {
        self.task = None;
    }
}

impl<F: Future<Output = ()> + Send + 'static> Drop for Cleanup<F> {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(task);
            }
            Err(_) => tracing::warn!("No runtime left to run BLE cleanup"),
        }
    }
}

impl BleTransport for BtleplugTransport {
    type Link = BtleplugLink;

    async fn connect(&self, address: BleAddress) -> Result<BtleplugLink, TransportError> {
        let peripheral = self.find(address).await?;
        tracing::debug!(address = %address, "Connecting");
        let pending = Cleanup::new(release(peripheral.clone()));
        let ready = async {
            peripheral.connect().await?;
            peripheral.discover_services().await
        };
        if let Err(e) = ready.await {
            pending.run().await;
            return Err(e.into());
        }
        pending.disarm();
        Ok(BtleplugLink { peripheral })
    }
}

/// A connected peripheral.
#[derive(Debug, Clone)]
pub struct BtleplugLink {
    peripheral: Peripheral,
}

impl BtleplugLink {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }
}

impl BleLink for BtleplugLink {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let c = self.characteristic(characteristic)?;
        Ok(self.peripheral.read(&c).await?)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let c = self.characteristic(characteristic)?;
        Ok(self
            .peripheral
            .write(&c, data, WriteType::WithResponse)
            .await?)
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), TransportError> {
        let c = self.characteristic(characteristic)?;
        Ok(self.peripheral.subscribe(&c).await?)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
