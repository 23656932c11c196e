// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted BLE transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ensto_lib::codec::CharacteristicId;
use ensto_lib::error::TransportError;
use ensto_lib::transport::{BleLink, BleTransport};
use ensto_lib::types::{BleAddress, DeviceIdentity, ResetCode};
use parking_lot::Mutex;
use uuid::Uuid;

pub const CODE: ResetCode = ResetCode::new([0x12, 0x34, 0x56, 0x78]);
pub const WRONG_CODE: ResetCode = ResetCode::new([0, 0, 0, 0]);

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new(BleAddress::new([0x90, 0xFD, 0x9F, 0x01, 0x02, 0x03]), "Living Room")
}

#[derive(Debug, Default)]
struct State {
    reset_code: Option<[u8; 4]>,
    values: HashMap<Uuid, Vec<u8>>,
    queued: HashMap<Uuid, VecDeque<Result<Vec<u8>, TransportError>>>,
    write_errors: HashMap<Uuid, TransportError>,
    subscribe_failures: HashMap<Uuid, usize>,
    read_delays: HashMap<Uuid, Duration>,
    write_delays: HashMap<Uuid, Duration>,
    connect_failures: VecDeque<TransportError>,
    writes: Vec<(Uuid, Vec<u8>)>,
    reads: Vec<Uuid>,
    subscriptions: Vec<Uuid>,
    connects: usize,
    disconnects: usize,
}

/// A thermostat simulated in memory.
///
/// Writes are stored and returned by later reads of the same characteristic,
/// except for the reset code: writing it sets the acknowledgement to `0x00`
/// when it matches the configured code and `0xFF` otherwise.
#[derive(Debug, Clone, Default)]
pub struct FakeDevice {
    state: Arc<Mutex<State>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let device = Self::default();
        device.state.lock().reset_code = Some(*CODE.as_bytes());
        device.set_status(0x0000);
        device
    }

    pub fn transport(&self) -> FakeTransport {
        FakeTransport {
            device: self.clone(),
        }
    }

    pub fn set_value(&self, id: CharacteristicId, bytes: &[u8]) {
        self.state.lock().values.insert(id.uuid(), bytes.to_vec());
    }

    pub fn set_status(&self, bits: u16) {
        self.set_value(CharacteristicId::Status, &bits.to_le_bytes());
    }

    /// Answers the reset code with a fixed acknowledgement, whatever was written.
    pub fn set_auth_ack(&self, ack: &[u8]) {
        let mut state = self.state.lock();
        state.reset_code = None;
        state
            .values
            .insert(CharacteristicId::Authentication.uuid(), ack.to_vec());
    }

    /// Queues one-shot read results, served before the stored value.
    pub fn queue_reads(
        &self,
        id: CharacteristicId,
        results: impl IntoIterator<Item = Result<Vec<u8>, TransportError>>,
    ) {
        self.state
            .lock()
            .queued
            .entry(id.uuid())
            .or_default()
            .extend(results);
    }

    pub fn fail_writes(&self, id: CharacteristicId, error: TransportError) {
        self.state.lock().write_errors.insert(id.uuid(), error);
    }

    pub fn fail_subscriptions(&self, id: CharacteristicId, times: usize) {
        self.state.lock().subscribe_failures.insert(id.uuid(), times);
    }

    pub fn fail_connects(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().connect_failures.extend(errors);
    }

    pub fn delay_reads(&self, id: CharacteristicId, delay: Duration) {
        self.state.lock().read_delays.insert(id.uuid(), delay);
    }

    pub fn delay_writes(&self, id: CharacteristicId, delay: Duration) {
        self.state.lock().write_delays.insert(id.uuid(), delay);
    }

    pub fn writes_to(&self, id: CharacteristicId) -> Vec<Vec<u8>> {
        let uuid = id.uuid();
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(u, _)| *u == uuid)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    pub fn write_log(&self) -> Vec<CharacteristicId> {
        self.state
            .lock()
            .writes
            .iter()
            .filter_map(|(uuid, _)| CharacteristicId::from_uuid(*uuid))
            .collect()
    }

    pub fn read_log(&self) -> Vec<CharacteristicId> {
        self.state
            .lock()
            .reads
            .iter()
            .filter_map(|uuid| CharacteristicId::from_uuid(*uuid))
            .collect()
    }

    pub fn reads_of(&self, id: CharacteristicId) -> usize {
        let uuid = id.uuid();
        self.state.lock().reads.iter().filter(|u| **u == uuid).count()
    }

    pub fn subscriptions(&self) -> Vec<CharacteristicId> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .filter_map(|uuid| CharacteristicId::from_uuid(*uuid))
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }
}

#[derive(Debug)]
pub struct FakeTransport {
    device: FakeDevice,
}

#[derive(Debug)]
pub struct FakeLink {
    device: FakeDevice,
}

impl BleTransport for FakeTransport {
    type Link = FakeLink;

    async fn connect(&self, _address: BleAddress) -> Result<FakeLink, TransportError> {
        let mut state = self.device.state.lock();
        state.connects += 1;
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        Ok(FakeLink {
            device: self.device.clone(),
        })
    }
}

impl BleLink for FakeLink {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let delay = self.device.state.lock().read_delays.get(&characteristic).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.device.state.lock();
        state.reads.push(characteristic);
        if let Some(result) = state
            .queued
            .get_mut(&characteristic)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        state
            .values
            .get(&characteristic)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(characteristic))
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let delay = self.device.state.lock().write_delays.get(&characteristic).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.device.state.lock();
        state.writes.push((characteristic, data.to_vec()));
        if let Some(err) = state.write_errors.get(&characteristic) {
            return Err(err.clone());
        }

        let stored = if characteristic == CharacteristicId::Authentication.uuid() {
            match state.reset_code {
                Some(code) if code.as_slice() == data => vec![0x00],
                Some(_) => vec![0xFF],
                None => return Ok(()),
            }
        } else {
            data.to_vec()
        };
        state.values.insert(characteristic, stored);
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), TransportError> {
        let mut state = self.device.state.lock();
        if let Some(remaining) = state.subscribe_failures.get_mut(&characteristic)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(TransportError::Failed("CCCD write failed".to_string()));
        }
        state.subscriptions.push(characteristic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.device.state.lock().disconnects += 1;
        Ok(())
    }
}
