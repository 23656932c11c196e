// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pairing records.
//!
//! The pairing tool stores one file per thermostat, named
//! `pairing-<address>.json` where `<address>` is the 12 hex digits of the
//! hardware address:
//!
//! ```json
//! {"resetCode": [18, 52, 86, 120], "deviceName": "Living Room"}
//! ```
//!
//! `resetKey` is accepted in place of `resetCode`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::PairingError;
use crate::types::{BleAddress, DeviceIdentity, ResetCode};

const FILE_PREFIX: &str = "pairing-";
const FILE_SUFFIX: &str = ".json";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFile {
    #[serde(alias = "resetKey")]
    reset_code: ResetCode,
    device_name: String,
}

/// Everything needed to connect to one paired thermostat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRecord {
    identity: DeviceIdentity,
    reset_code: ResetCode,
}

impl PairingRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(identity: DeviceIdentity, reset_code: ResetCode) -> Self {
        Self {
            identity,
            reset_code,
        }
    }

    /// Parses the JSON body of a pairing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the reset code is not
    /// exactly four bytes.
    pub fn from_json(address: BleAddress, json: &str) -> Result<Self, serde_json::Error> {
        let file: RecordFile = serde_json::from_str(json)?;
        Ok(Self::new(
            DeviceIdentity::new(address, file.device_name),
            file.reset_code,
        ))
    }

    /// Loads a pairing file, taking the address from its name.
    ///
    /// # Errors
    ///
    /// - `PairingError::InvalidFileName` if the name has no address
    /// - `PairingError::Io` if the file cannot be read
    /// - `PairingError::Json` if the content is invalid
    pub fn load(path: &Path) -> Result<Self, PairingError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let address = address_from_file_name(file_name)
            .ok_or_else(|| PairingError::InvalidFileName(path.display().to_string()))?;

        let json = fs::read_to_string(path).map_err(|source| PairingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(address, &json).map_err(|source| PairingError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the device identity.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the reset code.
    #[must_use]
    pub fn reset_code(&self) -> &ResetCode {
        &self.reset_code
    }

    /// Returns the topic segment for this device.
    #[must_use]
    pub fn topic_name(&self) -> String {
        self.identity.topic_name()
    }
}

/// Extracts the address from a `pairing-<address>.json` file name.
#[must_use]
pub fn address_from_file_name(file_name: &str) -> Option<BleAddress> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

/// The paired thermostats, keyed by topic name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingRegistry {
    records: BTreeMap<String, PairingRecord>,
}

impl PairingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `pairing-*.json` file in `dir`.
    ///
    /// Other files are ignored. When two records normalize to the same topic
    /// name the later file, in name order, wins and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns the first error reading the directory or any pairing file.
    pub fn load_dir(dir: &Path) -> Result<Self, PairingError> {
        let io_err = |source| PairingError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_pairing_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(FILE_SUFFIX));
            if is_pairing_file && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            let record = PairingRecord::load(&path)?;
            tracing::debug!(
                path = %path.display(),
                device = %record.identity(),
                "Loaded pairing record"
            );
            if let Some(previous) = registry.insert(record) {
                tracing::warn!(
                    device = %previous.identity(),
                    path = %path.display(),
                    "Pairing record replaced by a device with the same topic name"
                );
            }
        }

        tracing::info!(
            dir = %dir.display(),
            devices = registry.len(),
            "Pairing records loaded"
        );
        Ok(registry)
    }

    /// Adds a record, returning the one it replaces.
    pub fn insert(&mut self, record: PairingRecord) -> Option<PairingRecord> {
        self.records.insert(record.topic_name(), record)
    }

    /// Looks up a record by topic name.
    #[must_use]
    pub fn get(&self, topic_name: &str) -> Option<&PairingRecord> {
        self.records.get(topic_name)
    }

    /// Returns the topic names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Returns the records in topic name order.
    pub fn iter(&self) -> impl Iterator<Item = &PairingRecord> {
        self.records.values()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no device is paired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<PairingRecord> for PairingRegistry {
    fn from_iter<I: IntoIterator<Item = PairingRecord>>(iter: I) -> Self {
        let mut registry = Self::new();
        for record in iter {
            registry.insert(record);
        }
        registry
    }
}
