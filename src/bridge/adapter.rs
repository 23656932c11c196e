// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Maps MQTT commands onto thermostat sessions.

use super::payload::{self, BridgeCommand, DeviceReport};
use super::{BridgeConfig, PairingRecord, PairingRegistry, Topics};
use crate::codec::{CharacteristicId, CharacteristicValue};
use crate::error::{DecodeError, Error, ReadError, Result};
use crate::session::{SessionHandle, SessionManager};
use crate::transport::BleTransport;

/// Payload published on availability topics.
pub const ONLINE: &str = "online";

/// A message for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Destination topic.
    pub topic: String,
    /// UTF-8 payload.
    pub payload: String,
}

impl Publication {
    /// Creates a publication.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Translates between MQTT messages and thermostat operations.
///
/// Each command opens a fresh session, writes the value, reads the affected
/// state back and closes the session again. Nothing is cached between
/// commands. The adapter itself never touches the broker; callers publish
/// the returned [`Publication`]s.
///
/// # Examples
///
/// ```ignore
/// use ensto_lib::bridge::{BridgeAdapter, BridgeConfig, PairingRegistry};
/// use ensto_lib::session::SessionManager;
///
/// let config = BridgeConfig::from_env()?;
/// let registry = PairingRegistry::load_dir(&config.pairing_dir)?;
/// let adapter = BridgeAdapter::new(SessionManager::new(transport), registry, config);
///
/// for publication in adapter.handle_message("ECO16BT/livingroom/set", payload).await? {
///     client.publish(&publication.topic, publication.payload).await?;
/// }
/// ```
#[derive(Debug)]
pub struct BridgeAdapter<T: BleTransport> {
    manager: SessionManager<T>,
    registry: PairingRegistry,
    topics: Topics,
    config: BridgeConfig,
}

impl<T: BleTransport> BridgeAdapter<T> {
    /// Creates an adapter serving the devices in `registry`.
    #[must_use]
    pub fn new(
        manager: SessionManager<T>,
        registry: PairingRegistry,
        config: BridgeConfig,
    ) -> Self {
        Self {
            manager,
            registry,
            topics: Topics::new(config.base_topic.clone()),
            config,
        }
    }

    /// Returns the session manager.
    #[must_use]
    pub fn manager(&self) -> &SessionManager<T> {
        &self.manager
    }

    /// Returns the paired devices.
    #[must_use]
    pub fn registry(&self) -> &PairingRegistry {
        &self.registry
    }

    /// Returns the topic layout.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Command topics to subscribe to, one per paired device.
    #[must_use]
    pub fn command_topics(&self) -> Vec<String> {
        self.registry.names().map(|name| self.topics.set(name)).collect()
    }

    /// `online` messages for every paired device.
    #[must_use]
    pub fn availability(&self) -> Vec<Publication> {
        self.registry
            .names()
            .map(|name| Publication::new(self.topics.available(name), ONLINE))
            .collect()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Handles a message received on a command topic.
    ///
    /// Transient failures are retried according to the configured
    /// [`RetryPolicy`](super::RetryPolicy).
    ///
    /// # Errors
    ///
    /// - `Error::Payload` if the topic or JSON is not a valid command
    /// - `Error::UnknownDevice` if no pairing record matches the topic
    /// - `Error::Value` if a command field is out of range
    /// - the last session error once retries are exhausted or the error is
    ///   permanent
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<Vec<Publication>> {
        let device = self.topics.device_from_set(topic)?;
        let record = self
            .registry
            .get(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;
        let command = BridgeCommand::parse(payload)?;

        tracing::info!(device = %device, command = command.kind(), "Command received");

        let mut attempt = 0;
        loop {
            match self.execute(record, &command).await {
                Ok(publications) => return Ok(publications),
                Err(err) if err.is_transient() && self.config.retry.should_retry(attempt) => {
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        device = %device,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Command failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(device = %device, error = %err, "Command failed");
                    return Err(err);
                }
            }
        }
    }

    /// Executes one command once: connect, write, read back, close.
    ///
    /// # Errors
    ///
    /// Returns the first failure. The session is closed either way.
    pub async fn execute(
        &self,
        record: &PairingRecord,
        command: &BridgeCommand,
    ) -> Result<Vec<Publication>> {
        let value = command.to_value()?;
        let read_back = command.read_back();

        self.with_session(record, |handle| async move {
            let ack = self
                .manager
                .write(&handle, &value, self.config.operation_timeout)
                .await?;
            tracing::debug!(
                device = %record.identity(),
                characteristic = %ack.characteristic,
                "Command written"
            );
            let state = self
                .manager
                .read(&handle, read_back, self.config.operation_timeout)
                .await?;
            Ok(vec![self.publication_for(record, &state)?])
        })
        .await
    }

    /// Reads the live readings of a device for its `state` topic.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownDevice` if `device` is not paired
    /// - any connect or read failure
    pub async fn poll(&self, device: &str) -> Result<Publication> {
        let record = self
            .registry
            .get(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;

        self.with_session(record, |handle| async move {
            let state = self
                .manager
                .read(
                    &handle,
                    CharacteristicId::RealTimeIndication,
                    self.config.operation_timeout,
                )
                .await?;
            self.publication_for(record, &state)
        })
        .await
    }

    /// Reads every characteristic a device reports in one session and renders
    /// them for its report topic.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownDevice` if `device` is not paired
    /// - the first connect or read failure; nothing is published partially
    pub async fn report(&self, device: &str) -> Result<Publication> {
        use CharacteristicId as C;
        use CharacteristicValue as V;

        let record = self
            .registry
            .get(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;

        let report = self
            .with_session(record, |handle| async move {
                let timeout = self.config.operation_timeout;

                // Every read of `id` decodes to `variant`
                macro_rules! read_as {
                    ($id:ident, $variant:ident) => {
                        match self.manager.read(&handle, C::$id, timeout).await? {
                            V::$variant(value) => value,
                            _ => {
                                let err = DecodeError::Unsupported(C::$id);
                                return Err(Error::Read(ReadError::Decode(err)));
                            }
                        }
                    };
                }

                Ok(DeviceReport {
                    name: record.identity().name().to_string(),
                    realtime: read_as!(RealTimeIndication, RealTime),
                    monitoring: read_as!(Monitoring, Monitoring),
                    power: read_as!(PowerHistory, PowerHistory),
                    calendar_mode: read_as!(CalendarMode, CalendarMode),
                    calendar: read_as!(CalendarDay, CalendarDay),
                    vacation: read_as!(Vacation, Vacation),
                    floor_area: read_as!(FloorArea, FloorArea),
                    heating_power: read_as!(HeatingPower, HeatingPower),
                    sensor: read_as!(SensorType, SensorType),
                    adaptive: read_as!(AdaptiveControl, AdaptiveControl),
                    limits: read_as!(TemperatureLimits, TemperatureLimits),
                    clock: read_as!(DateTime, DateTime),
                    daylight_saving: read_as!(DaylightSaving, DaylightSaving),
                })
            })
            .await?;

        tracing::debug!(device = %record.identity(), "Report gathered");
        Ok(Publication::new(
            self.topics.report(&record.topic_name()),
            payload::report_payload(&report)?,
        ))
    }

    /// Reads any characteristic of a device in a one-off session.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownDevice` if `device` is not paired
    /// - any connect or read failure
    pub async fn read(&self, device: &str, id: CharacteristicId) -> Result<CharacteristicValue> {
        let record = self
            .registry
            .get(device)
            .ok_or_else(|| Error::UnknownDevice(device.to_string()))?;

        self.with_session(record, |handle| async move {
            Ok(self
                .manager
                .read(&handle, id, self.config.operation_timeout)
                .await?)
        })
        .await
    }

    fn publication_for(
        &self,
        record: &PairingRecord,
        value: &CharacteristicValue,
    ) -> Result<Publication> {
        let name = record.topic_name();
        let topic = match value.characteristic() {
            CharacteristicId::Boost => self.topics.boost(&name),
            _ => self.topics.state(&name),
        };
        Ok(Publication::new(topic, payload::render(value)?))
    }

    async fn with_session<'a, F, Fut, R>(&'a self, record: &'a PairingRecord, f: F) -> Result<R>
    where
        F: FnOnce(SessionHandle<T::Link>) -> Fut,
        Fut: Future<Output = Result<R>> + 'a,
    {
        let handle = self
            .manager
            .connect(
                record.identity(),
                record.reset_code(),
                self.config.connect_timeout,
            )
            .await?;
        let result = f(handle.clone()).await;
        self.manager.close(&handle).await;
        result
    }
}
