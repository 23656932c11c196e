// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT front end of the bridge.
//!
//! Three tasks share one broker connection:
//!
//! ```text
//! event loop --(set messages)--> queue --> processor --> BridgeAdapter
//!                                  ^                          |
//!           poller, reporter ------+                          v
//!                  heartbeat --------------------------> publications
//! ```
//!
//! The processor handles one job at a time, so two commands never talk to
//! thermostats concurrently.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BridgeAdapter, BridgeConfig, Publication};
use crate::error::Result;
use crate::transport::BleTransport;

/// Request capacity of the MQTT client.
const CLIENT_CAPACITY: usize = 10;

/// How long to flush the disconnect on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Job {
    Command { topic: String, payload: Vec<u8> },
    Poll(String),
    Report(String),
}

/// Runs a [`BridgeAdapter`] against an MQTT broker.
///
/// # Examples
///
/// ```ignore
/// use ensto_lib::bridge::{BridgeAdapter, BridgeConfig, MqttBridge, PairingRegistry};
/// use ensto_lib::session::SessionManager;
/// use ensto_lib::transport::BtleplugTransport;
/// use tokio_util::sync::CancellationToken;
///
/// let config = BridgeConfig::from_env()?;
/// let registry = PairingRegistry::load_dir(&config.pairing_dir)?;
/// let manager = SessionManager::new(BtleplugTransport::new().await?);
/// let bridge = MqttBridge::new(BridgeAdapter::new(manager, registry, config));
///
/// let shutdown = CancellationToken::new();
/// bridge.run(shutdown.clone()).await?;
/// ```
#[derive(Debug)]
pub struct MqttBridge<T: BleTransport> {
    adapter: Arc<BridgeAdapter<T>>,
}

impl<T: BleTransport> MqttBridge<T> {
    /// Wraps an adapter.
    #[must_use]
    pub fn new(adapter: BridgeAdapter<T>) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    /// Returns the adapter.
    #[must_use]
    pub fn adapter(&self) -> &BridgeAdapter<T> {
        &self.adapter
    }

    /// Serves commands until `cancel` fires.
    ///
    /// Broker errors are logged and the connection is retried after the
    /// configured reconnect interval; they never end the loop.
    ///
    /// # Errors
    ///
    /// Returns `Error::Mqtt` if the final disconnect cannot be queued.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let config = self.adapter.config();
        let (client, mut event_loop) = AsyncClient::new(mqtt_options(config), CLIENT_CAPACITY);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let shutdown = cancel.child_token();

        let mut tasks = vec![
            tokio::spawn(process(
                Arc::clone(&self.adapter),
                client.clone(),
                queue_rx,
                shutdown.clone(),
            )),
            tokio::spawn(heartbeat(
                Arc::clone(&self.adapter),
                client.clone(),
                shutdown.clone(),
            )),
        ];
        let schedules = [
            (config.poll_interval, Job::Poll as fn(String) -> Job),
            (config.report_interval, Job::Report),
        ];
        for (interval, job) in schedules {
            let Some(interval) = interval else {
                continue;
            };
            tasks.push(tokio::spawn(schedule(
                Arc::clone(&self.adapter),
                interval,
                job,
                queue_tx.clone(),
                shutdown.clone(),
            )));
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            devices = self.adapter.registry().len(),
            "Starting MQTT bridge"
        );

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                event = event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    tracing::info!(?connack, "Connected to MQTT broker");
                    self.subscribe(&client);
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    tracing::debug!(topic = %publish.topic, "Command queued");
                    let job = Job::Command {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if queue_tx.send(job).is_err() {
                        tracing::error!("Command processor stopped");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let pause = config.reconnect_interval;
                    tracing::error!(
                        error = %e,
                        retry_in_ms = pause.as_millis(),
                        "MQTT event loop error"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }

        shutdown.cancel();
        drop(queue_tx);
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Bridge task failed");
            }
        }

        tracing::info!("Stopping MQTT bridge");
        client.try_disconnect()?;
        flush_disconnect(&mut event_loop).await;
        Ok(())
    }

    fn subscribe(&self, client: &AsyncClient) {
        let filters: Vec<SubscribeFilter> = self
            .adapter
            .command_topics()
            .into_iter()
            .map(|topic| SubscribeFilter::new(topic, QoS::AtMostOnce))
            .collect();
        if filters.is_empty() {
            tracing::warn!("No paired devices, nothing to subscribe to");
            return;
        }
        let count = filters.len();
        // The event loop is the caller, so waiting for channel space would deadlock
        match client.try_subscribe_many(filters) {
            Ok(()) => tracing::info!(topics = count, "Subscribing to command topics"),
            Err(e) => tracing::error!(error = %e, "Failed to subscribe to command topics"),
        }
    }
}

/// Builds the client options for the listener connection.
#[must_use]
pub fn mqtt_options(config: &BridgeConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.listener_client_id(), &config.host, config.port);
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);
    if let Some((username, password)) = &config.credentials {
        options.set_credentials(username, password);
    }
    options
}

/// Queues a publication, waiting for room in the client channel.
///
/// Gives up when `shutdown` fires: once the event loop is no longer polled
/// the channel never drains.
async fn publish(client: &AsyncClient, publication: Publication, shutdown: &CancellationToken) {
    tracing::debug!(
        topic = %publication.topic,
        payload = %publication.payload,
        "Publishing"
    );
    let Publication { topic, payload } = publication;
    let queued = client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload);
    let sent = tokio::select! {
        () = shutdown.cancelled() => {
            tracing::debug!(topic = %topic, "Publication dropped on shutdown");
            return;
        }
        sent = queued => sent,
    };
    if let Err(e) = sent {
        tracing::warn!(topic = %topic, error = %e, "Publish failed");
    }
}

async fn process<T: BleTransport>(
    adapter: Arc<BridgeAdapter<T>>,
    client: AsyncClient,
    mut queue: mpsc::UnboundedReceiver<Job>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            () = shutdown.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let outcome = tokio::select! {
            () = shutdown.cancelled() => break,
            outcome = run_job(&adapter, &job) => outcome,
        };

        match outcome {
            Ok(publications) => {
                for publication in publications {
                    publish(&client, publication, &shutdown).await;
                }
            }
            Err(e) => tracing::warn!(job = ?job, error = %e, "Job dropped"),
        }
    }
}

async fn run_job<T: BleTransport>(
    adapter: &BridgeAdapter<T>,
    job: &Job,
) -> Result<Vec<Publication>> {
    match job {
        Job::Command { topic, payload } => adapter.handle_message(topic, payload).await,
        Job::Poll(device) => Ok(vec![adapter.poll(device).await?]),
        Job::Report(device) => Ok(vec![adapter.report(device).await?]),
    }
}

async fn heartbeat<T: BleTransport>(
    adapter: Arc<BridgeAdapter<T>>,
    client: AsyncClient,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(adapter.config().availability_interval);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                for publication in adapter.availability() {
                    publish(&client, publication, &shutdown).await;
                }
            }
        }
    }
}

/// Queues `job` for every paired device at each tick of `interval`.
async fn schedule<T: BleTransport>(
    adapter: Arc<BridgeAdapter<T>>,
    interval: Duration,
    job: fn(String) -> Job,
    queue: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                for device in adapter.registry().names() {
                    if queue.send(job(device.to_string())).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn flush_disconnect(event_loop: &mut EventLoop) {
    let flushed = tokio::time::timeout(SHUTDOWN_GRACE, async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if flushed.is_err() {
        tracing::debug!("Disconnect not flushed before shutdown");
    }
}
