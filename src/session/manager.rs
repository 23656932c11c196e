// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::handle::Ticket;
use super::{HandleState, SessionConfig, SessionHandle, handshake};
use crate::codec::segmented::{Progress, Reassembler};
use crate::codec::{self, CharacteristicId, CharacteristicSpec, CharacteristicValue};
use crate::error::{
    AuthError, Cancelled, ConnectError, ReadError, TimeoutError, TransportError, WriteError,
};
use crate::event::{DeviceEvents, EventBus, SessionEvent};
use crate::transport::{BleLink, BleTransport};
use crate::types::{BleAddress, DeviceIdentity, RawStatus, ResetCode};

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    /// The characteristic that was written.
    pub characteristic: CharacteristicId,
    /// The status read back, for characteristics that confirm writes.
    pub status: Option<RawStatus>,
}

/// Outcome of a guarded transport operation.
enum Io<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// Why a request could not take its turn in the queue.
enum Acquire {
    NotConnected,
    Timeout(TimeoutError),
    Cancelled,
}

impl From<Acquire> for ReadError {
    fn from(value: Acquire) -> Self {
        match value {
            Acquire::NotConnected => Self::NotConnected,
            Acquire::Timeout(e) => Self::Timeout(e),
            Acquire::Cancelled => Self::Cancelled(Cancelled),
        }
    }
}

impl From<Acquire> for WriteError {
    fn from(value: Acquire) -> Self {
        match value {
            Acquire::NotConnected => Self::NotConnected,
            Acquire::Timeout(e) => Self::Timeout(e),
            Acquire::Cancelled => Self::Cancelled(Cancelled),
        }
    }
}

/// Races `fut` against the deadline and the cancellation token.
async fn guard<F: Future>(
    deadline: Instant,
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Io<F::Output> {
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        biased;
        () = cancelled => Io::Cancelled,
        result = timeout_at(deadline, fut) => match result {
            Ok(output) => Io::Done(output),
            Err(_) => Io::TimedOut,
        },
    }
}

async fn read_bytes<L: BleLink>(
    link: &L,
    uuid: Uuid,
    segmented: bool,
    max_segments: usize,
) -> Result<Vec<u8>, ReadError> {
    if !segmented {
        return link.read(uuid).await.map_err(ReadError::Transport);
    }
    let mut reassembler = Reassembler::new(max_segments);
    loop {
        let packet = link.read(uuid).await.map_err(ReadError::Transport)?;
        if reassembler.push(&packet)? == Progress::Complete {
            return Ok(reassembler.into_payload());
        }
    }
}

async fn write_bytes<L: BleLink>(
    link: &L,
    spec: &CharacteristicSpec,
    bytes: &[u8],
) -> Result<Option<Vec<u8>>, TransportError> {
    link.write(spec.uuid, bytes).await?;
    if spec.confirm_write {
        let status = link.read(CharacteristicId::Status.uuid()).await?;
        Ok(Some(status))
    } else {
        Ok(None)
    }
}

fn confirm(id: CharacteristicId, raw: &[u8]) -> Result<Ack, WriteError> {
    let status = codec::decode_status(raw).map_err(WriteError::Confirmation)?;
    if status.is_write_rejected() {
        tracing::warn!(characteristic = %id, status = %status, "Write rejected");
        return Err(WriteError::Rejected {
            characteristic: id,
            status,
        });
    }
    tracing::debug!(characteristic = %id, status = %status, "Written and confirmed");
    Ok(Ack {
        characteristic: id,
        status: Some(status),
    })
}

/// Owns connections to thermostats and serializes access to them.
///
/// Every operation that touches the radio takes a timeout. When it expires
/// the link is released and the handle becomes unusable; the caller must
/// [`connect`](Self::connect) again. No operation is retried internally.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use ensto_lib::codec::CharacteristicId;
/// use ensto_lib::session::SessionManager;
///
/// let manager = SessionManager::new(transport);
/// let handle = manager.connect(&identity, &reset_code, Duration::from_secs(30)).await?;
/// let value = manager
///     .read(&handle, CharacteristicId::RealTimeIndication, Duration::from_secs(5))
///     .await?;
/// manager.close(&handle).await;
/// ```
#[derive(Debug)]
pub struct SessionManager<T: BleTransport> {
    transport: T,
    config: SessionConfig,
    events: EventBus,
}

impl<T: BleTransport> SessionManager<T> {
    /// Creates a manager with default configuration.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Creates a manager with the given configuration.
    #[must_use]
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            events: EventBus::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Subscribes to the session events of one thermostat.
    #[must_use]
    pub fn subscribe_device(&self, address: BleAddress) -> DeviceEvents {
        self.events.subscribe_device(address)
    }

    // ========================================================================
    // Connect / close
    // ========================================================================

    /// Connects and pairs with a thermostat.
    ///
    /// On failure the link is released before this returns.
    ///
    /// # Errors
    ///
    /// - `ConnectError::Link` if the device cannot be reached
    /// - `ConnectError::Auth` if the handshake fails
    /// - `ConnectError::Timeout` if `timeout` expires first
    pub async fn connect(
        &self,
        identity: &DeviceIdentity,
        code: &ResetCode,
        timeout: Duration,
    ) -> Result<SessionHandle<T::Link>, ConnectError> {
        tracing::info!(address = %identity.address(), name = identity.name(), "Connecting");

        match handshake::perform(&self.transport, identity, code, &self.config, timeout).await {
            Ok(context) => {
                let handle = SessionHandle::new(context);
                tracing::info!(
                    address = %identity.address(),
                    session = %handle.id(),
                    "Session ready"
                );
                self.events.publish(SessionEvent::Connected {
                    session: handle.id(),
                    address: identity.address(),
                });
                Ok(handle)
            }
            Err(err) => {
                if let ConnectError::Auth(AuthError::Rejected { code }) = &err {
                    self.events.publish(SessionEvent::Rejected {
                        address: identity.address(),
                        code: *code,
                    });
                }
                tracing::warn!(address = %identity.address(), error = %err, "Connect failed");
                Err(err)
            }
        }
    }

    /// Closes a session and releases its link.
    ///
    /// Waits for the request in flight, if any. Closing an already closed
    /// handle does nothing.
    pub async fn close(&self, handle: &SessionHandle<T::Link>) {
        let reason = handle.mark(HandleState::Closed);
        let mut ticket = handle.lock().await;
        self.teardown(handle, &mut ticket, reason).await;
        handle.force(HandleState::Closed);
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Reads and decodes a characteristic.
    ///
    /// Characteristics flagged as segmented in the table are reassembled
    /// from several packets.
    ///
    /// # Errors
    ///
    /// - `ReadError::NotConnected` if the handle is no longer open
    /// - `ReadError::NotReadable` for write-only characteristics
    /// - `ReadError::Decode` if the bytes are invalid; the session stays open
    /// - `ReadError::Transport`, `ReadError::Segment` or `ReadError::Timeout`;
    ///   the session is closed
    pub async fn read(
        &self,
        handle: &SessionHandle<T::Link>,
        id: CharacteristicId,
        timeout: Duration,
    ) -> Result<CharacteristicValue, ReadError> {
        self.read_inner(handle, id, timeout, None, id.spec().segmented)
            .await
    }

    /// Like [`read`](Self::read), but gives up when `cancel` fires.
    ///
    /// Cancelling while queued leaves the session open. Cancelling while the
    /// read is in flight closes it.
    ///
    /// # Errors
    ///
    /// As for [`read`](Self::read), plus `ReadError::Cancelled`.
    pub async fn read_with_cancel(
        &self,
        handle: &SessionHandle<T::Link>,
        id: CharacteristicId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CharacteristicValue, ReadError> {
        self.read_inner(handle, id, timeout, Some(cancel), id.spec().segmented)
            .await
    }

    /// Reads a characteristic as a multi-packet transfer and decodes the
    /// reassembled payload.
    ///
    /// # Errors
    ///
    /// As for [`read`](Self::read). `ReadError::Segment` means the packets
    /// could not be reassembled and the session was closed.
    pub async fn read_segmented(
        &self,
        handle: &SessionHandle<T::Link>,
        id: CharacteristicId,
        timeout: Duration,
    ) -> Result<CharacteristicValue, ReadError> {
        self.read_inner(handle, id, timeout, None, true).await
    }

    async fn read_inner(
        &self,
        handle: &SessionHandle<T::Link>,
        id: CharacteristicId,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
        segmented: bool,
    ) -> Result<CharacteristicValue, ReadError> {
        let spec = id.spec();
        if !spec.readable {
            return Err(ReadError::NotReadable(id));
        }

        let deadline = Instant::now() + timeout;
        let timeout_err = TimeoutError {
            operation: "read",
            after: timeout,
        };
        let mut ticket = self.acquire(handle, deadline, timeout_err, cancel).await?;

        ticket.in_flight = true;
        let io = match ticket.context() {
            Some(ctx) => {
                let link = ctx.link();
                guard(
                    deadline,
                    cancel,
                    read_bytes(link, spec.uuid, segmented, self.config.max_segments),
                )
                .await
            }
            None => Io::Done(Err(ReadError::NotConnected)),
        };
        ticket.in_flight = false;

        let result = match io {
            Io::Done(Ok(bytes)) => {
                tracing::debug!(characteristic = %id, len = bytes.len(), "Read");
                codec::decode(id, &bytes).map_err(|e| {
                    tracing::debug!(characteristic = %id, error = %e, "Decode failed");
                    ReadError::Decode(e)
                })
            }
            Io::Done(Err(ReadError::Transport(e))) => {
                self.teardown(handle, &mut ticket, HandleState::LinkLost).await;
                Err(ReadError::Transport(e))
            }
            Io::Done(Err(ReadError::Segment(e))) => {
                // The device is mid-transfer; the next read would resume it
                tracing::warn!(characteristic = %id, error = %e, "Reassembly failed");
                self.teardown(handle, &mut ticket, HandleState::LinkLost).await;
                Err(ReadError::Segment(e))
            }
            Io::Done(Err(e)) => Err(e),
            Io::TimedOut => {
                self.teardown(handle, &mut ticket, HandleState::TimedOut).await;
                Err(ReadError::Timeout(timeout_err))
            }
            Io::Cancelled => {
                self.teardown(handle, &mut ticket, HandleState::Cancelled).await;
                Err(ReadError::Cancelled(Cancelled))
            }
        };
        self.settle(handle, &mut ticket).await;
        result
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Encodes and writes a value.
    ///
    /// For characteristics that require confirmation, the status is read back
    /// and a set `WRITE_REJECTED` flag fails the write. Rejected writes are
    /// not retried.
    ///
    /// # Errors
    ///
    /// - `WriteError::NotConnected` if the handle is no longer open
    /// - `WriteError::NotWritable` for read-only characteristics
    /// - `WriteError::Encode` if the value is out of range
    /// - `WriteError::Rejected` if the device refused the value
    /// - `WriteError::Transport` or `WriteError::Timeout`; the session is closed
    pub async fn write(
        &self,
        handle: &SessionHandle<T::Link>,
        value: &CharacteristicValue,
        timeout: Duration,
    ) -> Result<Ack, WriteError> {
        self.write_inner(handle, value, timeout, None).await
    }

    /// Like [`write`](Self::write), but gives up when `cancel` fires.
    ///
    /// # Errors
    ///
    /// As for [`write`](Self::write), plus `WriteError::Cancelled`.
    pub async fn write_with_cancel(
        &self,
        handle: &SessionHandle<T::Link>,
        value: &CharacteristicValue,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Ack, WriteError> {
        self.write_inner(handle, value, timeout, Some(cancel)).await
    }

    async fn write_inner(
        &self,
        handle: &SessionHandle<T::Link>,
        value: &CharacteristicValue,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Ack, WriteError> {
        let id = value.characteristic();
        let spec = id.spec();
        if !spec.writable {
            return Err(WriteError::NotWritable(id));
        }
        let bytes = codec::encode(value)?;

        let deadline = Instant::now() + timeout;
        let timeout_err = TimeoutError {
            operation: "write",
            after: timeout,
        };
        let mut ticket = self.acquire(handle, deadline, timeout_err, cancel).await?;

        ticket.in_flight = true;
        let io = match ticket.context() {
            Some(ctx) => guard(deadline, cancel, write_bytes(ctx.link(), spec, &bytes)).await,
            None => Io::Done(Err(TransportError::Disconnected)),
        };
        ticket.in_flight = false;

        let result = match io {
            Io::Done(Ok(None)) => {
                tracing::debug!(characteristic = %id, "Written");
                Ok(Ack {
                    characteristic: id,
                    status: None,
                })
            }
            Io::Done(Ok(Some(raw))) => confirm(id, &raw),
            Io::Done(Err(e)) => {
                self.teardown(handle, &mut ticket, HandleState::LinkLost).await;
                Err(WriteError::Transport(e))
            }
            Io::TimedOut => {
                self.teardown(handle, &mut ticket, HandleState::TimedOut).await;
                Err(WriteError::Timeout(timeout_err))
            }
            Io::Cancelled => {
                self.teardown(handle, &mut ticket, HandleState::Cancelled).await;
                Err(WriteError::Cancelled(Cancelled))
            }
        };
        self.settle(handle, &mut ticket).await;
        result
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Waits for the handle's turn and checks that it is still usable.
    async fn acquire<'h>(
        &self,
        handle: &'h SessionHandle<T::Link>,
        deadline: Instant,
        timeout_err: TimeoutError,
        cancel: Option<&CancellationToken>,
    ) -> Result<Ticket<'h, T::Link>, Acquire> {
        let mut ticket = match guard(deadline, cancel, handle.lock()).await {
            Io::Done(ticket) => ticket,
            Io::TimedOut => {
                handle.mark(HandleState::TimedOut);
                tracing::warn!(
                    session = %handle.id(),
                    operation = timeout_err.operation,
                    "Timed out while queued"
                );
                // Otherwise the holder releases the link when its request settles
                if let Some(mut ticket) = handle.try_lock() {
                    self.teardown(handle, &mut ticket, HandleState::TimedOut).await;
                }
                return Err(Acquire::Timeout(timeout_err));
            }
            Io::Cancelled => return Err(Acquire::Cancelled),
        };

        let state = handle.state();
        if state != HandleState::Open {
            self.teardown(handle, &mut ticket, state).await;
            return Err(Acquire::NotConnected);
        }
        if ticket.context().is_none() {
            return Err(Acquire::NotConnected);
        }
        Ok(ticket)
    }

    /// Releases the link if the handle was invalidated while the request ran.
    async fn settle(&self, handle: &SessionHandle<T::Link>, ticket: &mut Ticket<'_, T::Link>) {
        let state = handle.state();
        if state != HandleState::Open {
            self.teardown(handle, ticket, state).await;
        }
    }

    /// Marks the handle and releases its link, once.
    async fn teardown(
        &self,
        handle: &SessionHandle<T::Link>,
        ticket: &mut Ticket<'_, T::Link>,
        reason: HandleState,
    ) {
        let reason = handle.mark(reason);
        let Some(context) = ticket.take() else {
            return;
        };
        tracing::info!(
            address = %handle.identity().address(),
            session = %handle.id(),
            reason = %reason,
            "Session ended"
        );
        self.events.publish(SessionEvent::Disconnected {
            session: handle.id(),
            address: handle.identity().address(),
            reason,
        });
        context.release(self.config.disconnect_timeout).await;
    }
}
