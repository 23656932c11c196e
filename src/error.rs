// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `ensto_lib` library.
//!
//! The hierarchy follows the layers of the bridge:
//!
//! - [`ValueError`]: constructing a constrained value type failed
//! - [`DecodeError`] / [`EncodeError`]: the characteristic codec refused bytes or a value
//! - [`TransportError`]: the BLE stack reported a failure
//! - [`AuthError`] / [`ConnectError`]: the pairing handshake did not reach `Ready`
//! - [`ReadError`] / [`WriteError`]: a session operation failed
//! - [`PairingError`] / [`PayloadError`] / [`ConfigError`]: bridge-side inputs were malformed
//!
//! Session and handshake failures always terminate the affected session. None
//! of them is retried by the library; retry policy belongs to the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::codec::{CharacteristicId, CharacteristicValue, LengthRule};
use crate::types::RawStatus;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Connecting or authenticating failed.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Reading a characteristic failed.
    #[error("read error: {0}")]
    Read(#[from] ReadError),

    /// Writing a characteristic failed.
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Loading a pairing record failed.
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// An MQTT payload could not be parsed or rendered.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// MQTT client operation failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The bridge configuration is incomplete or malformed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No pairing record exists for the addressed device.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

impl Error {
    /// Returns true if the failure is worth retrying with a fresh connection.
    ///
    /// Authentication rejections are never transient: retrying them risks a
    /// device-side pairing lockout.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect(err) => err.is_transient(),
            Self::Read(ReadError::Timeout(_) | ReadError::Transport(_))
            | Self::Write(WriteError::Timeout(_) | WriteError::Transport(_)) => true,
            _ => false,
        }
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i32,
        /// Maximum allowed value.
        max: i32,
        /// The actual value that was provided.
        actual: i32,
    },

    /// A floating point value was NaN or infinite.
    #[error("value is not a finite number")]
    NotFinite,

    /// A Bluetooth address could not be parsed.
    #[error("invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    /// A reset code did not have exactly four bytes.
    #[error("reset code must be 4 bytes, got {0}")]
    InvalidResetCode(usize),

    /// A time of day is outside `00:00..=24:00`.
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTime {
        /// Hour component.
        hour: u8,
        /// Minute component.
        minute: u8,
    },

    /// A schedule slot ends before it starts.
    #[error("schedule slot ends before it starts")]
    EmptySlot,

    /// An unknown mode name was provided.
    #[error("invalid mode: {0}")]
    InvalidMode(String),
}

/// Errors reported by the BLE transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device could not be reached.
    #[error("device {0} is unreachable")]
    Unreachable(String),

    /// The link dropped while an operation was outstanding.
    #[error("link disconnected")]
    Disconnected,

    /// The device does not expose the requested characteristic.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// Any other failure of the BLE stack.
    #[error("BLE operation failed: {0}")]
    Failed(String),
}

/// A blocking operation exceeded its caller-supplied timeout.
///
/// The session that timed out is torn down; a fresh connect is required.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{operation} timed out after {} ms", .after.as_millis())]
pub struct TimeoutError {
    /// The operation that timed out.
    pub operation: &'static str,
    /// The timeout that expired.
    pub after: Duration,
}

/// A request was cancelled by its caller.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("request cancelled")]
pub struct Cancelled;

/// Failures of the pairing handshake after the link is established.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The device refused the reset code or did not acknowledge it in time.
    #[error("device rejected the reset code (ack {code:?})")]
    Rejected {
        /// The acknowledgement code, if one was received.
        code: Option<u8>,
    },

    /// The link dropped during the reset-code exchange.
    #[error("link lost during authentication")]
    LinkLost,

    /// Subscribing to a notification characteristic failed.
    ///
    /// The link stays authenticated; one subscription-only retry is allowed.
    #[error("subscription to {characteristic} failed: {source}")]
    SubscriptionFailed {
        /// The characteristic that could not be subscribed to.
        characteristic: CharacteristicId,
        /// The transport failure.
        source: TransportError,
    },

    /// The single subscription retry was already spent.
    #[error("subscription retry already used")]
    RetryExhausted,

    /// The transport failed while writing the reset code.
    #[error("transport failure during authentication: {0}")]
    Transport(TransportError),

    /// A handshake step was invoked from the wrong state.
    #[error("handshake step not allowed in state {0}")]
    OutOfSequence(crate::session::HandshakeState),
}

/// Failures of [`SessionManager::connect`](crate::session::SessionManager::connect).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The BLE link could not be established.
    #[error("link failed: {0}")]
    Link(TransportError),

    /// The handshake did not reach `Ready`.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The connect deadline expired.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl ConnectError {
    /// Returns true for failures that a later attempt may not repeat.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Link(_) | Self::Timeout(_) | Self::Auth(AuthError::LinkLost)
        )
    }
}

/// Errors produced when decoding characteristic bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte count does not match the characteristic's layout.
    #[error("{characteristic}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// The characteristic being decoded.
        characteristic: CharacteristicId,
        /// The length rule of the characteristic.
        expected: LengthRule,
        /// The number of bytes received.
        actual: usize,
    },

    /// A field holds a value outside its documented range.
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// The decoded raw value.
        value: i32,
        /// Minimum allowed value.
        min: i32,
        /// Maximum allowed value.
        max: i32,
    },

    /// An enumerated code is not in the lookup table.
    ///
    /// The raw code is carried in `fallback` so callers can still log it.
    #[error("{characteristic}: unknown code {raw:#04x}")]
    UnknownVariant {
        /// The characteristic being decoded.
        characteristic: CharacteristicId,
        /// The unrecognized code.
        raw: u8,
        /// The raw code as an uninterpreted status value.
        fallback: RawStatus,
    },

    /// The characteristic carries no decodable value.
    #[error("{0} has no value encoding")]
    Unsupported(CharacteristicId),
}

impl DecodeError {
    /// Returns the raw fallback value for an unknown enumeration code.
    #[must_use]
    pub fn fallback(&self) -> Option<CharacteristicValue> {
        match self {
            Self::UnknownVariant { fallback, .. } => {
                Some(CharacteristicValue::RawStatus(*fallback))
            }
            _ => None,
        }
    }
}

/// Errors produced when encoding a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A field is outside the range the device accepts.
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// The rejected value.
        value: i32,
        /// Minimum allowed value.
        min: i32,
        /// Maximum allowed value.
        max: i32,
    },
}

/// Errors produced while reassembling a multi-packet read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// The device returned an empty packet.
    #[error("empty packet at index {0}")]
    EmptyPacket(usize),

    /// The device never flagged a final packet.
    #[error("no final packet after {0} packets")]
    TooManyPackets(usize),
}

/// Failures of [`SessionManager::read`](crate::session::SessionManager::read).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The handle is closed, timed out, cancelled or lost its link.
    #[error("session is not connected")]
    NotConnected,

    /// The characteristic cannot be read.
    #[error("{0} is not readable")]
    NotReadable(CharacteristicId),

    /// The bytes could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A multi-packet read could not be reassembled.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// The transport failed; the session was terminated.
    #[error("transport failure: {0}")]
    Transport(TransportError),

    /// The read timed out; the session was terminated.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The read was cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Failures of [`SessionManager::write`](crate::session::SessionManager::write).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The handle is closed, timed out, cancelled or lost its link.
    #[error("session is not connected")]
    NotConnected,

    /// The characteristic cannot be written.
    #[error("{0} is not writable")]
    NotWritable(CharacteristicId),

    /// The value could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The device reported that it did not accept the write.
    #[error("{characteristic} write rejected by device (status {status})")]
    Rejected {
        /// The characteristic that was written.
        characteristic: CharacteristicId,
        /// The status read back from the device.
        status: RawStatus,
    },

    /// The confirmation status could not be decoded.
    #[error("unreadable confirmation: {0}")]
    Confirmation(DecodeError),

    /// The transport failed; the session was terminated.
    #[error("transport failure: {0}")]
    Transport(TransportError),

    /// The write timed out; the session was terminated.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The write was cancelled.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Errors loading pairing records.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The pairing file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// The file or directory.
        path: PathBuf,
        /// The I/O failure.
        source: std::io::Error,
    },

    /// The pairing file is not valid JSON.
    #[error("cannot parse {}: {source}", .path.display())]
    Json {
        /// The file.
        path: PathBuf,
        /// The JSON failure.
        source: serde_json::Error,
    },

    /// The file name does not carry a Bluetooth address.
    #[error("file name {0} does not contain a device address")]
    InvalidFileName(String),

    /// A field of the pairing record is invalid.
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Errors parsing or rendering MQTT payloads.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not valid JSON for the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A field value is invalid.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The topic is not a command topic of this bridge.
    #[error("unexpected topic: {0}")]
    UnexpectedTopic(String),

    /// The value has no MQTT representation.
    #[error("{0} has no payload representation")]
    Unsupported(CharacteristicId),
}

/// Errors building a bridge configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set to something unusable.
    #[error("{var} has invalid value {value:?}")]
    Invalid {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
