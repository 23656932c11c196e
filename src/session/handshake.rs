// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pairing handshake.
//!
//! ```text
//! Disconnected -> Connected -> AuthChallengeSent -> Authenticated -> Ready
//!                                      |
//!                                      +-> Rejected
//! ```
//!
//! The reset code is written exactly once per connect. A rejected or
//! unacknowledged code ends in `Rejected`; the handshake never retries it,
//! as repeated attempts can lock the thermostat out of pairing. A failed
//! notification subscription leaves the link `Authenticated` and may be
//! retried once without repeating the exchange.

use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, timeout, timeout_at};

use super::{SessionConfig, SessionContext};
use crate::codec::{self, AuthAck, CharacteristicId};
use crate::error::{AuthError, ConnectError, TimeoutError, TransportError};
use crate::transport::{BleLink, BleTransport};
use crate::types::{DeviceIdentity, ResetCode};

/// Position of a link in the pairing handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// No link.
    Disconnected,
    /// Link established, not yet authenticated.
    Connected,
    /// Reset code written, waiting for the acknowledgement.
    AuthChallengeSent,
    /// Reset code accepted, subscriptions pending.
    Authenticated,
    /// Subscriptions in place; the link is usable.
    Ready,
    /// The device refused the reset code.
    Rejected,
}

impl HandshakeState {
    /// Returns true for states no further step can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Rejected | Self::Disconnected)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::AuthChallengeSent => "auth_challenge_sent",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A handshake in progress on one link.
#[derive(Debug)]
pub struct Handshake<L: BleLink> {
    identity: DeviceIdentity,
    link: L,
    state: HandshakeState,
    subscribed: Vec<CharacteristicId>,
    pending: Vec<CharacteristicId>,
    retry_used: bool,
}

impl<L: BleLink> Handshake<L> {
    /// Opens a link to the device.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError::Link` if the transport cannot reach the device.
    pub async fn begin<T>(transport: &T, identity: DeviceIdentity) -> Result<Self, ConnectError>
    where
        T: BleTransport<Link = L>,
    {
        tracing::debug!(address = %identity.address(), "Opening link");
        let link = transport
            .connect(identity.address())
            .await
            .map_err(ConnectError::Link)?;
        Ok(Self::on_link(link, identity))
    }

    /// Starts a handshake on an already established link.
    #[must_use]
    pub fn on_link(link: L, identity: DeviceIdentity) -> Self {
        Self {
            identity,
            link,
            state: HandshakeState::Connected,
            subscribed: Vec::new(),
            pending: Vec::new(),
            retry_used: false,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Writes the reset code and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// - `AuthError::Rejected` if the device refuses the code, answers with
    ///   no bytes, or does not answer within `ack_timeout`
    /// - `AuthError::LinkLost` if the link drops during the exchange
    /// - `AuthError::Transport` for any other transport failure
    /// - `AuthError::OutOfSequence` if not called from `Connected`
    pub async fn authenticate(
        &mut self,
        code: &ResetCode,
        ack_timeout: Duration,
    ) -> Result<(), AuthError> {
        self.expect(HandshakeState::Connected)?;
        let uuid = CharacteristicId::Authentication.uuid();

        if let Err(e) = self.link.write(uuid, code.as_bytes()).await {
            return Err(self.exchange_failed(e));
        }
        self.state = HandshakeState::AuthChallengeSent;
        tracing::debug!(address = %self.identity.address(), "Reset code sent");

        let ack = match timeout(ack_timeout, self.link.read(uuid)).await {
            Ok(Ok(bytes)) => codec::decode_auth_ack(&bytes),
            Ok(Err(e)) => return Err(self.exchange_failed(e)),
            Err(_) => {
                tracing::warn!(
                    address = %self.identity.address(),
                    timeout_ms = ack_timeout.as_millis(),
                    "No acknowledgement for reset code"
                );
                AuthAck::Missing
            }
        };

        match ack {
            AuthAck::Accepted => {
                self.state = HandshakeState::Authenticated;
                tracing::debug!(address = %self.identity.address(), "Reset code accepted");
                Ok(())
            }
            AuthAck::Refused(code) => {
                self.state = HandshakeState::Rejected;
                Err(AuthError::Rejected { code: Some(code) })
            }
            AuthAck::Missing => {
                self.state = HandshakeState::Rejected;
                Err(AuthError::Rejected { code: None })
            }
        }
    }

    /// Subscribes to notification characteristics.
    ///
    /// On failure the link stays `Authenticated` and the failed and remaining
    /// characteristics are kept for [`retry_subscription`](Self::retry_subscription).
    ///
    /// # Errors
    ///
    /// - `AuthError::SubscriptionFailed` if a subscription fails
    /// - `AuthError::LinkLost` if the link drops
    /// - `AuthError::OutOfSequence` if not called from `Authenticated`
    pub async fn subscribe(&mut self, ids: &[CharacteristicId]) -> Result<(), AuthError> {
        self.expect(HandshakeState::Authenticated)?;
        self.pending = ids.to_vec();
        self.subscribe_pending().await
    }

    /// Retries the subscriptions that failed, once.
    ///
    /// # Errors
    ///
    /// - `AuthError::RetryExhausted` if the retry was already used
    /// - otherwise the same errors as [`subscribe`](Self::subscribe)
    pub async fn retry_subscription(&mut self) -> Result<(), AuthError> {
        self.expect(HandshakeState::Authenticated)?;
        if self.retry_used {
            return Err(AuthError::RetryExhausted);
        }
        self.retry_used = true;
        tracing::debug!(
            address = %self.identity.address(),
            pending = self.pending.len(),
            "Retrying subscriptions"
        );
        self.subscribe_pending().await
    }

    async fn subscribe_pending(&mut self) -> Result<(), AuthError> {
        while let Some(&id) = self.pending.first() {
            match self.link.subscribe(id.uuid()).await {
                Ok(()) => {
                    self.pending.remove(0);
                    self.subscribed.push(id);
                }
                Err(TransportError::Disconnected) => {
                    self.state = HandshakeState::Disconnected;
                    return Err(AuthError::LinkLost);
                }
                Err(source) => {
                    tracing::warn!(
                        address = %self.identity.address(),
                        characteristic = %id,
                        error = %source,
                        "Subscription failed"
                    );
                    return Err(AuthError::SubscriptionFailed {
                        characteristic: id,
                        source,
                    });
                }
            }
        }
        self.state = HandshakeState::Ready;
        Ok(())
    }

    /// Converts a `Ready` handshake into a session context.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OutOfSequence` (and gives the handshake back) if
    /// the handshake is not `Ready`.
    pub fn into_context(self) -> Result<SessionContext<L>, (Self, AuthError)> {
        if self.state != HandshakeState::Ready {
            let err = AuthError::OutOfSequence(self.state);
            return Err((self, err));
        }
        Ok(SessionContext::new(self.identity, self.link, self.subscribed))
    }

    /// Abandons the handshake and releases the link.
    pub async fn abort(self, disconnect_timeout: Duration) {
        tracing::debug!(
            address = %self.identity.address(),
            state = %self.state,
            "Aborting handshake"
        );
        match timeout(disconnect_timeout, self.link.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(address = %self.identity.address(), error = %e, "Disconnect failed");
            }
            Err(_) => {
                tracing::warn!(address = %self.identity.address(), "Disconnect timed out");
            }
        }
    }

    fn expect(&self, state: HandshakeState) -> Result<(), AuthError> {
        if self.state == state {
            Ok(())
        } else {
            Err(AuthError::OutOfSequence(self.state))
        }
    }

    fn exchange_failed(&mut self, err: TransportError) -> AuthError {
        self.state = HandshakeState::Disconnected;
        match err {
            TransportError::Disconnected => AuthError::LinkLost,
            other => AuthError::Transport(other),
        }
    }

    async fn run(&mut self, code: &ResetCode, config: &SessionConfig) -> Result<(), AuthError> {
        self.authenticate(code, config.ack_timeout).await?;
        match self.subscribe(&config.subscriptions).await {
            Err(AuthError::SubscriptionFailed { .. }) => self.retry_subscription().await,
            other => other,
        }
    }
}

/// Runs the complete handshake within `deadline_after`.
///
/// On any failure the link is released before returning, so a failed
/// connect never leaves a half-open link behind.
///
/// # Errors
///
/// - `ConnectError::Link` if the link cannot be established
/// - `ConnectError::Auth` if authentication or subscription fails
/// - `ConnectError::Timeout` if the deadline expires
pub async fn perform<T: BleTransport>(
    transport: &T,
    identity: &DeviceIdentity,
    code: &ResetCode,
    config: &SessionConfig,
    deadline_after: Duration,
) -> Result<SessionContext<T::Link>, ConnectError> {
    let deadline = Instant::now() + deadline_after;
    let timed_out = || {
        ConnectError::Timeout(TimeoutError {
            operation: "connect",
            after: deadline_after,
        })
    };

    let mut handshake = timeout_at(deadline, Handshake::begin(transport, identity.clone()))
        .await
        .map_err(|_| timed_out())??;

    let outcome = timeout_at(deadline, handshake.run(code, config)).await;
    let err = match outcome {
        Ok(Ok(())) => match handshake.into_context() {
            Ok(context) => return Ok(context),
            Err((back, err)) => {
                handshake = back;
                ConnectError::Auth(err)
            }
        },
        Ok(Err(err)) => ConnectError::Auth(err),
        Err(_) => timed_out(),
    };

    handshake.abort(config.disconnect_timeout).await;
    Err(err)
}
