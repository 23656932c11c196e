// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the session manager.

mod common;

use std::time::Duration;

use common::{CODE, FakeDevice, FakeTransport, WRONG_CODE, identity};
use ensto_lib::codec::{CharacteristicId, CharacteristicValue};
use ensto_lib::error::{
    ConnectError, DecodeError, ReadError, SegmentError, TransportError, WriteError,
};
use ensto_lib::event::SessionEvent;
use ensto_lib::session::{HandleState, SessionConfig, SessionHandle, SessionManager};
use ensto_lib::types::{
    BleAddress, BoostOffset, BoostSettings, DeviceIdentity, Mode, RawStatus, Temperature,
};
use tokio_util::sync::CancellationToken;

const CONNECT: Duration = Duration::from_secs(30);
const OP: Duration = Duration::from_secs(5);

type Handle = SessionHandle<common::FakeLink>;

async fn open(device: &FakeDevice) -> (SessionManager<FakeTransport>, Handle) {
    let manager = SessionManager::new(device.transport());
    let handle = manager.connect(&identity(), &CODE, CONNECT).await.unwrap();
    (manager, handle)
}

fn thermostat() -> FakeDevice {
    let device = FakeDevice::new();
    device.set_value(CharacteristicId::TargetTemperature, &[0xD7, 0x00]);
    device.set_value(CharacteristicId::Mode, &[0x01]);
    device
}

// ============================================================================
// Connect / close
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn connect_publishes_event() {
        let device = thermostat();
        let manager = SessionManager::new(device.transport());
        let mut events = manager.subscribe();

        let handle = manager.connect(&identity(), &CODE, CONNECT).await.unwrap();

        assert!(handle.is_open());
        assert_eq!(handle.identity(), &identity());
        match events.recv().await.unwrap() {
            SessionEvent::Connected { session, address } => {
                assert_eq!(session, handle.id());
                assert_eq!(address, identity().address());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn device_subscription_skips_other_thermostats() {
        let device = thermostat();
        let manager = SessionManager::new(device.transport());
        let mut living_room = manager.subscribe_device(identity().address());
        let hall = DeviceIdentity::new(BleAddress::new([0x90, 0xFD, 0x9F, 0, 0, 9]), "Hall");

        let other = manager.connect(&hall, &CODE, CONNECT).await.unwrap();
        manager.close(&other).await;
        let handle = manager.connect(&identity(), &CODE, CONNECT).await.unwrap();
        manager.close(&handle).await;

        assert_eq!(living_room.address(), identity().address());
        assert_eq!(
            living_room.recv().await,
            Some(SessionEvent::Connected {
                session: handle.id(),
                address: identity().address(),
            })
        );
        assert_eq!(
            living_room.recv().await,
            Some(SessionEvent::Disconnected {
                session: handle.id(),
                address: identity().address(),
                reason: HandleState::Closed,
            })
        );
    }

    #[tokio::test]
    async fn rejected_connect_publishes_event_and_releases_link() {
        let device = thermostat();
        let manager = SessionManager::new(device.transport());
        let mut events = manager.subscribe();

        let err = manager
            .connect(&identity(), &WRONG_CODE, CONNECT)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::Auth(_)));
        assert!(!err.is_transient());
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Rejected {
                code: Some(0xFF),
                ..
            }
        ));
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;
        let mut events = manager.subscribe();

        manager.close(&handle).await;
        manager.close(&handle).await;

        assert_eq!(handle.state(), HandleState::Closed);
        assert_eq!(device.disconnects(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Disconnected {
                reason: HandleState::Closed,
                ..
            }
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_handle_is_not_connected() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;
        manager.close(&handle).await;

        let err = manager
            .read(&handle, CharacteristicId::TargetTemperature, OP)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::NotConnected));

        let value = CharacteristicValue::Temperature(Temperature::from_tenths(200));
        let err = manager.write(&handle, &value, OP).await.unwrap_err();
        assert!(matches!(err, WriteError::NotConnected));
    }

    #[tokio::test]
    async fn clones_share_the_session() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;
        let other = handle.clone();

        manager.close(&other).await;

        assert!(!handle.is_open());
        assert_eq!(handle.id(), other.id());
    }
}

// ============================================================================
// Read
// ============================================================================

mod read {
    use super::*;

    #[tokio::test]
    async fn decodes_target_temperature() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;

        let value = manager
            .read(&handle, CharacteristicId::TargetTemperature, OP)
            .await
            .unwrap();

        assert_eq!(
            value,
            CharacteristicValue::Temperature(Temperature::from_tenths(215))
        );
    }

    #[tokio::test]
    async fn write_only_characteristic_is_not_readable() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;

        let err = manager
            .read(&handle, CharacteristicId::ScheduleEntry, OP)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReadError::NotReadable(CharacteristicId::ScheduleEntry)
        ));
        assert_eq!(device.reads_of(CharacteristicId::ScheduleEntry), 0);
    }

    #[tokio::test]
    async fn decode_error_keeps_the_session() {
        let device = thermostat();
        device.set_value(CharacteristicId::TargetTemperature, &[0xD7, 0x00, 0x00]);
        let (manager, handle) = open(&device).await;

        let err = manager
            .read(&handle, CharacteristicId::TargetTemperature, OP)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReadError::Decode(DecodeError::LengthMismatch { actual: 3, .. })
        ));
        assert!(handle.is_open());
        assert!(
            manager
                .read(&handle, CharacteristicId::Mode, OP)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn transport_failure_ends_the_session() {
        let device = thermostat();
        device.queue_reads(CharacteristicId::Mode, [Err(TransportError::Disconnected)]);
        let (manager, handle) = open(&device).await;

        let err = manager
            .read(&handle, CharacteristicId::Mode, OP)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReadError::Transport(TransportError::Disconnected)
        ));
        assert_eq!(handle.state(), HandleState::LinkLost);
        assert_eq!(device.disconnects(), 1);
        assert!(matches!(
            manager.read(&handle, CharacteristicId::Mode, OP).await,
            Err(ReadError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn power_history_is_reassembled() {
        let device = thermostat();
        device.queue_reads(CharacteristicId::PowerHistory, [
            Ok(vec![0x00, 10, 15, 3, 24]),
            Ok(vec![0x00, 1, 50]),
            Ok(vec![0x40, 2, 75]),
        ]);
        let (manager, handle) = open(&device).await;

        let value = manager
            .read(&handle, CharacteristicId::PowerHistory, OP)
            .await
            .unwrap();

        let CharacteristicValue::PowerHistory(history) = value else {
            panic!("expected power history, got {value:?}");
        };
        assert_eq!(history.samples().len(), 2);
        assert_eq!(device.reads_of(CharacteristicId::PowerHistory), 3);
    }

    #[tokio::test]
    async fn repeated_final_packet_is_dropped() {
        let device = thermostat();
        device.queue_reads(CharacteristicId::PowerHistory, [
            Ok(vec![0x40, 10, 15, 3, 24, 1, 50]),
            Ok(vec![0x40, 10, 15, 3, 24, 1, 50]),
        ]);
        let (manager, handle) = open(&device).await;

        let value = manager
            .read_segmented(&handle, CharacteristicId::PowerHistory, OP)
            .await
            .unwrap();

        let CharacteristicValue::PowerHistory(history) = value else {
            panic!("expected power history");
        };
        assert_eq!(history.samples().len(), 1);
        assert_eq!(device.reads_of(CharacteristicId::PowerHistory), 2);
    }

    #[tokio::test]
    async fn unterminated_transfer_ends_the_session() {
        let device = thermostat();
        device.queue_reads(CharacteristicId::PowerHistory, [
            Ok(vec![0x00, 10, 15, 3, 24]),
            Ok(vec![0x00, 1, 50]),
            Ok(vec![0x00, 2, 75]),
            Ok(vec![0x40, 3, 90]),
        ]);
        let manager = SessionManager::with_config(
            device.transport(),
            SessionConfig::new().with_max_segments(3),
        );
        let handle = manager.connect(&identity(), &CODE, CONNECT).await.unwrap();
        let mut events = manager.subscribe();

        let err = manager
            .read(&handle, CharacteristicId::PowerHistory, OP)
            .await
            .unwrap_err();

        assert_eq!(err, ReadError::Segment(SegmentError::TooManyPackets(3)));
        assert_eq!(handle.state(), HandleState::LinkLost);
        assert_eq!(device.disconnects(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Disconnected {
                reason: HandleState::LinkLost,
                ..
            }
        ));

        // The leftover final packet must not be read as the start of a new transfer
        assert!(matches!(
            manager.read(&handle, CharacteristicId::PowerHistory, OP).await,
            Err(ReadError::NotConnected)
        ));
        assert_eq!(device.reads_of(CharacteristicId::PowerHistory), 3);
    }
}

// ============================================================================
// Write
// ============================================================================

mod write {
    use super::*;

    #[tokio::test]
    async fn confirmed_write_reads_status() {
        let device = thermostat();
        device.set_status(RawStatus::HEATING);
        let (manager, handle) = open(&device).await;

        let value = CharacteristicValue::Temperature(Temperature::from_tenths(215));
        let ack = manager.write(&handle, &value, OP).await.unwrap();

        assert_eq!(ack.characteristic, CharacteristicId::TargetTemperature);
        assert_eq!(ack.status, Some(RawStatus::from_bits(RawStatus::HEATING)));
        assert_eq!(
            device.writes_to(CharacteristicId::TargetTemperature),
            vec![vec![0xD7, 0x00]]
        );
        assert_eq!(device.reads_of(CharacteristicId::Status), 1);
    }

    #[tokio::test]
    async fn rejected_write_is_not_retried() {
        let device = thermostat();
        device.set_status(RawStatus::WRITE_REJECTED);
        let (manager, handle) = open(&device).await;

        let value = CharacteristicValue::Mode(Mode::Schedule);
        let err = manager.write(&handle, &value, OP).await.unwrap_err();

        assert!(matches!(
            err,
            WriteError::Rejected {
                characteristic: CharacteristicId::Mode,
                ..
            }
        ));
        assert_eq!(device.writes_to(CharacteristicId::Mode).len(), 1);
        assert!(handle.is_open());
    }

    #[tokio::test]
    async fn unconfirmed_write_returns_without_status() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;

        let boost = BoostSettings::enable(BoostOffset::from_hundredths(200), 30);
        let ack = manager
            .write(&handle, &CharacteristicValue::Boost(boost), OP)
            .await
            .unwrap();

        assert_eq!(ack.status, None);
        assert_eq!(device.reads_of(CharacteristicId::Status), 0);
    }

    #[tokio::test]
    async fn read_only_characteristic_is_not_writable() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;

        let value = CharacteristicValue::RawStatus(RawStatus::from_bits(0));
        let err = manager.write(&handle, &value, OP).await.unwrap_err();

        assert!(matches!(
            err,
            WriteError::NotWritable(CharacteristicId::Status)
        ));
    }

    #[tokio::test]
    async fn out_of_range_value_is_not_sent() {
        let device = thermostat();
        let (manager, handle) = open(&device).await;

        let value = CharacteristicValue::Temperature(Temperature::from_tenths(400));
        let err = manager.write(&handle, &value, OP).await.unwrap_err();

        assert!(matches!(err, WriteError::Encode(_)));
        assert!(device.writes_to(CharacteristicId::TargetTemperature).is_empty());
        assert!(handle.is_open());
    }
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

mod deadlines {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_invalidates_the_handle() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::TargetTemperature, Duration::from_secs(60));
        let (manager, handle) = open(&device).await;

        let err = manager
            .read(&handle, CharacteristicId::TargetTemperature, OP)
            .await
            .unwrap_err();

        assert!(matches!(err, ReadError::Timeout(_)));
        assert_eq!(handle.state(), HandleState::TimedOut);
        assert_eq!(device.disconnects(), 1);

        let err = manager
            .read(&handle, CharacteristicId::Mode, OP)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn write_timeout_invalidates_the_handle() {
        let device = thermostat();
        device.delay_writes(CharacteristicId::Mode, Duration::from_secs(60));
        let (manager, handle) = open(&device).await;

        let err = manager
            .write(&handle, &CharacteristicValue::Mode(Mode::Off), OP)
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Timeout(_)));
        assert!(matches!(
            manager
                .write(&handle, &CharacteristicValue::Mode(Mode::Off), OP)
                .await,
            Err(WriteError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_served_in_order() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::TargetTemperature, Duration::from_secs(2));
        let (manager, handle) = open(&device).await;

        let (first, second) = tokio::join!(
            manager.read(&handle, CharacteristicId::TargetTemperature, OP),
            manager.read(&handle, CharacteristicId::Mode, OP),
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap(), CharacteristicValue::Mode(Mode::Heat));
        let order: Vec<_> = device
            .read_log()
            .into_iter()
            .filter(|id| *id != CharacteristicId::Authentication)
            .collect();
        assert_eq!(order, [CharacteristicId::TargetTemperature, CharacteristicId::Mode]);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_while_queued_poisons_the_handle() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::TargetTemperature, Duration::from_secs(10));
        let (manager, handle) = open(&device).await;

        let (first, second) = tokio::join!(
            manager.read(&handle, CharacteristicId::TargetTemperature, Duration::from_secs(30)),
            manager.read(&handle, CharacteristicId::Mode, Duration::from_secs(1)),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(ReadError::Timeout(_))));
        assert_eq!(device.reads_of(CharacteristicId::Mode), 0);
        assert_eq!(handle.state(), HandleState::TimedOut);

        assert!(matches!(
            manager.read(&handle, CharacteristicId::Mode, OP).await,
            Err(ReadError::NotConnected)
        ));
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn link_is_released_once_the_request_ahead_finishes() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::TargetTemperature, Duration::from_secs(10));
        let (manager, handle) = open(&device).await;
        let mut events = manager.subscribe();

        let (first, second) = tokio::join!(
            manager.read(&handle, CharacteristicId::TargetTemperature, Duration::from_secs(30)),
            manager.read(&handle, CharacteristicId::Mode, Duration::from_secs(1)),
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(ReadError::Timeout(_))));
        // No further request is needed to free the radio
        assert_eq!(device.disconnects(), 1);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Disconnected {
                reason: HandleState::TimedOut,
                ..
            }
        ));

        manager.close(&handle).await;
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_queued_leaves_the_handle_open() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::TargetTemperature, Duration::from_secs(10));
        let (manager, handle) = open(&device).await;
        let token = CancellationToken::new();

        let (first, second, ()) = tokio::join!(
            manager.read(&handle, CharacteristicId::TargetTemperature, Duration::from_secs(30)),
            manager.read_with_cancel(
                &handle,
                CharacteristicId::Mode,
                Duration::from_secs(30),
                &token
            ),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            },
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(ReadError::Cancelled(_))));
        assert!(handle.is_open());
        assert_eq!(device.disconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_flight_ends_the_session() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::Mode, Duration::from_secs(10));
        let (manager, handle) = open(&device).await;
        let token = CancellationToken::new();

        let (result, ()) = tokio::join!(
            manager.read_with_cancel(
                &handle,
                CharacteristicId::Mode,
                Duration::from_secs(30),
                &token
            ),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            },
        );

        assert!(matches!(result, Err(ReadError::Cancelled(_))));
        assert_eq!(handle.state(), HandleState::Cancelled);
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_poisons_the_handle() {
        let device = thermostat();
        device.delay_reads(CharacteristicId::Mode, Duration::from_secs(10));
        let (manager, handle) = open(&device).await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            manager.read(&handle, CharacteristicId::Mode, Duration::from_secs(30)),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(handle.state(), HandleState::Cancelled);
        assert!(matches!(
            manager.read(&handle, CharacteristicId::TargetTemperature, OP).await,
            Err(ReadError::NotConnected)
        ));
        assert_eq!(device.disconnects(), 1);
    }
}
