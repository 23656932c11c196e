// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the bridge adapter.

mod common;

use std::fs;
use std::time::Duration;

use common::{FakeDevice, FakeTransport};
use ensto_lib::Error;
use ensto_lib::bridge::{BridgeAdapter, BridgeConfig, PairingRegistry, Publication, RetryPolicy};
use ensto_lib::codec::{CharacteristicId, CharacteristicValue};
use ensto_lib::error::{AuthError, ConnectError, PayloadError, TransportError};
use ensto_lib::session::SessionManager;
use ensto_lib::types::{Mode, RawStatus};
use serde_json::{Value, json};
use tempfile::TempDir;

const PAIRING: &str = r#"{"resetCode": [18, 52, 86, 120], "deviceName": "Living Room"}"#;

/// Live readings: target 21.5, room 20.5, floor -1.5, relay on.
const REAL_TIME: [u8; 21] = [
    0x01, 0xD7, 0x00, 50, 0xCD, 0x00, 0xF1, 0xFF, 1, 0, 0, 0, 0, 1, 0, 0, 60, 0, 0, 0, 0,
];

fn pairing_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pairing-90FD9F010203.json"), PAIRING).unwrap();
    dir
}

fn config(dir: &TempDir) -> BridgeConfig {
    BridgeConfig::new("127.0.0.1")
        .with_pairing_dir(dir.path())
        .with_retry(
            RetryPolicy::new()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(4)),
        )
}

fn adapter(device: &FakeDevice) -> (BridgeAdapter<FakeTransport>, TempDir) {
    let dir = pairing_dir();
    let config = config(&dir);
    let registry = PairingRegistry::load_dir(&config.pairing_dir).unwrap();
    let adapter = BridgeAdapter::new(SessionManager::new(device.transport()), registry, config);
    (adapter, dir)
}

fn thermostat() -> FakeDevice {
    let device = FakeDevice::new();
    device.set_value(CharacteristicId::RealTimeIndication, &REAL_TIME);
    device.set_value(CharacteristicId::TargetTemperature, &[0xC8, 0x00]);
    device.set_value(CharacteristicId::Mode, &[0x01]);
    device
}

fn json_of(publication: &Publication) -> Value {
    serde_json::from_str(&publication.payload).unwrap()
}

// ============================================================================
// Registry and topics
// ============================================================================

mod registry {
    use super::*;

    #[test]
    fn loads_pairing_files_from_directory() {
        let dir = pairing_dir();
        fs::write(dir.path().join("notes.txt"), "not a pairing file").unwrap();

        let registry = PairingRegistry::load_dir(dir.path()).unwrap();

        assert_eq!(registry.len(), 1);
        let record = registry.get("livingroom").unwrap();
        assert_eq!(record.identity().name(), "Living Room");
        assert_eq!(record.identity().address().to_string(), "90:FD:9F:01:02:03");
        assert_eq!(record.reset_code(), &common::CODE);
    }

    #[test]
    fn availability_and_command_topics() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        assert_eq!(adapter.command_topics(), ["ECO16BT/livingroom/set"]);
        assert_eq!(adapter.availability(), [Publication::new(
            "ECO16BT/livingroom/available",
            "online"
        )]);
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn boost_command_publishes_boost_settings() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);
        let payload = json!({
            "type": "boost",
            "boostEnabled": 1,
            "boostOffsetDegrees": 2.0,
            "boostSetpointMinutes": 30
        })
        .to_string();
        let payload = payload.as_bytes();

        let publications = adapter
            .handle_message("ECO16BT/livingroom/set", payload)
            .await
            .unwrap();

        assert_eq!(publications.len(), 1);
        assert_eq!(publications[0].topic, "ECO16BT/livingroom/boost");
        let json = json_of(&publications[0]);
        assert_eq!(json["boostEnabled"], json!(true));
        assert_eq!(json["boostOffsetDegrees"], json!(2.0));
        assert_eq!(json["boostSetpointMinutes"], json!(30));
        assert_eq!(device.writes_to(CharacteristicId::Boost).len(), 1);
        assert_eq!(device.connects(), 1);
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test]
    async fn temperature_command_publishes_state() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let publications = adapter
            .handle_message(
                "ECO16BT/livingroom/set",
                br#"{"type":"temperature","targetTemperature":21.5}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            device.writes_to(CharacteristicId::TargetTemperature),
            vec![vec![0xD7, 0x00]]
        );
        assert_eq!(publications[0].topic, "ECO16BT/livingroom/state");
        let json = json_of(&publications[0]);
        assert_eq!(json["targetTemperature"], json!(21.5));
        assert_eq!(json["roomTemperature"], json!(20.5));
        assert_eq!(json["floorTemperature"], json!(-1.5));
        assert_eq!(json["heat"], json!(true));
    }

    #[tokio::test]
    async fn mode_command_writes_mode() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        adapter
            .handle_message(
                "ECO16BT/livingroom/set",
                br#"{"type":"mode","mode":"schedule"}"#,
            )
            .await
            .unwrap();

        assert_eq!(device.writes_to(CharacteristicId::Mode), vec![vec![
            Mode::Schedule.code()
        ]]);
    }

    #[tokio::test]
    async fn unknown_device_is_refused() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("ECO16BT/kitchen/set", br#"{"type":"mode","mode":"off"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownDevice(name) if name == "kitchen"));
        assert_eq!(device.connects(), 0);
    }

    #[tokio::test]
    async fn foreign_topic_is_refused() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("other/livingroom/set", br#"{"type":"mode","mode":"off"}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Payload(PayloadError::UnexpectedTopic(_))
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_refused() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("ECO16BT/livingroom/set", b"{not json")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Payload(PayloadError::Json(_))));
        assert_eq!(device.connects(), 0);
    }

    #[tokio::test]
    async fn out_of_range_target_never_connects() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message(
                "ECO16BT/livingroom/set",
                br#"{"type":"temperature","targetTemperature":80}"#,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Value(_)));
        assert_eq!(device.connects(), 0);
    }
}

// ============================================================================
// Retries
// ============================================================================

mod retries {
    use super::*;

    #[tokio::test]
    async fn rejected_code_is_not_retried() {
        let device = thermostat();
        device.set_auth_ack(&[0xFF]);
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("ECO16BT/livingroom/set", br#"{"type":"mode","mode":"off"}"#)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Connect(ConnectError::Auth(AuthError::Rejected { .. }))
        ));
        assert_eq!(device.connects(), 1);
    }

    #[tokio::test]
    async fn rejected_write_is_not_retried() {
        let device = thermostat();
        device.set_status(RawStatus::WRITE_REJECTED);
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("ECO16BT/livingroom/set", br#"{"type":"mode","mode":"off"}"#)
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert_eq!(device.connects(), 1);
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_device_is_retried() {
        let device = thermostat();
        device.fail_connects([TransportError::Unreachable("out of range".to_string())]);
        let (adapter, _dir) = adapter(&device);

        let publications = adapter
            .handle_message(
                "ECO16BT/livingroom/set",
                br#"{"type":"temperature","targetTemperature":22}"#,
            )
            .await
            .unwrap();

        assert_eq!(publications.len(), 1);
        assert_eq!(device.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let device = thermostat();
        device.fail_connects(
            std::iter::repeat_with(|| TransportError::Unreachable("out of range".to_string()))
                .take(10),
        );
        let (adapter, _dir) = adapter(&device);

        let err = adapter
            .handle_message("ECO16BT/livingroom/set", br#"{"type":"mode","mode":"off"}"#)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(device.connects(), 3);
    }
}

// ============================================================================
// Polling
// ============================================================================

mod polling {
    use super::*;

    #[tokio::test]
    async fn poll_publishes_state() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let publication = adapter.poll("livingroom").await.unwrap();

        assert_eq!(publication.topic, "ECO16BT/livingroom/state");
        assert_eq!(json_of(&publication)["roomTemperature"], json!(20.5));
        assert_eq!(device.disconnects(), 1);
    }

    #[tokio::test]
    async fn one_off_read() {
        let device = thermostat();
        let (adapter, _dir) = adapter(&device);

        let value = adapter
            .read("livingroom", CharacteristicId::Mode)
            .await
            .unwrap();

        assert_eq!(value, CharacteristicValue::Mode(Mode::Heat));
        assert!(matches!(
            adapter.poll("kitchen").await,
            Err(Error::UnknownDevice(_))
        ));
    }
}

// ============================================================================
// Reporting
// ============================================================================

mod reporting {
    use ensto_lib::error::{DecodeError, ReadError};

    use super::*;

    /// Monitoring transfer: fixed part in the first packet, one hourly record
    /// in the last.
    fn monitoring_packets() -> Vec<Result<Vec<u8>, TransportError>> {
        let mut first = vec![0x00, 5, 3, 24];
        for day in 0..8u8 {
            first.extend_from_slice(&[day, 10 * day]);
        }
        first.extend_from_slice(&[2, 24]);
        for month in 0..13u8 {
            first.extend_from_slice(&[month, 50 + month]);
        }
        first.extend_from_slice(&[13, 5, 3, 24]);
        vec![Ok(first), Ok(vec![0x40, 0, 0xEB, 0x00, 0xD2, 0x00])]
    }

    fn installed() -> FakeDevice {
        let device = thermostat();
        device.queue_reads(CharacteristicId::Monitoring, monitoring_packets());
        device.queue_reads(CharacteristicId::PowerHistory, [
            Ok(vec![0x00, 10, 15, 3, 24]),
            Ok(vec![0x40, 1, 40]),
        ]);
        device.set_value(CharacteristicId::CalendarMode, &[1]);
        device.set_value(CharacteristicId::CalendarDay, &[
            3, 0, 6, 0, 8, 30, 0xF4, 0x01, 0, 1,
        ]);
        device.set_value(CharacteristicId::Vacation, &[
            24, 12, 20, 14, 0, 25, 1, 6, 9, 30, 0x30, 0xF8, 0, 1, 3,
        ]);
        device.set_value(CharacteristicId::FloorArea, &[12, 0]);
        device.set_value(CharacteristicId::HeatingPower, &[0xDC, 0x05]);
        device.set_value(CharacteristicId::SensorType, &[2]);
        device.set_value(CharacteristicId::AdaptiveControl, &[0]);
        device.set_value(CharacteristicId::TemperatureLimits, &[
            0xF4, 0x01, 0xAC, 0x0D,
        ]);
        device.set_value(CharacteristicId::DateTime, &[0xE8, 0x07, 3, 5, 13, 45, 12]);
        device.set_value(CharacteristicId::DaylightSaving, &[1, 0x78, 0x00]);
        device
    }

    #[tokio::test]
    async fn report_reads_everything_in_one_session() {
        let device = installed();
        let (adapter, _dir) = adapter(&device);

        let publication = adapter.report("livingroom").await.unwrap();

        assert_eq!(publication.topic, "ECO16BT/livingroom");
        let json = json_of(&publication);
        assert_eq!(json["information"]["name"], "Living Room");
        assert_eq!(json["information"]["heatingPower"], 1500);
        assert_eq!(json["information"]["sensor"]["sensorTypeName"], "10kOhm");
        assert_eq!(json["information"]["adaptive"], 0);
        assert_eq!(
            json["information"]["datetime"],
            "2024-03-05T13:45:12+02:00"
        );
        assert_eq!(json["realtime"]["roomTemperature"], json!(20.5));
        assert_eq!(json["vacation"]["offsetTemperature"], json!(-20.0));
        assert_eq!(json["calendar"]["days"][0]["from"], "06:00");
        assert_eq!(json["power"][0]["ratio"], 40);
        assert_eq!(json["wallClockStamp"], "2024-03-05T00:00:00");
        assert_eq!(json["onOffRatio12Months"][1]["ratio"], 51);
        assert_eq!(
            json["temperature24Hours7Days"][0]["floorTemperature"],
            json!(23.5)
        );

        assert_eq!(device.connects(), 1);
        assert_eq!(device.disconnects(), 1);
        assert_eq!(device.reads_of(CharacteristicId::Monitoring), 2);
        assert_eq!(device.reads_of(CharacteristicId::DaylightSaving), 1);
        assert_eq!(device.write_log(), [CharacteristicId::Authentication]);
    }

    #[tokio::test]
    async fn failed_read_publishes_nothing() {
        let device = installed();
        device.set_value(CharacteristicId::SensorType, &[9]);
        let (adapter, _dir) = adapter(&device);

        let err = adapter.report("livingroom").await.unwrap_err();

        assert!(matches!(
            err,
            Error::Read(ReadError::Decode(DecodeError::UnknownVariant { raw: 9, .. }))
        ));
        assert_eq!(device.disconnects(), 1);
        assert_eq!(device.reads_of(CharacteristicId::AdaptiveControl), 0);
    }

    #[tokio::test]
    async fn unknown_device_is_not_reported() {
        let device = installed();
        let (adapter, _dir) = adapter(&device);

        assert!(matches!(
            adapter.report("kitchen").await,
            Err(Error::UnknownDevice(_))
        ));
        assert_eq!(device.connects(), 0);
    }
}
