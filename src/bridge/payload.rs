// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON payloads exchanged over MQTT.
//!
//! Inbound commands carry a `type` tag:
//!
//! ```json
//! {"type": "boost", "boostEnabled": true, "boostOffsetDegrees": 2.5, "boostSetpointMinutes": 60}
//! {"type": "temperature", "targetTemperature": 21.5}
//! {"type": "mode", "mode": "schedule"}
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::codec::{
    CalendarDay, CharacteristicId, CharacteristicValue, DaylightSaving, MonitoringData,
    PowerHistory, RealTimeIndication, SensorType, TemperatureLimits, VacationSettings,
};
use crate::error::{PayloadError, ValueError};
use crate::types::{BoostOffset, BoostSettings, Mode, Temperature};

/// A command received on a device's `set` topic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeCommand {
    /// Start or stop a boost.
    Boost {
        /// Start (true) or stop (false) the boost.
        #[serde(rename = "boostEnabled", deserialize_with = "flag")]
        enabled: bool,
        /// Offset in degrees Celsius.
        #[serde(rename = "boostOffsetDegrees", default)]
        offset_degrees: f32,
        /// Boost duration in minutes.
        #[serde(rename = "boostSetpointMinutes", default)]
        setpoint_minutes: u16,
    },
    /// Change the target temperature.
    Temperature {
        /// Target in degrees Celsius.
        #[serde(rename = "targetTemperature")]
        target: f32,
    },
    /// Change the operating mode.
    Mode {
        /// Mode name, e.g. `heat` or `schedule`.
        mode: String,
    },
}

/// Accepts JSON booleans and numbers (non-zero is true).
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde::de::Error as _;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        other => Err(D::Error::custom(format!("expected boolean, got {other}"))),
    }
}

impl BridgeCommand {
    /// Parses a command payload.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::Json` for malformed JSON or an unknown `type`.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Returns the `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Boost { .. } => "boost",
            Self::Temperature { .. } => "temperature",
            Self::Mode { .. } => "mode",
        }
    }

    /// Converts the command into the value to write.
    ///
    /// # Errors
    ///
    /// Returns a `ValueError` if a field is out of range or the mode is
    /// unknown.
    pub fn to_value(&self) -> Result<CharacteristicValue, ValueError> {
        match self {
            Self::Boost {
                enabled: false, ..
            } => Ok(BoostSettings::disable().into()),
            Self::Boost {
                enabled: true,
                offset_degrees,
                setpoint_minutes,
            } => {
                let offset = BoostOffset::from_celsius(*offset_degrees)?;
                Ok(BoostSettings::enable(offset, *setpoint_minutes).into())
            }
            Self::Temperature { target } => {
                let target = Temperature::from_celsius(*target)?;
                if !target.is_valid_setpoint() {
                    return Err(ValueError::OutOfRange {
                        min: i32::from(Temperature::SETPOINT_MIN.tenths()),
                        max: i32::from(Temperature::SETPOINT_MAX.tenths()),
                        actual: i32::from(target.tenths()),
                    });
                }
                Ok(target.into())
            }
            Self::Mode { mode } => Ok(mode.parse::<Mode>()?.into()),
        }
    }

    /// Characteristic read back after the command to report the new state.
    #[must_use]
    pub const fn read_back(&self) -> CharacteristicId {
        match self {
            Self::Boost { .. } => CharacteristicId::Boost,
            Self::Temperature { .. } | Self::Mode { .. } => CharacteristicId::RealTimeIndication,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BoostPayload {
    boost_enabled: bool,
    boost_offset_degrees: f32,
    boost_setpoint_minutes: u16,
    boost_percentage: u8,
    boost_time_minutes: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload {
    room_temperature: f32,
    target_temperature: f32,
    floor_temperature: f32,
    heat: bool,
    boost_enabled: bool,
    boost_setpoint_minutes: u16,
    boost_remaining_minutes: u16,
}

impl From<&RealTimeIndication> for StatePayload {
    fn from(rt: &RealTimeIndication) -> Self {
        Self {
            room_temperature: rt.room.celsius(),
            target_temperature: rt.target.celsius(),
            floor_temperature: rt.floor.celsius(),
            heat: rt.relay_on,
            boost_enabled: rt.boost_enabled,
            boost_setpoint_minutes: rt.boost_setpoint_minutes,
            boost_remaining_minutes: rt.boost_remaining_minutes,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetPayload {
    target_temperature: f32,
}

#[derive(Serialize)]
struct ModePayload {
    mode: Mode,
}

/// Renders boost settings for the `boost` topic.
///
/// # Errors
///
/// Returns `PayloadError::Json` if serialization fails.
pub fn boost_payload(boost: &BoostSettings) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(&BoostPayload {
        boost_enabled: boost.enabled(),
        boost_offset_degrees: boost.offset().celsius(),
        boost_setpoint_minutes: boost.setpoint_minutes(),
        boost_percentage: boost.offset_percent(),
        boost_time_minutes: boost.remaining_minutes(),
    })?)
}

/// Renders real-time readings for the `state` topic.
///
/// # Errors
///
/// Returns `PayloadError::Json` if serialization fails.
pub fn state_payload(rt: &RealTimeIndication) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(&StatePayload::from(rt))?)
}

/// Everything a device reports, gathered in one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    /// Device name as paired.
    pub name: String,
    /// Floor area in square metres.
    pub floor_area: u16,
    /// Heating power in watts.
    pub heating_power: u16,
    /// Floor sensor.
    pub sensor: SensorType,
    /// Adaptive control enabled.
    pub adaptive: bool,
    /// Installer setpoint limits.
    pub limits: TemperatureLimits,
    /// Device clock.
    pub clock: NaiveDateTime,
    /// UTC offset of the device clock.
    pub daylight_saving: DaylightSaving,
    /// Live readings.
    pub realtime: RealTimeIndication,
    /// Vacation settings.
    pub vacation: VacationSettings,
    /// Weekly calendar enabled.
    pub calendar_mode: bool,
    /// Programs of the selected calendar day.
    pub calendar: CalendarDay,
    /// Hourly heating ratios.
    pub power: PowerHistory,
    /// Daily and monthly ratios with hourly temperatures.
    pub monitoring: MonitoringData,
}

impl DeviceReport {
    /// The device clock with its UTC offset, RFC 3339 formatted.
    ///
    /// Falls back to the bare local time if the offset is not a valid one.
    #[must_use]
    pub fn datetime(&self) -> String {
        self.daylight_saving.localize(self.clock).map_or_else(
            || self.clock.format("%Y-%m-%dT%H:%M:%S").to_string(),
            |local| local.to_rfc3339(),
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SensorPayload {
    sensor_type: u8,
    sensor_type_name: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InformationPayload<'a> {
    name: &'a str,
    floor_area: u16,
    heating_power: u16,
    sensor: SensorPayload,
    adaptive: u8,
    temperature_limits: TemperatureLimits,
    datetime: String,
}

#[derive(Serialize)]
struct CalendarPayload<'a> {
    mode: bool,
    days: &'a CalendarDay,
}

#[derive(Serialize)]
struct ReportPayload<'a> {
    information: InformationPayload<'a>,
    realtime: StatePayload,
    vacation: VacationSettings,
    calendar: CalendarPayload<'a>,
    power: &'a PowerHistory,
    #[serde(flatten)]
    monitoring: &'a MonitoringData,
}

/// Renders a full device report for the device's report topic.
///
/// # Errors
///
/// Returns `PayloadError::Json` if serialization fails.
pub fn report_payload(report: &DeviceReport) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(&ReportPayload {
        information: InformationPayload {
            name: &report.name,
            floor_area: report.floor_area,
            heating_power: report.heating_power,
            sensor: SensorPayload {
                sensor_type: report.sensor.code(),
                sensor_type_name: report.sensor.name(),
            },
            adaptive: u8::from(report.adaptive),
            temperature_limits: report.limits,
            datetime: report.datetime(),
        },
        realtime: StatePayload::from(&report.realtime),
        vacation: report.vacation,
        calendar: CalendarPayload {
            mode: report.calendar_mode,
            days: &report.calendar,
        },
        power: &report.power,
        monitoring: &report.monitoring,
    })?)
}

/// Renders any value that has an MQTT representation.
///
/// # Errors
///
/// Returns `PayloadError::Unsupported` for values without one.
pub fn render(value: &CharacteristicValue) -> Result<String, PayloadError> {
    match value {
        CharacteristicValue::Boost(boost) => boost_payload(boost),
        CharacteristicValue::RealTime(rt) => state_payload(rt),
        CharacteristicValue::Temperature(t) => Ok(serde_json::to_string(&TargetPayload {
            target_temperature: t.celsius(),
        })?),
        CharacteristicValue::Mode(mode) => {
            Ok(serde_json::to_string(&ModePayload { mode: *mode })?)
        }
        other => Err(PayloadError::Unsupported(other.characteristic())),
    }
}
