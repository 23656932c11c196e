// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Characteristic lookup table.
//!
//! Every GATT characteristic the bridge touches is described by one
//! [`CharacteristicSpec`] row in [`CHARACTERISTICS`]. The codec, the handshake
//! and the session manager all consult this table instead of hard-coding
//! UUIDs, lengths or access rules.

use std::fmt;

use uuid::Uuid;

/// Identifies a thermostat characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum CharacteristicId {
    /// Reset-code exchange used to pair.
    Authentication,
    /// Manual-mode target temperature.
    TargetTemperature,
    /// Operating mode.
    Mode,
    /// Status bitfield, also used to confirm writes.
    Status,
    /// A single weekly schedule slot (write).
    ScheduleEntry,
    /// The full weekly schedule (read).
    Schedule,
    /// Boost override settings.
    Boost,
    /// Real-time indication of temperatures, relay and boost.
    RealTimeIndication,
    /// Hourly heating on/off ratios.
    PowerHistory,
    /// Daily and monthly on/off ratios with hourly temperatures.
    Monitoring,
    /// Calendar (weekly program) enabled.
    CalendarMode,
    /// Programs of the selected calendar day.
    CalendarDay,
    /// Vacation period and offset.
    Vacation,
    /// Heated floor area in square metres.
    FloorArea,
    /// Installed heating power in watts.
    HeatingPower,
    /// Floor sensor type.
    SensorType,
    /// Adaptive temperature control enabled.
    AdaptiveControl,
    /// Installer setpoint limits.
    TemperatureLimits,
    /// Device clock.
    DateTime,
    /// Daylight-saving rules and UTC offset.
    DaylightSaving,
}

impl CharacteristicId {
    /// All characteristics, in table order.
    pub const ALL: [Self; 20] = [
        Self::Authentication,
        Self::TargetTemperature,
        Self::Mode,
        Self::Status,
        Self::ScheduleEntry,
        Self::Schedule,
        Self::Boost,
        Self::RealTimeIndication,
        Self::PowerHistory,
        Self::Monitoring,
        Self::CalendarMode,
        Self::CalendarDay,
        Self::Vacation,
        Self::FloorArea,
        Self::HeatingPower,
        Self::SensorType,
        Self::AdaptiveControl,
        Self::TemperatureLimits,
        Self::DateTime,
        Self::DaylightSaving,
    ];

    /// Returns the table row of this characteristic.
    #[must_use]
    pub fn spec(self) -> &'static CharacteristicSpec {
        // The table has one row per variant, in declaration order
        &CHARACTERISTICS[self as usize]
    }

    /// Returns the GATT UUID of this characteristic.
    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.spec().uuid
    }

    /// Looks up a characteristic by GATT UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        CHARACTERISTICS
            .iter()
            .find(|spec| spec.uuid == uuid)
            .map(|spec| spec.id)
    }

    /// Returns the `snake_case` name of this characteristic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::TargetTemperature => "target_temperature",
            Self::Mode => "mode",
            Self::Status => "status",
            Self::ScheduleEntry => "schedule_entry",
            Self::Schedule => "schedule",
            Self::Boost => "boost",
            Self::RealTimeIndication => "real_time_indication",
            Self::PowerHistory => "power_history",
            Self::Monitoring => "monitoring",
            Self::CalendarMode => "calendar_mode",
            Self::CalendarDay => "calendar_day",
            Self::Vacation => "vacation",
            Self::FloorArea => "floor_area",
            Self::HeatingPower => "heating_power",
            Self::SensorType => "sensor_type",
            Self::AdaptiveControl => "adaptive_control",
            Self::TemperatureLimits => "temperature_limits",
            Self::DateTime => "date_time",
            Self::DaylightSaving => "daylight_saving",
        }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-length rule of a characteristic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthRule {
    /// Exactly this many bytes.
    Exact(usize),
    /// At least this many bytes.
    AtLeast(usize),
    /// A header followed by any number of fixed-size records.
    Records {
        /// Header length in bytes.
        header: usize,
        /// Record length in bytes.
        record: usize,
    },
    /// A header followed by any number of two-byte pairs.
    Pairs {
        /// Header length in bytes.
        header: usize,
    },
}

impl LengthRule {
    /// Returns true if `len` satisfies the rule.
    #[must_use]
    pub const fn accepts(&self, len: usize) -> bool {
        match *self {
            Self::Exact(n) => len == n,
            Self::AtLeast(n) => len >= n,
            Self::Records { header, record } => len >= header && (len - header) % record == 0,
            Self::Pairs { header } => len >= header && (len - header) % 2 == 0,
        }
    }
}

impl fmt::Display for LengthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
            Self::Records { header, record } => write!(f, "{header} + {record}n"),
            Self::Pairs { header } => write!(f, "{header} + 2n"),
        }
    }
}

/// One row of the characteristic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicSpec {
    /// The characteristic this row describes.
    pub id: CharacteristicId,
    /// GATT UUID.
    pub uuid: Uuid,
    /// Payload length rule for reads.
    pub length: LengthRule,
    /// The characteristic can be read.
    pub readable: bool,
    /// The characteristic can be written.
    pub writable: bool,
    /// The characteristic sends notifications.
    pub notifies: bool,
    /// Writes must be confirmed by reading `Status`.
    pub confirm_write: bool,
    /// Reads span several packets and must be reassembled.
    pub segmented: bool,
}

impl CharacteristicSpec {
    const fn new(id: CharacteristicId, uuid: u128, length: LengthRule) -> Self {
        Self {
            id,
            uuid: Uuid::from_u128(uuid),
            length,
            readable: false,
            writable: false,
            notifies: false,
            confirm_write: false,
            segmented: false,
        }
    }

    const fn read(mut self) -> Self {
        self.readable = true;
        self
    }

    const fn write(mut self) -> Self {
        self.writable = true;
        self
    }

    const fn notify(mut self) -> Self {
        self.notifies = true;
        self
    }

    const fn confirmed(mut self) -> Self {
        self.confirm_write = true;
        self
    }

    const fn segmented(mut self) -> Self {
        self.segmented = true;
        self
    }
}

/// The characteristic table, one row per [`CharacteristicId`] in declaration order.
pub static CHARACTERISTICS: [CharacteristicSpec; 20] = [
    // The acknowledgement read back after the reset code is at least one byte
    CharacteristicSpec::new(
        CharacteristicId::Authentication,
        0xf366_dddb_ebe2_43ee_83c0_472d_ed74_c8fa,
        LengthRule::AtLeast(1),
    )
    .read()
    .write(),
    // Not present in captured traffic; provisional.
    CharacteristicSpec::new(
        CharacteristicId::TargetTemperature,
        0xe507_0001_16b7_4c3e_9a1d_0ec0_16b7_0001,
        LengthRule::Exact(2),
    )
    .read()
    .write()
    .confirmed(),
    // Not present in captured traffic; provisional.
    CharacteristicSpec::new(
        CharacteristicId::Mode,
        0xe507_0002_16b7_4c3e_9a1d_0ec0_16b7_0002,
        LengthRule::Exact(1),
    )
    .read()
    .write()
    .confirmed(),
    // Not present in captured traffic; provisional.
    CharacteristicSpec::new(
        CharacteristicId::Status,
        0xe507_0003_16b7_4c3e_9a1d_0ec0_16b7_0003,
        LengthRule::Exact(2),
    )
    .read()
    .notify(),
    // Not present in captured traffic; provisional.
    CharacteristicSpec::new(
        CharacteristicId::ScheduleEntry,
        0xe507_0004_16b7_4c3e_9a1d_0ec0_16b7_0004,
        LengthRule::Exact(7),
    )
    .write()
    .confirmed(),
    // Not present in captured traffic; provisional.
    CharacteristicSpec::new(
        CharacteristicId::Schedule,
        0xe507_0005_16b7_4c3e_9a1d_0ec0_16b7_0005,
        LengthRule::Records {
            header: 1,
            record: 7,
        },
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::Boost,
        0xca3c_0685_b708_4cd4_a049_5bad_d104_69e7,
        LengthRule::Exact(8),
    )
    .read()
    .write(),
    CharacteristicSpec::new(
        CharacteristicId::RealTimeIndication,
        0x66ad_3e6b_3135_4ada_bb2b_8b22_916b_21d4,
        LengthRule::Exact(21),
    )
    .read()
    .notify(),
    CharacteristicSpec::new(
        CharacteristicId::PowerHistory,
        0xc168_6f28_fa1b_4791_9eca_3552_3fb3_597e,
        LengthRule::Pairs { header: 4 },
    )
    .read()
    .segmented(),
    // Installation settings and history below are read-only over BLE
    CharacteristicSpec::new(
        CharacteristicId::Monitoring,
        0xecc7_94d2_c790_4abd_88a5_79ab_f941_7908,
        LengthRule::Records {
            header: 51,
            record: 5,
        },
    )
    .read()
    .segmented(),
    CharacteristicSpec::new(
        CharacteristicId::CalendarMode,
        0x636d_45fd_d7be_491f_966c_380f_8631_b2c6,
        LengthRule::AtLeast(1),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::CalendarDay,
        0x20db_94b9_bd18_4f84_bf16_de11_63ad_fd8c,
        LengthRule::Records {
            header: 2,
            record: 8,
        },
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::Vacation,
        0x6584_e9c6_4784_41aa_ac09_c899_1910_48ae,
        LengthRule::AtLeast(15),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::FloorArea,
        0x5c89_7ab6_354c_443d_9f36_f3f7_2638_68dd,
        LengthRule::AtLeast(2),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::HeatingPower,
        0x53b7_bf87_6cf0_4790_839a_e72d_3afb_ec44,
        LengthRule::AtLeast(2),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::SensorType,
        0xf561_ce1f_61fb_4fa2_8bef_5fec_c949_b55b,
        LengthRule::AtLeast(1),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::AdaptiveControl,
        0xc2dc_85e9_47bf_4968_9562_d2e1_980e_d4e4,
        LengthRule::AtLeast(1),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::TemperatureLimits,
        0x89b4_c78f_6d5e_4cfa_8e81_4eca_9738_bbfd,
        LengthRule::AtLeast(4),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::DateTime,
        0xb43f_918a_b084_45c8_9b60_df64_8c4a_4a1e,
        LengthRule::AtLeast(6),
    )
    .read(),
    CharacteristicSpec::new(
        CharacteristicId::DaylightSaving,
        0xe4f6_6642_ed89_4c73_be57_2158_c225_bbde,
        LengthRule::AtLeast(2),
    )
    .read(),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_in_declaration_order() {
        for id in CharacteristicId::ALL {
            assert_eq!(id.spec().id, id);
        }
    }

    #[test]
    fn uuids_are_unique_and_resolvable() {
        for id in CharacteristicId::ALL {
            assert_eq!(CharacteristicId::from_uuid(id.uuid()), Some(id));
        }
        assert_eq!(CharacteristicId::from_uuid(Uuid::nil()), None);
    }

    #[test]
    fn known_uuids() {
        assert_eq!(
            CharacteristicId::Authentication.uuid().to_string(),
            "f366dddb-ebe2-43ee-83c0-472ded74c8fa"
        );
        assert_eq!(
            CharacteristicId::Boost.uuid().to_string(),
            "ca3c0685-b708-4cd4-a049-5badd10469e7"
        );
        assert_eq!(
            CharacteristicId::Monitoring.uuid().to_string(),
            "ecc794d2-c790-4abd-88a5-79abf9417908"
        );
        assert_eq!(
            CharacteristicId::DaylightSaving.uuid().to_string(),
            "e4f66642-ed89-4c73-be57-2158c225bbde"
        );
    }

    #[test]
    fn access_rules() {
        assert!(!CharacteristicId::ScheduleEntry.spec().readable);
        assert!(!CharacteristicId::Status.spec().writable);
        assert!(CharacteristicId::Mode.spec().confirm_write);
        assert!(!CharacteristicId::Boost.spec().confirm_write);
        assert!(CharacteristicId::PowerHistory.spec().segmented);
        assert!(CharacteristicId::Monitoring.spec().segmented);
        assert!(CharacteristicId::Vacation.spec().readable);
        assert!(!CharacteristicId::DateTime.spec().writable);
    }

    #[test]
    fn length_rules() {
        let schedule = LengthRule::Records {
            header: 1,
            record: 7,
        };
        assert!(schedule.accepts(1));
        assert!(schedule.accepts(22));
        assert!(!schedule.accepts(0));
        assert!(!schedule.accepts(9));

        let pairs = LengthRule::Pairs { header: 4 };
        assert!(pairs.accepts(4));
        assert!(pairs.accepts(8));
        assert!(!pairs.accepts(5));

        assert_eq!(LengthRule::Exact(2).to_string(), "exactly 2");
        assert_eq!(schedule.to_string(), "1 + 7n");
    }

    #[test]
    fn display_is_snake_case() {
        assert_eq!(
            CharacteristicId::RealTimeIndication.to_string(),
            "real_time_indication"
        );
    }
}
