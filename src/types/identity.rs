// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity: hardware address, reset code and display name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::ValueError;

/// A 6-byte Bluetooth hardware address.
///
/// Accepts both the colon-separated form and the bare 12-digit form used in
/// pairing file names. Always displays as upper-case, colon-separated.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::BleAddress;
///
/// let a: BleAddress = "90:fd:9f:12:34:56".parse().unwrap();
/// let b: BleAddress = "90FD9F123456".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "90:FD:9F:12:34:56");
/// assert_eq!(a.compact(), "90FD9F123456");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BleAddress([u8; 6]);

impl BleAddress {
    /// Creates an address from its bytes, most significant first.
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the address bytes, most significant first.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Returns the 12-digit upper-case form without separators.
    #[must_use]
    pub fn compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for BleAddress {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidAddress(s.to_string());
        let digits: String = s.trim().chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = digits.get(i * 2..i * 2 + 2).ok_or_else(invalid)?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BleAddress {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BleAddress> for String {
    fn from(value: BleAddress) -> Self {
        value.to_string()
    }
}

/// The 4-byte reset code printed on the thermostat, used to pair.
///
/// The bytes are never printed: `Debug` shows a redacted placeholder.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::ResetCode;
///
/// let code = ResetCode::new([0x12, 0x34, 0x56, 0x78]);
/// assert_eq!(format!("{code:?}"), "ResetCode(****)");
///
/// assert!(ResetCode::try_from(&[1u8, 2, 3][..]).is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "Vec<u8>")]
pub struct ResetCode([u8; 4]);

impl ResetCode {
    /// Creates a reset code from its bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Returns the bytes to write during authentication.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Debug for ResetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetCode(****)")
    }
}

impl TryFrom<&[u8]> for ResetCode {
    type Error = ValueError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 4]>::try_from(value)
            .map(Self)
            .map_err(|_| ValueError::InvalidResetCode(value.len()))
    }
}

impl TryFrom<Vec<u8>> for ResetCode {
    type Error = ValueError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::try_from(value.as_slice())
    }
}

/// Normalizes a device name for use in MQTT topics.
///
/// Decomposes the name (NFKD), keeps the ASCII part, lower-cases it and
/// drops whitespace. Accented letters fold to their base letter.
///
/// # Examples
///
/// ```
/// use ensto_lib::types::normalize_device_name;
///
/// assert_eq!(normalize_device_name("Living Room"), "livingroom");
/// assert_eq!(normalize_device_name("Kylpyhuone Ä"), "kylpyhuonea");
/// ```
#[must_use]
pub fn normalize_device_name(name: &str) -> String {
    name.nfkd()
        .filter(|c| c.is_ascii() && !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Address and name of one paired thermostat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    address: BleAddress,
    name: String,
}

impl DeviceIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(address: BleAddress, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }

    /// Returns the hardware address.
    #[must_use]
    pub const fn address(&self) -> BleAddress {
        self.address
    }

    /// Returns the name as configured on the device.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the normalized name used as the topic segment.
    #[must_use]
    pub fn topic_name(&self) -> String {
        normalize_device_name(&self.name)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_both_forms() {
        let a: BleAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(a.bytes(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let b: BleAddress = "aabbccddeeff".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn address_rejects_garbage() {
        assert!("AA:BB:CC".parse::<BleAddress>().is_err());
        assert!("GG:BB:CC:DD:EE:FF".parse::<BleAddress>().is_err());
        assert!("".parse::<BleAddress>().is_err());
        // Multi-byte characters must not panic on slicing
        assert!("ÄÄÄÄÄÄ".parse::<BleAddress>().is_err());
    }

    #[test]
    fn address_serde_uses_string() {
        let a = BleAddress::new([1, 2, 3, 4, 5, 6]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"01:02:03:04:05:06\"");
        let back: BleAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn reset_code_requires_four_bytes() {
        assert_eq!(
            ResetCode::try_from(vec![1, 2, 3, 4, 5]),
            Err(ValueError::InvalidResetCode(5))
        );
        let code = ResetCode::try_from(vec![1, 2, 3, 4]).unwrap();
        assert_eq!(code.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn reset_code_debug_is_redacted() {
        let code = ResetCode::new([0xDE, 0xAD, 0xBE, 0xEF]);
        let debug = format!("{code:?}");
        assert_eq!(debug, "ResetCode(****)");
        assert!(!debug.contains("DE") && !debug.contains("222"));
    }

    #[test]
    fn reset_code_deserializes_from_array() {
        let code: ResetCode = serde_json::from_str("[10, 20, 30, 40]").unwrap();
        assert_eq!(code.as_bytes(), &[10, 20, 30, 40]);
        assert!(serde_json::from_str::<ResetCode>("[10, 20]").is_err());
    }

    #[test]
    fn topic_name_is_normalized() {
        let id = DeviceIdentity::new(BleAddress::new([0; 6]), " Olohuone 2 ");
        assert_eq!(id.topic_name(), "olohuone2");
        assert_eq!(id.name(), " Olohuone 2 ");
    }

    #[test]
    fn accented_letters_fold_to_ascii() {
        assert_eq!(normalize_device_name("Työhuone Ä"), "tyohuonea");
        assert_eq!(normalize_device_name("Sauna ½"), "sauna12");
        assert_eq!(normalize_device_name("Kök\tUppe"), "kokuppe");
        // Scripts without an ASCII decomposition vanish entirely
        assert_eq!(normalize_device_name("Γ 7"), "7");
    }
}
