// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reassembly of characteristics that span several reads.
//!
//! Each read returns one packet: a header byte followed by payload. The
//! first packet is always kept. A later packet with [`LAST_PACKET`] set in
//! its header ends the transfer; the device may repeat the previous packet
//! as the final one, so it is appended only if its checksum differs.

use crc16::{CCITT_FALSE, State};

use crate::error::SegmentError;

/// Header bit marking the final packet.
pub const LAST_PACKET: u8 = 0x40;

/// Default bound on the number of packets in one transfer.
pub const DEFAULT_MAX_PACKETS: usize = 64;

/// Progress of a reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Another read is required.
    More,
    /// The transfer is complete.
    Complete,
}

/// Collects packets of a segmented read.
///
/// # Examples
///
/// ```
/// use ensto_lib::codec::segmented::{Progress, Reassembler};
///
/// let mut r = Reassembler::new(8);
/// assert_eq!(r.push(&[0x00, 1, 2]).unwrap(), Progress::More);
/// assert_eq!(r.push(&[0x40, 3, 4]).unwrap(), Progress::Complete);
/// assert_eq!(r.into_payload(), vec![1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Reassembler {
    max_packets: usize,
    packets: usize,
    previous_crc: Option<u16>,
    payload: Vec<u8>,
    complete: bool,
}

impl Reassembler {
    /// Creates a reassembler that gives up after `max_packets` packets.
    #[must_use]
    pub fn new(max_packets: usize) -> Self {
        Self {
            max_packets,
            packets: 0,
            previous_crc: None,
            payload: Vec::new(),
            complete: false,
        }
    }

    /// Adds the next packet.
    ///
    /// # Errors
    ///
    /// Returns `SegmentError::EmptyPacket` for a zero-length packet and
    /// `SegmentError::TooManyPackets` once the bound is reached without a
    /// final packet.
    pub fn push(&mut self, packet: &[u8]) -> Result<Progress, SegmentError> {
        if self.complete {
            return Ok(Progress::Complete);
        }
        let Some((&header, data)) = packet.split_first() else {
            return Err(SegmentError::EmptyPacket(self.packets));
        };

        let crc = checksum(packet);
        let index = self.packets;
        self.packets += 1;

        if index > 0 && header & LAST_PACKET != 0 {
            if self.previous_crc != Some(crc) {
                self.payload.extend_from_slice(data);
            }
            self.complete = true;
            tracing::debug!(
                packets = self.packets,
                len = self.payload.len(),
                "Segmented read complete"
            );
            return Ok(Progress::Complete);
        }

        self.payload.extend_from_slice(data);
        self.previous_crc = Some(crc);

        if self.packets >= self.max_packets {
            return Err(SegmentError::TooManyPackets(self.packets));
        }
        Ok(Progress::More)
    }

    /// Returns the number of packets consumed so far.
    #[must_use]
    pub const fn packets(&self) -> usize {
        self.packets
    }

    /// Returns true once the final packet was seen.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the reassembled payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKETS)
    }
}

/// CRC-16/CCITT-FALSE of a packet with the two high bits masked off.
#[must_use]
pub fn checksum(packet: &[u8]) -> u16 {
    State::<CCITT_FALSE>::calculate(packet) & 0x3FFF
}
