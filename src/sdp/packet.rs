/*
    SPDX-License-Identifier: AGPL-3.0-or-later
    SPDX-FileCopyrightText: 2025 Shomy
*/
use crate::error::{Result, SdpError};
use crate::sdp::command::CommandTag;
use crate::sdp::status::ResponseValue;

pub const CMD_PACKET_SIZE: usize = 16;
pub const RESPONSE_WORD_SIZE: usize = 4;

// Tag (BE) | Address (BE) | Count (BE) | Param (BE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdPacket {
    pub tag: CommandTag,
    pub address: u32,
    pub count: u32,
    pub param: u32,
}

impl CmdPacket {
    pub fn new(tag: CommandTag, address: u32, count: u32, param: u32) -> Self {
        Self {
            tag,
            address,
            count,
            param,
        }
    }

    pub fn to_bytes(&self) -> [u8; CMD_PACKET_SIZE] {
        let mut buf = [0u8; CMD_PACKET_SIZE];
        buf[0..4].copy_from_slice(&(self.tag as u32).to_be_bytes());
        buf[4..8].copy_from_slice(&self.address.to_be_bytes());
        buf[8..12].copy_from_slice(&self.count.to_be_bytes());
        buf[12..16].copy_from_slice(&self.param.to_be_bytes());
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CMD_PACKET_SIZE {
            return Err(SdpError::MalformedFrame {
                expected: CMD_PACKET_SIZE,
                got: data.len(),
            });
        }

        let tag = CommandTag::try_from(be_word(&data[0..4]))?;
        Ok(Self {
            tag,
            address: be_word(&data[4..8]),
            count: be_word(&data[8..12]),
            param: be_word(&data[12..16]),
        })
    }
}

impl std::fmt::Display for CmdPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} address=0x{:08X} count={} param=0x{:08X}",
            self.tag, self.address, self.count, self.param
        )
    }
}

/// One inbound response word.
///
/// `ok` is false when the exchange did not complete (nothing arrived before
/// the timeout); `raw` is then left zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdResponse {
    pub ok: bool,
    pub raw: [u8; RESPONSE_WORD_SIZE],
}

impl CmdResponse {
    pub fn new(ok: bool, raw: [u8; RESPONSE_WORD_SIZE]) -> Self {
        Self { ok, raw }
    }

    pub fn missing() -> Self {
        Self::new(false, [0u8; RESPONSE_WORD_SIZE])
    }

    /// Decodes a frame read from the transport.
    ///
    /// An empty frame is a missing response, not an error. Anything between
    /// one and three bytes is truncated and cannot be trusted.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::missing());
        }
        if data.len() < RESPONSE_WORD_SIZE {
            return Err(SdpError::MalformedFrame {
                expected: RESPONSE_WORD_SIZE,
                got: data.len(),
            });
        }

        let mut raw = [0u8; RESPONSE_WORD_SIZE];
        raw.copy_from_slice(&data[..RESPONSE_WORD_SIZE]);
        Ok(Self::new(true, raw))
    }

    pub fn value(&self) -> Option<u32> {
        self.ok.then(|| u32::from_be_bytes(self.raw))
    }

    pub fn response_value(&self) -> Option<ResponseValue> {
        self.value().and_then(ResponseValue::from_word)
    }

    pub fn is(&self, expected: ResponseValue) -> bool {
        self.value() == Some(expected as u32)
    }
}

impl From<ResponseValue> for CmdResponse {
    fn from(value: ResponseValue) -> Self {
        Self::new(true, value.to_be_bytes())
    }
}

fn be_word(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_layout_is_big_endian() {
        let packet = CmdPacket::new(CommandTag::WriteDcd, 0x0091_0000, 0x200, 0xAABB_CCDD);
        assert_eq!(
            packet.to_bytes(),
            [
                0x00, 0x00, 0x0A, 0x0A, // tag
                0x00, 0x91, 0x00, 0x00, // address
                0x00, 0x00, 0x02, 0x00, // count
                0xAA, 0xBB, 0xCC, 0xDD, // param
            ]
        );
    }

    #[test]
    fn packet_round_trips_for_every_tag() {
        let samples = [
            (0u32, 0u32, 0u32),
            (0x2000_0000, 4, 0),
            (0xFFFF_FFFF, 0xFFFF_FFFF, 0xFFFF_FFFF),
            (0x0090_7400, 0x1_0000, 0x1234_5678),
        ];
        for tag in CommandTag::ALL {
            for (address, count, param) in samples {
                let packet = CmdPacket::new(tag, address, count, param);
                assert_eq!(CmdPacket::from_bytes(&packet.to_bytes()).unwrap(), packet);
            }
        }
    }

    #[test]
    fn short_packet_is_malformed() {
        let bytes = CmdPacket::new(CommandTag::JumpAddress, 0, 0, 0).to_bytes();
        assert!(matches!(
            CmdPacket::from_bytes(&bytes[..15]),
            Err(SdpError::MalformedFrame {
                expected: 16,
                got: 15
            })
        ));
    }

    #[test]
    fn response_decoding() {
        let locked = CmdResponse::decode(&[0x12, 0x34, 0x34, 0x12]).unwrap();
        assert!(locked.ok);
        assert_eq!(locked.response_value(), Some(ResponseValue::Locked));
        assert!(locked.is(ResponseValue::Locked));

        let missing = CmdResponse::decode(&[]).unwrap();
        assert!(!missing.ok);
        assert_eq!(missing.value(), None);

        assert!(matches!(
            CmdResponse::decode(&[0x12, 0x34]),
            Err(SdpError::MalformedFrame {
                expected: 4,
                got: 2
            })
        ));
    }

    #[test]
    fn trailing_bytes_after_the_word_are_ignored() {
        let resp = CmdResponse::decode(&[0x88, 0x88, 0x88, 0x88, 0x00, 0x00]).unwrap();
        assert!(resp.is(ResponseValue::WriteFileOk));
    }
}
