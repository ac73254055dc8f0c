//! MMTP header decoding (spec §4.2): the common header shared by every
//! payload type, and the MPU-type header carried when `payload_type ==
//! Mpu`. Field widths are fixed here to concrete values (not a
//! byte-for-byte transcription of any one MMTP profile).
//!
//! ```text
//! common header (12 bytes):
//!   byte 0: version:4 | reserved:4
//!   byte 1: payload_type (u8)
//!   bytes 2-3: packet_id (u16)
//!   bytes 4-7: timestamp (u32, NTP short seconds)
//!   bytes 8-11: packet_sequence_number (u32)
//!
//! MPU-type header (6 bytes, present when payload_type == Mpu):
//!   bytes 0-3: mpu_sequence_number (u32)
//!   byte 4: fragmentation_indicator:2 | fragment_type:3 | reserved:3
//!   byte 5: fragmentation_counter (u8)
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

pub const MMTP_VERSION: u8 = 0;
const COMMON_HEADER_LEN: usize = 12;
const MPU_HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Mpu,
    Signalling,
}

impl PayloadType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(PayloadType::Mpu),
            1 => Ok(PayloadType::Signalling),
            _ => Err(Error::UnsupportedCodepoint("unknown MMTP payload_type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmtpCommonHeader {
    pub version: u8,
    pub payload_type: PayloadType,
    pub packet_id: u16,
    pub timestamp: u32,
    pub packet_sequence_number: u32,
}

pub fn decode_common_header(data: &[u8]) -> Result<(MmtpCommonHeader, &[u8])> {
    if data.len() < COMMON_HEADER_LEN {
        return Err(Error::TruncatedHeader {
            needed: COMMON_HEADER_LEN,
            have: data.len(),
        });
    }
    let version = (data[0] >> 4) & 0xF;
    if version != MMTP_VERSION {
        return Err(Error::UnsupportedCodepoint("MMTP version mismatch"));
    }
    let payload_type = PayloadType::from_u8(data[1])?;
    let packet_id = BigEndian::read_u16(&data[2..4]);
    let timestamp = BigEndian::read_u32(&data[4..8]);
    let packet_sequence_number = BigEndian::read_u32(&data[8..12]);

    let header = MmtpCommonHeader {
        version,
        payload_type,
        packet_id,
        timestamp,
        packet_sequence_number,
    };
    Ok((header, &data[COMMON_HEADER_LEN..]))
}

/// Position of a fragment within its MPU sequence (spec §3 `MPUFragmentBucket`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentIndicator {
    Standalone,
    First,
    Middle,
    Last,
}

impl FragmentIndicator {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => FragmentIndicator::Standalone,
            1 => FragmentIndicator::First,
            2 => FragmentIndicator::Middle,
            _ => FragmentIndicator::Last,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            FragmentIndicator::Standalone => 0,
            FragmentIndicator::First => 1,
            FragmentIndicator::Middle => 2,
            FragmentIndicator::Last => 3,
        }
    }
}

/// Which reassembly vector within the sub-flow a fragment belongs to
/// (spec §3 `SubFlow`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentType {
    MpuMetadata,
    MovieFragmentMetadata,
    MediaFragmentUnit,
}

impl FragmentType {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(FragmentType::MpuMetadata),
            1 => Ok(FragmentType::MovieFragmentMetadata),
            2 => Ok(FragmentType::MediaFragmentUnit),
            _ => Err(Error::UnsupportedCodepoint("unknown MMTP fragment_type")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpuTypeHeader {
    pub mpu_sequence_number: u32,
    pub fragmentation_indicator: FragmentIndicator,
    pub fragment_type: FragmentType,
    pub fragmentation_counter: u8,
}

pub fn decode_mpu_header(data: &[u8]) -> Result<(MpuTypeHeader, &[u8])> {
    if data.len() < MPU_HEADER_LEN {
        return Err(Error::TruncatedHeader {
            needed: MPU_HEADER_LEN,
            have: data.len(),
        });
    }
    let mpu_sequence_number = BigEndian::read_u32(&data[0..4]);
    let fragmentation_indicator = FragmentIndicator::from_bits((data[4] >> 6) & 0x3);
    let fragment_type = FragmentType::from_bits((data[4] >> 3) & 0x7)?;
    let fragmentation_counter = data[5];

    let header = MpuTypeHeader {
        mpu_sequence_number,
        fragmentation_indicator,
        fragment_type,
        fragmentation_counter,
    };
    Ok((header, &data[MPU_HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_packet(payload_type: u8, packet_id: u16, seq: u32) -> Vec<u8> {
        let mut p = vec![MMTP_VERSION << 4, payload_type];
        p.extend_from_slice(&packet_id.to_be_bytes());
        p.extend_from_slice(&0u32.to_be_bytes());
        p.extend_from_slice(&seq.to_be_bytes());
        p
    }

    #[test]
    fn decodes_common_header() {
        let packet = build_packet(0, 42, 100);
        let (header, rest) = decode_common_header(&packet).unwrap();
        assert_eq!(header.payload_type, PayloadType::Mpu);
        assert_eq!(header.packet_id, 42);
        assert_eq!(header.packet_sequence_number, 100);
        assert!(rest.is_empty());
    }

    #[test]
    fn decodes_mpu_header_fragment_fields() {
        let mut p = build_packet(0, 1, 0);
        p.extend_from_slice(&7u32.to_be_bytes());
        p.push((2 << 6) | (2 << 3)); // middle, media_fragment_unit
        p.push(5);
        let (_, rest) = decode_common_header(&p).unwrap();
        let (mpu, _) = decode_mpu_header(rest).unwrap();
        assert_eq!(mpu.mpu_sequence_number, 7);
        assert_eq!(mpu.fragmentation_indicator, FragmentIndicator::Middle);
        assert_eq!(mpu.fragment_type, FragmentType::MediaFragmentUnit);
        assert_eq!(mpu.fragmentation_counter, 5);
    }

    #[test]
    fn rejects_truncated_common_header() {
        let packet = vec![0u8; 4];
        assert!(matches!(
            decode_common_header(&packet),
            Err(Error::TruncatedHeader { .. })
        ));
    }
}
