//! LCT/ALC fixed and optional header decoding (spec §4.2).
//!
//! Layout (self-contained, not a byte-for-byte RFC 5651 transcription —
//! the FEC Object Transmission Information placement and sizing follow
//! the same degrees of freedom the RFC grants, fixed here to concrete
//! field widths):
//!
//! ```text
//! byte 0: version:4 | congestion_control:2 | reserved:2
//! byte 1: close_session:1 | close_object:1 | toi_is_64bit:1 | tsi_is_64bit:1 | reserved:4
//! byte 2: header_len_words (u8, total LCT header length in 32-bit words)
//! byte 3: codepoint (u8, doubles as FEC encoding ID)
//! ..   : TSI (4 or 8 bytes, per tsi_is_64bit)
//! ..   : TOI (4 or 8 bytes, per toi_is_64bit)
//! ..   : header extensions, padding out to header_len_words * 4 (ignored)
//! ..   : FEC Payload ID — 4 bytes (sbn:u8, esi:u24) if codepoint == 128 (Raptor),
//!        otherwise a 4-byte start_offset
//! ..   : payload
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

pub const LCT_VERSION: u8 = 1;
pub const RAPTOR_FEC_ENCODING_ID: u8 = 128;
const FIXED_HEADER_LEN: usize = 4;
const FEC_PAYLOAD_ID_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LctHeader {
    pub version: u8,
    pub congestion_control: u8,
    pub close_session: bool,
    pub close_object: bool,
    pub codepoint: u8,
    pub tsi: u64,
    pub toi: u64,
}

/// FEC object transmission information extracted per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecObjectInfo {
    /// FEC encoding ID 128 (Raptor): `(source block number, encoding symbol id)`.
    RaptorSbnEsi { sbn: u8, esi: u32 },
    /// Any other FEC encoding: byte offset of the symbol within the object.
    StartOffset(u32),
}

impl FecObjectInfo {
    pub fn source_block_number(&self) -> u8 {
        match self {
            FecObjectInfo::RaptorSbnEsi { sbn, .. } => *sbn,
            // Non-SBN FEC schemes reassemble into a single implicit block.
            FecObjectInfo::StartOffset(_) => 0,
        }
    }
}

/// A fully decoded ALC packet: LCT header, FEC transmission info, and the
/// remaining payload slice.
#[derive(Debug, Clone)]
pub struct AnalyzedAlcPacket<'a> {
    pub lct: LctHeader,
    pub fec_encoding_id: u8,
    pub fec_info: FecObjectInfo,
    pub payload: &'a [u8],
}

/// Decodes the fixed + variable-width TSI/TOI portion of an LCT header.
/// Returns the header and the number of bytes consumed (`header_len_words
/// * 4`), so the caller can slice off FEC Payload ID + payload next.
pub fn decode_lct_header(data: &[u8]) -> Result<(LctHeader, usize)> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(Error::TruncatedHeader {
            needed: FIXED_HEADER_LEN,
            have: data.len(),
        });
    }

    let version = (data[0] >> 4) & 0xF;
    if version != LCT_VERSION {
        return Err(Error::UnsupportedCodepoint("LCT version != 1"));
    }
    let congestion_control = (data[0] >> 2) & 0x3;
    if data[0] & 0x3 != 0 {
        return Err(Error::UnsupportedCodepoint("reserved bits in byte 0 set"));
    }

    let close_session = (data[1] & 0b1000_0000) != 0;
    let close_object = (data[1] & 0b0100_0000) != 0;
    let toi_is_64bit = (data[1] & 0b0010_0000) != 0;
    let tsi_is_64bit = (data[1] & 0b0001_0000) != 0;

    let header_len_words = data[2] as usize;
    let header_len_bytes = header_len_words * 4;
    let codepoint = data[3];

    let tsi_len = if tsi_is_64bit { 8 } else { 4 };
    let toi_len = if toi_is_64bit { 8 } else { 4 };
    let min_len = FIXED_HEADER_LEN + tsi_len + toi_len;

    if data.len() < min_len {
        return Err(Error::TruncatedHeader {
            needed: min_len,
            have: data.len(),
        });
    }
    if header_len_bytes < min_len {
        return Err(Error::UnsupportedCodepoint("header_len_words too small for TSI/TOI"));
    }
    if data.len() < header_len_bytes {
        return Err(Error::TruncatedHeader {
            needed: header_len_bytes,
            have: data.len(),
        });
    }

    let mut offset = FIXED_HEADER_LEN;
    let tsi = read_be_uint(&data[offset..offset + tsi_len]);
    offset += tsi_len;
    let toi = read_be_uint(&data[offset..offset + toi_len]);

    let header = LctHeader {
        version,
        congestion_control,
        close_session,
        close_object,
        codepoint,
        tsi,
        toi,
    };
    Ok((header, header_len_bytes))
}

/// Decodes the FEC Payload ID immediately following the LCT header, per
/// the codepoint/FEC-encoding-ID carried in the header.
pub fn decode_fec_object_info(codepoint: u8, data: &[u8]) -> Result<(FecObjectInfo, &[u8])> {
    if data.len() < FEC_PAYLOAD_ID_LEN {
        return Err(Error::TruncatedHeader {
            needed: FEC_PAYLOAD_ID_LEN,
            have: data.len(),
        });
    }
    let (fec_id_bytes, rest) = data.split_at(FEC_PAYLOAD_ID_LEN);
    let info = if codepoint == RAPTOR_FEC_ENCODING_ID {
        let sbn = fec_id_bytes[0];
        let esi = ((fec_id_bytes[1] as u32) << 16)
            | ((fec_id_bytes[2] as u32) << 8)
            | fec_id_bytes[3] as u32;
        FecObjectInfo::RaptorSbnEsi { sbn, esi }
    } else {
        FecObjectInfo::StartOffset(BigEndian::read_u32(fec_id_bytes))
    };
    Ok((info, rest))
}

/// Decodes a complete ALC packet: LCT header, FEC info, and payload slice.
pub fn analyze_alc_packet(data: &[u8]) -> Result<AnalyzedAlcPacket<'_>> {
    let (lct, consumed) = decode_lct_header(data)?;
    let (fec_info, payload) = decode_fec_object_info(lct.codepoint, &data[consumed..])?;
    Ok(AnalyzedAlcPacket {
        lct,
        fec_encoding_id: lct.codepoint,
        fec_info,
        payload,
    })
}

fn read_be_uint(bytes: &[u8]) -> u64 {
    let mut v: u64 = 0;
    for b in bytes {
        v = (v << 8) | (*b as u64);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_packet(codepoint: u8, toi: u32, fec_id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut p = vec![0u8; 0];
        p.push(LCT_VERSION << 4); // version=1, cc=0, reserved=0
        p.push(0); // no close flags, 32-bit TSI/TOI
        p.push(3); // header_len_words = 3 (12 bytes: 4 fixed + 4 TSI + 4 TOI)
        p.push(codepoint);
        p.extend_from_slice(&0u32.to_be_bytes()); // TSI = 0
        p.extend_from_slice(&toi.to_be_bytes());
        p.extend_from_slice(fec_id);
        p.extend_from_slice(payload);
        p
    }

    #[test]
    fn decodes_raptor_fec_info() {
        let packet = build_packet(RAPTOR_FEC_ENCODING_ID, 7, &[2, 0, 0, 5], b"hello");
        let analyzed = analyze_alc_packet(&packet).unwrap();
        assert_eq!(analyzed.lct.toi, 7);
        assert_eq!(analyzed.payload, b"hello");
        match analyzed.fec_info {
            FecObjectInfo::RaptorSbnEsi { sbn, esi } => {
                assert_eq!(sbn, 2);
                assert_eq!(esi, 5);
            }
            _ => panic!("expected raptor fec info"),
        }
    }

    #[test]
    fn decodes_start_offset_for_non_raptor() {
        let packet = build_packet(0, 9, &[0, 0, 0, 42], b"world");
        let analyzed = analyze_alc_packet(&packet).unwrap();
        assert_eq!(analyzed.fec_info, FecObjectInfo::StartOffset(42));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut packet = build_packet(0, 1, &[0; 4], b"x");
        packet[0] = 2 << 4; // version 2
        assert!(matches!(
            analyze_alc_packet(&packet),
            Err(Error::UnsupportedCodepoint(_))
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let packet = vec![LCT_VERSION << 4, 0, 3];
        assert!(matches!(
            analyze_alc_packet(&packet),
            Err(Error::TruncatedHeader { .. })
        ));
    }
}
