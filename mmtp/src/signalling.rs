//! MPT (Media Presentation Table) signalling store (spec §4.5): parses
//! signalling-message fragments into an `MPTable` and answers
//! presentation-time lookups for the joiner's Phase 5.
//!
//! Wire format (self-contained, not a transcription of any MMT profile):
//! ```text
//! u8  num_assets
//! per asset:
//!   u16 packet_id
//!   u8  asset_type
//!   u8  default_asset_flag (0/1)
//!   u16 identifier_len, then that many bytes
//!   u8  has_timestamp_descriptor (0/1)
//!   if 1: u16 num_tuples, then per tuple: u32 mpu_sequence_number, u64 mpu_presentation_time (raw NTP-64)
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::subflow::PacketId;
use atsc3_buffer::Ntp64;

#[derive(Debug, Clone, Default)]
pub struct MpuTimestampDescriptor {
    pub entries: Vec<(u32, Ntp64)>,
}

#[derive(Debug, Clone)]
pub struct AssetRow {
    pub packet_id: PacketId,
    pub asset_type: u8,
    pub default_asset_flag: bool,
    pub identifier: Bytes,
    pub mpu_timestamp_descriptor: Option<MpuTimestampDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct MpTable {
    pub assets: Vec<AssetRow>,
}

impl MpTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::MalformedSignalling("empty MPT message"));
        }
        let num_assets = data[0] as usize;
        let mut cursor = 1usize;
        let mut assets = Vec::with_capacity(num_assets);

        for _ in 0..num_assets {
            require(data, cursor, 6)?;
            let packet_id = BigEndian::read_u16(&data[cursor..cursor + 2]);
            let asset_type = data[cursor + 2];
            let default_asset_flag = data[cursor + 3] != 0;
            let identifier_len = BigEndian::read_u16(&data[cursor + 4..cursor + 6]) as usize;
            cursor += 6;

            require(data, cursor, identifier_len)?;
            let identifier = Bytes::copy_from_slice(&data[cursor..cursor + identifier_len]);
            cursor += identifier_len;

            require(data, cursor, 1)?;
            let has_descriptor = data[cursor] != 0;
            cursor += 1;

            let mpu_timestamp_descriptor = if has_descriptor {
                require(data, cursor, 2)?;
                let num_tuples = BigEndian::read_u16(&data[cursor..cursor + 2]) as usize;
                cursor += 2;
                let mut entries = Vec::with_capacity(num_tuples);
                for _ in 0..num_tuples {
                    require(data, cursor, 12)?;
                    let mpu_sequence_number = BigEndian::read_u32(&data[cursor..cursor + 4]);
                    let raw_ntp = BigEndian::read_u64(&data[cursor + 4..cursor + 12]);
                    entries.push((mpu_sequence_number, Ntp64::new(raw_ntp)));
                    cursor += 12;
                }
                Some(MpuTimestampDescriptor { entries })
            } else {
                None
            };

            assets.push(AssetRow {
                packet_id,
                asset_type,
                default_asset_flag,
                identifier,
                mpu_timestamp_descriptor,
            });
        }

        Ok(MpTable { assets })
    }
}

fn require(data: &[u8], cursor: usize, len: usize) -> Result<()> {
    if data.len() < cursor + len {
        return Err(Error::MalformedSignalling("MPT message truncated"));
    }
    Ok(())
}

/// Copy-on-write store for the current MPT snapshot (spec §5: "writers
/// install a new MPTable atomically; readers take a snapshot pointer").
#[derive(Debug, Default)]
pub struct SignallingTableStore {
    current: ArcSwap<MpTable>,
}

impl SignallingTableStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(MpTable::default()),
        }
    }

    pub fn ingest_message(&self, data: &[u8]) -> Result<()> {
        let table = MpTable::parse(data)?;
        self.current.store(Arc::new(table));
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<MpTable> {
        self.current.load_full()
    }

    /// Scans the most recent MPT for the first tuple matching
    /// `(packet_id, mpu_seq)` (spec §4.5 lookup contract).
    pub fn presentation_time_for(&self, packet_id: PacketId, mpu_seq: u32) -> Option<Ntp64> {
        let table = self.current.load();
        table
            .assets
            .iter()
            .find(|a| a.packet_id == packet_id)
            .and_then(|a| a.mpu_timestamp_descriptor.as_ref())
            .and_then(|d| d.entries.iter().find(|(seq, _)| *seq == mpu_seq))
            .map(|(_, ts)| *ts)
    }
}
