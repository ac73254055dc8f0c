//! `SubFlow` (spec §3): per-packet-id reassembly state, holding the three
//! fragment vectors. Signalling-message payloads bypass the sub-flow
//! entirely: `MmtpFragmentReassembler::ingest` routes them straight out as
//! `IngestEvent::SignallingFragment` for the caller to hand to a
//! `SignallingTableStore`, so no per-sub-flow history is kept for them.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::bucket::MpuFragmentBucket;

pub type PacketId = u16;

/// Buckets that haven't completed by the time they're this many MPU
/// sequences behind the latest are reaped (spec §4.4).
const REAP_WINDOW: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKind {
    MpuMetadata,
    MovieFragmentMetadata,
    MediaFragmentUnit,
}

/// One of the three bucket vectors indexed by MPU sequence number, with
/// reap-on-insert bookkeeping.
#[derive(Debug, Default)]
pub struct BucketVector {
    buckets: BTreeMap<u32, MpuFragmentBucket>,
    latest_seq: Option<u32>,
}

impl BucketVector {
    pub fn get_or_create(&mut self, mpu_sequence_number: u32) -> &mut MpuFragmentBucket {
        let is_new = !self.buckets.contains_key(&mpu_sequence_number);
        let bucket = self
            .buckets
            .entry(mpu_sequence_number)
            .or_insert_with(|| MpuFragmentBucket::new(mpu_sequence_number));
        if is_new {
            self.latest_seq = Some(self.latest_seq.map_or(mpu_sequence_number, |l| l.max(mpu_sequence_number)));
            self.reap();
        }
        bucket
    }

    pub fn get(&self, mpu_sequence_number: u32) -> Option<&MpuFragmentBucket> {
        self.buckets.get(&mpu_sequence_number)
    }

    /// Newest-first walk, for Phase 1's "first bucket whose fragments
    /// reassemble completely" search (spec §4.6).
    pub fn newest_first(&self) -> impl Iterator<Item = &MpuFragmentBucket> {
        self.buckets.values().rev()
    }

    fn reap(&mut self) {
        let Some(latest) = self.latest_seq else { return };
        let threshold = latest.saturating_sub(REAP_WINDOW);
        self.buckets.retain(|seq, bucket| *seq >= threshold || bucket.is_complete());
    }
}

#[derive(Debug, Default)]
pub struct SubFlow {
    pub packet_id: PacketId,
    pub mpu_metadata_fragments_vector: BucketVector,
    pub movie_fragment_metadata_vector: BucketVector,
    pub media_fragment_unit_vector: BucketVector,
}

impl SubFlow {
    pub fn new(packet_id: PacketId) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }

    pub fn vector_mut(&mut self, kind: VectorKind) -> &mut BucketVector {
        match kind {
            VectorKind::MpuMetadata => &mut self.mpu_metadata_fragments_vector,
            VectorKind::MovieFragmentMetadata => &mut self.movie_fragment_metadata_vector,
            VectorKind::MediaFragmentUnit => &mut self.media_fragment_unit_vector,
        }
    }

    pub fn vector(&self, kind: VectorKind) -> &BucketVector {
        match kind {
            VectorKind::MpuMetadata => &self.mpu_metadata_fragments_vector,
            VectorKind::MovieFragmentMetadata => &self.movie_fragment_metadata_vector,
            VectorKind::MediaFragmentUnit => &self.media_fragment_unit_vector,
        }
    }
}

/// Owns every sub-flow within one channel, keyed by MMTP packet-id
/// (spec §3 "sub-flow registries are owned by sessions").
#[derive(Debug, Default)]
pub struct SubFlowRegistry {
    subflows: HashMap<PacketId, SubFlow>,
}

impl SubFlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, packet_id: PacketId) -> &mut SubFlow {
        self.subflows.entry(packet_id).or_insert_with(|| SubFlow::new(packet_id))
    }

    pub fn get(&self, packet_id: PacketId) -> Option<&SubFlow> {
        self.subflows.get(&packet_id)
    }
}
