//! MMTP fragment reassembly (spec §4.4): routes each MPU-type payload to
//! the right sub-flow and bucket vector, and exposes `find_mpu_sequence`
//! for the joiner.

use bytes::Bytes;
use log::debug;

use crate::bucket::MpuFragmentBucket;
use crate::error::Result;
use crate::header::{decode_common_header, decode_mpu_header, FragmentType, PayloadType};
use crate::subflow::{PacketId, SubFlowRegistry, VectorKind};
use atsc3_buffer::Telemetry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// A fragment was appended to an MPU bucket; `bucket_complete` tells
    /// the session receive loop whether to consider re-invoking the joiner.
    MpuFragmentAppended {
        packet_id: PacketId,
        mpu_sequence_number: u32,
        vector: VectorKindTag,
        bucket_complete: bool,
    },
    /// A signalling-message payload, to be handed to a `SignallingTableStore`.
    SignallingFragment { packet_id: PacketId, payload: Bytes },
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorKindTag {
    MpuMetadata,
    MovieFragmentMetadata,
    MediaFragmentUnit,
}

impl From<FragmentType> for (VectorKind, VectorKindTag) {
    fn from(ft: FragmentType) -> Self {
        match ft {
            FragmentType::MpuMetadata => (VectorKind::MpuMetadata, VectorKindTag::MpuMetadata),
            FragmentType::MovieFragmentMetadata => {
                (VectorKind::MovieFragmentMetadata, VectorKindTag::MovieFragmentMetadata)
            }
            FragmentType::MediaFragmentUnit => {
                (VectorKind::MediaFragmentUnit, VectorKindTag::MediaFragmentUnit)
            }
        }
    }
}

pub struct MmtpFragmentReassembler {
    subflows: SubFlowRegistry,
    telemetry: Telemetry,
}

impl MmtpFragmentReassembler {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            subflows: SubFlowRegistry::new(),
            telemetry,
        }
    }

    /// Decodes one packet and appends its payload to the appropriate
    /// sub-flow/vector/bucket.
    pub fn ingest(&mut self, packet: &[u8]) -> IngestEvent {
        let (common, rest) = match decode_common_header(packet) {
            Ok(v) => v,
            Err(_) => {
                self.telemetry.record_malformed_header();
                return IngestEvent::Dropped;
            }
        };

        match common.payload_type {
            PayloadType::Signalling => IngestEvent::SignallingFragment {
                packet_id: common.packet_id,
                payload: Bytes::copy_from_slice(rest),
            },
            PayloadType::Mpu => {
                let (mpu, payload) = match decode_mpu_header(rest) {
                    Ok(v) => v,
                    Err(_) => {
                        self.telemetry.record_malformed_header();
                        return IngestEvent::Dropped;
                    }
                };
                let (vector_kind, vector_tag) = mpu.fragment_type.into();
                let subflow = self.subflows.get_or_create(common.packet_id);
                let bucket = subflow.vector_mut(vector_kind).get_or_create(mpu.mpu_sequence_number);
                bucket.append(
                    mpu.fragmentation_indicator,
                    mpu.fragmentation_counter,
                    Bytes::copy_from_slice(payload),
                );
                let bucket_complete = bucket.is_complete();
                debug!(
                    "mmtp packet_id={} mpu_seq={} vector={:?} complete={}",
                    common.packet_id, mpu.mpu_sequence_number, vector_tag, bucket_complete
                );
                IngestEvent::MpuFragmentAppended {
                    packet_id: common.packet_id,
                    mpu_sequence_number: mpu.mpu_sequence_number,
                    vector: vector_tag,
                    bucket_complete,
                }
            }
        }
    }

    /// Spec §4.4 `find_mpu_sequence(packet_id, seq, vector_kind)`.
    pub fn find_mpu_sequence(
        &self,
        packet_id: PacketId,
        seq: u32,
        vector_kind: VectorKind,
    ) -> Option<&MpuFragmentBucket> {
        self.subflows.get(packet_id)?.vector(vector_kind).get(seq)
    }

    pub fn highest_mpu_sequence(&self, packet_id: PacketId, vector_kind: VectorKind) -> Option<u32> {
        self.subflows
            .get(packet_id)?
            .vector(vector_kind)
            .newest_first()
            .next()
            .map(|b| b.mpu_sequence_number)
    }

    /// Newest-first walk over one sub-flow's bucket vector, for the
    /// joiner's Phase 1 init-box search (spec §4.6).
    pub fn newest_first(
        &self,
        packet_id: PacketId,
        vector_kind: VectorKind,
    ) -> impl Iterator<Item = &MpuFragmentBucket> {
        self.subflows
            .get(packet_id)
            .into_iter()
            .flat_map(move |sf| sf.vector(vector_kind).newest_first())
    }
}

impl Default for MmtpFragmentReassembler {
    fn default() -> Self {
        Self::new(Telemetry::new())
    }
}
