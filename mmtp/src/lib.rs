#![warn(rust_2018_idioms)]

//! MMTP header decoding, per-(packet-id, MPU-sequence) fragment
//! reassembly, and the MPT signalling store (spec §4.2, §4.4–§4.5).

pub mod bucket;
pub mod error;
pub mod header;
pub mod reassembler;
pub mod signalling;
pub mod subflow;

pub use bucket::MpuFragmentBucket;
pub use error::{Error, Result};
pub use header::{
    decode_common_header, decode_mpu_header, FragmentIndicator, FragmentType, MmtpCommonHeader,
    MpuTypeHeader, PayloadType,
};
pub use reassembler::{IngestEvent, MmtpFragmentReassembler, VectorKindTag};
pub use signalling::{AssetRow, MpTable, MpuTimestampDescriptor, SignallingTableStore};
pub use subflow::{BucketVector, PacketId, SubFlow, SubFlowRegistry, VectorKind};
