#![warn(rust_2018_idioms)]

//! ALC/LCT header decoding, per-TOI object reassembly, and the FDT store
//! (spec §4.2–§4.3, §6).

pub mod api;
pub mod error;
pub mod fec;
pub mod header;
pub mod object;
pub mod reassembler;

pub use api::{error_code, AlcRecvResult, AlcStore};
pub use error::{Error, Result};
pub use fec::{FecRegistry, IFecDecoder};
pub use header::{analyze_alc_packet, AnalyzedAlcPacket, FecObjectInfo, LctHeader};
pub use object::{ObjectKind, ObjectState, SymbolKey, Toi, TransportBlock, TransportObject, FDT_TOI};
pub use reassembler::{AlcObjectReassembler, IngestOutcome};
