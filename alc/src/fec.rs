//! FEC decoding is intentionally out of scope here: Reed-Solomon and
//! Raptor require a real coding library. This module defines the seam
//! (`IFecDecoder`) the reassembler calls into, plus the one scheme simple
//! enough to implement directly — Compact No-Code, which is just framing
//! with no redundancy.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::object::TransportBlock;

pub const COMPACT_NO_CODE_ID: u8 = 0;

/// A pluggable FEC scheme. The reassembler asks `is_ready` after every
/// inserted symbol and calls `decode` exactly once a block is ready.
pub trait IFecDecoder: Send + Sync {
    fn encoding_id(&self) -> u8;

    /// FEC-specific completeness predicate (spec §4.3 `block_ready_to_decode`):
    /// all source symbols present for no-code, k-of-n for RS/Raptor.
    /// `transfer_len_hint` is the object's transfer length when known, used
    /// by schemes (like no-code) that have no independent symbol count.
    fn is_ready(&self, block: &TransportBlock, transfer_len_hint: Option<u64>) -> bool;

    /// Produces source data from a ready block. Implementations may
    /// assume `is_ready` has already returned true.
    fn decode(&self, block: &TransportBlock) -> Result<Bytes>;
}

/// No redundancy: symbols are payload bytes at known offsets. Ready once
/// they form one contiguous run from zero; "decoding" is concatenation.
#[derive(Debug, Default)]
pub struct CompactNoCodeDecoder;

impl IFecDecoder for CompactNoCodeDecoder {
    fn encoding_id(&self) -> u8 {
        COMPACT_NO_CODE_ID
    }

    fn is_ready(&self, block: &TransportBlock, _transfer_len_hint: Option<u64>) -> bool {
        block.is_contiguous_from_zero()
    }

    fn decode(&self, block: &TransportBlock) -> Result<Bytes> {
        Ok(block.concat_by_offset())
    }
}

/// Looks up the decoder registered for an encoding ID. Holds the built-in
/// Compact No-Code scheme and any externally supplied decoders (Raptor,
/// Reed-Solomon) registered by the embedding application.
pub struct FecRegistry {
    decoders: Vec<Box<dyn IFecDecoder>>,
}

impl Default for FecRegistry {
    fn default() -> Self {
        Self {
            decoders: vec![Box::new(CompactNoCodeDecoder)],
        }
    }
}

impl FecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decoder: Box<dyn IFecDecoder>) {
        self.decoders.retain(|d| d.encoding_id() != decoder.encoding_id());
        self.decoders.push(decoder);
    }

    pub fn get(&self, encoding_id: u8) -> Result<&dyn IFecDecoder> {
        self.decoders
            .iter()
            .find(|d| d.encoding_id() == encoding_id)
            .map(|b| b.as_ref())
            .ok_or(Error::UnsupportedFec(encoding_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::SymbolKey;

    #[test]
    fn compact_no_code_ready_once_contiguous() {
        let mut block = TransportBlock::new(0);
        let decoder = CompactNoCodeDecoder;
        assert!(!decoder.is_ready(&block, None));
        block.insert_symbol(SymbolKey::Offset(0), Bytes::from_static(b"hi"));
        assert!(decoder.is_ready(&block, None));
        assert_eq!(decoder.decode(&block).unwrap(), Bytes::from_static(b"hi"));
    }

    #[test]
    fn registry_rejects_unknown_encoding() {
        let registry = FecRegistry::new();
        assert!(matches!(registry.get(128), Err(Error::UnsupportedFec(128))));
        assert!(registry.get(COMPACT_NO_CODE_ID).is_ok());
    }
}
