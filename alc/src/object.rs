//! TOI-keyed transport objects and the blocks/symbols they're built from
//! (spec §3 data model, §4.3).

use std::collections::BTreeMap;

use bytes::Bytes;

pub type Toi = u64;

/// FDT instances are carried under this reserved TOI (spec §4.3: "FDT
/// lives under a reserved TOI").
pub const FDT_TOI: Toi = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Fdt,
    Normal,
}

impl ObjectKind {
    pub fn for_toi(toi: Toi) -> Self {
        if toi == FDT_TOI {
            ObjectKind::Fdt
        } else {
            ObjectKind::Normal
        }
    }
}

/// Key under which a symbol is stored within its block: by encoding
/// symbol ID for Raptor, or by byte offset for any other FEC scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymbolKey {
    Esi(u32),
    Offset(u64),
}

/// Ordered collection of encoding-symbol payloads for one source block
/// number. `decoded` is populated once the FEC decoder (or the pass-through
/// no-code path) produces contiguous source data.
#[derive(Debug, Clone, Default)]
pub struct TransportBlock {
    pub sbn: u8,
    symbols: BTreeMap<SymbolKey, Bytes>,
    pub decoded: Option<Bytes>,
}

impl TransportBlock {
    pub fn new(sbn: u8) -> Self {
        Self {
            sbn,
            symbols: BTreeMap::new(),
            decoded: None,
        }
    }

    /// Inserts a symbol, deduplicating by key. Returns `false` if the key
    /// was already present (the packet is a duplicate, per the reassembly
    /// invariant that every symbol is represented at most once).
    pub fn insert_symbol(&mut self, key: SymbolKey, payload: Bytes) -> bool {
        if self.symbols.contains_key(&key) {
            return false;
        }
        self.symbols.insert(key, payload);
        true
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&SymbolKey, &Bytes)> {
        self.symbols.iter()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// True when offset-keyed symbols form one contiguous run starting at
    /// zero, with no gaps. Used by the no-code FEC path, where a "block"
    /// is just payload bytes split across packets with no redundancy.
    pub fn is_contiguous_from_zero(&self) -> bool {
        let mut expected = 0u64;
        for (key, payload) in &self.symbols {
            match key {
                SymbolKey::Offset(off) => {
                    if *off != expected {
                        return false;
                    }
                    expected += payload.len() as u64;
                }
                SymbolKey::Esi(_) => return false,
            }
        }
        !self.symbols.is_empty()
    }

    /// Concatenates offset-keyed symbols in order. Caller must have
    /// already verified contiguity.
    pub fn concat_by_offset(&self) -> Bytes {
        let mut out = Vec::new();
        for (_, payload) in &self.symbols {
            out.extend_from_slice(payload);
        }
        Bytes::from(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Pending,
    Completed,
    Incomplete,
}

/// One TOI-identified deliverable within a session (spec §3).
#[derive(Debug, Clone)]
pub struct TransportObject {
    pub toi: Toi,
    pub kind: ObjectKind,
    pub transfer_len: Option<u64>,
    pub blocks: BTreeMap<u8, TransportBlock>,
    pub close_object: bool,
    pub close_session: bool,
    pub state: ObjectState,
    /// FDT-only: `Content-Encoding` and `FDT-Instance-Id` from the FLUTE
    /// header extension carrying this instance. `None` for normal objects.
    pub content_encoding: Option<String>,
    pub fdt_instance_id: Option<u32>,
}

impl TransportObject {
    pub fn new(toi: Toi) -> Self {
        Self {
            toi,
            kind: ObjectKind::for_toi(toi),
            transfer_len: None,
            blocks: BTreeMap::new(),
            close_object: false,
            close_session: false,
            state: ObjectState::Pending,
            content_encoding: None,
            fdt_instance_id: None,
        }
    }

    pub fn block_mut(&mut self, sbn: u8) -> &mut TransportBlock {
        self.blocks.entry(sbn).or_insert_with(|| TransportBlock::new(sbn))
    }

    /// Fixes the transfer length on first observation; later packets
    /// carrying a differing value are ignored (spec: "fixed on first
    /// carrying packet").
    pub fn set_transfer_len_if_unset(&mut self, len: u64) {
        if self.transfer_len.is_none() {
            self.transfer_len = Some(len);
        }
    }

    /// Latches sticky once set (spec §4.3 step 4).
    pub fn latch_close_flags(&mut self, close_object: bool, close_session: bool) {
        self.close_object |= close_object;
        self.close_session |= close_session;
    }

    pub fn set_fdt_metadata(&mut self, content_encoding: String, fdt_instance_id: u32) {
        self.content_encoding = Some(content_encoding);
        self.fdt_instance_id = Some(fdt_instance_id);
    }

    pub fn decoded_len(&self) -> u64 {
        self.blocks
            .values()
            .filter_map(|b| b.decoded.as_ref())
            .map(|d| d.len() as u64)
            .sum()
    }

    /// True iff every block has been decoded and the accounted length
    /// satisfies the known (or, absent one, the close_object-signalled)
    /// transfer length (spec §4.3: `object_completed`).
    pub fn is_completed(&self) -> bool {
        if self.blocks.is_empty() || !self.blocks.values().all(|b| b.decoded.is_some()) {
            return false;
        }
        match self.transfer_len {
            Some(len) => self.decoded_len() >= len,
            None => self.close_object,
        }
    }

    /// Concatenates decoded blocks in SBN order into the final payload.
    /// Caller must check `is_completed` first.
    pub fn concat_payload(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.decoded_len() as usize);
        for block in self.blocks.values() {
            if let Some(decoded) = &block.decoded {
                out.extend_from_slice(decoded);
            }
        }
        Bytes::from(out)
    }
}
