//! Per-TOI object reassembly (spec §4.3): the six-step ingest protocol,
//! completion detection, and the idempotent-discard / incomplete-at-close
//! failure semantics.

use std::collections::HashMap;

use log::debug;

use crate::error::{Error, Result};
use crate::fec::FecRegistry;
use crate::header::{self, FecObjectInfo};
use crate::object::{ObjectKind, SymbolKey, Toi, TransportObject};
use atsc3_buffer::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Header decode failed, or the packet targets an already-completed
    /// or already-incomplete object; discarded idempotently.
    Dropped,
    /// Symbol accepted; object not yet complete.
    Progressed,
    /// Object reached its completion predicate on this packet.
    Completed(Toi),
}

pub struct AlcObjectReassembler {
    objects: HashMap<Toi, TransportObject>,
    fec: FecRegistry,
    telemetry: Telemetry,
}

impl AlcObjectReassembler {
    pub fn new(telemetry: Telemetry) -> Self {
        Self::with_fec_registry(telemetry, FecRegistry::new())
    }

    pub fn with_fec_registry(telemetry: Telemetry, fec: FecRegistry) -> Self {
        Self {
            objects: HashMap::new(),
            fec,
            telemetry,
        }
    }

    /// Decodes the LCT/ALC header and FEC transmission info for a raw
    /// packet (spec §4.3 `analyze`).
    pub fn analyze<'a>(&self, packet: &'a [u8]) -> Result<header::AnalyzedAlcPacket<'a>> {
        header::analyze_alc_packet(packet)
    }

    /// Spec §4.3 `object_exists`: lookup by TOI, filtered to the requested
    /// kind (FDT objects live under the reserved TOI and are never
    /// returned as `Normal`, and vice versa).
    pub fn object_exists(&self, toi: Toi, kind: ObjectKind) -> Option<&TransportObject> {
        self.objects.get(&toi).filter(|o| o.kind == kind)
    }

    /// Lets an embedder that has learned an object's transfer length out
    /// of band (e.g. from the FDT's XML body) record it; a no-op once the
    /// length has already been fixed by an earlier call.
    pub fn set_transfer_len(&mut self, toi: Toi, len: u64) {
        self.objects
            .entry(toi)
            .or_insert_with(|| TransportObject::new(toi))
            .set_transfer_len_if_unset(len);
    }

    /// Runs the six-step ingest protocol for one ALC packet.
    pub fn ingest(&mut self, packet: &[u8]) -> IngestOutcome {
        let analyzed = match self.analyze(packet) {
            Ok(a) => a,
            Err(_) => {
                self.telemetry.record_malformed_header();
                return IngestOutcome::Dropped;
            }
        };

        let toi = analyzed.lct.toi;
        // Step 1: locate or create the object by TOI.
        let object = self
            .objects
            .entry(toi)
            .or_insert_with(|| TransportObject::new(toi));

        if matches!(object.state, crate::object::ObjectState::Completed | crate::object::ObjectState::Incomplete) {
            return IngestOutcome::Dropped;
        }

        // Step 2: locate or create block by SBN (or the single implicit
        // block derived from start-offset FEC).
        let sbn = analyzed.fec_info.source_block_number();
        let key = match analyzed.fec_info {
            FecObjectInfo::RaptorSbnEsi { esi, .. } => SymbolKey::Esi(esi),
            FecObjectInfo::StartOffset(off) => SymbolKey::Offset(off as u64),
        };

        // Step 3: append payload, deduplicating by key.
        let inserted = object
            .block_mut(sbn)
            .insert_symbol(key, bytes::Bytes::copy_from_slice(analyzed.payload));

        // Step 4: update close_object/close_session latches (sticky).
        object.latch_close_flags(analyzed.lct.close_object, analyzed.lct.close_session);

        if !inserted {
            debug!("duplicate symbol for TOI {toi}, sbn {sbn}; discarded");
        }

        // Step 5: if the block is ready, hand it to the FEC decoder.
        let encoding_id = analyzed.fec_encoding_id;
        let transfer_len_hint = object.transfer_len;
        let block_already_decoded = object.blocks.get(&sbn).map(|b| b.decoded.is_some()).unwrap_or(false);
        if !block_already_decoded {
            if let Ok(decoder) = self.fec.get(encoding_id) {
                let ready = object
                    .blocks
                    .get(&sbn)
                    .map(|b| decoder.is_ready(b, transfer_len_hint))
                    .unwrap_or(false);
                if ready {
                    let block = object.blocks.get(&sbn).expect("block present after insert");
                    match decoder.decode(block) {
                        Ok(decoded) => {
                            object.block_mut(sbn).decoded = Some(decoded);
                        }
                        Err(e) => {
                            self.telemetry.record_unsupported_fec();
                            debug!("FEC decode failed for TOI {toi}, sbn {sbn}: {e}");
                        }
                    }
                }
            } else {
                self.telemetry.record_unsupported_fec();
            }
        }

        // Step 6: if the object is now completed, enqueue a notification.
        if object.is_completed() {
            object.state = crate::object::ObjectState::Completed;
            self.telemetry.record_object_completed();
            return IngestOutcome::Completed(toi);
        }

        IngestOutcome::Progressed
    }

    /// Sweeps every object latched `close_session` but not completed into
    /// the terminal `Incomplete` state, per spec §4.3 failure semantics.
    /// Returns the TOIs that transitioned so waiting readers can be woken.
    pub fn close_session_sweep(&mut self) -> Vec<Toi> {
        let mut newly_incomplete = Vec::new();
        for (toi, object) in self.objects.iter_mut() {
            if object.close_session
                && !matches!(object.state, crate::object::ObjectState::Completed | crate::object::ObjectState::Incomplete)
            {
                object.state = crate::object::ObjectState::Incomplete;
                self.telemetry.record_object_incomplete();
                newly_incomplete.push(*toi);
            }
        }
        newly_incomplete
    }

    pub fn take_completed(&self, toi: Toi) -> Option<bytes::Bytes> {
        self.objects
            .get(&toi)
            .filter(|o| o.is_completed())
            .map(|o| o.concat_payload())
    }

    pub fn object_state(&self, toi: Toi) -> Option<crate::object::ObjectState> {
        self.objects.get(&toi).map(|o| o.state)
    }

    /// Arbitrary (insertion-order-unstable) completed TOI, for
    /// `alc_recv_any`. Callers needing a specific completion order should
    /// use `alc_recv` with a known TOI instead.
    pub fn first_completed_toi(&self) -> Option<Toi> {
        self.objects
            .values()
            .find(|o| matches!(o.state, crate::object::ObjectState::Completed))
            .map(|o| o.toi)
    }

    pub fn fdt_metadata(&self) -> Option<(Option<String>, Option<u32>)> {
        self.objects
            .get(&crate::object::FDT_TOI)
            .map(|o| (o.content_encoding.clone(), o.fdt_instance_id.clone()))
    }
}

impl Default for AlcObjectReassembler {
    fn default() -> Self {
        Self::new(Telemetry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{LCT_VERSION, RAPTOR_FEC_ENCODING_ID};

    fn build_packet(codepoint: u8, toi: u32, close_object: bool, fec_id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut p = Vec::new();
        p.push(LCT_VERSION << 4);
        p.push(if close_object { 0b0100_0000 } else { 0 });
        p.push(3);
        p.push(codepoint);
        p.extend_from_slice(&0u32.to_be_bytes());
        p.extend_from_slice(&toi.to_be_bytes());
        p.extend_from_slice(fec_id);
        p.extend_from_slice(payload);
        p
    }

    #[test]
    fn three_symbol_object_completes_on_close_object() {
        let mut r = AlcObjectReassembler::default();
        let p0 = build_packet(0, 7, false, &[0, 0, 0, 0], b"aaa");
        let p1 = build_packet(0, 7, false, &[0, 0, 0, 3], b"bbb");
        let p2 = build_packet(0, 7, true, &[0, 0, 0, 6], b"ccc");

        assert_eq!(r.ingest(&p0), IngestOutcome::Progressed);
        assert_eq!(r.ingest(&p1), IngestOutcome::Progressed);
        assert_eq!(r.ingest(&p2), IngestOutcome::Completed(7));

        let payload = r.take_completed(7).unwrap();
        assert_eq!(payload, bytes::Bytes::from_static(b"aaabbbccc"));
    }

    #[test]
    fn completed_object_discards_further_packets() {
        let mut r = AlcObjectReassembler::default();
        let p0 = build_packet(0, 1, true, &[0, 0, 0, 0], b"x");
        assert_eq!(r.ingest(&p0), IngestOutcome::Completed(1));
        let p1 = build_packet(0, 1, false, &[0, 0, 0, 1], b"y");
        assert_eq!(r.ingest(&p1), IngestOutcome::Dropped);
    }

    #[test]
    fn close_session_without_completion_yields_incomplete() {
        let mut r = AlcObjectReassembler::default();
        let p0 = build_packet(RAPTOR_FEC_ENCODING_ID, 2, false, &[0, 0, 0, 0], b"partial");
        assert_eq!(r.ingest(&p0), IngestOutcome::Progressed);

        // No close_object packet ever arrives, but session is torn down.
        let mut close = build_packet(RAPTOR_FEC_ENCODING_ID, 2, false, &[0, 0, 0, 0], b"x");
        close[1] |= 0b1000_0000; // close_session
        r.ingest(&close);

        let swept = r.close_session_sweep();
        assert_eq!(swept, vec![2]);
        assert_eq!(r.object_state(2), Some(crate::object::ObjectState::Incomplete));
    }
}
