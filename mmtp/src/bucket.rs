//! `MPUFragmentBucket` (spec §3): a timed collection of fragments for one
//! (packet-id, mpu-sequence) pair, with the fragmentation-indicator state
//! machine that detects completion (spec §4.4).

use bytes::Bytes;

use crate::header::FragmentIndicator;

#[derive(Debug, Clone)]
pub struct MpuFragmentBucket {
    pub mpu_sequence_number: u32,
    fragments: Vec<(u8, Bytes)>,
    opening_counter: Option<u8>,
    complete: bool,
    standalone: Option<Bytes>,
}

impl MpuFragmentBucket {
    pub fn new(mpu_sequence_number: u32) -> Self {
        Self {
            mpu_sequence_number,
            fragments: Vec::new(),
            opening_counter: None,
            complete: false,
            standalone: None,
        }
    }

    /// Appends one fragment and re-evaluates completeness.
    ///
    /// - indicator 0 (standalone) bypasses reassembly entirely.
    /// - indicator 1 (first) records the opening counter.
    /// - indicator 2 (middle) is appended; fragments are kept sorted by
    ///   descending counter, matching their arrival order on the wire.
    /// - indicator 3 (last) with counter 0, arriving after a recorded
    ///   opening counter, completes the bucket.
    pub fn append(&mut self, indicator: FragmentIndicator, counter: u8, payload: Bytes) {
        if self.complete {
            return;
        }
        match indicator {
            FragmentIndicator::Standalone => {
                self.standalone = Some(payload);
                self.complete = true;
            }
            FragmentIndicator::First => {
                self.opening_counter = Some(counter);
                self.insert_sorted(counter, payload);
            }
            FragmentIndicator::Middle => {
                self.insert_sorted(counter, payload);
            }
            FragmentIndicator::Last => {
                self.insert_sorted(counter, payload);
                if counter == 0 && self.opening_counter.is_some() {
                    self.complete = true;
                }
            }
        }
    }

    fn insert_sorted(&mut self, counter: u8, payload: Bytes) {
        let pos = self
            .fragments
            .iter()
            .position(|(c, _)| *c < counter)
            .unwrap_or(self.fragments.len());
        self.fragments.insert(pos, (counter, payload));
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Concatenates fragments in descending-counter order into one
    /// payload. `None` until the bucket is complete.
    pub fn concat(&self) -> Option<Bytes> {
        if !self.complete {
            return None;
        }
        if let Some(p) = &self.standalone {
            return Some(p.clone());
        }
        let mut out = Vec::new();
        for (_, payload) in &self.fragments {
            out.extend_from_slice(payload);
        }
        Some(Bytes::from(out))
    }
}
