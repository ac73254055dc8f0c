//! `OutputBuffer` (spec §3): the paired audio/video track buffers the
//! joiner writes into and the sink reads a consistent snapshot of.

use atsc3_buffer::{Block, Ntp64};

use crate::error::{Error, Result};

const DEFAULT_TRACK_CAPACITY: usize = 256 * 1024;
const MDAT_FOURCC: &[u8; 4] = b"mdat";

/// One track's (audio or video) contiguous region: `init || moof ||
/// fragment`, with cursor positions marking each boundary.
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    block: Block,
    pub init_box_pos: usize,
    pub moof_box_pos: usize,
    pub last_moof_box_pos: usize,
    pub fragment_pos: usize,
    pub mpu_presentation_time: Ntp64,
    pub mpu_presentation_time_set: bool,
    /// MPU sequence number of the `mpu_metadata` bucket the current init
    /// box was copied from, so the joiner can tell a re-observed bucket
    /// (no-op) from a genuinely new one (discard-then-copy).
    pub init_source_seq: Option<u32>,
}

impl TrackBuffer {
    pub fn new() -> Self {
        Self {
            block: Block::alloc(DEFAULT_TRACK_CAPACITY),
            init_box_pos: 0,
            moof_box_pos: 0,
            last_moof_box_pos: 0,
            fragment_pos: 0,
            mpu_presentation_time: Ntp64::default(),
            mpu_presentation_time_set: false,
            init_source_seq: None,
        }
    }

    /// Phase 1: installs the init box (`ftyp`/`moov`). `continuation`
    /// selects append (fragmentation_indicator is standalone/first on a
    /// fresh copy, so `false`) vs. discard-then-copy for a later fragment
    /// continuing the same previously-abandoned init (spec §4.6 Phase 1).
    ///
    /// A non-continuation copy also discards any `last_moof_box_pos`
    /// fallback carried in from a prior round's `reset_moof_and_fragment_position`:
    /// the moof those bytes described was built against the *old* init
    /// box's track layout, physically overwritten by the rewind below, so
    /// there is nothing valid left to recover.
    pub fn copy_init_block(&mut self, data: &[u8], continuation: bool) -> Result<()> {
        if !continuation {
            self.block.rewind();
            self.init_box_pos = 0;
            self.moof_box_pos = 0;
            self.last_moof_box_pos = 0;
            self.fragment_pos = 0;
        }
        self.block.write(data)?;
        self.init_box_pos = self.block.len();
        self.moof_box_pos = self.init_box_pos;
        self.last_moof_box_pos = self.init_box_pos;
        self.fragment_pos = self.init_box_pos;
        Ok(())
    }

    pub fn has_init_box(&self) -> bool {
        self.init_box_pos > 0
    }

    /// Start of each build call: rolls the cursor back to the end of the
    /// init box, remembering the previous round's moof span as the
    /// fallback `last_moof_box_pos` (spec §4.6 Phase 2 recovery path).
    pub fn reset_moof_and_fragment_position(&mut self) -> Result<()> {
        self.last_moof_box_pos = self.moof_box_pos;
        self.moof_box_pos = self.init_box_pos;
        self.fragment_pos = self.init_box_pos;
        self.block.seek(self.init_box_pos)?;
        Ok(())
    }

    /// Phase 2: copies moof fragments in order and advances `moof_box_pos`.
    pub fn append_moof_fragment(&mut self, data: &[u8]) -> Result<()> {
        self.block.write(data)?;
        self.moof_box_pos = self.block.len();
        Ok(())
    }

    /// Phase 2 recovery: reuses the previous round's moof bytes, still
    /// physically present at `[init_box_pos, last_moof_box_pos)` since
    /// nothing has overwritten them yet this round.
    pub fn recover_previous_moof(&mut self) -> Result<bool> {
        if self.last_moof_box_pos <= self.init_box_pos {
            return Ok(false);
        }
        self.block.seek(self.last_moof_box_pos)?;
        self.moof_box_pos = self.last_moof_box_pos;
        Ok(true)
    }

    /// Phase 3: appends one media fragment data unit and advances `fragment_pos`.
    pub fn append_media_fragment(&mut self, data: &[u8]) -> Result<()> {
        self.block.write(data)?;
        self.fragment_pos = self.block.len();
        Ok(())
    }

    /// Phase 4: patches the `mdat` box's declared size, which starts
    /// exactly at `moof_box_pos` (the mdat box is the fragment region's
    /// leading box) so it equals `fragment_pos - moof_box_pos`.
    pub fn patch_mdat_box(&mut self) -> Result<()> {
        let mdat_offset = self.moof_box_pos;
        let slice = self.block.as_slice();
        if slice.len() < mdat_offset + 8 || &slice[mdat_offset + 4..mdat_offset + 8] != MDAT_FOURCC {
            return Err(Error::JoinIncomplete("mdat box not found at expected offset"));
        }
        let size = (self.fragment_pos - mdat_offset) as u32;
        self.block.write_at(mdat_offset, &size.to_be_bytes())?;
        Ok(())
    }

    /// The fully assembled `init || moof || fragment` region, ready for
    /// Phase 6 concatenation.
    pub fn as_slice(&self) -> &[u8] {
        &self.block.as_slice()[..self.fragment_pos]
    }
}

impl Default for TrackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Paired audio/video output of one successful joiner build call.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    pub audio: TrackBuffer,
    pub video: TrackBuffer,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self {
            audio: TrackBuffer::new(),
            video: TrackBuffer::new(),
        }
    }

    /// Phase 6: concatenates `(audio-init||moof||mdat)` then
    /// `(video-init||moof||mdat)` into one contiguous stream.
    pub fn join(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.audio.fragment_pos + self.video.fragment_pos);
        out.extend_from_slice(self.audio.as_slice());
        out.extend_from_slice(self.video.as_slice());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mdat_box(payload: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
        b.extend_from_slice(MDAT_FOURCC);
        b.extend_from_slice(payload);
        b
    }

    #[test]
    fn phase1_through_phase4_produce_patched_output() {
        let mut track = TrackBuffer::new();
        track.copy_init_block(b"ftypmoov", false).unwrap();
        track.reset_moof_and_fragment_position().unwrap();
        track.append_moof_fragment(b"moofdata").unwrap();
        // mdat declares a wrong/placeholder size initially.
        let mut mdat = mdat_box(b"xx");
        mdat[3] = 0; // corrupt the declared size on purpose
        track.append_media_fragment(&mdat).unwrap();
        track.patch_mdat_box().unwrap();

        let out = track.as_slice();
        let mdat_offset = track.moof_box_pos;
        let declared_size = u32::from_be_bytes(out[mdat_offset..mdat_offset + 4].try_into().unwrap());
        assert_eq!(declared_size as usize, out.len() - mdat_offset);
    }

    #[test]
    fn recovers_previous_moof_when_new_one_missing() {
        let mut track = TrackBuffer::new();
        track.copy_init_block(b"ftyp", false).unwrap();
        track.reset_moof_and_fragment_position().unwrap();
        track.append_moof_fragment(b"moof-v1").unwrap();
        let first_moof_end = track.moof_box_pos;

        // Next build: no moof found this round.
        track.reset_moof_and_fragment_position().unwrap();
        assert_eq!(track.last_moof_box_pos, first_moof_end);
        let recovered = track.recover_previous_moof().unwrap();
        assert!(recovered);
        assert_eq!(track.moof_box_pos, first_moof_end);
        assert_eq!(track.as_slice(), b"ftypmoof-v1");
    }

    #[test]
    fn init_replacement_drops_stale_moof_fallback() {
        let mut track = TrackBuffer::new();
        track.copy_init_block(b"ftyp-v1", false).unwrap();
        track.reset_moof_and_fragment_position().unwrap();
        track.append_moof_fragment(b"moof-v1").unwrap();

        // Next round: a new init box arrives (track.init_source_seq changes
        // in the joiner), replacing the one `moof-v1` was built against.
        track.reset_moof_and_fragment_position().unwrap();
        track.copy_init_block(b"ftyp-v2", false).unwrap();
        assert_eq!(track.last_moof_box_pos, track.init_box_pos);
        assert!(!track.recover_previous_moof().unwrap());
    }

    #[test]
    fn continuation_appends_instead_of_discarding() {
        let mut track = TrackBuffer::new();
        track.copy_init_block(b"fty", false).unwrap();
        track.copy_init_block(b"pmoov", true).unwrap();
        assert_eq!(&track.block.as_slice()[..track.init_box_pos], b"ftypmoov");
    }

    #[test]
    fn join_concatenates_audio_then_video() {
        let mut ob = OutputBuffer::new();
        ob.audio.copy_init_block(b"A", false).unwrap();
        ob.video.copy_init_block(b"V", false).unwrap();
        assert_eq!(ob.join(), b"AV");
    }
}
