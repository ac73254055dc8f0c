//! ISO-BMFF track joiner (spec §4.6): walks each track through its four
//! build phases, stamps presentation timing, and emits the joined byte
//! stream.

use log::warn;

use atsc3_buffer::Telemetry;
use atsc3_mmtp::{MmtpFragmentReassembler, PacketId, SignallingTableStore, VectorKind};

use crate::output_buffer::{OutputBuffer, TrackBuffer};

/// Per-track build state within one `build_from_*` call (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Empty,
    Init,
    InitMoof,
    Ready,
    Published,
    Abort,
}

pub struct IsobmffJoiner {
    output: OutputBuffer,
    telemetry: Telemetry,
}

impl IsobmffJoiner {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            output: OutputBuffer::new(),
            telemetry,
        }
    }

    /// **A.** Uses the newest completed MPU sequence observed on each
    /// track's media-fragment vector.
    pub fn build_from_flow(
        &mut self,
        reassembler: &MmtpFragmentReassembler,
        signalling: &SignallingTableStore,
        audio_packet_id: PacketId,
        video_packet_id: PacketId,
    ) -> Option<OutputBuffer> {
        let seq_audio = reassembler.highest_mpu_sequence(audio_packet_id, VectorKind::MediaFragmentUnit)?;
        let seq_video = reassembler.highest_mpu_sequence(video_packet_id, VectorKind::MediaFragmentUnit)?;
        self.build_from_mpu_sequence_numbers(
            reassembler,
            signalling,
            audio_packet_id,
            video_packet_id,
            seq_audio,
            seq_video,
        )
    }

    /// **B.** Explicit replay of a specific (audio, video) MPU sequence pair.
    pub fn build_from_mpu_sequence_numbers(
        &mut self,
        reassembler: &MmtpFragmentReassembler,
        signalling: &SignallingTableStore,
        audio_packet_id: PacketId,
        video_packet_id: PacketId,
        seq_audio: u32,
        seq_video: u32,
    ) -> Option<OutputBuffer> {
        let mut audio = std::mem::take(&mut self.output.audio);
        let mut video = std::mem::take(&mut self.output.video);

        let audio_state = self.build_track(&mut audio, reassembler, audio_packet_id, seq_audio);
        let video_state = self.build_track(&mut video, reassembler, video_packet_id, seq_video);

        self.output.audio = audio;
        self.output.video = video;

        if audio_state != TrackState::Ready || video_state != TrackState::Ready {
            self.telemetry.record_join_incomplete();
            return None;
        }

        // Phase 4: mdat patch.
        if self.output.audio.patch_mdat_box().is_err() || self.output.video.patch_mdat_box().is_err() {
            self.telemetry.record_join_incomplete();
            return None;
        }

        // Phase 5: presentation timing.
        if let Some(ts) = signalling.presentation_time_for(audio_packet_id, seq_audio) {
            self.output.audio.mpu_presentation_time = ts;
            self.output.audio.mpu_presentation_time_set = true;
        } else {
            self.telemetry.record_signalling_table_missing();
            self.output.audio.mpu_presentation_time_set = false;
        }
        if let Some(ts) = signalling.presentation_time_for(video_packet_id, seq_video) {
            self.output.video.mpu_presentation_time = ts;
            self.output.video.mpu_presentation_time_set = true;
        } else {
            self.telemetry.record_signalling_table_missing();
            self.output.video.mpu_presentation_time_set = false;
        }

        // Phase 6: join is just `OutputBuffer::join`, left to the caller
        // (the sink wants the paired buffer, not necessarily the flat bytes).
        Some(self.output.clone())
    }

    fn build_track(
        &mut self,
        track: &mut TrackBuffer,
        reassembler: &MmtpFragmentReassembler,
        packet_id: PacketId,
        seq: u32,
    ) -> TrackState {
        if track.reset_moof_and_fragment_position().is_err() {
            return TrackState::Abort;
        }

        // Phase 1: init box. Replacing the init box here (a genuinely new
        // `init_source_seq`) also drops any moof-reuse fallback from the
        // previous round; see `TrackBuffer::copy_init_block`.
        let mut found_init_seq = None;
        for bucket in reassembler.newest_first(packet_id, VectorKind::MpuMetadata) {
            if bucket.is_complete() {
                found_init_seq = Some(bucket.mpu_sequence_number);
                if track.init_source_seq != Some(bucket.mpu_sequence_number) {
                    let Some(payload) = bucket.concat() else { break };
                    if track.copy_init_block(&payload, false).is_err() {
                        return TrackState::Abort;
                    }
                    track.init_source_seq = Some(bucket.mpu_sequence_number);
                }
                break;
            }
        }
        if found_init_seq.is_none() || !track.has_init_box() {
            return TrackState::Abort;
        }
        let mut state = TrackState::Init;

        // Phase 2: moof.
        match reassembler.find_mpu_sequence(packet_id, seq, VectorKind::MovieFragmentMetadata) {
            Some(bucket) if bucket.is_complete() => {
                let Some(payload) = bucket.concat() else {
                    return TrackState::Abort;
                };
                if track.append_moof_fragment(&payload).is_err() {
                    return TrackState::Abort;
                }
                state = TrackState::InitMoof;
            }
            _ => match track.recover_previous_moof() {
                Ok(true) => {
                    warn!("moof missing for seq {seq} on packet_id {packet_id}; reused previous moof");
                    self.telemetry.record_moof_fallback();
                    state = TrackState::InitMoof;
                }
                _ => return TrackState::Abort,
            },
        }

        // Phase 3: media fragments.
        match reassembler.find_mpu_sequence(packet_id, seq, VectorKind::MediaFragmentUnit) {
            Some(bucket) if bucket.is_complete() => {
                let Some(payload) = bucket.concat() else {
                    return TrackState::Abort;
                };
                if track.append_media_fragment(&payload).is_err() {
                    return TrackState::Abort;
                }
                state = TrackState::Ready;
            }
            _ => return TrackState::Abort,
        }

        state
    }
}
