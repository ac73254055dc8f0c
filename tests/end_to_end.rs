//! End-to-end scenarios S1-S6 from spec §8, exercised across crate
//! boundaries the way a real embedder would drive them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use atsc3_alc::{AlcStore, Error as AlcError};
use atsc3_buffer::Telemetry;
use atsc3_isobmff::IsobmffJoiner;
use atsc3_mmtp::{MmtpFragmentReassembler, SignallingTableStore};
use atsc3_recv::packet_source::{IPacketSource, PacketEvent, ReceivedPacket};
use atsc3_recv::{Channel, ChannelKind};

fn alc_packet(toi: u32, close_object: bool, close_session: bool, offset: u32, payload: &[u8]) -> Vec<u8> {
    let mut flags = 0u8;
    if close_object {
        flags |= 0b0100_0000;
    }
    if close_session {
        flags |= 0b1000_0000;
    }
    let mut p = vec![1u8 << 4, flags, 3, 0];
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&toi.to_be_bytes());
    p.extend_from_slice(&offset.to_be_bytes());
    p.extend_from_slice(payload);
    p
}

/// S1: 3 ALC packets for TOI=7, ESI 0..2, close_object on the last.
#[tokio::test]
async fn s1_alc_recv_returns_concatenated_payload() {
    let store = Arc::new(AlcStore::new("s1", Telemetry::new()));
    store.ingest(&alc_packet(7, false, false, 0, b"aaa")).await;
    store.ingest(&alc_packet(7, false, false, 3, b"bbb")).await;
    store.ingest(&alc_packet(7, true, false, 6, b"ccc")).await;

    let payload = store.alc_recv(7).await.unwrap();
    assert_eq!(payload, Bytes::from_static(b"aaabbbccc"));
    assert_eq!(payload.len(), 9);
}

fn mmtp_packet(packet_id: u16, mpu_seq: u32, indicator: u8, frag_type: u8, counter: u8, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![0u8, 0];
    p.extend_from_slice(&packet_id.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&mpu_seq.to_be_bytes());
    p.push((indicator << 6) | (frag_type << 3));
    p.push(counter);
    p.extend_from_slice(payload);
    p
}

fn mdat_box(payload: &[u8]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&((8 + payload.len()) as u32).to_be_bytes());
    b.extend_from_slice(b"mdat");
    b.extend_from_slice(payload);
    b
}

fn feed_track(reassembler: &mut MmtpFragmentReassembler, packet_id: u16, seq: u32, with_moof: bool) {
    reassembler.ingest(&mmtp_packet(packet_id, 0, 0, 0, 0, b"ftypmoov"));
    if with_moof {
        reassembler.ingest(&mmtp_packet(packet_id, seq, 1, 1, 2, b"A"));
        reassembler.ingest(&mmtp_packet(packet_id, seq, 2, 1, 1, b"B"));
        reassembler.ingest(&mmtp_packet(packet_id, seq, 3, 1, 0, b"C"));
    }
    reassembler.ingest(&mmtp_packet(packet_id, seq, 0, 2, 0, &mdat_box(b"xy")));
}

/// S2: audio/video init+moof+media all at seq=42, joins cleanly.
#[tokio::test]
async fn s2_build_from_mpu_sequence_numbers_produces_sized_output() {
    let mut reassembler = MmtpFragmentReassembler::default();
    feed_track(&mut reassembler, 1, 42, true);
    feed_track(&mut reassembler, 2, 42, true);
    let signalling = SignallingTableStore::new();

    let mut joiner = IsobmffJoiner::new(Telemetry::new());
    let output = joiner
        .build_from_mpu_sequence_numbers(&reassembler, &signalling, 1, 2, 42, 42)
        .expect("both tracks ready");

    assert!(output.audio.init_box_pos > 0);
    assert!(output.audio.fragment_pos > output.audio.moof_box_pos);
    assert!(output.video.init_box_pos > 0);
}

/// S3: video moof missing for seq=42 but present at seq=41; the joiner
/// reuses the prior moof and records a fallback.
#[tokio::test]
async fn s3_missing_moof_falls_back_to_previous() {
    let mut reassembler = MmtpFragmentReassembler::default();
    feed_track(&mut reassembler, 1, 42, true);

    // video: seq 41 has a moof and media fragment, seq 42 has a media
    // fragment but no moof.
    reassembler.ingest(&mmtp_packet(2, 0, 0, 0, 0, b"ftyp"));
    reassembler.ingest(&mmtp_packet(2, 41, 0, 1, 0, b"moof41"));
    reassembler.ingest(&mmtp_packet(2, 41, 0, 2, 0, &mdat_box(b"yy")));
    reassembler.ingest(&mmtp_packet(2, 42, 0, 2, 0, &mdat_box(b"zz")));

    let signalling = SignallingTableStore::new();
    let telemetry = Telemetry::new();
    let mut joiner = IsobmffJoiner::new(telemetry.clone());

    // First build (seq=41) establishes last_moof_box_pos for video.
    joiner
        .build_from_mpu_sequence_numbers(&reassembler, &signalling, 1, 2, 42, 41)
        .expect("seq 41 has a moof");

    let output = joiner
        .build_from_mpu_sequence_numbers(&reassembler, &signalling, 1, 2, 42, 42)
        .expect("video falls back to the previous moof");

    assert!(output.video.fragment_pos > output.video.moof_box_pos);
    assert_eq!(telemetry.moof_fallback_count(), 1);
}

/// S4: an MPT timestamp tuple for seq=42 arrives before the join call;
/// the published output carries it on both tracks.
#[tokio::test]
async fn s4_presentation_time_set_from_signalling() {
    let mut reassembler = MmtpFragmentReassembler::default();
    feed_track(&mut reassembler, 1, 42, true);
    feed_track(&mut reassembler, 2, 42, true);
    let signalling = SignallingTableStore::new();

    let mut mpt = vec![2u8]; // two assets
    for packet_id in [1u16, 2u16] {
        mpt.extend_from_slice(&packet_id.to_be_bytes());
        mpt.push(0); // asset_type
        mpt.push(1); // default_asset_flag
        mpt.extend_from_slice(&0u16.to_be_bytes()); // identifier_len
        mpt.push(1); // has_timestamp_descriptor
        mpt.extend_from_slice(&1u16.to_be_bytes()); // num_tuples
        mpt.extend_from_slice(&42u32.to_be_bytes());
        mpt.extend_from_slice(&0x83AA7E8000000001u64.to_be_bytes());
    }
    signalling.ingest_message(&mpt).unwrap();

    let mut joiner = IsobmffJoiner::new(Telemetry::new());
    let output = joiner
        .build_from_mpu_sequence_numbers(&reassembler, &signalling, 1, 2, 42, 42)
        .unwrap();

    assert!(output.audio.mpu_presentation_time_set);
    assert!(output.video.mpu_presentation_time_set);
    assert_eq!(output.audio.mpu_presentation_time.raw(), 0x83AA7E8000000001);
}

struct ScriptedSource {
    packets: std::sync::Mutex<Vec<Bytes>>,
}

#[async_trait]
impl IPacketSource for ScriptedSource {
    async fn next(&self, _timeout: Duration) -> PacketEvent {
        let mut packets = self.packets.lock().unwrap();
        if packets.is_empty() {
            return PacketEvent::Closed;
        }
        let bytes = packets.remove(0);
        PacketEvent::Packet(ReceivedPacket {
            src: "127.0.0.1:0".parse().unwrap(),
            dst: "127.0.0.1:0".parse().unwrap(),
            bytes,
        })
    }
}

/// S5: a `close_session`-flagged packet transitions the channel closed
/// and unblocks a pending `alc_recv` with session-closed.
#[tokio::test]
async fn s5_close_session_unblocks_pending_recv() {
    let store = Arc::new(AlcStore::new("s5", Telemetry::new()));
    let waiter = {
        let store = store.clone();
        tokio::spawn(async move { store.alc_recv(99).await })
    };
    tokio::task::yield_now().await;

    let source = Arc::new(ScriptedSource {
        packets: std::sync::Mutex::new(vec![Bytes::from(alc_packet(1, false, true, 0, b"x"))]),
    });
    let channel = Channel::new(
        0,
        ChannelKind::Alc(store.clone()),
        source,
        Arc::new(tokio::sync::Notify::new()),
        Telemetry::new(),
    );
    channel.run(Duration::from_millis(10)).await;

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(AlcError::SessionClosed)));
}

/// S6: replaying the same packet trace twice yields byte-for-byte
/// identical joined output both times.
#[tokio::test]
async fn s6_replay_is_byte_for_byte_identical() {
    let trace: Vec<Vec<u8>> = vec![
        mmtp_packet(1, 0, 0, 0, 0, b"ftypmoov"),
        mmtp_packet(1, 7, 1, 1, 1, b"A"),
        mmtp_packet(1, 7, 3, 1, 0, b"B"),
        mmtp_packet(1, 7, 0, 2, 0, &mdat_box(b"pq")),
        mmtp_packet(2, 0, 0, 0, 0, b"ftypmoov"),
        mmtp_packet(2, 7, 1, 1, 1, b"A"),
        mmtp_packet(2, 7, 3, 1, 0, b"B"),
        mmtp_packet(2, 7, 0, 2, 0, &mdat_box(b"pq")),
    ];

    let run = |trace: &[Vec<u8>]| {
        let mut reassembler = MmtpFragmentReassembler::default();
        for p in trace {
            reassembler.ingest(p);
        }
        let signalling = SignallingTableStore::new();
        let mut joiner = IsobmffJoiner::new(Telemetry::new());
        joiner
            .build_from_mpu_sequence_numbers(&reassembler, &signalling, 1, 2, 7, 7)
            .unwrap()
            .join()
    };

    assert_eq!(run(&trace), run(&trace));
}
