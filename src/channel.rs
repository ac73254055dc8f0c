//! `Channel` (spec §3, §4.7): one receive task per socket, routing
//! decoded payloads to the appropriate reassembler and tracking the
//! highest observed MPU sequence number per packet-id.
//!
//! Per spec §9 "cyclic references... become: session exclusively owns
//! channels; channels hold a weak back-reference... resolved through the
//! session registry" — here that back-reference is the `Arc<Notify>` the
//! session's join task waits on, not an `Arc<Session>` (which would keep
//! the session alive from inside its own channel and complicate shutdown).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::{Mutex, Notify};

use atsc3_alc::AlcStore;
use atsc3_buffer::Telemetry;
use atsc3_mmtp::{IngestEvent, MmtpFragmentReassembler, PacketId, SignallingTableStore, VectorKindTag};

use crate::packet_source::{IPacketSource, PacketEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Opened = 0,
    Receiving = 1,
    Closed = 2,
}

impl ChannelState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ChannelState::Opened,
            1 => ChannelState::Receiving,
            _ => ChannelState::Closed,
        }
    }
}

/// Which reassembler a channel's packets are routed to.
pub enum ChannelKind {
    Alc(Arc<AlcStore>),
    Mmtp {
        reassembler: Arc<Mutex<MmtpFragmentReassembler>>,
        signalling: Arc<SignallingTableStore>,
    },
}

pub struct Channel {
    pub id: u32,
    kind: ChannelKind,
    packet_source: Arc<dyn IPacketSource>,
    state: AtomicU8,
    /// Highest completed MPU sequence seen per MMTP packet-id, read by
    /// the session's join task (spec §4.7).
    high_water_marks: Mutex<HashMap<PacketId, u32>>,
    session_notify: Arc<Notify>,
    telemetry: Telemetry,
}

impl Channel {
    pub fn new(
        id: u32,
        kind: ChannelKind,
        packet_source: Arc<dyn IPacketSource>,
        session_notify: Arc<Notify>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            id,
            kind,
            packet_source,
            state: AtomicU8::new(ChannelState::Opened as u8),
            high_water_marks: Mutex::new(HashMap::new()),
            session_notify,
            telemetry,
        }
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub async fn high_water_mark(&self, packet_id: PacketId) -> Option<u32> {
        self.high_water_marks.lock().await.get(&packet_id).copied()
    }

    /// Runs the receive loop until the packet source closes or the
    /// channel is cancelled. Intended to be `tokio::spawn`ed by the
    /// owning session (spec §5 "one per channel").
    pub async fn run(&self, socket_timeout: Duration) {
        self.state.store(ChannelState::Receiving as u8, Ordering::SeqCst);
        loop {
            if self.state() == ChannelState::Closed {
                return;
            }
            match self.packet_source.next(socket_timeout).await {
                PacketEvent::Packet(p) => self.handle_packet(p.bytes).await,
                PacketEvent::Timeout => continue,
                PacketEvent::Closed => {
                    self.close().await;
                    return;
                }
            }
        }
    }

    async fn handle_packet(&self, packet: Bytes) {
        match &self.kind {
            ChannelKind::Alc(store) => {
                if let Ok(analyzed) = atsc3_alc::analyze_alc_packet(&packet) {
                    let should_close = analyzed.lct.close_session;
                    store.ingest(&packet).await;
                    if should_close {
                        store.close_session().await;
                        self.close().await;
                    }
                } else {
                    self.telemetry.record_malformed_header();
                }
            }
            ChannelKind::Mmtp { reassembler, signalling } => {
                let event = reassembler.lock().await.ingest(&packet);
                match event {
                    IngestEvent::MpuFragmentAppended {
                        packet_id,
                        mpu_sequence_number,
                        vector: VectorKindTag::MediaFragmentUnit,
                        bucket_complete: true,
                    } => {
                        let advanced = {
                            let mut marks = self.high_water_marks.lock().await;
                            let entry = marks.entry(packet_id).or_insert(0);
                            let advanced = mpu_sequence_number > *entry || *entry == 0;
                            *entry = (*entry).max(mpu_sequence_number);
                            advanced
                        };
                        if advanced {
                            self.session_notify.notify_one();
                        }
                    }
                    IngestEvent::MpuFragmentAppended { .. } => {}
                    IngestEvent::SignallingFragment { payload, .. } => {
                        if let Err(e) = signalling.ingest_message(&payload) {
                            warn!("channel {}: malformed MPT message: {e}", self.id);
                        }
                    }
                    IngestEvent::Dropped => {
                        debug!("channel {}: dropped malformed MMTP packet", self.id);
                    }
                }
            }
        }
    }

    /// Closes the channel (spec §8 invariant 6: transitions within one
    /// receive cycle of a `close_session`-bearing packet).
    pub async fn close(&self) {
        self.state.store(ChannelState::Closed as u8, Ordering::SeqCst);
        if let ChannelKind::Alc(store) = &self.kind {
            store.close_session().await;
        }
        self.session_notify.notify_one();
    }
}
