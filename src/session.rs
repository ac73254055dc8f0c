//! `Session` (spec §3, §4.7): owns every channel for one broadcast
//! service, demultiplexes the MMTP audio/video high-water marks, and
//! drives the join task that invokes the ISO-BMFF joiner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::{Mutex, Notify};

use atsc3_alc::AlcStore;
use atsc3_buffer::Telemetry;
use atsc3_isobmff::IsobmffJoiner;
use atsc3_mmtp::{MmtpFragmentReassembler, PacketId, SignallingTableStore};

use crate::channel::{Channel, ChannelKind};
use crate::config::ReceiverConfig;
use crate::packet_source::{IOutputSink, IPacketSource};

/// One MMTP audio/video pair the join task should attempt to assemble
/// whenever either side's high-water mark advances.
struct JoinTarget {
    audio_channel: u32,
    video_channel: u32,
    audio_packet_id: PacketId,
    video_packet_id: PacketId,
    reassembler: Arc<Mutex<MmtpFragmentReassembler>>,
    signalling: Arc<SignallingTableStore>,
}

pub struct Session {
    pub session_id: String,
    channels: Mutex<HashMap<u32, Arc<Channel>>>,
    next_channel_id: AtomicU32,
    /// First ALC channel's store, used for the session-level
    /// `fdt_recv`/`alc_recv*` facade (spec §6). An embedder that needs
    /// more than one ALC sub-flow per session opens additional channels
    /// directly via [`Self::alc_channel`].
    primary_alc_store: Mutex<Option<Arc<AlcStore>>>,
    join_notify: Arc<Notify>,
    join_target: Mutex<Option<JoinTarget>>,
    telemetry: Telemetry,
    closed: AtomicBool,
}

impl Session {
    pub fn new(session_id: impl Into<String>, telemetry: Telemetry) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            channels: Mutex::new(HashMap::new()),
            next_channel_id: AtomicU32::new(0),
            primary_alc_store: Mutex::new(None),
            join_notify: Arc::new(Notify::new()),
            join_target: Mutex::new(None),
            telemetry,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens an ALC channel, spawning its receive task (spec §5 "one per
    /// channel"). The first ALC channel opened on a session becomes the
    /// target of `fdt_recv`/`alc_recv*`.
    pub async fn open_alc_channel(
        self: &Arc<Self>,
        packet_source: Arc<dyn IPacketSource>,
        config: &ReceiverConfig,
    ) -> Arc<Channel> {
        let store = Arc::new(AlcStore::new(self.session_id.clone(), self.telemetry.clone()));
        {
            let mut primary = self.primary_alc_store.lock().await;
            if primary.is_none() {
                *primary = Some(store.clone());
            }
        }
        self.spawn_channel(ChannelKind::Alc(store), packet_source, config).await
    }

    /// Opens an MMTP channel for one packet-id, spawning its receive
    /// task. Returns the channel plus the reassembler/signalling handles
    /// a caller needs to later call [`Self::set_join_target`].
    pub async fn open_mmtp_channel(
        self: &Arc<Self>,
        packet_source: Arc<dyn IPacketSource>,
        config: &ReceiverConfig,
    ) -> (Arc<Channel>, Arc<Mutex<MmtpFragmentReassembler>>, Arc<SignallingTableStore>) {
        let reassembler = Arc::new(Mutex::new(MmtpFragmentReassembler::new(self.telemetry.clone())));
        let signalling = Arc::new(SignallingTableStore::new());
        let channel = self
            .spawn_channel(
                ChannelKind::Mmtp {
                    reassembler: reassembler.clone(),
                    signalling: signalling.clone(),
                },
                packet_source,
                config,
            )
            .await;
        (channel, reassembler, signalling)
    }

    async fn spawn_channel(
        self: &Arc<Self>,
        kind: ChannelKind,
        packet_source: Arc<dyn IPacketSource>,
        config: &ReceiverConfig,
    ) -> Arc<Channel> {
        let id = self.next_channel_id.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(Channel::new(
            id,
            kind,
            packet_source,
            self.join_notify.clone(),
            self.telemetry.clone(),
        ));
        self.channels.lock().await.insert(id, channel.clone());
        let spawned = channel.clone();
        let timeout = config.socket_timeout;
        tokio::spawn(async move { spawned.run(timeout).await });
        channel
    }

    /// Configures the audio/video packet-id pair the join task builds
    /// from, and starts that task (spec §4.7). Call once both MMTP
    /// channels for a service are open.
    pub async fn set_join_target(
        self: &Arc<Self>,
        audio_channel: u32,
        video_channel: u32,
        audio_packet_id: PacketId,
        video_packet_id: PacketId,
        reassembler: Arc<Mutex<MmtpFragmentReassembler>>,
        signalling: Arc<SignallingTableStore>,
        sink: Arc<dyn IOutputSink>,
    ) {
        *self.join_target.lock().await = Some(JoinTarget {
            audio_channel,
            video_channel,
            audio_packet_id,
            video_packet_id,
            reassembler,
            signalling,
        });

        let session = self.clone();
        tokio::spawn(async move { session.run_join_task(sink).await });
    }

    async fn run_join_task(self: Arc<Self>, sink: Arc<dyn IOutputSink>) {
        let mut joiner = IsobmffJoiner::new(self.telemetry.clone());
        loop {
            self.join_notify.notified().await;
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            let target = self.join_target.lock().await;
            let Some(target) = target.as_ref() else { continue };
            let reassembler = target.reassembler.lock().await;
            let Some(seq_audio) =
                reassembler.highest_mpu_sequence(target.audio_packet_id, atsc3_mmtp::VectorKind::MediaFragmentUnit)
            else {
                continue;
            };
            let Some(seq_video) =
                reassembler.highest_mpu_sequence(target.video_packet_id, atsc3_mmtp::VectorKind::MediaFragmentUnit)
            else {
                continue;
            };
            let output = joiner.build_from_mpu_sequence_numbers(
                &reassembler,
                &target.signalling,
                target.audio_packet_id,
                target.video_packet_id,
                seq_audio,
                seq_video,
            );
            drop(reassembler);
            let Some(output) = output else {
                debug!(
                    "session {}: join attempt incomplete for channels {}/{}, waiting for next advance",
                    self.session_id, target.audio_channel, target.video_channel
                );
                continue;
            };
            if !sink.publish(&output).await {
                self.telemetry.record_sink_closed();
                return;
            }
        }
    }

    /// Blocks until TOI `toi` completes on the primary ALC channel
    /// (spec §6 `alc_recv`).
    pub async fn alc_recv(&self, toi: atsc3_alc::Toi) -> atsc3_alc::AlcRecvResult<bytes::Bytes> {
        let store = self.primary_store().await;
        store.alc_recv(toi).await
    }

    pub async fn alc_recv_any(&self) -> atsc3_alc::AlcRecvResult<(atsc3_alc::Toi, bytes::Bytes)> {
        let store = self.primary_store().await;
        store.alc_recv_any().await
    }

    pub async fn fdt_recv(
        &self,
    ) -> atsc3_alc::AlcRecvResult<(bytes::Bytes, Option<String>, Option<u32>)> {
        let store = self.primary_store().await;
        store.fdt_recv().await
    }

    async fn primary_store(&self) -> Arc<AlcStore> {
        self.primary_alc_store
            .lock()
            .await
            .clone()
            .expect("alc_recv* called before any ALC channel was opened")
    }

    /// Closes every channel and stops the join task (spec §5
    /// "Cancellation"): drains nothing further, since `run_join_task`
    /// exits on its own once woken with `closed` set.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let channels = self.channels.lock().await;
        for channel in channels.values() {
            channel.close().await;
        }
        // `notify_one`, not `notify_waiters`: the join task is the sole
        // waiter on this `Notify`, and `notify_one` stores a permit even
        // if it isn't waiting yet, closing the race where `close()` runs
        // before the task reaches its first `notified().await`.
        self.join_notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet_source::PacketEvent;
    use async_trait::async_trait;
    use atsc3_isobmff::OutputBuffer;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct EmptySource;

    #[async_trait]
    impl IPacketSource for EmptySource {
        async fn next(&self, _timeout: Duration) -> PacketEvent {
            PacketEvent::Closed
        }
    }

    struct RecordingSink {
        published: StdMutex<Vec<OutputBuffer>>,
    }

    #[async_trait]
    impl IOutputSink for RecordingSink {
        async fn publish(&self, output: &OutputBuffer) -> bool {
            self.published.lock().unwrap().push(output.clone());
            true
        }
    }

    #[tokio::test]
    async fn opening_alc_channel_registers_primary_store() {
        let session = Session::new("sess-1", Telemetry::new());
        let channel = session.open_alc_channel(Arc::new(EmptySource), &ReceiverConfig::default()).await;
        assert_eq!(channel.id, 0);
        // Give the spawned receive task a chance to observe the closed source.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = session.alc_recv(1).await;
        assert!(matches!(result, Err(atsc3_alc::Error::SessionClosed)));
    }

    #[tokio::test]
    async fn close_stops_join_task_without_publishing() {
        let session = Session::new("sess-2", Telemetry::new());
        let reassembler = Arc::new(Mutex::new(MmtpFragmentReassembler::new(Telemetry::new())));
        let signalling = Arc::new(SignallingTableStore::new());
        let sink = Arc::new(RecordingSink {
            published: StdMutex::new(Vec::new()),
        });
        session
            .set_join_target(0, 1, 1, 2, reassembler, signalling, sink.clone())
            .await;
        session.close().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(sink.published.lock().unwrap().is_empty());
    }
}
