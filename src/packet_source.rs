//! External collaborator traits (spec §6): `IPacketSource` and
//! `IOutputSink`. Raw socket I/O is out of scope (spec Non-goals) — this
//! crate only defines the seam an embedder plugs a real UDP/multicast
//! listener or sink into, the same way `util::conn::Conn`/`Listener` are
//! defined as traits the embedder supplies a concrete `Conn` for.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use atsc3_isobmff::OutputBuffer;

/// One datagram pulled from a packet source, with its source and
/// destination addresses (spec §6 "Packet source": `next(timeout) →
/// (src, dst, bytes)`).
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub src: SocketAddr,
    pub dst: SocketAddr,
    pub bytes: Bytes,
}

/// Outcome of one `IPacketSource::next` call.
#[derive(Debug, Clone)]
pub enum PacketEvent {
    Packet(ReceivedPacket),
    Timeout,
    Closed,
}

/// Pull interface a channel's receive task polls (spec §6).
#[async_trait]
pub trait IPacketSource: Send + Sync {
    async fn next(&self, timeout: Duration) -> PacketEvent;
}

/// Push interface the join task publishes completed output to
/// (spec §6). Returning `false` means the sink is shutting down; the
/// session keeps reassembling but stops publishing (spec §7 `SinkClosed`).
#[async_trait]
pub trait IOutputSink: Send + Sync {
    async fn publish(&self, output: &OutputBuffer) -> bool;
}
