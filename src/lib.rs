#![warn(rust_2018_idioms)]

//! Core of an ATSC 3.0 broadcast receiver: ALC/LCT and MMTP packet
//! reassembly into ISO-BMFF fragments (spec §1–§2). Raw socket I/O, the
//! atom parser, FEC algorithms, and content decryption are collaborator
//! seams (`IPacketSource`, `IBoxBuilder`, `IFecDecoder`, `IOutputSink`)
//! an embedder supplies concrete implementations for.

// re-export sub-crates, as the teacher's root facade re-exports its
// protocol crates
pub use atsc3_alc;
pub use atsc3_buffer;
pub use atsc3_isobmff;
pub use atsc3_mmtp;

pub mod channel;
pub mod config;
pub mod error;
pub mod packet_source;
pub mod session;

pub use channel::{Channel, ChannelKind, ChannelState};
pub use config::{LogConfig, ReceiverConfig};
pub use error::Error;
pub use packet_source::{IOutputSink, IPacketSource, PacketEvent, ReceivedPacket};
pub use session::Session;

/// Equal to UDP MTU; the largest single datagram a packet source hands
/// to a channel's receive task.
pub(crate) const RECEIVE_MTU: usize = 1460;
