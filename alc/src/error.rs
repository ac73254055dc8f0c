use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from LCT/ALC header decoding and object reassembly (spec §4.2, §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bytes than the declared header length demands.
    #[error("truncated LCT/ALC header: need {needed} bytes, have {have}")]
    TruncatedHeader { needed: usize, have: usize },

    /// LCT version field != 1, or a reserved bit is set where forbidden.
    #[error("unsupported codepoint: {0}")]
    UnsupportedCodepoint(&'static str),

    /// The FEC decoder registry has no entry for this encoding ID.
    #[error("unsupported FEC encoding id {0}")]
    UnsupportedFec(u8),

    #[error("buffer error: {0}")]
    Buffer(#[from] atsc3_buffer::Error),

    /// FEC decode failed for an already-ready block.
    #[error("FEC decode failed: {0}")]
    FecDecode(String),

    /// The owning channel/session closed before the requested object
    /// completed (spec §6 return code -1).
    #[error("session closed")]
    SessionClosed,

    /// `close_session` latched before every block of the object decoded
    /// (spec §6 return code -2).
    #[error("object incomplete at session close")]
    Incomplete,

    /// Spilling a completed object to a temp file failed.
    #[error("temp file I/O failed: {0}")]
    TempFileIo(String),
}
