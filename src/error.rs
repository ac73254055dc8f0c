use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error, chaining every sub-crate's taxonomy (spec §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer error: {0}")]
    Buffer(#[from] atsc3_buffer::Error),

    #[error("ALC error: {0}")]
    Alc(#[from] atsc3_alc::Error),

    #[error("MMTP error: {0}")]
    Mmtp(#[from] atsc3_mmtp::Error),

    #[error("ISO-BMFF error: {0}")]
    Isobmff(#[from] atsc3_isobmff::Error),

    /// A receive task was cancelled at a socket boundary; terminal for
    /// that task (spec §5 "Cancellation").
    #[error("receive task cancelled")]
    Cancelled,

    /// The configured output sink reported it is shutting down
    /// (spec §7 `SinkClosed`); the session keeps reassembling but stops
    /// publishing.
    #[error("output sink closed")]
    SinkClosed,
}
