use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from MMTP header decoding and fragment reassembly (spec §4.2, §4.4, §4.5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("truncated MMTP header: need {needed} bytes, have {have}")]
    TruncatedHeader { needed: usize, have: usize },

    #[error("unsupported codepoint: {0}")]
    UnsupportedCodepoint(&'static str),

    #[error("malformed MPT signalling message: {0}")]
    MalformedSignalling(&'static str),

    #[error("buffer error: {0}")]
    Buffer(#[from] atsc3_buffer::Error),
}
