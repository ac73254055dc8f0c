use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from output-buffer assembly and track joining (spec §4.6, §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A build phase returned null (no viable sequence yet); not
    /// propagated to callers — `build_from_*` simply returns `None`.
    #[error("join phase incomplete: {0}")]
    JoinIncomplete(&'static str),

    #[error("buffer error: {0}")]
    Buffer(#[from] atsc3_buffer::Error),
}
