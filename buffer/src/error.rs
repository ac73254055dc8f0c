use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the buffer primitives.
///
/// `CapacityExhausted` corresponds to spec §7's channel-degrading error:
/// callers that see it should release whatever incomplete object the block
/// belonged to and mark the owning channel degraded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("write of {requested} bytes at offset {offset} exceeds capacity {capacity}")]
    CapacityExhausted {
        requested: usize,
        offset: usize,
        capacity: usize,
    },
    #[error("block has already been released")]
    Released,
}
