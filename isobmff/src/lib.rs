#![warn(rust_2018_idioms)]

//! ISO-BMFF fragment output buffering and track joining (spec §4.6).

pub mod box_builder;
pub mod error;
pub mod joiner;
pub mod output_buffer;

pub use box_builder::{IBoxBuilder, Mp4BoxBuilder};
pub use error::{Error, Result};
pub use joiner::{IsobmffJoiner, TrackState};
pub use output_buffer::{OutputBuffer, TrackBuffer};
